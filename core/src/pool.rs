//! Bounded worker pool shared by sweeps and batch deployments.
//!
//! `N` long-lived workers pull items from one queue. Each item runs in its own tokio task
//! so a panic costs only that item; the worker records it and moves on. The queue lock is
//! never held across an await point.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, error};

/// Cooperative cancellation shared between a caller and a running pool.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops new items from being scheduled. Items already running are not interrupted.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything that happened to the submitted items.
#[derive(Debug)]
pub struct PoolReport<T, R> {
    pub completed: Vec<(T, R)>,
    /// Items whose task panicked, with the panic message.
    pub panicked: Vec<(T, String)>,
    /// Items never started because the pool was cancelled.
    pub skipped: Vec<T>,
}

impl<T, R> Default for PoolReport<T, R> {
    fn default() -> Self {
        Self {
            completed: Vec::new(),
            panicked: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// Runs `work` over `items` with at most `workers` in flight.
pub async fn run_pool<T, R, F, Fut>(
    items: Vec<T>,
    workers: usize,
    cancel: CancelFlag,
    work: F,
) -> PoolReport<T, R>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let workers = workers.max(1).min(items.len().max(1));
    let queue: Arc<Mutex<VecDeque<T>>> = Arc::new(Mutex::new(items.into_iter().collect()));
    let work = Arc::new(work);

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let queue = queue.clone();
        let work = work.clone();
        let cancel = cancel.clone();

        handles.push(tokio::spawn(async move {
            let mut report: PoolReport<T, R> = PoolReport::default();
            loop {
                if cancel.is_cancelled() {
                    debug!("worker {worker_id} stopping on cancel");
                    break;
                }
                let Some(item) = pop(&queue) else {
                    break;
                };

                let task = tokio::spawn(work(item.clone()));
                match task.await {
                    Ok(output) => report.completed.push((item, output)),
                    Err(join_error) => {
                        let message = panic_message(join_error);
                        error!("worker {worker_id}: task panicked: {message}");
                        report.panicked.push((item, message));
                    }
                }
            }
            report
        }));
    }

    let mut report = PoolReport::default();
    for handle in handles {
        match handle.await {
            Ok(part) => {
                report.completed.extend(part.completed);
                report.panicked.extend(part.panicked);
            }
            Err(e) => error!("worker exited abnormally: {e}"),
        }
    }

    report.skipped = drain(&queue);
    report
}

fn pop<T>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    match queue.lock() {
        Ok(mut guard) => guard.pop_front(),
        Err(poisoned) => poisoned.into_inner().pop_front(),
    }
}

fn drain<T>(queue: &Mutex<VecDeque<T>>) -> Vec<T> {
    match queue.lock() {
        Ok(mut guard) => guard.drain(..).collect(),
        Err(poisoned) => poisoned.into_inner().drain(..).collect(),
    }
}

fn panic_message(join_error: tokio::task::JoinError) -> String {
    if join_error.is_cancelled() {
        return "task was cancelled".to_string();
    }
    let payload = join_error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
