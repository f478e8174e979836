use std::future::Future;

use camfleet_core::pool::CancelFlag;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Exit status after a forced abort, as a shell reports SIGINT.
const ABORT_EXIT_CODE: i32 = 130;

/// Watches Ctrl-C for a long-running command.
///
/// The first signal trips `cancel` so in-flight work can finish. A second one exits the
/// process without waiting for it.
pub fn watch(cancel: CancelFlag, on_first: &'static str) -> JoinHandle<()> {
    tokio::spawn(async move {
        if escalate(tokio::signal::ctrl_c, &cancel, on_first).await {
            error!("aborted");
            std::process::exit(ABORT_EXIT_CODE);
        }
    })
}

/// Returns `true` once a second signal arrives after `cancel` was tripped.
async fn escalate<F, Fut>(mut signal: F, cancel: &CancelFlag, on_first: &str) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if signal().await.is_err() {
        return false;
    }
    warn!("{on_first}, press Ctrl-C again to abort");
    cancel.cancel();

    signal().await.is_ok()
}
