//! # Network Scanner
//!
//! Sweeps a set of addresses for eligible devices. Every address goes through the
//! [`DeviceProbe`] and, when something answers, the [`Classifier`]. Addresses are handed
//! to a bounded [`pool`](crate::pool) so a large range never opens more than
//! `scan_concurrency` connections at once.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use camfleet_common::config::Config;
use camfleet_common::credential::Credential;
use camfleet_common::device::{Classification, DiscoveredDevice};
use camfleet_common::network::range::IpCollection;
use tracing::{info, warn};

use crate::classifier::Classifier;
use crate::error::{Error, Result};
use crate::pool::{self, CancelFlag};
use crate::probe::DeviceProbe;
use crate::transport::DeviceTransport;

/// Sweep progress after each address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    pub completed: usize,
    pub total: usize,
    /// Addresses that answered the management endpoint so far.
    pub found: usize,
}

pub type ProgressCallback = Arc<dyn Fn(ScanProgress) + Send + Sync>;

pub struct Discovery {
    probe: Arc<DeviceProbe>,
    classifier: Arc<Classifier>,
    config: Arc<Config>,
    cancel: CancelFlag,
    on_progress: Option<ProgressCallback>,
}

impl Discovery {
    pub fn new(transport: Arc<dyn DeviceTransport>, config: Arc<Config>) -> Self {
        Self {
            probe: Arc::new(DeviceProbe::new(transport.clone(), config.clone())),
            classifier: Arc::new(Classifier::new(transport, config.clone())),
            config,
            cancel: CancelFlag::new(),
            on_progress: None,
        }
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ScanProgress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Checks and classifies every address in `targets`.
    ///
    /// Silent addresses are absent from the result; rejected devices are kept with their
    /// reason. The result is sorted by address.
    pub async fn scan(
        &self,
        targets: &IpCollection,
        credential: &Credential,
    ) -> Result<Vec<DiscoveredDevice>> {
        if self.config.scan_concurrency == 0 {
            return Err(Error::InvalidJob("scan concurrency must be at least 1".into()));
        }

        let addrs: Vec<IpAddr> = targets.iter().copied().collect();
        let total = addrs.len();
        let completed = Arc::new(AtomicUsize::new(0));
        let found = Arc::new(AtomicUsize::new(0));

        let probe = self.probe.clone();
        let classifier = self.classifier.clone();
        let credential = credential.clone();
        let on_progress = self.on_progress.clone();

        let report = pool::run_pool(
            addrs,
            self.config.scan_concurrency,
            self.cancel.clone(),
            move |address| {
                let probe = probe.clone();
                let classifier = classifier.clone();
                let credential = credential.clone();
                let on_progress = on_progress.clone();
                let completed = completed.clone();
                let found = found.clone();

                async move {
                    let mut device = probe.probe(address).await;
                    if let Some(device) = device.as_mut() {
                        found.fetch_add(1, Ordering::SeqCst);
                        classifier.classify(device, &credential).await;
                    }

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(callback) = &on_progress {
                        callback(ScanProgress {
                            completed: done,
                            total,
                            found: found.load(Ordering::SeqCst),
                        });
                    }
                    device
                }
            },
        )
        .await;

        for (address, message) in &report.panicked {
            warn!("scan of {address} aborted: {message}");
        }
        if !report.skipped.is_empty() {
            info!("sweep cancelled, {} addresses not probed", report.skipped.len());
        }

        let mut devices: Vec<DiscoveredDevice> = report
            .completed
            .into_iter()
            .filter_map(|(_, device)| device)
            .collect();
        devices.sort_by_key(|device| device.address);

        let confirmed = devices
            .iter()
            .filter(|device| device.classification == Classification::Confirmed)
            .count();
        info!(
            "{} devices answered out of {total} addresses, {confirmed} confirmed",
            devices.len()
        );
        Ok(devices)
    }

    /// Classifies one known address on `port` without the liveness check.
    ///
    /// Returns `None` when the address never sent back a reply: the connection was refused
    /// or the first request ran out of time. Anything that answered, even with a failed
    /// TLS handshake or a bad password, comes back as a device.
    pub async fn quick_check(
        &self,
        address: IpAddr,
        port: u16,
        credential: &Credential,
    ) -> Option<DiscoveredDevice> {
        let mut device = DiscoveredDevice::candidate(address, port);
        let session = self.classifier.session(&device, credential);

        match self
            .classifier
            .classify_with(&session, &mut device, credential)
            .await
        {
            Some(e) if e.is_silence() && !session.has_answered() => {
                info!("{} does not answer: {e}", SocketAddr::new(address, port));
                None
            }
            _ => Some(device),
        }
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
