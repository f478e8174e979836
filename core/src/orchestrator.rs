//! # Batch Deployment Orchestrator
//!
//! Fans one package out to many devices. A job is validated up front, then handed to the
//! bounded [`pool`](crate::pool): `concurrency` workers pull device endpoints from one
//! queue and drive each through a [`TaskRunner`]. The caller gets a [`DeploymentRun`]
//! handle and the receiving end of the job's own progress channel.
//!
//! The final [`BatchReport`] always holds one entry per distinct submitted address,
//! whether its task succeeded, failed, panicked or was never scheduled.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use camfleet_common::config::Config;
use camfleet_common::credential::Credential;
use camfleet_common::deployment::{
    BatchReport, ConfigurePolicy, DeploymentResult, DeploymentStage, ProgressEvent,
};
use camfleet_common::device::DiscoveredDevice;
use camfleet_common::package::PackageArtifact;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::deploy::{DeploymentPlan, TaskRunner};
use crate::error::{Error, Result};
use crate::pool::{self, CancelFlag};
use crate::transport::DeviceTransport;

pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_PORT: u16 = 80;

pub type ProgressStream = UnboundedReceiver<ProgressEvent>;

#[derive(Debug, Clone)]
pub struct BatchDeploymentJob {
    pub targets: Vec<SocketAddr>,
    pub artifact: PackageArtifact,
    pub concurrency: usize,
    pub configuration: Option<serde_json::Value>,
    pub configure_policy: ConfigurePolicy,
    pub credential: Credential,
}

impl BatchDeploymentJob {
    pub fn new(targets: Vec<SocketAddr>, artifact: PackageArtifact, credential: Credential) -> Self {
        Self {
            targets,
            artifact,
            concurrency: DEFAULT_CONCURRENCY,
            configuration: None,
            configure_policy: ConfigurePolicy::default(),
            credential,
        }
    }

    /// Targets every address on the default management port.
    pub fn for_addresses<I>(addresses: I, artifact: PackageArtifact, credential: Credential) -> Self
    where
        I: IntoIterator<Item = IpAddr>,
    {
        let targets = addresses
            .into_iter()
            .map(|address| SocketAddr::new(address, DEFAULT_PORT))
            .collect();
        Self::new(targets, artifact, credential)
    }

    /// Targets the confirmed devices of a sweep; everything else is left out.
    pub fn from_devices(
        devices: &[DiscoveredDevice],
        artifact: PackageArtifact,
        credential: Credential,
    ) -> Self {
        let targets = devices
            .iter()
            .filter(|device| device.is_deployable())
            .map(|device| SocketAddr::new(device.address, device.port))
            .collect();
        Self::new(targets, artifact, credential)
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_configuration(mut self, configuration: serde_json::Value) -> Self {
        self.configuration = Some(configuration);
        self
    }

    pub fn with_configure_policy(mut self, policy: ConfigurePolicy) -> Self {
        self.configure_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::InvalidJob("concurrency must be at least 1".into()));
        }
        if self.artifact.size == 0 {
            return Err(Error::InvalidJob(format!(
                "package {} is empty",
                self.artifact.file_name
            )));
        }
        if self.artifact.name.trim().is_empty() {
            return Err(Error::InvalidJob("package name is empty".into()));
        }
        Ok(())
    }

    /// Targets with repeated addresses collapsed, first occurrence wins.
    fn distinct_targets(&self) -> Vec<SocketAddr> {
        let mut seen = HashSet::new();
        self.targets
            .iter()
            .copied()
            .filter(|target| seen.insert(target.ip()))
            .collect()
    }
}

pub struct BatchDeployer {
    transport: Arc<dyn DeviceTransport>,
    config: Arc<Config>,
}

impl BatchDeployer {
    pub fn new(transport: Arc<dyn DeviceTransport>, config: Arc<Config>) -> Self {
        Self { transport, config }
    }

    /// Validates `job` and starts it in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn deploy_batch(&self, job: BatchDeploymentJob) -> Result<(DeploymentRun, ProgressStream)> {
        job.validate()?;

        let job_id = Uuid::new_v4();
        let targets = job.distinct_targets();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let cancel = CancelFlag::new();

        let plan = Arc::new(DeploymentPlan {
            artifact: job.artifact,
            configuration: job.configuration,
            configure_policy: job.configure_policy,
            credential: job.credential,
        });
        let runner = Arc::new(TaskRunner::new(
            self.transport.clone(),
            self.config.clone(),
            plan.clone(),
            job_id,
            progress_tx,
        ));

        info!(
            "job {job_id}: deploying {} v{} to {} devices, {} at a time",
            plan.artifact.name,
            plan.artifact.version,
            targets.len(),
            job.concurrency
        );

        let handle = tokio::spawn(run_job(
            job_id,
            targets.clone(),
            job.concurrency,
            cancel.clone(),
            runner,
        ));

        let run = DeploymentRun {
            job_id,
            targets: targets.iter().map(SocketAddr::ip).collect(),
            cancel,
            handle,
        };
        Ok((run, progress_rx))
    }
}

async fn run_job(
    job_id: Uuid,
    targets: Vec<SocketAddr>,
    concurrency: usize,
    cancel: CancelFlag,
    runner: Arc<TaskRunner>,
) -> BatchReport {
    let worker_runner = runner.clone();
    let outcome = pool::run_pool(targets, concurrency, cancel, move |endpoint| {
        let runner = worker_runner.clone();
        async move { runner.run(endpoint).await }
    })
    .await;

    let mut report = BatchReport::new(job_id);
    for (endpoint, result) in outcome.completed {
        report.results.insert(endpoint.ip(), result);
    }

    for (endpoint, message) in outcome.panicked {
        let address = endpoint.ip();
        let reason = format!("task panicked: {message}");
        runner.report_aborted(address, &reason);
        report.results.insert(
            address,
            DeploymentResult::Failure {
                stage: runner.last_stage(&address).unwrap_or(DeploymentStage::Connecting),
                step: None,
                reason,
            },
        );
    }

    for endpoint in outcome.skipped {
        let address = endpoint.ip();
        runner.report_aborted(address, "cancelled");
        report.results.insert(
            address,
            DeploymentResult::Failure {
                stage: DeploymentStage::Connecting,
                step: None,
                reason: "cancelled".to_string(),
            },
        );
    }

    info!(
        "job {job_id}: {} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );
    report
}

/// Handle on a running batch.
pub struct DeploymentRun {
    job_id: Uuid,
    targets: Vec<IpAddr>,
    cancel: CancelFlag,
    handle: JoinHandle<BatchReport>,
}

impl DeploymentRun {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Distinct addresses of the job, in submission order.
    pub fn targets(&self) -> &[IpAddr] {
        &self.targets
    }

    /// Stops scheduling. Tasks already running finish or time out on their own.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Waits for every task and returns the complete report.
    pub async fn wait(self) -> BatchReport {
        match self.handle.await {
            Ok(report) => report,
            Err(e) => {
                error!("job {} aborted: {e}", self.job_id);
                let mut report = BatchReport::new(self.job_id);
                for address in self.targets {
                    report.results.insert(
                        address,
                        DeploymentResult::Failure {
                            stage: DeploymentStage::Connecting,
                            step: None,
                            reason: format!("job aborted: {e}"),
                        },
                    );
                }
                report
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::scripted::{challenge_401, ScriptedTransport};
    use crate::transport::DeviceResponse;
    use camfleet_common::device::{Classification, RejectReason};

    fn artifact() -> PackageArtifact {
        PackageArtifact::from_bytes("app", "2", "app.pkg", vec![9; 32])
    }

    fn cred() -> Credential {
        Credential::new("root", "pass")
    }

    fn fleet() -> Arc<ScriptedTransport> {
        Arc::new(ScriptedTransport::new(|req| {
            if req.authorization.is_none() {
                return Ok(challenge_401("batch"));
            }
            Ok(DeviceResponse::new(200, "OK"))
        }))
    }

    fn addrs(n: u8) -> Vec<IpAddr> {
        (1..=n).map(|i| IpAddr::from([10, 1, 0, i])).collect()
    }

    #[tokio::test]
    async fn invalid_jobs_are_refused_before_anything_runs() {
        let deployer = BatchDeployer::new(fleet(), Arc::new(Config::default()));

        let zero = BatchDeploymentJob::for_addresses(addrs(2), artifact(), cred()).with_concurrency(0);
        assert!(matches!(deployer.deploy_batch(zero), Err(Error::InvalidJob(_))));

        let empty = PackageArtifact::from_bytes("app", "2", "app.pkg", Vec::new());
        let job = BatchDeploymentJob::for_addresses(addrs(2), empty, cred());
        assert!(matches!(deployer.deploy_batch(job), Err(Error::InvalidJob(_))));
    }

    #[tokio::test]
    async fn duplicates_are_collapsed_and_report_is_complete() {
        let deployer = BatchDeployer::new(fleet(), Arc::new(Config::default()));
        let mut targets = addrs(4);
        targets.extend(addrs(2));

        let job = BatchDeploymentJob::for_addresses(targets, artifact(), cred()).with_concurrency(2);
        let (run, mut progress) = deployer.deploy_batch(job).unwrap();
        assert_eq!(run.targets().len(), 4);

        let report = run.wait().await;
        assert_eq!(report.len(), 4);
        assert_eq!(report.succeeded(), 4);

        let mut complete = 0;
        while let Some(event) = progress.recv().await {
            if event.stage == DeploymentStage::Complete {
                complete += 1;
            }
        }
        assert_eq!(complete, 4);
    }

    #[tokio::test]
    async fn only_confirmed_devices_are_targeted() {
        let mut confirmed = DiscoveredDevice::candidate(IpAddr::from([10, 1, 0, 1]), 80);
        confirmed.classification = Classification::Confirmed;
        let mut speaker = DiscoveredDevice::candidate(IpAddr::from([10, 1, 0, 2]), 80);
        speaker.classification = Classification::Rejected {
            reason: RejectReason::WrongProductClass {
                product_type: "Speaker".into(),
            },
        };
        let mut locked = DiscoveredDevice::candidate(IpAddr::from([10, 1, 0, 3]), 443);
        locked.classification = Classification::RequiresAuth {
            reason: "rejected".into(),
        };

        let job = BatchDeploymentJob::from_devices(&[confirmed, speaker, locked], artifact(), cred());
        assert_eq!(job.targets, vec!["10.1.0.1:80".parse::<SocketAddr>().unwrap()]);
    }

    #[tokio::test]
    async fn cancelled_job_reports_unscheduled_devices() {
        let deployer = BatchDeployer::new(fleet(), Arc::new(Config::default()));
        let job = BatchDeploymentJob::for_addresses(addrs(6), artifact(), cred()).with_concurrency(1);

        let (run, _progress) = deployer.deploy_batch(job).unwrap();
        run.cancel();
        let report = run.wait().await;

        assert_eq!(report.len(), 6);
        let cancelled = report
            .iter()
            .filter(|(_, r)| matches!(r, DeploymentResult::Failure { reason, .. } if reason == "cancelled"))
            .count();
        assert_eq!(cancelled + report.succeeded(), 6);
        assert!(cancelled >= 5);
    }
}
