//! Drives one device through the deployment stages and reports every move.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};

use camfleet_common::config::Config;
use camfleet_common::credential::Credential;
use camfleet_common::deployment::{
    ConfigurePolicy, ControlAction, DeploymentResult, DeploymentStage, DeploymentTask, LifecycleStep,
    ProgressEvent,
};
use camfleet_common::package::PackageArtifact;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::lifecycle::PackageManager;
use crate::transport::DeviceTransport;

/// What every task of a batch installs, shared read-only between workers.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    pub artifact: PackageArtifact,
    pub configuration: Option<serde_json::Value>,
    pub configure_policy: ConfigurePolicy,
    pub credential: Credential,
}

pub struct TaskRunner {
    transport: Arc<dyn DeviceTransport>,
    config: Arc<Config>,
    plan: Arc<DeploymentPlan>,
    job_id: Uuid,
    progress: UnboundedSender<ProgressEvent>,
    last_stage: Mutex<HashMap<IpAddr, DeploymentStage>>,
}

impl TaskRunner {
    pub fn new(
        transport: Arc<dyn DeviceTransport>,
        config: Arc<Config>,
        plan: Arc<DeploymentPlan>,
        job_id: Uuid,
        progress: UnboundedSender<ProgressEvent>,
    ) -> Self {
        Self {
            transport,
            config,
            plan,
            job_id,
            progress,
            last_stage: Mutex::new(HashMap::new()),
        }
    }

    /// Runs the whole lifecycle against `endpoint`. Never returns an error: a failure is a
    /// [`DeploymentResult::Failure`] naming the stage and sub-step.
    pub async fn run(&self, endpoint: SocketAddr) -> DeploymentResult {
        let mut task = DeploymentTask::new(
            endpoint.ip(),
            self.plan.artifact.name.clone(),
            self.plan.artifact.version.clone(),
        );
        self.emit(&task, None);

        let manager = PackageManager::new(
            self.transport.clone(),
            self.config.clone(),
            endpoint,
            self.plan.credential.clone(),
        );

        match self.drive(&mut task, &manager).await {
            Ok(warning) => {
                info!("{} deployed to {}", self.plan.artifact.name, endpoint);
                DeploymentResult::Success {
                    version: self.plan.artifact.version.clone(),
                    warning,
                }
            }
            Err(e) => self.fail(&mut task, &e),
        }
    }

    async fn drive(&self, task: &mut DeploymentTask, manager: &PackageManager) -> Result<Option<String>> {
        let artifact = &self.plan.artifact;

        self.emit(task, Some(LifecycleStep::List));
        let installed = manager.list_installed().await?;

        self.advance(task, DeploymentStage::Uploading, format!("uploading {}", artifact.file_name))?;
        {
            let snapshot = task.clone();
            let mut on_step = |step: LifecycleStep| self.emit(&snapshot, Some(step));
            manager
                .clear_previous(&artifact.name, &installed, &mut on_step)
                .await?;
        }
        self.emit(task, Some(LifecycleStep::Upload));
        manager.upload(artifact).await?;

        self.advance(task, DeploymentStage::Installing, "installing")?;
        self.emit(task, Some(LifecycleStep::Install));
        manager
            .control(&artifact.name, ControlAction::Install)
            .await?;

        let warning = self.configure(task, manager).await?;

        self.advance(task, DeploymentStage::Starting, "starting")?;
        self.emit(task, Some(LifecycleStep::Start));
        manager
            .control(&artifact.name, ControlAction::Start)
            .await?;

        self.advance(task, DeploymentStage::Complete, "complete")?;
        Ok(warning)
    }

    /// Returns the warning of a tolerated configuration failure.
    async fn configure(&self, task: &mut DeploymentTask, manager: &PackageManager) -> Result<Option<String>> {
        let Some(payload) = &self.plan.configuration else {
            self.advance(task, DeploymentStage::Configuring, "no configuration to apply")?;
            return Ok(None);
        };

        self.advance(task, DeploymentStage::Configuring, "applying configuration")?;
        self.emit(task, Some(LifecycleStep::Configure));

        match manager.configure(&self.plan.artifact.name, payload).await {
            Ok(()) => Ok(None),
            Err(e) if self.plan.configure_policy == ConfigurePolicy::BestEffort => {
                let warning = e.to_string();
                warn!("{}: configuration skipped: {warning}", task.address);
                task.note(format!("configuration failed, continuing: {warning}"));
                self.emit_with_error(task, Some(LifecycleStep::Configure), warning.clone());
                Ok(Some(warning))
            }
            Err(e) => Err(e),
        }
    }

    fn advance(&self, task: &mut DeploymentTask, stage: DeploymentStage, message: impl Into<String>) -> Result<()> {
        task.advance(stage, message)?;
        self.emit(task, None);
        Ok(())
    }

    fn fail(&self, task: &mut DeploymentTask, error: &Error) -> DeploymentResult {
        let stage = task.stage;
        let reason = error.to_string();
        warn!("{} failed at {stage}: {reason}", task.address);

        if task.fail(reason.clone()).is_ok() {
            self.emit(task, error.step());
        }
        DeploymentResult::Failure {
            stage,
            step: error.step(),
            reason,
        }
    }

    /// Last stage seen for `address`, if a task for it ever started.
    pub fn last_stage(&self, address: &IpAddr) -> Option<DeploymentStage> {
        self.last_stage
            .lock()
            .ok()
            .and_then(|stages| stages.get(address).copied())
    }

    /// Publishes a terminal failure for a device whose task never reported one itself.
    pub fn report_aborted(&self, address: IpAddr, reason: &str) {
        let mut task = DeploymentTask::new(
            address,
            self.plan.artifact.name.clone(),
            self.plan.artifact.version.clone(),
        );
        if task.fail(reason).is_ok() {
            self.emit(&task, None);
        }
    }

    fn emit(&self, task: &DeploymentTask, step: Option<LifecycleStep>) {
        self.publish(ProgressEvent::from_task(self.job_id, task, step));
    }

    fn emit_with_error(&self, task: &DeploymentTask, step: Option<LifecycleStep>, error: String) {
        let mut event = ProgressEvent::from_task(self.job_id, task, step);
        event.error = Some(error);
        self.publish(event);
    }

    fn publish(&self, event: ProgressEvent) {
        if event.stage != DeploymentStage::Failed {
            if let Ok(mut stages) = self.last_stage.lock() {
                stages.insert(event.address, event.stage);
            }
        }
        // A dropped receiver only means nobody is watching.
        let _ = self.progress.send(event);
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
