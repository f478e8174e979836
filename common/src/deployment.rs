//! # Deployment State
//!
//! Per-device task state, the progress events it emits and the aggregate report of a
//! batch. [`DeploymentTask`] owns its state machine: stages only move forward
//! (`Connecting -> Uploading -> Installing -> Configuring -> Starting -> Complete`) and
//! any non-terminal stage may divert to `Failed`. Everything else is refused.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStage {
    Connecting,
    Uploading,
    Installing,
    Configuring,
    Starting,
    Complete,
    Failed,
}

impl DeploymentStage {
    fn rank(self) -> u8 {
        match self {
            DeploymentStage::Connecting => 0,
            DeploymentStage::Uploading => 1,
            DeploymentStage::Installing => 2,
            DeploymentStage::Configuring => 3,
            DeploymentStage::Starting => 4,
            DeploymentStage::Complete | DeploymentStage::Failed => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeploymentStage::Complete | DeploymentStage::Failed)
    }

    /// Nominal completion percentage when entering the stage.
    pub fn percent(self) -> u8 {
        match self {
            DeploymentStage::Connecting => 5,
            DeploymentStage::Uploading => 20,
            DeploymentStage::Installing => 60,
            DeploymentStage::Configuring => 75,
            DeploymentStage::Starting => 90,
            DeploymentStage::Complete => 100,
            DeploymentStage::Failed => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentStage::Connecting => "connecting",
            DeploymentStage::Uploading => "uploading",
            DeploymentStage::Installing => "installing",
            DeploymentStage::Configuring => "configuring",
            DeploymentStage::Starting => "starting",
            DeploymentStage::Complete => "complete",
            DeploymentStage::Failed => "failed",
        }
    }
}

impl fmt::Display for DeploymentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single device call inside the package lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStep {
    List,
    Stop,
    Remove,
    Upload,
    Install,
    Configure,
    Start,
}

impl LifecycleStep {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleStep::List => "list",
            LifecycleStep::Stop => "stop",
            LifecycleStep::Remove => "remove",
            LifecycleStep::Upload => "upload",
            LifecycleStep::Install => "install",
            LifecycleStep::Configure => "configure",
            LifecycleStep::Start => "start",
        }
    }
}

impl fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `action=` values accepted by the application control endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Install,
    Start,
    Stop,
    Remove,
}

impl ControlAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlAction::Install => "install",
            ControlAction::Start => "start",
            ControlAction::Stop => "stop",
            ControlAction::Remove => "remove",
        }
    }

    pub fn step(self) -> LifecycleStep {
        match self {
            ControlAction::Install => LifecycleStep::Install,
            ControlAction::Start => LifecycleStep::Start,
            ControlAction::Stop => LifecycleStep::Stop,
            ControlAction::Remove => LifecycleStep::Remove,
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ControlAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "install" => Ok(ControlAction::Install),
            "start" => Ok(ControlAction::Start),
            "stop" => Ok(ControlAction::Stop),
            "remove" => Ok(ControlAction::Remove),
            other => Err(format!("unknown action '{other}' (install, start, stop, remove)")),
        }
    }
}

/// What to do when pushing the deployment configuration fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurePolicy {
    /// Report the failure and keep going to `Starting`.
    #[default]
    BestEffort,
    /// Fail the task at `Configuring`.
    Required,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("task already {from}, cannot move to {to}")]
    Terminal {
        from: DeploymentStage,
        to: DeploymentStage,
    },

    #[error("cannot move backward from {from} to {to}")]
    Backward {
        from: DeploymentStage,
        to: DeploymentStage,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentTask {
    pub address: IpAddr,
    pub package: String,
    pub version: String,
    pub stage: DeploymentStage,
    pub percent: u8,
    pub message: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl DeploymentTask {
    pub fn new(address: IpAddr, package: impl Into<String>, version: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            address,
            package: package.into(),
            version: version.into(),
            stage: DeploymentStage::Connecting,
            percent: DeploymentStage::Connecting.percent(),
            message: "connecting".to_string(),
            error: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    /// Moves forward to `next`. Skipping stages is allowed, going back or leaving a
    /// terminal stage is not. Use [`DeploymentTask::fail`] to divert to `Failed`.
    pub fn advance(
        &mut self,
        next: DeploymentStage,
        message: impl Into<String>,
    ) -> Result<(), TransitionError> {
        if self.stage.is_terminal() {
            return Err(TransitionError::Terminal {
                from: self.stage,
                to: next,
            });
        }
        if next == DeploymentStage::Failed || next.rank() <= self.stage.rank() {
            return Err(TransitionError::Backward {
                from: self.stage,
                to: next,
            });
        }

        self.stage = next;
        self.percent = next.percent();
        self.message = message.into();
        self.touch();
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        if self.stage.is_terminal() {
            return Err(TransitionError::Terminal {
                from: self.stage,
                to: DeploymentStage::Failed,
            });
        }
        let reason = reason.into();
        self.stage = DeploymentStage::Failed;
        self.message = format!("failed: {reason}");
        self.error = Some(reason);
        self.touch();
        Ok(())
    }

    /// Updates the status message without changing stage.
    pub fn note(&mut self, message: impl Into<String>) {
        self.message = message.into();
        self.updated_at = Utc::now();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        if self.stage.is_terminal() {
            self.finished_at = Some(self.updated_at);
        }
    }
}

/// One observable change of a deployment task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub job_id: Uuid,
    pub address: IpAddr,
    pub stage: DeploymentStage,
    pub percent: u8,
    pub message: String,
    pub step: Option<LifecycleStep>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn from_task(job_id: Uuid, task: &DeploymentTask, step: Option<LifecycleStep>) -> Self {
        Self {
            job_id,
            address: task.address,
            stage: task.stage,
            percent: task.percent,
            message: task.message.clone(),
            step,
            error: task.error.clone(),
            timestamp: task.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeploymentResult {
    Success {
        version: String,
        /// Set when a best-effort configuration push failed.
        warning: Option<String>,
    },
    Failure {
        stage: DeploymentStage,
        step: Option<LifecycleStep>,
        reason: String,
    },
}

impl DeploymentResult {
    pub fn is_success(&self) -> bool {
        matches!(self, DeploymentResult::Success { .. })
    }
}

/// Final outcome of every device submitted to a batch, keyed and ordered by address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub job_id: Uuid,
    pub results: BTreeMap<IpAddr, DeploymentResult>,
}

impl BatchReport {
    pub fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            results: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, address: &IpAddr) -> Option<&DeploymentResult> {
        self.results.get(address)
    }

    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IpAddr, &DeploymentResult)> {
        self.results.iter()
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
