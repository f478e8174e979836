//! # Package Lifecycle Manager
//!
//! Single authenticated calls against a device's application CGI (list, upload, control,
//! configure) and the compound install built from them. Every failure is attributed to
//! the sub-step that raised it via [`Error::LifecycleStepFailed`].

use std::net::SocketAddr;
use std::sync::Arc;

use camfleet_common::config::Config;
use camfleet_common::credential::Credential;
use camfleet_common::deployment::{ControlAction, LifecycleStep};
use camfleet_common::package::PackageArtifact;
use camfleet_protocols::apps::{self, InstalledApp};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::session::{expect_success, DeviceSession};
use crate::transport::{DeviceRequest, DeviceTransport};

/// Multipart field name the upload endpoint expects.
pub const UPLOAD_FIELD: &str = "packfil";

/// What the compound install found on the device before it started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub replaced: Option<InstalledApp>,
}

pub struct PackageManager {
    session: DeviceSession,
    config: Arc<Config>,
}

impl PackageManager {
    pub fn new(
        transport: Arc<dyn DeviceTransport>,
        config: Arc<Config>,
        endpoint: SocketAddr,
        credential: Credential,
    ) -> Self {
        Self {
            session: DeviceSession::new(transport, endpoint, credential),
            config,
        }
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.session.endpoint()
    }

    pub async fn list_installed(&self) -> Result<Vec<InstalledApp>> {
        let step = LifecycleStep::List;
        let body = self
            .session
            .get_ok(&self.config.paths.app_list, self.config.timeouts.management, "list")
            .await
            .map_err(|e| e.at_step(step))?;

        if let Some(reply) = apps::reply_error(&body) {
            return Err(invalid(step, reply));
        }
        Ok(apps::parse_installed(&body))
    }

    /// Posts the package with a timeout scaled to its size.
    pub async fn upload(&self, artifact: &PackageArtifact) -> Result<()> {
        let step = LifecycleStep::Upload;
        let timeout = self.config.timeouts.upload_for(artifact.size);
        debug!(
            "uploading {} ({} bytes, timeout {:?}) to {}",
            artifact.file_name,
            artifact.size,
            timeout,
            self.endpoint()
        );

        let request = DeviceRequest::post_multipart(
            self.endpoint(),
            self.config.paths.app_upload.clone(),
            UPLOAD_FIELD,
            artifact.file_name.clone(),
            artifact.bytes.clone(),
            timeout,
        );
        self.checked(request, step, "upload").await
    }

    pub async fn control(&self, package: &str, action: ControlAction) -> Result<()> {
        let request = DeviceRequest::post_form(
            self.endpoint(),
            self.config.paths.app_control.clone(),
            vec![
                ("package".to_string(), package.to_string()),
                ("action".to_string(), action.as_str().to_string()),
            ],
            self.config.timeouts.management,
        );
        self.checked(request, action.step(), action.as_str()).await
    }

    /// Pushes a JSON configuration document to `root.<package>.Config`.
    pub async fn configure(&self, package: &str, payload: &serde_json::Value) -> Result<()> {
        let request = DeviceRequest::post_form(
            self.endpoint(),
            self.config.paths.params.clone(),
            vec![
                ("action".to_string(), "update".to_string()),
                (format!("root.{package}.Config"), payload.to_string()),
            ],
            self.config.timeouts.management,
        );
        self.checked(request, LifecycleStep::Configure, "configure").await
    }

    /// Stops and removes `package` if it is in `installed`.
    ///
    /// A refused stop is tolerated since an application that is not running cannot be
    /// stopped; a refused remove is not.
    pub async fn clear_previous(
        &self,
        package: &str,
        installed: &[InstalledApp],
        on_step: &mut (dyn FnMut(LifecycleStep) + Send),
    ) -> Result<Option<InstalledApp>> {
        let Some(previous) = installed.iter().find(|app| app.name == package) else {
            return Ok(None);
        };

        on_step(LifecycleStep::Stop);
        match self.control(package, ControlAction::Stop).await {
            Ok(()) => {}
            Err(Error::LifecycleStepFailed { source, .. })
                if matches!(*source, Error::InvalidResponse { .. }) =>
            {
                warn!("{}: stop of {package} refused ({source}), continuing", self.endpoint());
            }
            Err(e) => return Err(e),
        }

        on_step(LifecycleStep::Remove);
        self.control(package, ControlAction::Remove).await?;
        Ok(Some(previous.clone()))
    }

    /// Installs `artifact`, replacing an existing copy.
    ///
    /// Fresh device: `upload, install, start`. Package already present:
    /// `stop, remove, upload, install, start`. `on_step` is called before each sub-step.
    pub async fn install(
        &self,
        artifact: &PackageArtifact,
        on_step: &mut (dyn FnMut(LifecycleStep) + Send),
    ) -> Result<InstallOutcome> {
        on_step(LifecycleStep::List);
        let installed = self.list_installed().await?;
        let replaced = self.clear_previous(&artifact.name, &installed, on_step).await?;

        on_step(LifecycleStep::Upload);
        self.upload(artifact).await?;

        on_step(LifecycleStep::Install);
        self.control(&artifact.name, ControlAction::Install).await?;

        on_step(LifecycleStep::Start);
        self.control(&artifact.name, ControlAction::Start).await?;

        info!(
            "{} v{} installed on {}",
            artifact.name,
            artifact.version,
            self.endpoint()
        );
        Ok(InstallOutcome { replaced })
    }

    async fn checked(&self, request: DeviceRequest, step: LifecycleStep, operation: &str) -> Result<()> {
        let response = self
            .session
            .send(request, operation)
            .await
            .map_err(|e| e.at_step(step))?;
        let body = expect_success(response, operation).map_err(|e| e.at_step(step))?;

        match apps::reply_error(&body) {
            Some(reply) => Err(invalid(step, reply)),
            None => Ok(()),
        }
    }
}

fn invalid(step: LifecycleStep, detail: String) -> Error {
    Error::InvalidResponse {
        operation: step.as_str().to_string(),
        detail,
    }
    .at_step(step)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
