//! Discovery and provisioning engine for fleets of network cameras.
//!
//! Everything here talks to devices through the [`transport::DeviceTransport`] port;
//! [`network::http::HttpTransport`] is the production adapter.

pub mod classifier;
pub mod deploy;
pub mod error;
pub mod lifecycle;
pub mod network;
pub mod orchestrator;
pub mod pool;
pub mod probe;
pub mod scanner;
pub mod session;
pub mod transport;

pub use error::{Error, Result};
pub use orchestrator::{BatchDeployer, BatchDeploymentJob, DeploymentRun, ProgressStream};
pub use scanner::Discovery;
