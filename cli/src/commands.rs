pub mod apps;
pub mod check;
pub mod deploy;
pub mod install;
pub mod scan;

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use camfleet_common::config::Config;
use camfleet_common::credential::Credential;
use camfleet_common::deployment::ControlAction;
use camfleet_common::network::target::Target;
use camfleet_core::transport::DeviceTransport;
use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "camfleet")]
#[command(about = "Discover and provision fleets of network cameras.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// Device account used for every authenticated call
    #[arg(short, long, global = true, env = "CAMFLEET_USERNAME", default_value = "root")]
    pub username: String,

    #[arg(short, long, global = true, env = "CAMFLEET_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// More log output, repeat for more
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only print results
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    #[arg(long, global = true)]
    pub no_banner: bool,

    /// Management ports tried during a sweep, in order
    #[arg(long, global = true, value_delimiter = ',', default_values_t = [80u16, 443])]
    pub ports: Vec<u16>,

    /// Addresses checked at once during a sweep
    #[arg(long, global = true, default_value_t = 50)]
    pub scan_concurrency: usize,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sweep a host, range or CIDR for eligible devices
    #[command(alias = "s")]
    Scan {
        #[arg(required_unless_present = "mdns")]
        target: Option<Target>,
        /// Also browse the local link for advertised cameras
        #[arg(long)]
        mdns: bool,
        /// Write the sweep result to an inventory file
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,
    },
    /// Classify one known device without a sweep
    #[command(alias = "c")]
    Check {
        address: IpAddr,
        #[arg(long, default_value_t = 80)]
        port: u16,
    },
    /// List applications installed on a device
    #[command(alias = "a")]
    Apps {
        address: IpAddr,
        #[arg(long, default_value_t = 80)]
        port: u16,
    },
    /// Start, stop or remove an installed application
    Control {
        address: IpAddr,
        package: String,
        action: ControlAction,
        #[arg(long, default_value_t = 80)]
        port: u16,
    },
    /// Install a package on one device, replacing any previous version
    #[command(alias = "i")]
    Install {
        address: IpAddr,
        file: PathBuf,
        #[arg(long, default_value_t = 80)]
        port: u16,
        #[command(flatten)]
        package: PackageArgs,
    },
    /// Discover a target and deploy a package to every confirmed device
    #[command(alias = "d")]
    Deploy {
        target: Target,
        file: PathBuf,
        /// Devices provisioned at once
        #[arg(short, long, default_value_t = camfleet_core::orchestrator::DEFAULT_CONCURRENCY)]
        concurrency: usize,
        /// JSON file applied to the application after install
        #[arg(long)]
        config: Option<PathBuf>,
        /// Fail a device when its configuration cannot be applied
        #[arg(long)]
        strict_config: bool,
        /// Skip discovery and deploy to every address in the target
        #[arg(long)]
        all: bool,
        /// Port used with --all
        #[arg(long, default_value_t = camfleet_core::orchestrator::DEFAULT_PORT)]
        port: u16,
        /// Deploy to the confirmed devices of a saved inventory instead of sweeping
        #[arg(long, value_name = "FILE", conflicts_with = "all")]
        from_inventory: Option<PathBuf>,
        #[command(flatten)]
        package: PackageArgs,
    },
}

#[derive(clap::Args)]
pub struct PackageArgs {
    /// Application name on the device, defaults to the file stem
    #[arg(long = "pkg-name")]
    pub name: Option<String>,
    /// Version recorded in results, defaults to "unknown"
    #[arg(long = "pkg-version")]
    pub version: Option<String>,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn config(&self) -> Config {
        Config {
            ports: self.ports.clone(),
            scan_concurrency: self.scan_concurrency,
            quiet: self.quiet,
            json: self.json,
            ..Config::default()
        }
    }

    pub fn credential(&self) -> anyhow::Result<Credential> {
        match &self.password {
            Some(password) => Ok(Credential::new(&self.username, password)),
            None => bail!("no password given, use --password or CAMFLEET_PASSWORD"),
        }
    }
}

/// What every subcommand needs to reach devices.
pub struct Context {
    pub cfg: Arc<Config>,
    pub credential: Credential,
    pub transport: Arc<dyn DeviceTransport>,
}
