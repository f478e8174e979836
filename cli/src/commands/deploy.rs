use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use camfleet_common::deployment::{BatchReport, ConfigurePolicy, DeploymentStage, ProgressEvent};
use camfleet_common::device::DiscoveredDevice;
use camfleet_common::inventory::Inventory;
use camfleet_common::network::target::Target;
use camfleet_core::{BatchDeployer, BatchDeploymentJob};
use colored::*;
use tracing::{Instrument, Span, debug, info, warn};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use super::install::load_artifact;
use super::scan::sweep;
use super::{Context, PackageArgs};
use crate::interrupt;
use crate::terminal::{colors, format, print, spinner};

pub struct DeployOptions {
    pub concurrency: usize,
    pub config: Option<PathBuf>,
    pub strict_config: bool,
    pub all: bool,
    pub port: u16,
    pub from_inventory: Option<PathBuf>,
    pub package: PackageArgs,
}

fn load_configuration(path: &Path) -> anyhow::Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read configuration {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

pub async fn deploy(
    target: Target,
    file: &Path,
    options: DeployOptions,
    ctx: &Context,
) -> anyhow::Result<()> {
    let artifact = load_artifact(file, options.package)?;
    let addresses = target.to_collection()?;

    let mut job = if options.all {
        let endpoints: Vec<SocketAddr> = addresses
            .iter()
            .map(|address| SocketAddr::new(*address, options.port))
            .collect();
        BatchDeploymentJob::new(endpoints, artifact, ctx.credential.clone())
    } else if let Some(path) = &options.from_inventory {
        let inventory = Inventory::load(path)?;
        info!(
            "using inventory {} from {}",
            path.display(),
            inventory.generated_at.format("%Y-%m-%d %H:%M UTC")
        );
        let devices: Vec<DiscoveredDevice> = inventory
            .deployable(|address| addresses.contains(address))
            .cloned()
            .collect();
        BatchDeploymentJob::from_devices(&devices, artifact, ctx.credential.clone())
    } else {
        let devices = sweep(&addresses, ctx).await?;
        let skipped = devices.iter().filter(|d| !d.is_deployable()).count();
        if skipped > 0 {
            info!("{skipped} answering devices are not eligible and will be left alone");
        }
        BatchDeploymentJob::from_devices(&devices, artifact, ctx.credential.clone())
    };

    if job.targets.is_empty() {
        warn!("nothing to deploy to");
        if !ctx.cfg.json {
            print::nothing_found("nothing to deploy to");
        }
        return Ok(());
    }

    job = job.with_concurrency(options.concurrency);
    if let Some(path) = &options.config {
        job = job.with_configuration(load_configuration(path)?);
    }
    if options.strict_config {
        job = job.with_configure_policy(ConfigurePolicy::Required);
    }

    let deployer = BatchDeployer::new(ctx.transport.clone(), ctx.cfg.clone());
    let (run, mut progress) = deployer.deploy_batch(job)?;
    info!(
        "job {} deploying to {} devices, {} at a time",
        run.job_id(),
        run.targets().len(),
        options.concurrency
    );

    let interrupt = interrupt::watch(run.cancel_flag(), "interrupted, no new devices will be started");

    let bar = spinner::progress_bar("deploy", run.targets().len());
    let tracker = bar.clone();
    async move {
        while let Some(event) = progress.recv().await {
            track(&tracker, &event);
        }
    }
    .instrument(bar)
    .await;
    interrupt.abort();

    let report = run.wait().await;

    if ctx.cfg.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.failed() > 0 {
        bail!("{} of {} deployments failed", report.failed(), report.len());
    }
    Ok(())
}

fn track(bar: &Span, event: &ProgressEvent) {
    match (&event.error, event.step) {
        (Some(error), _) if event.stage == DeploymentStage::Failed => {
            warn!("{}: failed, {error}", event.address);
        }
        (Some(error), _) => warn!("{}: {error}", event.address),
        (None, Some(step)) => debug!("{}: {} ({step})", event.address, event.stage),
        (None, None) => debug!("{}: {} {}%", event.address, event.stage, event.percent),
    }
    if event.stage.is_terminal() {
        bar.pb_inc(1);
        bar.pb_set_message(&format!("{} {}", event.address, event.stage));
    }
}

fn print_report(report: &BatchReport) {
    for (idx, (address, result)) in report.iter().enumerate() {
        print::entry(idx, &address.to_string());
        print::fields(format::result_to_key_value_pair(result));
    }

    print::blank();
    print::rule();
    let succeeded = report.succeeded().to_string().color(colors::CONFIRMED).bold();
    let failed = match report.failed() {
        0 => "0".color(colors::TEXT_DEFAULT),
        n => n.to_string().color(colors::REJECTED).bold(),
    };
    print::summary(&format!("{succeeded} deployed, {failed} failed"));
}
