use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use anyhow::Context as _;
use camfleet_common::deployment::LifecycleStep;
use camfleet_common::package::PackageArtifact;
use camfleet_core::lifecycle::PackageManager;
use colored::*;
use tracing::{Instrument, info};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use super::{Context, PackageArgs};
use crate::terminal::{colors, print, spinner};

pub fn load_artifact(file: &Path, package: PackageArgs) -> anyhow::Result<PackageArtifact> {
    let artifact = PackageArtifact::from_file(file, package.name, package.version)
        .with_context(|| format!("cannot read package {}", file.display()))?;
    if artifact.name.is_empty() {
        anyhow::bail!("package name is empty, pass --pkg-name");
    }
    info!(
        "package {} {} ({} bytes, sha256 {})",
        artifact.name, artifact.version, artifact.size, artifact.sha256
    );
    Ok(artifact)
}

pub async fn install(
    address: IpAddr,
    port: u16,
    file: &Path,
    package: PackageArgs,
    ctx: &Context,
) -> anyhow::Result<()> {
    let artifact = load_artifact(file, package)?;
    let manager = PackageManager::new(
        ctx.transport.clone(),
        ctx.cfg.clone(),
        SocketAddr::new(address, port),
        ctx.credential.clone(),
    );

    let span = spinner::spinner(&format!("installing {} on {address}", artifact.name));
    let progress = span.clone();
    let mut on_step =
        move |step: LifecycleStep| progress.pb_set_message(&format!("{address}: {step}"));

    let outcome = manager
        .install(&artifact, &mut on_step)
        .instrument(span)
        .await
        .with_context(|| format!("install on {address} failed"))?;

    let replaced = outcome
        .replaced
        .as_ref()
        .map(|app| app.version.clone().unwrap_or_else(|| "unknown".into()));

    if ctx.cfg.json {
        println!(
            "{}",
            serde_json::json!({
                "address": address,
                "package": artifact.name,
                "version": artifact.version,
                "replaced_version": replaced,
            })
        );
        return Ok(());
    }

    let width = print::key_width(["Package", "Version", "Replaced"]);
    print::field("Package", artifact.name.as_str().color(colors::TEXT_DEFAULT), width);
    print::field("Version", artifact.version.as_str().color(colors::CONFIRMED), width);
    match replaced {
        Some(previous) => print::field("Replaced", previous.color(colors::TEXT_DEFAULT), width),
        None => print::field("Replaced", "-".color(colors::SEPARATOR), width),
    }
    Ok(())
}
