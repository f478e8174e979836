use std::path::PathBuf;

use anyhow::Context as _;
use camfleet_common::device::DiscoveredDevice;
use camfleet_common::inventory::Inventory;
use camfleet_common::network::range::IpCollection;
use camfleet_common::network::target::Target;
use camfleet_core::Discovery;
use camfleet_core::network::mdns;
use tracing::{Instrument, info, warn};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use super::Context;
use crate::interrupt;
use crate::terminal::{format, print, spinner};

pub struct ScanOptions {
    pub mdns: bool,
    pub save: Option<PathBuf>,
}

pub async fn scan(target: Option<Target>, options: ScanOptions, ctx: &Context) -> anyhow::Result<()> {
    let mut targets = match target {
        Some(target) => target.to_collection()?,
        None => IpCollection::new(),
    };
    if options.mdns {
        browse_into(&mut targets, ctx).await;
    }

    let devices = if targets.is_empty() {
        warn!("nothing to sweep");
        Vec::new()
    } else {
        sweep(&targets, ctx).await?
    };

    if let Some(path) = &options.save {
        Inventory::new(devices.clone()).save(path)?;
        info!("inventory of {} devices written to {}", devices.len(), path.display());
    }

    if ctx.cfg.json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }
    if devices.is_empty() {
        print::nothing_found("no devices answered");
        return Ok(());
    }

    print_devices(&devices);

    let confirmed = devices.iter().filter(|d| d.is_deployable()).count();
    print::rule();
    print::summary(&format!(
        "{} of {} answering devices are deployable",
        confirmed,
        devices.len()
    ));
    Ok(())
}

/// Adds whatever answers an mDNS browse to the sweep. A failed browse only warns.
async fn browse_into(targets: &mut IpCollection, ctx: &Context) {
    match mdns::browse(&ctx.cfg.mdns_service, ctx.cfg.timeouts.browse).await {
        Ok(found) => {
            let before = targets.len();
            for address in found {
                targets.add_single(address);
            }
            info!("mdns added {} addresses", targets.len() - before);
        }
        Err(e) => warn!("mdns browse failed: {e}"),
    }
}

/// Runs a sweep behind a progress bar. Ctrl-C stops scheduling new addresses.
pub async fn sweep(targets: &IpCollection, ctx: &Context) -> anyhow::Result<Vec<DiscoveredDevice>> {
    info!("sweeping {} addresses on ports {:?}", targets.len(), ctx.cfg.ports);

    let bar = spinner::progress_bar("sweep", targets.len());
    let progress = bar.clone();
    let discovery = Discovery::new(ctx.transport.clone(), ctx.cfg.clone()).with_progress(
        move |p| {
            progress.pb_set_position(p.completed as u64);
            progress.pb_set_message(&format!("{} answering", p.found));
        },
    );

    let interrupt = interrupt::watch(
        discovery.cancel_flag(),
        "interrupted, finishing addresses already in flight",
    );

    let result = discovery
        .scan(targets, &ctx.credential)
        .instrument(bar)
        .await
        .context("sweep failed");
    interrupt.abort();
    result
}

pub fn print_devices(devices: &[DiscoveredDevice]) {
    for (idx, device) in devices.iter().enumerate() {
        print::entry(idx, &device.address.to_string());
        print::fields(format::device_to_key_value_pair(device));
    }
}
