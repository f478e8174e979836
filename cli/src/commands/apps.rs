use std::net::{IpAddr, SocketAddr};

use camfleet_common::deployment::ControlAction;
use camfleet_core::lifecycle::PackageManager;
use colored::*;
use tracing::Instrument;

use super::Context;
use crate::terminal::{colors, format, print, spinner};

fn manager(address: IpAddr, port: u16, ctx: &Context) -> PackageManager {
    PackageManager::new(
        ctx.transport.clone(),
        ctx.cfg.clone(),
        SocketAddr::new(address, port),
        ctx.credential.clone(),
    )
}

pub async fn list(address: IpAddr, port: u16, ctx: &Context) -> anyhow::Result<()> {
    let installed = manager(address, port, ctx)
        .list_installed()
        .instrument(spinner::spinner(&format!("listing applications on {address}")))
        .await?;

    if ctx.cfg.json {
        let apps: Vec<serde_json::Value> = installed
            .iter()
            .map(|app| {
                serde_json::json!({
                    "name": app.name,
                    "nice_name": app.nice_name,
                    "version": app.version,
                    "status": app.status,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&apps)?);
        return Ok(());
    }
    if installed.is_empty() {
        print::nothing_found("no applications installed");
        return Ok(());
    }

    for (idx, app) in installed.iter().enumerate() {
        print::entry(idx, &app.name);
        print::fields(format::app_to_key_value_pair(app));
    }
    Ok(())
}

pub async fn control(
    address: IpAddr,
    port: u16,
    package: &str,
    action: ControlAction,
    ctx: &Context,
) -> anyhow::Result<()> {
    manager(address, port, ctx)
        .control(package, action)
        .instrument(spinner::spinner(&format!("{action} {package} on {address}")))
        .await?;

    if ctx.cfg.json {
        println!(
            "{}",
            serde_json::json!({ "address": address, "package": package, "action": action })
        );
    } else {
        print::field(&action.to_string(), format!("{package} on {address}").color(colors::CONFIRMED), 0);
    }
    Ok(())
}
