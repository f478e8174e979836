use std::net::IpAddr;

use camfleet_core::Discovery;
use tracing::Instrument;

use super::Context;
use super::scan::print_devices;
use crate::terminal::{print, spinner};

pub async fn check(address: IpAddr, port: u16, ctx: &Context) -> anyhow::Result<()> {
    let discovery = Discovery::new(ctx.transport.clone(), ctx.cfg.clone());
    let device = discovery
        .quick_check(address, port, &ctx.credential)
        .instrument(spinner::spinner(&format!("asking {address}:{port}")))
        .await;

    match device {
        Some(device) if ctx.cfg.json => println!("{}", serde_json::to_string_pretty(&device)?),
        Some(device) => print_devices(std::slice::from_ref(&device)),
        None if ctx.cfg.json => println!("null"),
        None => print::nothing_found("no answer"),
    }
    Ok(())
}
