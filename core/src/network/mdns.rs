use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use camfleet_protocols::mdns::{self, MDNS_GROUP, MDNS_PORT};
use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Asks the local link for instances of `service` and collects the addresses that answer
/// within `window`.
pub async fn browse(service: &str, window: Duration) -> Result<BTreeSet<IpAddr>> {
    browse_at(SocketAddr::new(IpAddr::V4(MDNS_GROUP), MDNS_PORT), service, window).await
}

/// [`browse`] against an explicit responder address.
///
/// The query leaves from an ephemeral port, which makes responders reply by unicast to
/// that port.
pub async fn browse_at(
    responder: SocketAddr,
    service: &str,
    window: Duration,
) -> Result<BTreeSet<IpAddr>> {
    let query = mdns::browse_query(service).map_err(|e| Error::InvalidResponse {
        operation: "mdns browse".into(),
        detail: e.to_string(),
    })?;

    let bind: SocketAddr = match responder {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(bind).await?;
    socket.send_to(&query, responder).await?;

    let deadline = Instant::now() + window;
    let mut found = BTreeSet::new();
    let mut buf = vec![0u8; 9000];

    while let Ok(received) = timeout_at(deadline, socket.recv_from(&mut buf)).await {
        let (len, source) = received?;
        found.extend(answering_addresses(&buf[..len], source, service));
    }

    info!("mdns browse for {service} found {} devices", found.len());
    Ok(found)
}

/// Addresses advertised by one reply. A reply that offers the service but carries no
/// address record stands for its sender.
fn answering_addresses(packet: &[u8], source: SocketAddr, service: &str) -> Vec<IpAddr> {
    let record = match mdns::extract_resource(packet) {
        Ok(record) => record,
        Err(e) => {
            debug!("ignoring mdns reply from {source}: {e}");
            return Vec::new();
        }
    };
    if !record.offers(service) {
        return Vec::new();
    }
    if record.ips.is_empty() {
        return vec![source.ip()];
    }
    record.ips.into_iter().collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
