use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use camfleet_common::config::Config;
use camfleet_common::device::{DeviceIdentity, DiscoveredDevice};
use camfleet_protocols::params::ParamList;
use serde_json::Value;
use tracing::debug;

use crate::transport::{DeviceRequest, DeviceTransport};

/// Two-phase liveness check: TCP reachability, then an unauthenticated GET of the
/// management endpoint. Anything that fails either phase is simply not a device.
pub struct DeviceProbe {
    transport: Arc<dyn DeviceTransport>,
    config: Arc<Config>,
}

impl DeviceProbe {
    pub fn new(transport: Arc<dyn DeviceTransport>, config: Arc<Config>) -> Self {
        Self { transport, config }
    }

    /// Tries every configured management port in order and returns the first hit.
    pub async fn probe(&self, address: IpAddr) -> Option<DiscoveredDevice> {
        for &port in &self.config.ports {
            if let Some(device) = self.probe_port(address, port).await {
                return Some(device);
            }
        }
        None
    }

    pub async fn probe_port(&self, address: IpAddr, port: u16) -> Option<DiscoveredDevice> {
        let endpoint = SocketAddr::new(address, port);
        if !self
            .transport
            .is_reachable(endpoint, self.config.timeouts.reach)
            .await
        {
            return None;
        }
        self.endpoint_check(endpoint).await
    }

    /// The HTTP half of discovery. A 2xx or 401 from the management endpoint makes a
    /// candidate; the `Server` header is only recorded. A 2xx body also yields whatever
    /// identity the device discloses without credentials.
    pub async fn endpoint_check(&self, endpoint: SocketAddr) -> Option<DiscoveredDevice> {
        let request = DeviceRequest::get(
            endpoint,
            self.config.paths.device_info.clone(),
            self.config.timeouts.probe,
        );

        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!("{endpoint} did not answer the management probe: {e}");
                return None;
            }
        };

        if !(response.is_success() || response.status == 401) {
            debug!("{endpoint} answered the management probe with {}", response.status);
            return None;
        }

        let mut device = DiscoveredDevice::candidate(endpoint.ip(), endpoint.port());
        if response.is_success() {
            device.identity = parse_identity(&response.body);
        }
        device.server_header = response.server;
        Some(device)
    }
}

/// Reads serial, MAC, firmware and hostname from a device-info reply.
///
/// Accepts the JSON document (`data.propertyList`) as well as `key=value` lines; unknown
/// or empty values stay `None`.
pub fn parse_identity(body: &str) -> DeviceIdentity {
    let params = match serde_json::from_str::<Value>(body) {
        Ok(document) => property_list(&document),
        Err(_) => ParamList::parse(body),
    };
    let field = |name: &str| {
        params
            .get(name)
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("unknown"))
            .map(str::to_string)
    };

    DeviceIdentity {
        serial: field("SerialNumber"),
        mac: field("MacAddress"),
        firmware: field("Version"),
        hostname: field("HostName"),
    }
}

fn property_list(document: &Value) -> ParamList {
    document
        .pointer("/data/propertyList")
        .and_then(Value::as_object)
        .map(|properties| {
            properties
                .iter()
                .filter_map(|(key, value)| Some((key.clone(), value.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::scripted::ScriptedTransport;
    use crate::transport::{DeviceResponse, TransportError};
    use camfleet_common::device::Classification;

    fn probe(transport: ScriptedTransport) -> DeviceProbe {
        DeviceProbe::new(Arc::new(transport), Arc::new(Config::default()))
    }

    #[tokio::test]
    async fn unauthorized_endpoint_is_a_candidate() {
        let transport = ScriptedTransport::new(|_| {
            Ok(DeviceResponse {
                status: 401,
                server: Some("Apache".into()),
                ..DeviceResponse::default()
            })
        });
        let device = probe(transport).probe("10.0.0.3".parse().unwrap()).await.unwrap();
        assert_eq!(device.port, 80);
        assert_eq!(device.classification, Classification::Candidate);
        assert_eq!(device.server_header.as_deref(), Some("Apache"));
    }

    #[test]
    fn identity_comes_from_json_or_lines() {
        let json = r#"{"apiVersion":"1.3","data":{"propertyList":{
            "Brand":"AXIS","ProdNbr":"M3045-V","SerialNumber":"ACCC8E000001","Version":"11.8.64"}}}"#;
        let identity = parse_identity(json);
        assert_eq!(identity.serial.as_deref(), Some("ACCC8E000001"));
        assert_eq!(identity.firmware.as_deref(), Some("11.8.64"));
        assert!(identity.mac.is_none());

        let lines = "MacAddress=AC:CC:8E:00:00:01\nHostName=axis-accc8e000001\nVersion=unknown\n";
        let identity = parse_identity(lines);
        assert_eq!(identity.mac.as_deref(), Some("AC:CC:8E:00:00:01"));
        assert_eq!(identity.hostname.as_deref(), Some("axis-accc8e000001"));
        assert!(identity.firmware.is_none());

        assert!(parse_identity("<html>forbidden</html>").is_empty());
    }

    #[tokio::test]
    async fn open_endpoint_discloses_identity() {
        let transport = ScriptedTransport::new(|_| {
            Ok(DeviceResponse::new(200, "SerialNumber=ACCC8E000002\nVersion=10.12.1\n"))
        });
        let device = probe(transport).probe("10.0.0.3".parse().unwrap()).await.unwrap();
        assert_eq!(device.identity.serial.as_deref(), Some("ACCC8E000002"));
        assert_eq!(device.identity.firmware.as_deref(), Some("10.12.1"));
    }

    #[tokio::test]
    async fn second_port_is_tried_when_first_fails() {
        let transport = ScriptedTransport::new(|req| {
            if req.endpoint.port() == 80 {
                Err(TransportError::Connect("refused".into()))
            } else {
                Ok(DeviceResponse::new(200, "{}"))
            }
        });
        let device = probe(transport).probe("10.0.0.3".parse().unwrap()).await.unwrap();
        assert_eq!(device.port, 443);
    }

    #[tokio::test]
    async fn not_found_and_silence_yield_nothing() {
        let not_found = ScriptedTransport::new(|_| Ok(DeviceResponse::new(404, "")));
        assert!(probe(not_found).probe("10.0.0.3".parse().unwrap()).await.is_none());

        let silent = ScriptedTransport::new(|_| Err(TransportError::Timeout));
        assert!(probe(silent).probe("10.0.0.3".parse().unwrap()).await.is_none());
    }

    #[tokio::test]
    async fn unreachable_host_is_never_queried() {
        let transport = Arc::new(
            ScriptedTransport::new(|_| Ok(DeviceResponse::new(200, ""))).unreachable(),
        );
        let probe = DeviceProbe::new(transport.clone(), Arc::new(Config::default()));
        assert!(probe.probe("10.0.0.3".parse().unwrap()).await.is_none());
        assert!(transport.requests().is_empty());
    }
}
