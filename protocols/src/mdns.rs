//! Multicast DNS service browsing (RFC 6762 / 6763).
//!
//! Cameras announce themselves as instances of a DNS-SD service type. A browse is a single
//! PTR question for that type; answers carry the instance names and, in the additional
//! section, the SRV target and its A/AAAA records.

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};

use dns_parser::{Builder, Packet, QueryClass, QueryType, RData};
use thiserror::Error;

pub const MDNS_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
pub const MDNS_PORT: u16 = 5353;

#[derive(Debug, Error)]
pub enum MdnsError {
    #[error("cannot build mDNS query for '{0}'")]
    Build(String),

    #[error("malformed mDNS packet: {0}")]
    Parse(#[from] dns_parser::Error),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MdnsRecord {
    /// Service instance names from PTR answers.
    pub instances: Vec<String>,
    /// SRV target host.
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub ips: BTreeSet<IpAddr>,
}

impl MdnsRecord {
    /// Whether any PTR answer names an instance of `service`.
    pub fn offers(&self, service: &str) -> bool {
        let suffix = service.trim_end_matches('.');
        self.instances
            .iter()
            .any(|instance| instance.trim_end_matches('.').ends_with(suffix))
    }
}

/// A one-shot PTR question for `service`, e.g. `_axis-video._tcp.local`.
pub fn browse_query(service: &str) -> Result<Vec<u8>, MdnsError> {
    let mut builder = Builder::new_query(0, false);
    builder.add_question(service, false, QueryType::PTR, QueryClass::IN);
    builder.build().map_err(|_| MdnsError::Build(service.to_string()))
}

pub fn extract_resource(data: &[u8]) -> Result<MdnsRecord, MdnsError> {
    let packet = Packet::parse(data)?;
    let mut record = MdnsRecord::default();

    for answer in packet.answers.iter().chain(packet.additional.iter()) {
        match &answer.data {
            RData::PTR(ptr) => {
                let name = ptr.0.to_string();
                if !name.ends_with(".arpa") {
                    record.instances.push(name);
                }
            }
            RData::SRV(srv) => {
                record.hostname = Some(srv.target.to_string());
                record.port = Some(srv.port);
            }
            RData::A(a) => {
                record.ips.insert(IpAddr::V4(a.0));
            }
            RData::AAAA(aaaa) => {
                record.ips.insert(IpAddr::V6(aaaa.0));
            }
            _ => {}
        }
    }

    Ok(record)
}
