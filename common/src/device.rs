//! # Discovered Device Model
//!
//! A device found during a sweep together with the eligibility decision reached for it.
//! The decision is a tagged [`Classification`]; nothing downstream re-reads the raw brand
//! strings to decide whether a device may receive a package.

use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credential::Credential;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    WrongVendor { brand: String },
    WrongProductClass { product_type: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::WrongVendor { brand } => write!(f, "wrong vendor ({brand})"),
            RejectReason::WrongProductClass { product_type } => {
                write!(f, "wrong product class ({product_type})")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Classification {
    /// Answered the management endpoint, not yet fingerprinted.
    Candidate,
    Confirmed,
    Rejected { reason: RejectReason },
    /// Fingerprinting could not complete; the device may still be eligible.
    RequiresAuth { reason: String },
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Candidate => "candidate",
            Classification::Confirmed => "confirmed",
            Classification::Rejected { .. } => "rejected",
            Classification::RequiresAuth { .. } => "requires_auth",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Ptz,
    Audio,
    Applications,
    Motion,
    Other(String),
}

impl Capability {
    /// Maps a `Properties` feature group name onto a capability.
    pub fn from_feature(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "ptz" => Capability::Ptz,
            "audio" => Capability::Audio,
            "embeddeddevelopment" | "applications" => Capability::Applications,
            "motion" | "motiondetection" => Capability::Motion,
            _ => Capability::Other(name.to_string()),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Ptz => f.write_str("ptz"),
            Capability::Audio => f.write_str("audio"),
            Capability::Applications => f.write_str("applications"),
            Capability::Motion => f.write_str("motion"),
            Capability::Other(name) => f.write_str(name),
        }
    }
}

/// Hardware identity read from the device-info endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub serial: Option<String>,
    pub mac: Option<String>,
    pub firmware: Option<String>,
    pub hostname: Option<String>,
}

impl DeviceIdentity {
    pub fn is_empty(&self) -> bool {
        self.serial.is_none() && self.mac.is_none() && self.firmware.is_none() && self.hostname.is_none()
    }

    /// Fills the fields still missing here from `other`.
    pub fn merge(&mut self, other: DeviceIdentity) {
        self.serial = self.serial.take().or(other.serial);
        self.mac = self.mac.take().or(other.mac);
        self.firmware = self.firmware.take().or(other.firmware);
        self.hostname = self.hostname.take().or(other.hostname);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub address: IpAddr,
    pub port: u16,
    pub classification: Classification,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub product_type: Option<String>,
    pub capabilities: BTreeSet<Capability>,
    #[serde(default)]
    pub identity: DeviceIdentity,
    /// `Server` header of the unauthenticated reply. Never used for eligibility.
    pub server_header: Option<String>,
    pub discovered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(skip)]
    pub credential: Option<Credential>,
}

impl DiscoveredDevice {
    pub fn candidate(address: IpAddr, port: u16) -> Self {
        let now = Utc::now();
        Self {
            address,
            port,
            classification: Classification::Candidate,
            manufacturer: None,
            model: None,
            product_type: None,
            capabilities: BTreeSet::new(),
            identity: DeviceIdentity::default(),
            server_header: None,
            discovered_at: now,
            last_seen: now,
            credential: None,
        }
    }

    pub fn is_deployable(&self) -> bool {
        matches!(self.classification, Classification::Confirmed)
    }

    pub fn touch(&mut self) {
        self.last_seen = Utc::now();
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
