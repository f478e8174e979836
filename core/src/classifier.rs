//! # Device Classifier
//!
//! Turns a discovered candidate into a decision. The brand group is fetched with digest
//! authentication and the verdict is reached in a fixed order:
//!
//! 1. brand differs from the expected vendor: rejected, wrong vendor;
//! 2. product type carries a deny-listed token: rejected, wrong product class;
//! 3. otherwise confirmed.
//!
//! Failing to fingerprint at all never rejects a device. It is marked `requires_auth` with
//! the reason so an operator can fix credentials and look again.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;

use camfleet_common::config::{Config, VendorPolicy};
use camfleet_common::credential::Credential;
use camfleet_common::device::{
    Capability, Classification, DeviceIdentity, DiscoveredDevice, RejectReason,
};
use camfleet_protocols::params::{BrandInfo, ParamList};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::probe::parse_identity;
use crate::session::DeviceSession;
use crate::transport::DeviceTransport;

/// Pure decision over a parsed fingerprint.
pub fn decide(policy: &VendorPolicy, info: &BrandInfo) -> Classification {
    if !policy.brand_matches(&info.brand) {
        return Classification::Rejected {
            reason: RejectReason::WrongVendor {
                brand: info.brand.clone(),
            },
        };
    }

    if let Some(product_type) = &info.product_type {
        if policy.denied_token(product_type).is_some() {
            return Classification::Rejected {
                reason: RejectReason::WrongProductClass {
                    product_type: product_type.clone(),
                },
            };
        }
    }

    Classification::Confirmed
}

pub struct Classifier {
    transport: Arc<dyn DeviceTransport>,
    config: Arc<Config>,
}

impl Classifier {
    pub fn new(transport: Arc<dyn DeviceTransport>, config: Arc<Config>) -> Self {
        Self { transport, config }
    }

    /// Authenticated brand query.
    pub async fn fingerprint(&self, session: &DeviceSession) -> Result<BrandInfo> {
        let operation = "brand query";
        let body = session
            .get_ok(
                &self.config.paths.brand_query(),
                self.config.timeouts.management,
                operation,
            )
            .await?;

        BrandInfo::from_params(&ParamList::parse(&body)).map_err(|detail| Error::InvalidResponse {
            operation: operation.to_string(),
            detail: detail.to_string(),
        })
    }

    /// A fresh session to `device` under `credential`.
    pub fn session(&self, device: &DiscoveredDevice, credential: &Credential) -> DeviceSession {
        let endpoint = SocketAddr::new(device.address, device.port);
        DeviceSession::new(self.transport.clone(), endpoint, credential.clone())
    }

    /// Fingerprints `device` and records the decision on it.
    ///
    /// Returns the fingerprinting error, if any, after it has been folded into a
    /// `requires_auth` classification.
    pub async fn classify(
        &self,
        device: &mut DiscoveredDevice,
        credential: &Credential,
    ) -> Option<Error> {
        let session = self.session(device, credential);
        self.classify_with(&session, device, credential).await
    }

    /// [`classify`](Self::classify) over a session the caller keeps, so it can ask the
    /// session afterwards whether the device ever replied.
    pub async fn classify_with(
        &self,
        session: &DeviceSession,
        device: &mut DiscoveredDevice,
        credential: &Credential,
    ) -> Option<Error> {
        let endpoint = session.endpoint();
        device.touch();

        let info = match self.fingerprint(session).await {
            Ok(info) => info,
            Err(e) => {
                debug!("{endpoint} could not be fingerprinted: {e}");
                device.classification = Classification::RequiresAuth {
                    reason: e.to_string(),
                };
                return Some(e);
            }
        };

        let classification = decide(&self.config.vendor, &info);
        device.manufacturer = Some(info.brand);
        device.model = Some(info.model);
        device.product_type = info.product_type;

        if classification == Classification::Confirmed {
            device.capabilities = self.capabilities(session).await;
            if device.identity.serial.is_none() {
                device.identity.merge(self.identity(session).await);
            }
            device.credential = Some(credential.clone());
            info!(
                "{} confirmed as {}",
                device.address,
                device.model.as_deref().unwrap_or("unknown model")
            );
        }
        device.classification = classification;
        None
    }

    /// Authenticated read of the device-info endpoint. Best effort.
    async fn identity(&self, session: &DeviceSession) -> DeviceIdentity {
        match session
            .get_ok(
                &self.config.paths.device_info,
                self.config.timeouts.management,
                "device info",
            )
            .await
        {
            Ok(body) => parse_identity(&body),
            Err(e) => {
                debug!("{} identity unavailable: {e}", session.endpoint());
                DeviceIdentity::default()
            }
        }
    }

    /// Best effort; any failure leaves the set empty.
    async fn capabilities(&self, session: &DeviceSession) -> BTreeSet<Capability> {
        let body = match session
            .get_ok(
                &self.config.paths.properties_query(),
                self.config.timeouts.management,
                "properties query",
            )
            .await
        {
            Ok(body) => body,
            Err(e) => {
                debug!("{} properties unavailable: {e}", session.endpoint());
                return BTreeSet::new();
            }
        };

        ParamList::parse(&body)
            .enabled_features("Properties")
            .into_iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(feature, _)| Capability::from_feature(&feature))
            .collect()
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
