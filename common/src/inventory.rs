//! Saved sweep results.
//!
//! An inventory is the JSON document a scan writes with `--save`. Deployments can start
//! from it instead of sweeping again; credentials are never written.

use std::fs;
use std::net::IpAddr;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::DiscoveredDevice;
use crate::error::InventoryError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub generated_at: DateTime<Utc>,
    pub devices: Vec<DiscoveredDevice>,
}

impl Inventory {
    pub fn new(devices: Vec<DiscoveredDevice>) -> Self {
        Self {
            generated_at: Utc::now(),
            devices,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), InventoryError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| InventoryError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| InventoryError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        let raw = fs::read_to_string(path).map_err(|source| InventoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| InventoryError::Format {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Confirmed devices whose address passes `keep`.
    pub fn deployable<'a>(
        &'a self,
        keep: impl Fn(&IpAddr) -> bool + 'a,
    ) -> impl Iterator<Item = &'a DiscoveredDevice> + 'a {
        self.devices
            .iter()
            .filter(move |device| device.is_deployable() && keep(&device.address))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::Credential;
    use crate::device::{Classification, RejectReason};

    fn device(last_octet: u8, classification: Classification) -> DiscoveredDevice {
        let mut device = DiscoveredDevice::candidate(IpAddr::from([10, 0, 0, last_octet]), 80);
        device.classification = classification;
        device
    }

    fn scratch(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("camfleet-{}-{name}", std::process::id()))
    }

    #[test]
    fn saved_inventory_loads_back_without_credentials() {
        let mut camera = device(2, Classification::Confirmed);
        camera.credential = Some(Credential::new("root", "secret"));
        camera.identity.serial = Some("ACCC8E000002".into());
        let inventory = Inventory::new(vec![camera]);

        let path = scratch("roundtrip.json");
        inventory.save(&path).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        let loaded = Inventory::load(&path).unwrap();
        fs::remove_file(&path).ok();

        assert!(!raw.contains("secret"));
        assert_eq!(loaded.devices.len(), 1);
        assert_eq!(loaded.devices[0].identity.serial.as_deref(), Some("ACCC8E000002"));
        assert!(loaded.devices[0].credential.is_none());
        assert_eq!(loaded.generated_at, inventory.generated_at);
    }

    #[test]
    fn deployable_filters_by_state_and_address() {
        let inventory = Inventory::new(vec![
            device(2, Classification::Confirmed),
            device(3, Classification::Confirmed),
            device(
                4,
                Classification::Rejected {
                    reason: RejectReason::WrongVendor { brand: "ACME".into() },
                },
            ),
        ]);
        let picked: Vec<IpAddr> = inventory
            .deployable(|address| *address != IpAddr::from([10, 0, 0, 3]))
            .map(|d| d.address)
            .collect();
        assert_eq!(picked, vec![IpAddr::from([10, 0, 0, 2])]);
    }

    #[test]
    fn missing_or_broken_files_name_the_path() {
        let missing = scratch("absent.json");
        let err = Inventory::load(&missing).unwrap_err();
        assert!(matches!(err, InventoryError::Io { .. }));
        assert!(err.to_string().contains("absent.json"));

        let broken = scratch("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        let err = Inventory::load(&broken).unwrap_err();
        fs::remove_file(&broken).ok();
        assert!(matches!(err, InventoryError::Format { .. }));
    }
}
