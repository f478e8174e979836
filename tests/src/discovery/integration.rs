use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use camfleet_common::config::Config;
use camfleet_common::credential::Credential;
use camfleet_common::device::{Capability, Classification, DiscoveredDevice, RejectReason};
use camfleet_common::network::range::IpCollection;
use camfleet_common::network::target::Target;
use camfleet_core::Discovery;

use crate::fleet::{PASSWORD, SimDevice, SimFleet};

fn lan(host: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 1, 1, host))
}

fn credential() -> Credential {
    Credential::new("root", PASSWORD)
}

/// A camera at .10, a speaker of the same vendor at .20 and another vendor's camera at .30.
fn mixed_lan() -> SimFleet {
    SimFleet::new()
        .with_device(lan(10), SimDevice::camera("M3045-V").with_serial("ACCC8E00000A"))
        .with_device(lan(20), SimDevice::speaker())
        .with_device(lan(30), SimDevice::foreign("HIKVISION"))
}

fn find(devices: &[DiscoveredDevice], address: IpAddr) -> &DiscoveredDevice {
    devices
        .iter()
        .find(|d| d.address == address)
        .unwrap_or_else(|| panic!("{address} missing from {devices:?}"))
}

#[tokio::test]
async fn sweep_of_a_subnet_classifies_every_answering_device() {
    let targets: IpCollection = "10.1.1.0/24".parse::<Target>().unwrap().to_collection().unwrap();
    let discovery = Discovery::new(Arc::new(mixed_lan()), Arc::new(Config::default()));

    let devices = discovery.scan(&targets, &credential()).await.unwrap();

    assert_eq!(devices.len(), 3, "only the three simulated hosts answer: {devices:?}");

    let camera = find(&devices, lan(10));
    assert_eq!(camera.classification, Classification::Confirmed);
    assert_eq!(camera.model.as_deref(), Some("M3045-V"));
    assert_eq!(camera.port, 80);
    assert!(camera.capabilities.contains(&Capability::Motion));
    assert!(camera.credential.is_some());
    assert_eq!(camera.identity.serial.as_deref(), Some("ACCC8E00000A"));
    assert_eq!(camera.identity.mac.as_deref(), Some("AC:CC:8E:00:00:0A"));
    assert_eq!(camera.identity.firmware.as_deref(), Some("11.8.64"));

    let speaker = find(&devices, lan(20));
    assert!(speaker.identity.is_empty(), "identity is only read for confirmed devices");
    assert!(matches!(
        &speaker.classification,
        Classification::Rejected { reason: RejectReason::WrongProductClass { .. } }
    ));
    assert!(!speaker.is_deployable());

    let foreign = find(&devices, lan(30));
    assert_eq!(
        foreign.classification,
        Classification::Rejected {
            reason: RejectReason::WrongVendor { brand: "HIKVISION".into() }
        }
    );
}

#[tokio::test]
async fn wrong_password_leaves_the_device_needing_auth() {
    let fleet = SimFleet::new().with_device(lan(40), SimDevice::camera("P3245-LV").with_password("secret"));
    let discovery = Discovery::new(Arc::new(fleet), Arc::new(Config::default()));

    let targets: IpCollection = [lan(40)].into_iter().collect();
    let devices = discovery.scan(&targets, &credential()).await.unwrap();

    assert_eq!(devices.len(), 1);
    assert!(matches!(devices[0].classification, Classification::RequiresAuth { .. }));
    assert!(devices[0].model.is_none());
    assert!(devices[0].credential.is_none());
}

#[tokio::test]
async fn quick_check_classifies_a_known_address() {
    let discovery = Discovery::new(Arc::new(mixed_lan()), Arc::new(Config::default()));

    let camera = discovery.quick_check(lan(10), 80, &credential()).await.unwrap();
    assert_eq!(camera.classification, Classification::Confirmed);

    let speaker = discovery.quick_check(lan(20), 80, &credential()).await.unwrap();
    assert!(matches!(speaker.classification, Classification::Rejected { .. }));

    assert!(discovery.quick_check(lan(99), 80, &credential()).await.is_none());
}

#[tokio::test]
async fn sweep_of_a_silent_range_is_empty() {
    let targets: IpCollection = "10.1.2.1-20".parse::<Target>().unwrap().to_collection().unwrap();
    let discovery = Discovery::new(Arc::new(mixed_lan()), Arc::new(Config::default()));

    let devices = discovery.scan(&targets, &credential()).await.unwrap();
    assert!(devices.is_empty());
}
