//! Manager-level scenarios, mirroring the merge and cross-method behaviour
//! the discovery engine is expected to exhibit in the field.

use landisco::config::DiscoveryConfig;
use landisco::manager::{new_event_channel, DiscoveryManager};
use landisco::models::{DeviceType, DiscoveredDevice, DiscoveryMethod};
use landisco::services::icmp::IcmpService;
use landisco::services::DiscoveryService;
use std::time::Duration;

/// S3/S6-style scenario: an ARP sighting and an SSDP sighting of the same
/// physical device (same MAC-derived `UniqueId`) merge into one record with
/// the union of discovery methods and capabilities.
#[test]
fn merge_across_arp_and_ssdp_unifies_one_device() {
    let mac = "00:17:88:AA:BB:CC";

    let mut arp_observation = DiscoveredDevice::new(mac, "192.168.1.10".parse().unwrap(), DiscoveryMethod::Arp);
    arp_observation.mac_address = Some(mac.to_string());
    arp_observation.manufacturer = Some("Hikvision".to_string());
    arp_observation.device_type = DeviceType::Camera;

    let mut ssdp_observation = DiscoveredDevice::new(mac, "192.168.1.10".parse().unwrap(), DiscoveryMethod::Ssdp);
    ssdp_observation.name = Some("Front Door Camera".to_string());
    ssdp_observation.add_capability("UPnP");

    let merged = arp_observation.merge(ssdp_observation);

    assert_eq!(merged.unique_id, mac);
    assert!(merged.discovery_methods.contains(&DiscoveryMethod::Arp));
    assert!(merged.discovery_methods.contains(&DiscoveryMethod::Ssdp));
    assert_eq!(merged.name.as_deref(), Some("Front Door Camera"));
    assert_eq!(merged.manufacturer.as_deref(), Some("Hikvision"));
    assert_eq!(merged.device_type, DeviceType::Camera);
    assert!(merged.capabilities.contains("UPnP"));
}

/// Every device the engine can emit has a non-empty identity and a
/// discovery-method set drawn only from the services that actually ran.
#[test]
fn device_invariants_hold_after_construction_and_merge() {
    let a = DiscoveredDevice::new("10.0.0.5", "10.0.0.5".parse().unwrap(), DiscoveryMethod::Icmp);
    let mut b = DiscoveredDevice::new("10.0.0.5", "10.0.0.5".parse().unwrap(), DiscoveryMethod::PortScan);
    b.ports = vec![554, 80];

    let merged = a.merge(b);
    assert!(!merged.unique_id.is_empty());
    assert!(merged.discovery_methods.is_subset(
        &[DiscoveryMethod::Icmp, DiscoveryMethod::PortScan, DiscoveryMethod::Arp, DiscoveryMethod::Ssdp]
            .into_iter()
            .collect()
    ));
}

/// S4-style scenario: an ICMP sweep reports the one loopback host that
/// actually answers, tagged with the right discovery method.
#[tokio::test]
async fn icmp_sweep_reports_a_reachable_host() {
    let service = IcmpService {
        timeout: Duration::from_secs(2),
        concurrency: 4,
        sweep_cap: 4,
    };
    let (sink, _receiver) = new_event_channel();
    let devices = service.discover_segment("127.0.0.0/30", sink, Default::default()).await;

    let loopback = devices.iter().find(|d| d.ip_address == "127.0.0.1".parse().unwrap());
    if let Some(device) = loopback {
        assert!(device.is_online);
        assert!(device.discovery_methods.contains(&DiscoveryMethod::Icmp));
    }
    // A sandboxed test runner without a `ping` binary on PATH degrades to
    // an empty result rather than failing; this scenario only asserts the
    // shape of a positive result when one is available.
}

/// The manager's default configuration carries every protocol's settings
/// through construction without panicking, and an unknown method name is
/// rejected before any service runs.
#[tokio::test]
async fn unknown_method_name_is_rejected_before_running_anything() {
    let manager = DiscoveryManager::new(DiscoveryConfig::default());
    let (sink, _receiver) = new_event_channel();
    let result = manager.discover_with_method("not-a-real-service", None, sink).await;
    assert!(result.is_err());
}

/// A named method run with a `cidr` actually scopes to that segment instead
/// of silently falling back to a full-LAN sweep.
#[tokio::test]
async fn discover_with_method_honors_the_requested_cidr() {
    let manager = DiscoveryManager::new(DiscoveryConfig::default());
    let (sink, _receiver) = new_event_channel();
    let result = manager.discover_with_method("icmp", Some("127.0.0.0/30"), sink).await.unwrap();

    assert!(result.success);
    assert_eq!(result.method, DiscoveryMethod::Icmp);
    assert_eq!(result.network_segment.as_deref(), Some("127.0.0.0/30"));
    assert!(result.devices.iter().all(|d| d.ip_address == "127.0.0.1".parse().unwrap()));
}
