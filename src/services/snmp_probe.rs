//! SNMPv2c discovery probe: a handful of `System` MIB scalars read through
//! a short list of community strings, on hosts pre-filtered by a quick
//! ICMP reachability check.

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::events::{emit, DiscoveryEvent, EventSink};
use crate::models::{DeviceType, DiscoveredDevice, DiscoveryMethod};
use crate::snmp::oids;
use crate::snmp::{SnmpClient, SnmpValue};
use crate::util::net;

use super::DiscoveryService;

pub struct SnmpProbeService {
    pub communities: Vec<String>,
    pub timeout: Duration,
    pub concurrency: usize,
}

impl Default for SnmpProbeService {
    fn default() -> Self {
        Self {
            communities: vec![
                "public".into(), "private".into(), "admin".into(), "manager".into(),
                "read".into(), "write".into(), "community".into(), "default".into(), "guest".into(),
            ],
            timeout: Duration::from_secs(5),
            concurrency: 20,
        }
    }
}

#[async_trait]
impl DiscoveryService for SnmpProbeService {
    fn service_name(&self) -> &'static str {
        "snmp"
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::Snmp
    }

    fn default_timeout(&self) -> Duration {
        self.timeout
    }

    async fn discover_all(&self, events: EventSink, cancel: CancellationToken) -> Vec<DiscoveredDevice> {
        let mut devices = Vec::new();
        for segment in net::get_local_network_segments() {
            if cancel.is_cancelled() {
                break;
            }
            devices.extend(self.discover_segment(&segment, events.clone(), cancel.clone()).await);
        }
        devices
    }

    async fn discover_segment(&self, cidr: &str, events: EventSink, cancel: CancellationToken) -> Vec<DiscoveredDevice> {
        let hosts = net::get_ip_addresses_in_segment(cidr);
        if hosts.is_empty() {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let total = hosts.len();
        let completed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut tasks = Vec::with_capacity(total);

        for host in hosts {
            if cancel.is_cancelled() {
                break;
            }
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let events = events.clone();
            let completed = completed.clone();
            let communities = self.communities.clone();
            let timeout = self.timeout;

            tasks.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return None;
                };
                if cancel.is_cancelled() {
                    return None;
                }

                let reachable = net::ping_host(host, Duration::from_secs(1)).await;
                let device = if reachable {
                    probe_host(host, &communities, timeout).await
                } else {
                    None
                };

                let n = completed.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                if n % 10 == 0 || n == total {
                    emit(&events, DiscoveryEvent::progress(DiscoveryMethod::Snmp, n, total, host.to_string(), "probing"));
                }
                device
            }));
        }

        let mut devices = Vec::new();
        for task in tasks {
            if let Ok(Some(device)) = task.await {
                emit(&events, DiscoveryEvent::device_discovered(device.clone(), DiscoveryMethod::Snmp));
                devices.push(device);
            }
        }
        devices
    }
}

async fn probe_host(host: Ipv4Addr, communities: &[String], timeout: Duration) -> Option<DiscoveredDevice> {
    for community in communities {
        let client = SnmpClient::new(std::net::IpAddr::V4(host), 161, community.clone(), timeout);
        let community = community.clone();
        let sys_descr = match tokio::task::spawn_blocking({
            let client = client.clone();
            move || client.get(&oids::SYS_DESCR)
        })
        .await
        {
            Ok(Ok(value)) => value,
            _ => continue,
        };

        let Some(descr) = sys_descr.as_text().filter(|s| !s.is_empty() && s.chars().all(|c| !c.is_control() || c.is_whitespace())) else {
            continue;
        };

        debug!(ip = %host, community = %community, "SNMP probe succeeded");
        let mut device = DiscoveredDevice::new(host.to_string(), host, DiscoveryMethod::Snmp);
        device.description = Some(descr.clone());
        device.set_raw("snmp_community", community.clone());

        for (oid, field): (&[u32], fn(&mut DiscoveredDevice, String)) in [
            (oids::SYS_NAME.as_slice(), (|d, v| d.name = Some(v)) as fn(&mut DiscoveredDevice, String)),
            (oids::SYS_CONTACT.as_slice(), |d, v| { d.set_raw("sys_contact", v); }),
            (oids::SYS_LOCATION.as_slice(), |d, v| { d.set_raw("sys_location", v); }),
        ] {
            let client = SnmpClient::new(std::net::IpAddr::V4(host), 161, community.clone(), timeout);
            if let Ok(Ok(value)) = tokio::task::spawn_blocking({
                let oid = oid.to_vec();
                move || client.get(&oid)
            }).await {
                if let Some(text) = value.as_text().filter(|s| !s.is_empty()) {
                    field(&mut device, text);
                }
            }
        }

        let object_id_client = SnmpClient::new(std::net::IpAddr::V4(host), 161, community.clone(), timeout);
        if let Ok(Ok(value)) = tokio::task::spawn_blocking(move || object_id_client.get(&oids::SYS_OBJECT_ID)).await {
            if let Some(oid) = value.as_object_id() {
                if let Some(vendor) = oids::vendor_for_object_id(oid) {
                    device.manufacturer = Some(vendor.to_string());
                    if let Some(vendor_type) = device_type_for_vendor(vendor) {
                        device.device_type = vendor_type;
                    }
                }
            }
        }

        device.device_type = classify_from_descr(&descr, device.device_type);
        return Some(device);
    }
    None
}

/// Device type implied by a `sysObjectId` vendor match, taking priority
/// over the `sysDescr` substring heuristic below.
fn device_type_for_vendor(vendor: &str) -> Option<DeviceType> {
    match vendor {
        "Hikvision" | "Axis" | "Dahua" | "Hanwha" => Some(DeviceType::Camera),
        "Cisco" => Some(DeviceType::Switch),
        "Juniper" => Some(DeviceType::Router),
        "HP" | "Printer" => Some(DeviceType::Printer),
        _ => None,
    }
}

fn classify_from_descr(descr: &str, current: DeviceType) -> DeviceType {
    if current != DeviceType::Unknown {
        return current;
    }
    let lower = descr.to_lowercase();
    if lower.contains("camera") {
        DeviceType::Camera
    } else if lower.contains("router") {
        DeviceType::Router
    } else if lower.contains("switch") {
        DeviceType::Switch
    } else if lower.contains("printer") {
        DeviceType::Printer
    } else if lower.contains("nas") {
        DeviceType::Nas
    } else if lower.contains("access point") || lower.contains("wap") {
        DeviceType::AccessPoint
    } else {
        DeviceType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_camera_from_descr() {
        assert_eq!(classify_from_descr("IP Camera v2", DeviceType::Unknown), DeviceType::Camera);
    }

    #[test]
    fn does_not_override_a_known_type() {
        assert_eq!(classify_from_descr("IP Camera v2", DeviceType::Printer), DeviceType::Printer);
    }

    #[test]
    fn camera_vendors_type_as_camera() {
        assert_eq!(device_type_for_vendor("Hikvision"), Some(DeviceType::Camera));
        assert_eq!(device_type_for_vendor("Dahua"), Some(DeviceType::Camera));
    }

    #[test]
    fn unlisted_vendor_yields_no_type_hint() {
        assert_eq!(device_type_for_vendor("Unbranded"), None);
    }
}
