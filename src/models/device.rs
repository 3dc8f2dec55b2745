//! The discovered-device record and its merge semantics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

use super::device_type::DeviceType;
use super::discovery_data::RawValue;
use super::discovery_method::DiscoveryMethod;
use super::service::DeviceService;

/// A network endpoint observed by one or more discovery strategies.
///
/// Created by a protocol service the moment a wire event yields a
/// recognisable identity; mutated only through [`DiscoveredDevice::merge`]
/// once admitted to the manager's authoritative set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// Stable identity: MAC, then ONVIF/SSDP endpoint URN, then IPv4 string.
    pub unique_id: String,
    pub ip_address: Ipv4Addr,
    pub port: u16,

    pub name: Option<String>,
    pub description: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub serial_number: Option<String>,
    pub mac_address: Option<String>,

    pub device_type: DeviceType,
    pub discovery_methods: HashSet<DiscoveryMethod>,
    pub services: HashMap<String, DeviceService>,
    pub capabilities: HashSet<String>,
    pub ports: Vec<u16>,
    pub discovery_data: HashMap<String, RawValue>,

    pub is_online: bool,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl DiscoveredDevice {
    /// A fresh observation, as produced by a single protocol service.
    pub fn new(unique_id: impl Into<String>, ip_address: Ipv4Addr, method: DiscoveryMethod) -> Self {
        let now = Utc::now();
        let mut discovery_methods = HashSet::new();
        discovery_methods.insert(method);
        Self {
            unique_id: unique_id.into(),
            ip_address,
            port: 0,
            name: None,
            description: None,
            manufacturer: None,
            model: None,
            firmware: None,
            serial_number: None,
            mac_address: None,
            device_type: DeviceType::Unknown,
            discovery_methods,
            services: HashMap::new(),
            capabilities: HashSet::new(),
            ports: Vec::new(),
            discovery_data: HashMap::new(),
            is_online: true,
            first_seen: now,
            last_seen: now,
        }
    }

    /// Canonicalise a MAC into `AA:BB:CC:DD:EE:FF` and set it as the identity
    /// when no more specific identity is already known.
    pub fn with_mac(mut self, mac: impl AsRef<str>) -> Self {
        let mac = crate::util::format_mac_ieee(mac.as_ref());
        self.mac_address = Some(mac);
        self
    }

    /// Fold `other` (a later observation of the same `unique_id`) into
    /// `self`, per the merge rule in the data model: scalars are overwritten
    /// only if empty or strictly more specific; sets, maps, and ports union;
    /// `last_seen` advances to the max.
    pub fn merge(mut self, other: DiscoveredDevice) -> Self {
        fn take_more_specific(existing: Option<String>, incoming: Option<String>) -> Option<String> {
            match (&existing, &incoming) {
                (None, _) => incoming,
                (Some(e), Some(i)) if e.is_empty() && !i.is_empty() => incoming,
                _ => existing,
            }
        }

        self.name = take_more_specific(self.name, other.name);
        self.description = take_more_specific(self.description, other.description);
        self.manufacturer = take_more_specific(self.manufacturer, other.manufacturer);
        self.model = take_more_specific(self.model, other.model);
        self.firmware = take_more_specific(self.firmware, other.firmware);
        self.serial_number = take_more_specific(self.serial_number, other.serial_number);
        self.mac_address = take_more_specific(self.mac_address, other.mac_address);

        if other.port != 0 && self.port == 0 {
            self.port = other.port;
        }

        if other.device_type.is_more_specific_than(self.device_type) {
            self.device_type = other.device_type;
        }

        self.discovery_methods.extend(other.discovery_methods);
        self.services.extend(other.services);
        self.capabilities.extend(other.capabilities);
        for port in other.ports {
            if !self.ports.contains(&port) {
                self.ports.push(port);
            }
        }
        self.discovery_data.extend(other.discovery_data);

        self.is_online = self.is_online || other.is_online;
        self.first_seen = self.first_seen.min(other.first_seen);
        self.last_seen = self.last_seen.max(other.last_seen);

        self
    }

    pub fn add_capability(&mut self, capability: impl Into<String>) {
        self.capabilities.insert(capability.into());
    }

    pub fn set_raw(&mut self, key: impl Into<String>, value: impl Into<RawValue>) {
        self.discovery_data.insert(key.into(), value.into());
    }

    /// Display name - prefers the device's advertised name, then its model,
    /// then its IP address.
    pub fn display_name(&self) -> String {
        self.name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.model.as_deref().filter(|s| !s.is_empty()))
            .map(str::to_string)
            .unwrap_or_else(|| self.ip_address.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, ip: &str, method: DiscoveryMethod) -> DiscoveredDevice {
        DiscoveredDevice::new(id, ip.parse().unwrap(), method)
    }

    #[test]
    fn merge_is_idempotent() {
        let d = device("AA:BB:CC:DD:EE:FF", "10.0.0.3", DiscoveryMethod::Arp);
        let merged = d.clone().merge(d.clone());
        assert_eq!(merged.discovery_methods, d.discovery_methods);
        assert_eq!(merged.unique_id, d.unique_id);
    }

    #[test]
    fn merge_unions_methods_and_never_shrinks_sets() {
        let mut a = device("10.0.0.3", "10.0.0.3", DiscoveryMethod::Icmp);
        a.add_capability("Gateway");
        let mut b = device("10.0.0.3", "10.0.0.3", DiscoveryMethod::PortScan);
        b.ports = vec![80, 554];
        b.add_capability("ONVIF");

        let merged = a.merge(b);
        assert!(merged.discovery_methods.contains(&DiscoveryMethod::Icmp));
        assert!(merged.discovery_methods.contains(&DiscoveryMethod::PortScan));
        assert_eq!(merged.capabilities.len(), 2);
        assert_eq!(merged.ports, vec![80, 554]);
    }

    #[test]
    fn merge_prefers_more_specific_device_type() {
        let a = device("10.0.0.3", "10.0.0.3", DiscoveryMethod::Icmp);
        let mut b = device("10.0.0.3", "10.0.0.3", DiscoveryMethod::PortScan);
        b.device_type = DeviceType::Camera;

        let merged = a.merge(b);
        assert_eq!(merged.device_type, DeviceType::Camera);
    }

    #[test]
    fn merge_advances_last_seen_to_max() {
        let mut a = device("x", "10.0.0.3", DiscoveryMethod::Icmp);
        let mut b = device("x", "10.0.0.3", DiscoveryMethod::Icmp);
        a.last_seen = Utc::now() - chrono::Duration::seconds(10);
        b.last_seen = Utc::now();
        let expected = b.last_seen;
        let merged = a.merge(b);
        assert_eq!(merged.last_seen, expected);
    }
}
