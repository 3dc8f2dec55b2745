//! ARP table service - reads the OS's resolved neighbor table rather than
//! sending any packets itself.

use async_trait::async_trait;
use regex::Regex;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::events::{emit, DiscoveryEvent, EventSink};
use crate::models::{oui, DeviceType, DiscoveredDevice, DiscoveryMethod};

use super::DiscoveryService;

pub struct ArpService {
    pub timeout: Duration,
}

impl Default for ArpService {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl DiscoveryService for ArpService {
    fn service_name(&self) -> &'static str {
        "arp"
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::Arp
    }

    fn default_timeout(&self) -> Duration {
        self.timeout
    }

    async fn discover_all(&self, events: EventSink, _cancel: CancellationToken) -> Vec<DiscoveredDevice> {
        emit(&events, DiscoveryEvent::progress(DiscoveryMethod::Arp, 0, 1, "arp table", "reading"));
        let rows = match read_arp_table().await {
            Ok(rows) => rows,
            Err(e) => {
                emit(&events, DiscoveryEvent::error(DiscoveryMethod::Arp, e.to_string()));
                Vec::new()
            }
        };

        let mut devices = Vec::new();
        for (ip, mac) in rows {
            let device = build_device(ip, &mac);
            emit(&events, DiscoveryEvent::device_discovered(device.clone(), DiscoveryMethod::Arp));
            devices.push(device);
        }
        emit(&events, DiscoveryEvent::progress(DiscoveryMethod::Arp, 1, 1, "arp table", "complete"));
        devices
    }

    async fn discover_segment(&self, cidr: &str, events: EventSink, cancel: CancellationToken) -> Vec<DiscoveredDevice> {
        let all = self.discover_all(events, cancel).await;
        all.into_iter()
            .filter(|d| crate::util::net::is_ip_in_segment(d.ip_address, cidr))
            .collect()
    }
}

fn build_device(ip: Ipv4Addr, mac: &str) -> DiscoveredDevice {
    let canonical_mac = crate::util::format_mac_ieee(mac);
    let mut device = DiscoveredDevice::new(canonical_mac.clone(), ip, DiscoveryMethod::Arp);
    device.mac_address = Some(canonical_mac.clone());

    if let Some(vendor) = oui::lookup(&canonical_mac) {
        device.manufacturer = Some(vendor.to_string());
        device.device_type = match vendor {
            "Hikvision" | "Dahua" | "Axis" | "Hanwha" => DeviceType::Camera,
            "Ubiquiti" | "Mikrotik" => DeviceType::Router,
            _ => DeviceType::Unknown,
        };
    }
    device
}

fn is_zero_or_broadcast_mac(mac: &str) -> bool {
    let clean = crate::util::format_mac_ieee(mac);
    clean == "00:00:00:00:00:00" || clean == "FF:FF:FF:FF:FF:FF"
}

/// Read and parse the OS ARP table: `arp -a` output on any platform that
/// provides it, falling back to `/proc/net/arp` on Linux.
async fn read_arp_table() -> anyhow::Result<Vec<(Ipv4Addr, String)>> {
    if let Ok(contents) = tokio::fs::read_to_string("/proc/net/arp").await {
        return Ok(parse_proc_net_arp(&contents));
    }

    let output = tokio::process::Command::new("arp").arg("-a").output().await?;
    Ok(parse_arp_a(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_proc_net_arp(contents: &str) -> Vec<(Ipv4Addr, String)> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 {
                return None;
            }
            let ip: Ipv4Addr = cols[0].parse().ok()?;
            let mac = cols[3];
            if is_zero_or_broadcast_mac(mac) {
                return None;
            }
            Some((ip, mac.to_string()))
        })
        .collect()
}

fn parse_arp_a(output: &str) -> Vec<(Ipv4Addr, String)> {
    // Matches both `? (192.168.1.1) at aa:bb:cc:dd:ee:ff` (BSD/macOS/Linux)
    // and `192.168.1.1  aa-bb-cc-dd-ee-ff  dynamic` (Windows).
    let unix_re = Regex::new(r"\(([0-9.]+)\)\s+at\s+([0-9a-fA-F:]{11,17})").unwrap();
    let win_re = Regex::new(r"^\s*([0-9.]+)\s+([0-9a-fA-F]{2}(?:-[0-9a-fA-F]{2}){5})\s+(\w+)").unwrap();

    let mut rows = Vec::new();
    for line in output.lines() {
        if let Some(caps) = unix_re.captures(line) {
            if let Ok(ip) = caps[1].parse::<Ipv4Addr>() {
                if !is_zero_or_broadcast_mac(&caps[2]) {
                    rows.push((ip, caps[2].to_string()));
                    debug!(ip = %ip, "ARP row parsed (unix)");
                }
            }
        } else if let Some(caps) = win_re.captures(line) {
            if let Ok(ip) = caps[1].parse::<Ipv4Addr>() {
                if !is_zero_or_broadcast_mac(&caps[2]) {
                    rows.push((ip, caps[2].to_string()));
                    debug!(ip = %ip, "ARP row parsed (windows)");
                }
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_windows_style_arp_rows() {
        let output = "Interface: 192.168.1.5\n  Internet Address      Physical Address      Type\n  192.168.1.10          00-17-88-aa-bb-cc     dynamic\n  192.168.1.20          4c-0b-be-11-22-33     dynamic\n";
        let rows = parse_arp_a(output);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "192.168.1.10".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn skips_zero_and_broadcast_macs() {
        let output = "192.168.1.10          00-00-00-00-00-00     dynamic\n";
        assert!(parse_arp_a(output).is_empty());
    }

    #[test]
    fn builds_device_with_vendor_and_type() {
        let device = build_device("192.168.1.10".parse().unwrap(), "00-17-88-aa-bb-cc");
        assert_eq!(device.unique_id, "00:17:88:AA:BB:CC");
        assert_eq!(device.manufacturer.as_deref(), Some("Hikvision"));
        assert_eq!(device.device_type, DeviceType::Camera);
    }
}
