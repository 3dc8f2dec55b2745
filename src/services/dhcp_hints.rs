//! Best-effort DHCP server/gateway discovery from local OS state.
//!
//! Sends no network packets: `ipconfig /all` output (Windows) or DHCP
//! lease files (Linux) are read and parsed for a DHCP server address and a
//! default gateway, each reported as a synthetic Router/Gateway device.

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::events::{emit, DiscoveryEvent, EventSink};
use crate::models::{DeviceType, DiscoveredDevice, DiscoveryMethod};
use crate::util::net::is_ip_in_segment;

use super::DiscoveryService;

const LEASE_FILE_CANDIDATES: &[&str] = &[
    "/var/lib/dhcp/dhclient.leases",
    "/var/lib/dhclient/dhclient.leases",
    "/var/lib/NetworkManager/internal-*.lease",
];

pub struct DhcpHintsService {
    pub timeout: Duration,
}

impl Default for DhcpHintsService {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(3) }
    }
}

#[async_trait]
impl DiscoveryService for DhcpHintsService {
    fn service_name(&self) -> &'static str {
        "dhcp-hints"
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::DhcpHints
    }

    fn default_timeout(&self) -> Duration {
        self.timeout
    }

    async fn discover_all(&self, events: EventSink, _cancel: CancellationToken) -> Vec<DiscoveredDevice> {
        let hints = gather_hints().await;
        let mut devices = Vec::new();
        for (ip, device_type, label) in hints {
            let mut device = DiscoveredDevice::new(ip.to_string(), ip, DiscoveryMethod::DhcpHints);
            device.device_type = device_type;
            device.name = Some(label.to_string());
            device.add_capability(label);
            emit(&events, DiscoveryEvent::device_discovered(device.clone(), DiscoveryMethod::DhcpHints));
            devices.push(device);
        }
        devices
    }

    async fn discover_segment(&self, cidr: &str, events: EventSink, cancel: CancellationToken) -> Vec<DiscoveredDevice> {
        self.discover_all(events, cancel)
            .await
            .into_iter()
            .filter(|d| is_ip_in_segment(d.ip_address, cidr))
            .collect()
    }
}

async fn gather_hints() -> Vec<(Ipv4Addr, DeviceType, &'static str)> {
    let mut hints = Vec::new();

    if cfg!(target_os = "windows") {
        if let Some(text) = run_ipconfig().await {
            if let Some(server) = extract_field(&text, "DHCP Server") {
                hints.push((server, DeviceType::Router, "DHCP Server"));
            }
            if let Some(gateway) = extract_field(&text, "Default Gateway") {
                hints.push((gateway, DeviceType::Gateway, "Gateway"));
            }
        }
    } else {
        for path in LEASE_FILE_CANDIDATES {
            if let Some(ip) = read_lease_file(path).await {
                hints.push((ip, DeviceType::Router, "DHCP Server"));
                break;
            }
        }
        if let Some(gateway) = read_ip_route_gateway().await {
            hints.push((gateway, DeviceType::Gateway, "Gateway"));
        }
    }

    hints.sort_by_key(|(ip, _, _)| *ip);
    hints.dedup_by_key(|(ip, _, _)| *ip);
    hints
}

async fn run_ipconfig() -> Option<String> {
    let output = tokio::process::Command::new("ipconfig").arg("/all").output().await.ok()?;
    Some(String::from_utf8_lossy(&output.stdout).to_string())
}

fn extract_field(text: &str, label: &str) -> Option<Ipv4Addr> {
    text.lines()
        .find(|line| line.contains(label))
        .and_then(|line| line.split(':').nth(1))
        .map(str::trim)
        .and_then(|value| value.parse().ok())
}

async fn read_lease_file(path: &str) -> Option<Ipv4Addr> {
    let text = tokio::fs::read_to_string(path).await.ok()?;
    text.lines()
        .rev()
        .find(|line| line.trim_start().starts_with("option dhcp-server-identifier"))
        .and_then(|line| line.split_whitespace().last())
        .map(|token| token.trim_end_matches(';'))
        .and_then(|ip| ip.parse().ok())
}

async fn read_ip_route_gateway() -> Option<Ipv4Addr> {
    let output = tokio::process::Command::new("ip").args(["route", "show", "default"]).output().await.ok()?;
    if !output.status.success() {
        debug!("`ip route show default` failed; no gateway hint");
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    text.split_whitespace()
        .skip_while(|&word| word != "via")
        .nth(1)
        .and_then(|ip| ip.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_dhcp_server_field_from_ipconfig_output() {
        let text = "   DHCP Server . . . . . . . . . : 192.168.1.1\r\n";
        assert_eq!(extract_field(text, "DHCP Server"), Some("192.168.1.1".parse().unwrap()));
    }

    #[test]
    fn missing_field_yields_none() {
        assert_eq!(extract_field("nothing here", "DHCP Server"), None);
    }
}
