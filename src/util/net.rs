//! Network utilities: pure CIDR/prefix arithmetic plus the three I/O
//! primitives (ping, TCP connect probe, reverse DNS) the discovery services
//! build on.
//!
//! Pure functions never fail - bad input yields an empty/default result.
//! I/O primitives swallow all transport errors and return the negative
//! outcome; nothing here ever panics on a timeout or a refused connection.

use ipnetwork::Ipv4Network;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;

use crate::models::{NetworkAddressInfo, NetworkInterfaceInfo};

/// Host addresses above this count are refused (returns empty) rather than
/// enumerated, per the data model's resource cap.
pub const MAX_HOSTS_PER_SEGMENT: u32 = 65_534;

/// Enumerate up, non-loopback local interfaces with at least one IPv4
/// address, computing network/broadcast/prefix metadata for each address.
pub fn get_local_network_interfaces() -> Vec<NetworkInterfaceInfo> {
    netdev::get_interfaces()
        .into_iter()
        .filter(|iface| iface.is_up() && !iface.is_loopback())
        .filter_map(|iface| {
            let addresses: Vec<NetworkAddressInfo> = iface
                .ipv4
                .iter()
                .filter_map(|net| {
                    let mask = get_subnet_mask(net.prefix_len)?;
                    Some(NetworkAddressInfo {
                        ip_address: net.addr,
                        subnet_mask: mask,
                        network_address: get_network_address(net.addr, mask),
                        broadcast_address: get_broadcast_address(net.addr, mask),
                        prefix_length: net.prefix_len,
                    })
                })
                .collect();
            if addresses.is_empty() {
                return None;
            }
            Some(NetworkInterfaceInfo {
                name: iface.name.clone(),
                description: iface.friendly_name.clone().unwrap_or_else(|| iface.name.clone()),
                is_up: iface.is_up(),
                mac_address: iface.mac_addr.map(|m| m.to_string()),
                ipv4_addresses: addresses,
            })
        })
        .collect()
}

/// The set-unique list of `{network}/{prefix}` CIDRs attached to this host.
pub fn get_local_network_segments() -> Vec<String> {
    let mut segments: Vec<String> = get_local_network_interfaces()
        .into_iter()
        .flat_map(|iface| iface.ipv4_addresses)
        .map(|addr| format!("{}/{}", addr.network_address, addr.prefix_length))
        .collect();
    segments.sort();
    segments.dedup();
    segments
}

/// Parse `A.B.C.D/P`, returning `None` on any malformed input.
pub fn try_parse_cidr(cidr: &str) -> Option<Ipv4Network> {
    cidr.parse().ok()
}

pub fn get_prefix_length(mask: Ipv4Addr) -> u8 {
    u32::from(mask).count_ones() as u8
}

pub fn get_subnet_mask(prefix: u8) -> Option<Ipv4Addr> {
    if prefix > 32 {
        return None;
    }
    let bits: u32 = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    Some(Ipv4Addr::from(bits))
}

pub fn get_network_address(ip: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) & u32::from(mask))
}

pub fn get_broadcast_address(ip: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) | !u32::from(mask))
}

/// Host addresses inside `cidr`, excluding network and broadcast.
/// Returns an empty vector if the segment holds more than
/// [`MAX_HOSTS_PER_SEGMENT`] hosts.
pub fn get_ip_addresses_in_segment(cidr: &str) -> Vec<Ipv4Addr> {
    let Some(network) = try_parse_cidr(cidr) else {
        return Vec::new();
    };
    let prefix = network.prefix();
    if prefix >= 32 {
        return Vec::new();
    }
    let host_bits = 32 - prefix as u32;
    let host_count = (1u64 << host_bits).saturating_sub(2);
    if host_count == 0 || host_count > MAX_HOSTS_PER_SEGMENT as u64 {
        return Vec::new();
    }

    let network_addr = u32::from(network.network());
    let broadcast_addr = u32::from(network.broadcast());
    (network_addr + 1..broadcast_addr)
        .map(Ipv4Addr::from)
        .collect()
}

/// True iff `ip` is a host, network, or broadcast address of `cidr`.
pub fn is_ip_in_segment(ip: Ipv4Addr, cidr: &str) -> bool {
    match try_parse_cidr(cidr) {
        Some(network) => network.contains(ip),
        None => false,
    }
}

/// One ICMP echo via the platform `ping` binary; true iff a reply arrives
/// within `timeout`. Shelling out avoids the raw-socket privilege a native
/// ICMP client would require.
pub async fn ping_host(host: Ipv4Addr, timeout: Duration) -> bool {
    let secs = timeout.as_secs().max(1).to_string();
    let result = tokio::process::Command::new("ping")
        .args(["-c", "1", "-W", &secs, &host.to_string()])
        .output()
        .await;

    match result {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

/// TCP connect race against `timeout`; true iff the connect succeeds.
pub async fn is_port_open(ip: Ipv4Addr, port: u16, timeout: Duration) -> bool {
    let addr = SocketAddr::new(IpAddr::V4(ip), port);
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

/// Best-effort reverse DNS; any failure yields `None`.
pub async fn get_hostname(ip: Ipv4Addr) -> Option<String> {
    super::dns::hostname_from_ip(&ip.to_string()).await
}

/// True if an IP address is private/RFC1918, loopback, or link-local.
pub fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_and_mask_round_trip() {
        for prefix in 0..=32u8 {
            let mask = get_subnet_mask(prefix).unwrap();
            assert_eq!(get_prefix_length(mask), prefix);
        }
    }

    #[test]
    fn host_count_matches_prefix_below_cap() {
        assert_eq!(get_ip_addresses_in_segment("10.0.0.0/30").len(), 2);
        assert_eq!(get_ip_addresses_in_segment("10.0.0.0/29").len(), 6);
        assert_eq!(get_ip_addresses_in_segment("192.168.0.0/16").len(), 65_534);
    }

    #[test]
    fn boundary_segments_yield_zero_hosts() {
        assert!(get_ip_addresses_in_segment("10.0.0.5/32").is_empty());
        assert!(get_ip_addresses_in_segment("10.0.0.4/31").is_empty());
        assert!(get_ip_addresses_in_segment("10.0.0.0/15").is_empty());
    }

    #[test]
    fn malformed_cidr_yields_empty() {
        assert!(get_ip_addresses_in_segment("not-a-cidr").is_empty());
    }

    #[test]
    fn is_ip_in_segment_includes_network_and_broadcast() {
        assert!(is_ip_in_segment("10.0.0.0".parse().unwrap(), "10.0.0.0/29"));
        assert!(is_ip_in_segment("10.0.0.7".parse().unwrap(), "10.0.0.0/29"));
        assert!(is_ip_in_segment("10.0.0.3".parse().unwrap(), "10.0.0.0/29"));
        assert!(!is_ip_in_segment("10.0.0.8".parse().unwrap(), "10.0.0.0/29"));
    }

    #[test]
    fn network_and_broadcast_address_math() {
        let ip: Ipv4Addr = "192.168.1.130".parse().unwrap();
        let mask = get_subnet_mask(24).unwrap();
        assert_eq!(get_network_address(ip, mask), "192.168.1.0".parse::<Ipv4Addr>().unwrap());
        assert_eq!(get_broadcast_address(ip, mask), "192.168.1.255".parse::<Ipv4Addr>().unwrap());
    }
}
