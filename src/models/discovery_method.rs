//! The discovery strategy that observed a device.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscoveryMethod {
    Ssdp,
    WsDiscovery,
    Onvif,
    Mdns,
    Arp,
    Icmp,
    Snmp,
    PortScan,
    DhcpHints,
}

impl fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiscoveryMethod::Ssdp => "SSDP",
            DiscoveryMethod::WsDiscovery => "WS-Discovery",
            DiscoveryMethod::Onvif => "ONVIF",
            DiscoveryMethod::Mdns => "mDNS",
            DiscoveryMethod::Arp => "ARP",
            DiscoveryMethod::Icmp => "ICMP",
            DiscoveryMethod::Snmp => "SNMP",
            DiscoveryMethod::PortScan => "PortScan",
            DiscoveryMethod::DhcpHints => "DHCP",
        };
        write!(f, "{}", name)
    }
}
