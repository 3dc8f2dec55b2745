//! Local network interface and address metadata.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAddressInfo {
    pub ip_address: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub network_address: Ipv4Addr,
    pub broadcast_address: Ipv4Addr,
    pub prefix_length: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterfaceInfo {
    pub name: String,
    pub description: String,
    pub is_up: bool,
    pub mac_address: Option<String>,
    pub ipv4_addresses: Vec<NetworkAddressInfo>,
}
