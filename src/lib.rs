//! Landisco - multi-protocol LAN device-discovery engine.
//!
//! Discovers cameras, routers, printers, NAS boxes, and other addressable
//! endpoints on locally-attached IPv4 subnets by running SSDP, WS-Discovery
//! (including an ONVIF-narrowed variant), mDNS, ARP, ICMP, SNMP, and TCP
//! port-scan strategies concurrently, merging their findings into a single
//! authoritative device set keyed by stable identity.

pub mod config;
pub mod error;
pub mod events;
pub mod manager;
pub mod models;
pub mod ports;
pub mod services;
pub mod snmp;
pub mod util;

/// Application version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";
