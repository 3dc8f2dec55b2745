//! Configuration settings structures.
//!
//! These structs represent the full discovery configuration tree, matching
//! the keys in config.yml / deployment.yml.

use serde::{Deserialize, Serialize};
use anyhow::Result;

/// Top-level discovery engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub log: String,

    // SNMP
    pub community: Vec<String>,
    pub snmptimeout: u64,
    pub snmpretries: u32,

    // Per-service timeouts, in milliseconds.
    pub ssdp_timeout_ms: u64,
    pub wsdiscovery_timeout_ms: u64,
    pub mdns_timeout_ms: u64,
    pub icmp_timeout_ms: u64,
    pub port_scan_timeout_ms: u64,
    pub http_enrichment_timeout_ms: u64,

    // Concurrency caps.
    pub icmp_concurrency: usize,
    pub snmp_concurrency: usize,
    pub port_scan_host_concurrency: usize,
    pub port_scan_port_concurrency: usize,
    pub icmp_sweep_cap: usize,

    // Ports
    pub ports: Vec<u16>,

    // Interface filtering
    pub interfaces_only: Vec<String>,
    pub interfaces_no: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            log: "info".into(),
            community: vec![
                "public".into(),
                "private".into(),
                "admin".into(),
                "manager".into(),
                "read".into(),
                "write".into(),
                "community".into(),
                "default".into(),
                "guest".into(),
            ],
            snmptimeout: 5_000_000,
            snmpretries: 1,
            ssdp_timeout_ms: 8_000,
            wsdiscovery_timeout_ms: 8_000,
            mdns_timeout_ms: 10_000,
            icmp_timeout_ms: 3_000,
            port_scan_timeout_ms: 1_000,
            http_enrichment_timeout_ms: 5_000,
            icmp_concurrency: 25,
            snmp_concurrency: 20,
            port_scan_host_concurrency: 20,
            port_scan_port_concurrency: 100,
            icmp_sweep_cap: 254,
            ports: crate::ports::CURATED_PORTS.to_vec(),
            interfaces_only: vec![],
            interfaces_no: vec![],
        }
    }
}

impl DiscoveryConfig {
    /// Apply overrides from a YAML value (deployment.yml).
    pub fn apply_overrides(&mut self, overrides: &serde_yaml::Value) -> Result<()> {
        if let Some(v) = overrides.get("community") {
            if let Ok(communities) = serde_yaml::from_value::<Vec<String>>(v.clone()) {
                self.community = communities;
            }
        }
        if let Some(v) = overrides.get("ports") {
            if let Ok(ports) = serde_yaml::from_value::<Vec<u16>>(v.clone()) {
                self.ports = ports;
            }
        }
        if let Some(v) = overrides.get("log").and_then(|v| v.as_str()) {
            self.log = v.to_string();
        }
        Ok(())
    }

    /// Apply environment variable overrides (for container deployment).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LANDISCO_COMMUNITY") {
            self.community = v.split(',').map(String::from).collect();
        }
        if let Ok(v) = std::env::var("LANDISCO_LOG") {
            self.log = v;
        }
        if let Ok(v) = std::env::var("LANDISCO_ICMP_CONCURRENCY") {
            if let Ok(n) = v.parse() {
                self.icmp_concurrency = n;
            }
        }
    }
}
