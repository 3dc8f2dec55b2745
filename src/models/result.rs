//! The outcome of one discovery run (all services, or a single method).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{device::DiscoveredDevice, discovery_method::DiscoveryMethod};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub success: bool,
    pub method: DiscoveryMethod,
    pub devices: Vec<DiscoveredDevice>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub network_segment: Option<String>,
    pub error_message: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl DiscoveryResult {
    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }

    pub fn failed(method: DiscoveryMethod, start_time: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            method,
            devices: Vec::new(),
            start_time,
            end_time: Utc::now(),
            network_segment: None,
            error_message: Some(message.into()),
            metadata: HashMap::new(),
        }
    }
}
