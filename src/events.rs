//! The discovery observer contract, realised as a message-passing channel.
//!
//! Delivery order for a single service is preserved; across services no
//! ordering is promised.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::models::{DiscoveredDevice, DiscoveryMethod};

#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    DeviceDiscovered {
        device: Box<DiscoveredDevice>,
        method: DiscoveryMethod,
        timestamp: DateTime<Utc>,
    },
    ProgressChanged {
        method: DiscoveryMethod,
        current: usize,
        total: usize,
        current_target: String,
        status: String,
    },
    DiscoveryError {
        method: DiscoveryMethod,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl DiscoveryEvent {
    pub fn device_discovered(device: DiscoveredDevice, method: DiscoveryMethod) -> Self {
        DiscoveryEvent::DeviceDiscovered {
            device: Box::new(device),
            method,
            timestamp: Utc::now(),
        }
    }

    pub fn progress(method: DiscoveryMethod, current: usize, total: usize, current_target: impl Into<String>, status: impl Into<String>) -> Self {
        DiscoveryEvent::ProgressChanged {
            method,
            current,
            total,
            current_target: current_target.into(),
            status: status.into(),
        }
    }

    pub fn error(method: DiscoveryMethod, message: impl Into<String>) -> Self {
        DiscoveryEvent::DiscoveryError {
            method,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn percentage(&self) -> Option<f64> {
        match self {
            DiscoveryEvent::ProgressChanged { current, total, .. } if *total > 0 => {
                Some(*current as f64 / *total as f64 * 100.0)
            }
            _ => None,
        }
    }
}

/// Sending half of the event channel, handed to every protocol service.
pub type EventSink = mpsc::UnboundedSender<DiscoveryEvent>;

/// Emit an event, ignoring a closed receiver (no observer is listening).
pub fn emit(sink: &EventSink, event: DiscoveryEvent) {
    let _ = sink.send(event);
}
