//! Device classification.
//!
//! Values are grouped into contiguous per-category ranges so a plain range
//! check recovers the category; keep new variants inside their category's
//! range or update [`DeviceType::category`] to match.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum DeviceType {
    Unknown = 0,

    // Network infrastructure: 100-199
    Router = 100,
    Switch = 101,
    AccessPoint = 102,
    Firewall = 103,
    Gateway = 104,
    Modem = 105,

    // Security: 200-299
    Camera = 200,
    Nvr = 201,
    Dvr = 202,
    Doorbell = 203,
    AlarmPanel = 204,

    // Computing: 300-399
    Server = 300,
    Workstation = 301,
    VirtualMachine = 302,

    // Storage: 400-499
    Nas = 400,
    Printer = 401,

    // Media: 500-599
    MediaServer = 500,
    StreamingDevice = 501,
    SmartTv = 502,
    Monitor = 503,
}

impl DeviceType {
    pub const fn category(self) -> DeviceCategory {
        match self as u16 {
            100..=199 => DeviceCategory::NetworkInfrastructure,
            200..=299 => DeviceCategory::Security,
            300..=399 => DeviceCategory::Computing,
            400..=499 => DeviceCategory::Storage,
            500..=599 => DeviceCategory::Media,
            _ => DeviceCategory::Unclassified,
        }
    }

    /// True if `other` is at least as informative as `self` (used by merge).
    pub fn is_more_specific_than(self, other: DeviceType) -> bool {
        other == DeviceType::Unknown && self != DeviceType::Unknown
    }
}

impl Default for DeviceType {
    fn default() -> Self {
        DeviceType::Unknown
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCategory {
    NetworkInfrastructure,
    Security,
    Computing,
    Storage,
    Media,
    Unclassified,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_matches_declared_range() {
        assert_eq!(DeviceType::Router.category(), DeviceCategory::NetworkInfrastructure);
        assert_eq!(DeviceType::Camera.category(), DeviceCategory::Security);
        assert_eq!(DeviceType::Nvr.category(), DeviceCategory::Security);
        assert_eq!(DeviceType::Server.category(), DeviceCategory::Computing);
        assert_eq!(DeviceType::Nas.category(), DeviceCategory::Storage);
        assert_eq!(DeviceType::SmartTv.category(), DeviceCategory::Media);
        assert_eq!(DeviceType::Unknown.category(), DeviceCategory::Unclassified);
    }

    #[test]
    fn unknown_is_never_more_specific() {
        assert!(!DeviceType::Unknown.is_more_specific_than(DeviceType::Camera));
        assert!(DeviceType::Camera.is_more_specific_than(DeviceType::Unknown));
    }
}
