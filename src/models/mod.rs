//! Data model for discovered devices and discovery-run results.

pub mod device;
pub mod device_type;
pub mod discovery_data;
pub mod discovery_method;
pub mod network;
pub mod oui;
pub mod result;
pub mod service;

pub use device::DiscoveredDevice;
pub use device_type::{DeviceCategory, DeviceType};
pub use discovery_data::RawValue;
pub use discovery_method::DiscoveryMethod;
pub use network::{NetworkAddressInfo, NetworkInterfaceInfo};
pub use result::DiscoveryResult;
pub use service::DeviceService;
