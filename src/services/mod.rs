//! Protocol discovery services.
//!
//! Every service implements the common [`DiscoveryService`] contract;
//! the [`crate::manager::DiscoveryManager`] fans work out across all of
//! them concurrently and folds their observations into one authoritative
//! device set.

pub mod arp;
pub mod dhcp_hints;
pub mod icmp;
pub mod mdns;
pub mod multicast;
pub mod portscan;
pub mod snmp_probe;
pub mod ssdp;
pub mod wsdiscovery;

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::events::EventSink;
use crate::models::DiscoveryMethod;

/// Common contract every protocol service implements.
///
/// Implementations must never propagate an error out of
/// `discover_all`/`discover_segment`: failures are caught internally and
/// reported as a `ProgressChanged` status prefixed with `"error: "` (and,
/// in the Manager's context, re-emitted as a `DiscoveryError`).
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    fn service_name(&self) -> &'static str;

    fn method(&self) -> DiscoveryMethod;

    fn default_timeout(&self) -> Duration;

    /// Discover across every local segment.
    async fn discover_all(&self, events: EventSink, cancel: CancellationToken) -> Vec<crate::models::DiscoveredDevice>;

    /// Discover within one CIDR segment (services for which a segment is
    /// not meaningful, e.g. multicast-only protocols, ignore it and behave
    /// as `discover_all`).
    async fn discover_segment(
        &self,
        cidr: &str,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Vec<crate::models::DiscoveredDevice>;
}
