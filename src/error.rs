//! Error taxonomy. Library-internal fallible helpers return
//! `Result<T, DiscoveryError>` or `anyhow::Result` and are handled at the
//! service boundary; the Manager's public methods never propagate an
//! `Err` themselves, they return partial results with error events.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Socket timeout, EOF, refused connection, ICMP unreachable, DNS
    /// failure. Swallowed at the per-probe scope; recorded as a negative
    /// outcome rather than propagated.
    #[error("transient I/O error: {0}")]
    TransientIo(String),

    /// Could not bind any socket for a service.
    #[error("{service} could not bind any socket: {reason}")]
    ServiceBootFailure { service: &'static str, reason: String },

    /// Unparseable SSDP/SOAP/SNMP/DNS payload; that one response is
    /// dropped, the service keeps listening.
    #[error("malformed {protocol} response: {reason}")]
    MalformedResponse { protocol: &'static str, reason: String },

    /// The cancellation token tripped mid-operation.
    #[error("discovery cancelled")]
    Cancellation,

    /// Invariant violation or programmer error; surfaced and the
    /// offending service alone is aborted.
    #[error("internal error in {service}: {reason}")]
    Fatal { service: &'static str, reason: String },

    /// A named service was requested that the manager doesn't know.
    #[error("unknown discovery service: {0}")]
    UnknownService(String),
}
