//! Minimal SNMPv2c client used for the discovery probe.
//!
//! Not a general SNMP library: just enough hand-rolled BER to `GetRequest`
//! a handful of `System` MIB scalars and classify the reply's vendor.

pub mod client;
pub mod oids;

pub use client::{SnmpClient, SnmpValue};
