//! Landisco test suite.
//!
//! Unit tests live alongside the code they cover as `#[cfg(test)]` modules;
//! this crate holds the slower, IO-touching tests:
//! - `integration/` - single protocol services against loopback fixtures
//! - `e2e/` - manager-level merge and cross-method scenarios

mod integration;
mod e2e;
