//! Utilities for actor addressing and identifier generation.
//!
//! # Components
//!
//! - [`ActorAddress`] - Parsed actor address with `<kind>://<node>/<id>` path form
//! - [`CorrelationId`] - Unique token pairing an ask request with its reply
//! - [`AddressError`] - Address parsing and validation failures
//!
//! # Module Organization
//!
//! This mod.rs file contains ONLY module declarations and re-exports.

pub mod ids;

pub use ids::{ActorAddress, AddressError, CorrelationId, LOCAL_NODE};
