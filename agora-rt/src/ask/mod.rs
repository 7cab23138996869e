//! Request/response machinery: correlation tracking and timeout handling.
//!
//! `ask` is built on top of one-way `tell`: the runtime allocates a
//! correlation id, registers a pending request, stamps the outgoing envelope
//! with the id and a reply-to address, and settles the request when the
//! matching reply arrives, the timeout fires, or the target stops. Exactly
//! one of the three.
//!
//! # Components
//!
//! - [`CorrelationTracker`] - Process-wide pending-request table
//! - [`PendingReply`] - Receiver half awaited by the asker
//! - [`TimeoutHandler`] - set/clear timeout facility preserving actor identity
//! - [`AskError`] - Structured ask failures (timeout, stopped target, ...)
//!
//! # Module Organization
//!
//! This mod.rs file contains ONLY module declarations and re-exports.

pub mod correlation;
pub mod timeout;

pub use correlation::{AskError, CorrelationTracker, PendingReply, DEFAULT_ASK_TIMEOUT};
pub use timeout::{TimeoutHandler, TimeoutId};
