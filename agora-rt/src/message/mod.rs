//! Dynamic messages and envelopes for actor communication.
//!
//! Messages are tagged variants discriminated on their `kind` string, with an
//! opaque JSON payload. The envelope adds routing metadata (sender, reply-to,
//! correlation id) and an enqueue timestamp, and serializes to the wire shape
//! used for cross-boundary transport.
//!
//! # Components
//!
//! - [`Message`] - Tagged message with JSON payload
//! - [`MessageEnvelope`] - Message plus routing metadata
//!
//! # Module Organization
//!
//! This mod.rs file contains ONLY module declarations and re-exports.

pub mod envelope;
pub mod message;

pub use envelope::MessageEnvelope;
pub use message::Message;
