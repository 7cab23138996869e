//! Event emission between actors: per-actor buses and auto-publish routing.
//!
//! Each actor optionally emits domain events distinct from its message
//! replies. Events fan out two ways: synchronously to the emitter's own
//! event-bus subscribers, and through the process-wide auto-publish registry
//! to actors that subscribed to the publisher's logical identity with an
//! event-type filter.
//!
//! # Components
//!
//! - [`EventBus`] - Per-actor synchronous listener set
//! - [`Subscription`] - Detachable listener handle
//! - [`PublishRegistry`] - Process-wide publisher/subscriber table
//!
//! # Module Organization
//!
//! This mod.rs file contains ONLY module declarations and re-exports.

pub mod bus;
pub mod registry;

pub use bus::{EventBus, EventListener, ListenerResult, Subscription};
pub use registry::{EventSubscription, PublishRegistry};
