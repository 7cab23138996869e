//! Actor abstractions: behavior contract, identity context, lifecycle.
//!
//! Actors are isolated units of state and behavior that communicate only by
//! messages. A [`Behavior`] describes how an actor reacts; the runtime owns
//! the actor's mutable context value and serializes message handling. The
//! identity context makes "who am I" available to library code across
//! suspension points without cross-talk between concurrent actors.
//!
//! # Components
//!
//! - [`Behavior`] - Immutable reaction description (`on_start`, `on_message`, `on_stop`)
//! - [`ActorView`] - Per-dispatch view handed to handlers
//! - [`IdentityContext`] - Continuation-local actor identity
//! - [`ActorStatus`] / [`ActorLifecycle`] - Lifecycle state machine and tracker
//! - [`StateEngine`] - Pluggable embedded state-machine collaborator
//!
//! # Module Organization
//!
//! This mod.rs file contains ONLY module declarations and re-exports.

pub mod behavior;
pub mod context;
pub mod lifecycle;

pub use behavior::{ActorView, Behavior, HandlerError, StateEngine};
pub use context::{
    current_actor_id, current_identity, with_identity, IdentityContext, IdentityDiagnostics,
    MAX_IDENTITY_DEPTH,
};
pub use lifecycle::{ActorLifecycle, ActorStatus};
