//! Actor system facade: lifecycle, spawning, lookup, diagnostics.
//!
//! # Components
//!
//! - [`ActorSystem`] - Top-level runtime handle
//! - [`ActorRef`] - Handle on a spawned actor
//! - [`SpawnBuilder`] - Fluent spawn configuration
//! - [`GuardianBehavior`] - Root system actor
//! - [`SystemConfig`] / [`SystemError`] / [`SystemStats`]
//!
//! # Module Organization
//!
//! This mod.rs file contains ONLY module declarations and re-exports.

pub mod actor_system;
pub mod builder;
pub mod config;
pub mod errors;
pub mod guardian;

pub use actor_system::{ActorRef, ActorSystem, BehaviorFactory, SystemStats};
pub use builder::SpawnBuilder;
pub use config::{StopPolicy, SystemConfig, SystemConfigBuilder};
pub use errors::SystemError;
pub use guardian::{
    GuardianBehavior, ACTOR_FAILED, GET_SYSTEM_INFO, GUARDIAN_ID, GUARDIAN_KIND, SHUTDOWN,
    SPAWN_ACTOR, STOP_ACTOR, SYSTEM_HEALTH_CHECK,
};
