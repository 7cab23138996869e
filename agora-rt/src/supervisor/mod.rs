//! Supervision: restart policies, backoff, and failure decisions.
//!
//! Every spawned actor carries a supervision policy inherited from its parent
//! unless overridden. When a handler fails, the supervising side consults the
//! policy: restart the child (with windowed rate limiting and optional
//! backoff), stop it, or escalate the failure upward. Supervision events are
//! emitted on the supervising actor's own event bus so hierarchical
//! observers can react.
//!
//! # Components
//!
//! - [`SupervisionPolicy`] - restart-on-failure / stop-on-failure / escalate
//! - [`BackoffConfig`] / [`RestartBackoff`] - linear, exponential, fibonacci delays
//! - [`ChildSupervision`] - Per-child decision state
//! - [`SupervisionEvent`] - child-started / child-failed / child-restarted / child-stopped
//!
//! # Module Organization
//!
//! This mod.rs file contains ONLY module declarations and re-exports.

pub mod backoff;
pub mod engine;
pub mod types;

pub use backoff::{BackoffConfig, BackoffStrategy, RestartBackoff};
pub use engine::{ChildSupervision, SupervisionDecision};
pub use types::{SupervisionEvent, SupervisionEventKind, SupervisionPolicy};
