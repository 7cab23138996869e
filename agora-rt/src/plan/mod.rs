//! Message plans: the declarative bridge between handlers and the scheduler.
//!
//! A behavior handler never performs effects directly; it returns a
//! [`MessagePlan`] describing what should happen next: events to emit,
//! messages to tell, asks to issue with settlement callbacks, a reply to
//! route, a context update. The [`PlanInterpreter`] executes the plan against
//! the runtime and reports what it did.
//!
//! # Components
//!
//! - [`MessagePlan`] - Closed sum of plan shapes
//! - [`DomainEvent`] / [`SendInstruction`] / [`AskInstruction`] / [`HandlerResult`]
//! - [`PlanInterpreter`] / [`PlanEffects`] - Execution against the runtime
//! - [`ExecutionReport`] / [`PlanError`] - Outcome summary
//!
//! # Module Organization
//!
//! This mod.rs file contains ONLY module declarations and re-exports.

pub mod instruction;
pub mod interpreter;

pub use instruction::{
    AskCallback, AskErrorCallback, AskInstruction, DomainEvent, HandlerResult, MessagePlan,
    SendInstruction,
};
pub use interpreter::{ExecutionReport, PlanEffects, PlanError, PlanInterpreter};
