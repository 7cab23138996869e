//! Execution of message plans against the runtime.
//!
//! The interpreter walks a plan as a work queue, so the recursive case (ask
//! callbacks producing further plans) stays iterative. Instructions execute
//! in array order; an error on one instruction is collected and the rest
//! continue. Effects go through the [`PlanEffects`] trait, which the actor
//! system implements; tests inject a recording double instead.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

// Layer 3: Internal module imports
use super::instruction::{DomainEvent, MessagePlan};
use crate::ask::AskError;
use crate::message::Message;
use crate::util::{ActorAddress, CorrelationId};

/// Errors collected while executing a plan.
#[derive(Error, Debug, Clone)]
pub enum PlanError {
    /// Instruction failed shape validation
    #[error("Invalid instruction: {0}")]
    InvalidInstruction(String),

    /// Fire-and-forget delivery failed
    #[error("Send to {to} failed: {reason}")]
    SendFailed { to: String, reason: String },

    /// Event emission failed
    #[error("Emit of {kind} failed: {reason}")]
    EmitFailed { kind: String, reason: String },

    /// Ask settled with an error and no `on_error` callback was given
    #[error("Ask to {to} failed: {reason}")]
    AskFailed { to: String, reason: String },

    /// A reply was produced for a message that carried no correlation
    #[error("Reply produced without a pending correlation")]
    ReplyWithoutCorrelation,

    /// The pending correlation was already settled
    #[error("Unroutable reply for correlation {0}")]
    UnroutableReply(CorrelationId),
}

/// Summary of one plan execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    /// Whether every instruction executed cleanly
    pub success: bool,

    /// Valid instructions executed
    pub instructions_executed: u64,

    /// Domain events emitted (top-level and via results)
    pub domain_events_emitted: u64,

    /// Fire-and-forget sends issued
    pub send_instructions_processed: u64,

    /// Asks issued
    pub ask_instructions_processed: u64,

    /// Collected errors, in encounter order
    pub errors: Vec<PlanError>,

    /// Wall-clock execution time
    pub execution_time_ms: u64,
}

/// Runtime effects a plan execution needs.
///
/// Implemented by the actor system for live dispatch; tests substitute a
/// recording double (dependency injection at the interpreter seam).
#[async_trait]
pub trait PlanEffects: Send + Sync {
    /// Replace the executing actor's context value.
    fn apply_context(&self, context: Value);

    /// Emit an event: state engine, own event bus, auto-publish routing.
    fn emit_event(&self, event: &DomainEvent) -> Result<(), PlanError>;

    /// Fire-and-forget delivery.
    fn tell(&self, to: &ActorAddress, message: Message) -> Result<(), PlanError>;

    /// Route a reply to the pending correlation of the current dispatch.
    ///
    /// `correlation_id` is `None` when the handled message was not an ask;
    /// implementations dead-letter the reply in that case.
    fn route_reply(
        &self,
        correlation_id: Option<CorrelationId>,
        message: Message,
    ) -> Result<(), PlanError>;

    /// Issue an ask and wait for settlement.
    async fn ask(
        &self,
        to: &ActorAddress,
        message: Message,
        timeout: Duration,
    ) -> Result<Message, AskError>;
}

/// Executes message plans and reports the outcome.
pub struct PlanInterpreter;

impl PlanInterpreter {
    /// Execute `plan` for the actor at `actor_path` handling `message_type`.
    ///
    /// `correlation_id` is the pending correlation of the dispatched message,
    /// when it was an ask. Callback plans produced by ask settlements are
    /// interpreted before the remaining instructions, under the same
    /// counters.
    pub async fn run<E>(
        plan: MessagePlan,
        correlation_id: Option<CorrelationId>,
        actor_path: &str,
        message_type: &str,
        effects: &E,
    ) -> ExecutionReport
    where
        E: PlanEffects + ?Sized,
    {
        let started = Instant::now();
        let mut report = ExecutionReport::default();
        let mut replied = false;

        let mut queue: VecDeque<MessagePlan> = VecDeque::new();
        queue.push_back(plan);

        while let Some(item) = queue.pop_front() {
            match item {
                MessagePlan::Noop => {}

                MessagePlan::Sequence(items) => {
                    for sub in items.into_iter().rev() {
                        queue.push_front(sub);
                    }
                }

                MessagePlan::Emit(event) => {
                    if event.kind().is_empty() {
                        report.errors.push(PlanError::InvalidInstruction(
                            "emit with empty event type".to_string(),
                        ));
                        continue;
                    }
                    report.instructions_executed += 1;
                    match effects.emit_event(&event) {
                        Ok(()) => report.domain_events_emitted += 1,
                        Err(error) => report.errors.push(error),
                    }
                }

                MessagePlan::Send(send) => {
                    if send.message.kind().is_empty() {
                        report.errors.push(PlanError::InvalidInstruction(
                            "send with empty message type".to_string(),
                        ));
                        continue;
                    }
                    report.instructions_executed += 1;
                    match effects.tell(&send.to, send.message) {
                        Ok(()) => report.send_instructions_processed += 1,
                        Err(error) => report.errors.push(error),
                    }
                }

                MessagePlan::Ask(ask) => {
                    if ask.message.kind().is_empty() {
                        report.errors.push(PlanError::InvalidInstruction(
                            "ask with empty message type".to_string(),
                        ));
                        continue;
                    }
                    if ask.timeout.is_zero() {
                        report.errors.push(PlanError::InvalidInstruction(
                            "ask with zero timeout".to_string(),
                        ));
                        continue;
                    }
                    report.instructions_executed += 1;
                    report.ask_instructions_processed += 1;
                    match effects.ask(&ask.to, ask.message, ask.timeout).await {
                        Ok(reply) => {
                            if let Some(callback) = ask.on_ok {
                                queue.push_front(callback(reply));
                            }
                        }
                        Err(error) => {
                            if let Some(callback) = ask.on_error {
                                queue.push_front(callback(error));
                            } else {
                                report.errors.push(PlanError::AskFailed {
                                    to: ask.to.path(),
                                    reason: error.to_string(),
                                });
                            }
                        }
                    }
                }

                MessagePlan::Result(result) => {
                    report.instructions_executed += 1;
                    if let Some(context) = result.context {
                        effects.apply_context(context);
                    }
                    if let Some(reply) = result.reply {
                        match effects.route_reply(correlation_id, reply) {
                            Ok(()) => replied = true,
                            Err(error) => report.errors.push(error),
                        }
                    }
                    for event in result.emit.into_iter().rev() {
                        queue.push_front(MessagePlan::Emit(event));
                    }
                }
            }
        }

        if let Some(id) = correlation_id {
            if !replied {
                warn!(
                    actor = actor_path,
                    message_type,
                    correlation_id = %id,
                    "handler received a correlated message but produced no reply"
                );
            }
        }

        report.success = report.errors.is_empty();
        report.execution_time_ms = started.elapsed().as_millis() as u64;
        report
    }
}
