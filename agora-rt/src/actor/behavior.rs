// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

// Layer 3: Internal module imports
use crate::message::Message;
use crate::plan::{DomainEvent, MessagePlan};
use crate::supervisor::SupervisionPolicy;
use crate::util::{ActorAddress, CorrelationId};

/// Failure raised by a behavior handler.
///
/// Handler failures never terminate the dispatcher; they surface through the
/// supervisor, which decides restart, stop, or escalate. A `fatal` failure
/// asks the supervisor to skip restarting regardless of policy.
#[derive(Error, Debug, Clone)]
#[error("{reason}")]
pub struct HandlerError {
    reason: String,
    fatal: bool,
}

impl HandlerError {
    /// A recoverable handler failure.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            fatal: false,
        }
    }

    /// A failure that should not be retried by restarting.
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            fatal: true,
        }
    }

    /// The failure description.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Whether restarting is pointless for this failure.
    pub fn is_fatal(&self) -> bool {
        self.fatal
    }
}

/// Pluggable state-machine collaborator embedded in a behavior.
///
/// Some behaviors delegate their domain logic to an external state engine.
/// The runtime treats it as opaque: the plan interpreter forwards emitted
/// domain events to it, and `snapshot` contributes to diagnostics.
pub trait StateEngine: Send + Sync {
    /// Feed a domain event into the engine.
    fn send(&self, event: &DomainEvent);

    /// Observe engine transitions. The listener receives each new snapshot.
    fn subscribe(&self, listener: Box<dyn Fn(&Value) + Send + Sync>);

    /// Current engine state.
    fn snapshot(&self) -> Value;
}

/// Per-dispatch view handed to behavior handlers.
///
/// Carries the actor's address, a snapshot of its context value, and the
/// envelope metadata of the message being handled. Handlers read from the
/// view and describe effects by returning a [`MessagePlan`]; they never
/// mutate runtime state directly.
#[derive(Debug, Clone)]
pub struct ActorView {
    address: ActorAddress,
    context: Value,
    sender: Option<ActorAddress>,
    correlation_id: Option<CorrelationId>,
}

impl ActorView {
    /// Assemble a view for one dispatch.
    pub fn new(
        address: ActorAddress,
        context: Value,
        sender: Option<ActorAddress>,
        correlation_id: Option<CorrelationId>,
    ) -> Self {
        Self {
            address,
            context,
            sender,
            correlation_id,
        }
    }

    /// Address of the actor handling the message.
    pub fn address(&self) -> &ActorAddress {
        &self.address
    }

    /// Snapshot of the actor's context value at dispatch time.
    pub fn context(&self) -> &Value {
        &self.context
    }

    /// Sender of the message being handled, when known.
    pub fn sender(&self) -> Option<&ActorAddress> {
        self.sender.as_ref()
    }

    /// Correlation id when the message is part of an ask exchange.
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.correlation_id
    }

    /// Whether the current message expects a reply.
    pub fn is_ask(&self) -> bool {
        self.correlation_id.is_some()
    }
}

/// Immutable description of how an actor reacts to messages.
///
/// The runtime owns the actor's mutable state (its context value, seeded by
/// [`initial_context`](Behavior::initial_context) and replaced through
/// OTP-style plan results), so `on_message` takes `&self`: it is a function
/// of the message and the view, returning a declarative [`MessagePlan`] that
/// the interpreter turns into sends, asks, emits, replies, and context
/// updates.
///
/// # Example
///
/// ```rust
/// use agora_rt::actor::{ActorView, Behavior, HandlerError};
/// use agora_rt::message::Message;
/// use agora_rt::plan::{HandlerResult, MessagePlan};
/// use async_trait::async_trait;
///
/// struct Echo;
///
/// #[async_trait]
/// impl Behavior for Echo {
///     async fn on_message(
///         &self,
///         message: &Message,
///         _view: &ActorView,
///     ) -> Result<MessagePlan, HandlerError> {
///         match message.kind() {
///             "PING" => Ok(HandlerResult::new()
///                 .reply(Message::with_payload("PONG", message.payload().clone()))
///                 .into()),
///             _ => Ok(MessagePlan::Noop),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Behavior: Send + Sync + 'static {
    /// Context value a fresh instance of this actor starts with.
    ///
    /// Also used after a supervisor restart: restarts reset the context.
    fn initial_context(&self) -> Value {
        Value::Null
    }

    /// Called once before the actor accepts messages.
    async fn on_start(&self, _view: &ActorView) -> Result<(), HandlerError> {
        Ok(())
    }

    /// React to a message. The returned plan describes what happens next.
    async fn on_message(
        &self,
        message: &Message,
        view: &ActorView,
    ) -> Result<MessagePlan, HandlerError>;

    /// Called once while the actor stops, after the mailbox closed.
    async fn on_stop(&self, _view: &ActorView) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Supervision policy for this actor, overriding the inherited one.
    fn supervision_strategy(&self) -> Option<SupervisionPolicy> {
        None
    }

    /// Embedded state engine, when this behavior delegates to one.
    fn state_engine(&self) -> Option<Arc<dyn StateEngine>> {
        None
    }
}
