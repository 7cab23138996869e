// Layer 1: Standard library imports
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Layer 3: Internal module imports
use crate::ask::{AskError, DEFAULT_ASK_TIMEOUT};
use crate::message::Message;
use crate::util::ActorAddress;

/// Event emitted by an actor, distinct from its message replies.
///
/// Domain events fan out synchronously to the actor's event-bus subscribers,
/// are forwarded to its embedded state engine (when one exists), and are
/// routed to auto-publish subscribers whose filters match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Event discriminant
    #[serde(rename = "type")]
    kind: String,

    /// Event fields
    #[serde(default, skip_serializing_if = "Value::is_null")]
    payload: Value,
}

impl DomainEvent {
    /// Create an event with no fields.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Value::Null,
        }
    }

    /// Create an event carrying fields.
    pub fn with_payload(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// The event discriminant.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The event fields (`Value::Null` when absent).
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Render this event as a message for delivery to a subscriber actor.
    pub fn to_message(&self) -> Message {
        Message::with_payload(self.kind.clone(), self.payload.clone())
    }
}

/// Fire-and-forget send instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct SendInstruction {
    /// Target actor
    pub to: ActorAddress,

    /// Message to deliver
    pub message: Message,
}

impl SendInstruction {
    /// Create a send instruction.
    pub fn new(to: ActorAddress, message: Message) -> Self {
        Self { to, message }
    }
}

/// Callback evaluating an ask reply into a follow-up plan.
pub type AskCallback = Arc<dyn Fn(Message) -> MessagePlan + Send + Sync>;

/// Callback evaluating an ask failure into a follow-up plan.
pub type AskErrorCallback = Arc<dyn Fn(AskError) -> MessagePlan + Send + Sync>;

/// Request/response instruction with settlement callbacks.
///
/// The interpreter issues the ask and, upon settlement, evaluates `on_ok` or
/// `on_error` in the originating actor's identity context; the produced plan
/// is interpreted recursively under the same execution counters.
#[derive(Clone)]
pub struct AskInstruction {
    /// Target actor
    pub to: ActorAddress,

    /// Request message
    pub message: Message,

    /// Per-request timeout
    pub timeout: Duration,

    /// Evaluated with the reply on success
    pub on_ok: Option<AskCallback>,

    /// Evaluated with the failure on timeout or stop
    pub on_error: Option<AskErrorCallback>,
}

impl AskInstruction {
    /// Create an ask instruction with the default timeout and no callbacks.
    pub fn new(to: ActorAddress, message: Message) -> Self {
        Self {
            to,
            message,
            timeout: DEFAULT_ASK_TIMEOUT,
            on_ok: None,
            on_error: None,
        }
    }

    /// Builder method: Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder method: Set the success callback.
    pub fn on_ok<F>(mut self, callback: F) -> Self
    where
        F: Fn(Message) -> MessagePlan + Send + Sync + 'static,
    {
        self.on_ok = Some(Arc::new(callback));
        self
    }

    /// Builder method: Set the failure callback.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(AskError) -> MessagePlan + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for AskInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AskInstruction")
            .field("to", &self.to)
            .field("message", &self.message)
            .field("timeout", &self.timeout)
            .field("on_ok", &self.on_ok.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// OTP-style handler result: context update, reply, emitted events.
///
/// `context` replaces the actor's context value; `reply` routes to the
/// pending correlation of the message being handled; `emit` fans out through
/// the event bus and the auto-publish registry.
#[derive(Debug, Clone, Default)]
pub struct HandlerResult {
    /// Replacement context value
    pub context: Option<Value>,

    /// Reply to the pending correlation
    pub reply: Option<Message>,

    /// Events to emit
    pub emit: Vec<DomainEvent>,
}

impl HandlerResult {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: Set the replacement context.
    pub fn context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Builder method: Set the reply message.
    pub fn reply(mut self, reply: Message) -> Self {
        self.reply = Some(reply);
        self
    }

    /// Builder method: Add an emitted event.
    pub fn emit(mut self, event: DomainEvent) -> Self {
        self.emit.push(event);
        self
    }

    /// Whether the result carries nothing.
    pub fn is_empty(&self) -> bool {
        self.context.is_none() && self.reply.is_none() && self.emit.is_empty()
    }
}

/// A handler's declarative description of what should happen next.
///
/// The grammar is a closed sum; the interpreter matches exhaustively.
/// Handlers that have nothing to do return [`MessagePlan::Noop`].
#[derive(Debug, Clone, Default)]
pub enum MessagePlan {
    /// Emit a domain event
    Emit(DomainEvent),

    /// Fire-and-forget send
    Send(SendInstruction),

    /// Request/response with settlement callbacks
    Ask(AskInstruction),

    /// OTP-style context/reply/emit result
    Result(HandlerResult),

    /// Instructions executed in array order
    Sequence(Vec<MessagePlan>),

    /// Nothing to do
    #[default]
    Noop,
}

impl MessagePlan {
    /// Number of leaf instructions in this plan (sequences flattened).
    pub fn instruction_count(&self) -> usize {
        match self {
            Self::Sequence(items) => items.iter().map(MessagePlan::instruction_count).sum(),
            Self::Noop => 0,
            _ => 1,
        }
    }

    /// Whether the plan contains a reply for the pending correlation.
    pub fn contains_reply(&self) -> bool {
        match self {
            Self::Result(result) => result.reply.is_some(),
            Self::Sequence(items) => items.iter().any(MessagePlan::contains_reply),
            _ => false,
        }
    }
}

impl From<DomainEvent> for MessagePlan {
    fn from(event: DomainEvent) -> Self {
        Self::Emit(event)
    }
}

impl From<SendInstruction> for MessagePlan {
    fn from(send: SendInstruction) -> Self {
        Self::Send(send)
    }
}

impl From<AskInstruction> for MessagePlan {
    fn from(ask: AskInstruction) -> Self {
        Self::Ask(ask)
    }
}

impl From<HandlerResult> for MessagePlan {
    fn from(result: HandlerResult) -> Self {
        Self::Result(result)
    }
}

impl From<Vec<MessagePlan>> for MessagePlan {
    fn from(items: Vec<MessagePlan>) -> Self {
        Self::Sequence(items)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_domain_event_to_message() {
        let event = DomainEvent::with_payload("USER_CREATED", json!({"id": 7}));
        let message = event.to_message();
        assert_eq!(message.kind(), "USER_CREATED");
        assert_eq!(message.i64_field("id"), Some(7));
    }

    #[test]
    fn test_handler_result_builder() {
        let result = HandlerResult::new()
            .context(json!({"n": 1}))
            .reply(Message::new("PONG"))
            .emit(DomainEvent::new("TICKED"));

        assert_eq!(result.context, Some(json!({"n": 1})));
        assert_eq!(result.reply.as_ref().unwrap().kind(), "PONG");
        assert_eq!(result.emit.len(), 1);
        assert!(!result.is_empty());
        assert!(HandlerResult::new().is_empty());
    }

    #[test]
    fn test_plan_instruction_count() {
        let to = ActorAddress::local("worker", "w-1").unwrap();
        let plan = MessagePlan::Sequence(vec![
            DomainEvent::new("A").into(),
            SendInstruction::new(to, Message::new("B")).into(),
            MessagePlan::Noop,
            MessagePlan::Sequence(vec![HandlerResult::new().into()]),
        ]);
        assert_eq!(plan.instruction_count(), 3);
    }

    #[test]
    fn test_contains_reply() {
        assert!(!MessagePlan::Noop.contains_reply());
        assert!(!MessagePlan::from(DomainEvent::new("E")).contains_reply());

        let with_reply =
            MessagePlan::Sequence(vec![HandlerResult::new().reply(Message::new("PONG")).into()]);
        assert!(with_reply.contains_reply());
    }

    #[test]
    fn test_ask_builder() {
        let to = ActorAddress::local("worker", "w-1").unwrap();
        let ask = AskInstruction::new(to, Message::new("Q"))
            .with_timeout(Duration::from_millis(50))
            .on_ok(|_reply| MessagePlan::Noop);

        assert_eq!(ask.timeout, Duration::from_millis(50));
        assert!(ask.on_ok.is_some());
        assert!(ask.on_error.is_none());

        let debug = format!("{ask:?}");
        assert!(debug.contains("on_ok: true"));
    }

    #[test]
    fn test_default_plan_is_noop() {
        assert!(matches!(MessagePlan::default(), MessagePlan::Noop));
    }
}
