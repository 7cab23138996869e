// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::message::Message;
use crate::util::{ActorAddress, CorrelationId};

/// Message envelope carrying routing metadata alongside the payload.
///
/// Envelopes are created on enqueue; the timestamp records that instant.
/// `correlation_id` and `reply_to` are present exactly when the message is
/// part of an ask exchange. `sender` is in-process metadata and is not part
/// of the wire shape.
///
/// Serialization matches the cross-boundary wire shape:
///
/// ```json
/// {
///   "type": "<string>",
///   "payload": { },
///   "_timestamp": 1700000000000,
///   "_correlationId": "…",
///   "_replyTo": "worker://local/w-1"
/// }
/// ```
///
/// # Example
/// ```rust
/// use agora_rt::message::{Message, MessageEnvelope};
/// use agora_rt::util::ActorAddress;
///
/// let sender = ActorAddress::local("client", "c-1").unwrap();
/// let envelope = MessageEnvelope::new(Message::new("PING")).with_sender(sender.clone());
/// assert_eq!(envelope.sender(), Some(&sender));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// The message itself (`type` + `payload` on the wire)
    #[serde(flatten)]
    pub message: Message,

    /// Sending actor, when the send happened inside a handler
    #[serde(skip)]
    pub sender: Option<ActorAddress>,

    /// Address to route the reply to; present iff ask
    #[serde(
        rename = "_replyTo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reply_to: Option<ActorAddress>,

    /// Correlation id pairing request and reply; present iff ask
    #[serde(
        rename = "_correlationId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub correlation_id: Option<CorrelationId>,

    /// Set on enqueue, milliseconds since epoch on the wire
    #[serde(rename = "_timestamp", with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl MessageEnvelope {
    /// Create an envelope around a message, stamped now.
    pub fn new(message: Message) -> Self {
        Self {
            message,
            sender: None,
            reply_to: None,
            correlation_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Builder method: Set sender address
    pub fn with_sender(mut self, sender: ActorAddress) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Builder method: Set reply-to address
    pub fn with_reply_to(mut self, reply_to: ActorAddress) -> Self {
        self.reply_to = Some(reply_to);
        self
    }

    /// Builder method: Set correlation id
    pub fn with_correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// The sending actor, when known.
    pub fn sender(&self) -> Option<&ActorAddress> {
        self.sender.as_ref()
    }

    /// The message discriminant.
    pub fn message_type(&self) -> &str {
        self.message.kind()
    }

    /// Whether this envelope is part of an ask exchange.
    pub fn is_ask(&self) -> bool {
        self.correlation_id.is_some()
    }
}
