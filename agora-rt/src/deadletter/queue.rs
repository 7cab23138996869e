// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

// Layer 3: Internal module imports
use crate::message::MessageEnvelope;

const SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;

/// Default ring-buffer capacity.
pub const DEFAULT_DEAD_LETTER_CAPACITY: usize = 1024;

/// Why a message became undeliverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeadLetterReason {
    /// Target actor had stopped
    TargetStopped,

    /// Mailbox refused the message under its overflow policy
    MailboxRejected,

    /// Reply arrived with no matching pending correlation
    UnroutableReply,

    /// No actor registered under the target address
    NoSuchActor,
}

/// One captured undeliverable message.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    /// The envelope that could not be delivered
    pub envelope: MessageEnvelope,

    /// Why delivery failed
    pub reason: DeadLetterReason,

    /// When it was captured
    pub at: DateTime<Utc>,
}

/// Bounded ring buffer of undeliverable messages.
///
/// Appends past capacity evict the oldest capture. Clones share the buffer.
#[derive(Clone)]
pub struct DeadLetterQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    letters: Mutex<VecDeque<DeadLetter>>,
    capacity: usize,
    subscribers: broadcast::Sender<DeadLetter>,
}

impl DeadLetterQueue {
    /// Create a queue holding up to `capacity` captures.
    pub fn new(capacity: usize) -> Self {
        let (subscribers, _) = broadcast::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(QueueInner {
                letters: Mutex::new(VecDeque::new()),
                capacity,
                subscribers,
            }),
        }
    }

    /// Create a queue with the default capacity.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_DEAD_LETTER_CAPACITY)
    }

    /// Capture an undeliverable envelope.
    pub fn publish(&self, envelope: MessageEnvelope, reason: DeadLetterReason) {
        debug!(
            message_type = envelope.message_type(),
            ?reason,
            "message dead-lettered"
        );
        let letter = DeadLetter {
            envelope,
            reason,
            at: Utc::now(),
        };
        {
            let mut letters = self.inner.letters.lock();
            if letters.len() >= self.inner.capacity {
                letters.pop_front();
            }
            letters.push_back(letter.clone());
        }
        let _ = self.inner.subscribers.send(letter);
    }

    /// Remove and return every capture.
    pub fn drain(&self) -> Vec<DeadLetter> {
        self.inner.letters.lock().drain(..).collect()
    }

    /// Observe captures as they happen.
    pub fn subscribe(&self) -> broadcast::Receiver<DeadLetter> {
        self.inner.subscribers.subscribe()
    }

    /// Captures currently buffered.
    pub fn len(&self) -> usize {
        self.inner.letters.lock().len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.letters.lock().is_empty()
    }
}

impl Default for DeadLetterQueue {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::Message;

    fn envelope(kind: &str) -> MessageEnvelope {
        MessageEnvelope::new(Message::new(kind))
    }

    #[test]
    fn test_publish_and_drain() {
        let queue = DeadLetterQueue::with_defaults();
        queue.publish(envelope("LOST"), DeadLetterReason::TargetStopped);
        assert_eq!(queue.len(), 1);

        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].envelope.message_type(), "LOST");
        assert_eq!(drained[0].reason, DeadLetterReason::TargetStopped);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let queue = DeadLetterQueue::new(2);
        queue.publish(envelope("first"), DeadLetterReason::NoSuchActor);
        queue.publish(envelope("second"), DeadLetterReason::NoSuchActor);
        queue.publish(envelope("third"), DeadLetterReason::NoSuchActor);

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].envelope.message_type(), "second");
        assert_eq!(drained[1].envelope.message_type(), "third");
    }

    #[tokio::test]
    async fn test_subscribers_observe_captures() {
        let queue = DeadLetterQueue::with_defaults();
        let mut observer = queue.subscribe();

        queue.publish(envelope("SEEN"), DeadLetterReason::UnroutableReply);

        let letter = observer.recv().await.unwrap();
        assert_eq!(letter.envelope.message_type(), "SEEN");
        assert_eq!(letter.reason, DeadLetterReason::UnroutableReply);
    }
}
