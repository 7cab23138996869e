// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

// Layer 3: Internal module imports
use super::metrics::MailboxMetrics;
use super::overflow::OverflowPolicy;
use crate::message::MessageEnvelope;

/// Errors returned by mailbox enqueue operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailboxError {
    /// Mailbox at capacity under the `Fail` overflow policy
    #[error("Mailbox full (capacity {capacity})")]
    Full { capacity: usize },

    /// Mailbox closed; the actor is stopping or stopped
    #[error("Mailbox closed")]
    Closed,
}

/// What `enqueue` did with the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Message queued
    Enqueued,

    /// Incoming message discarded under `DropNewest`
    DroppedNewest,

    /// Oldest queued message discarded to admit this one under `DropOldest`
    DroppedOldest,
}

/// Errors returned by the non-blocking receive.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    /// No message queued right now
    #[error("Mailbox empty")]
    Empty,

    /// Mailbox closed and fully drained
    #[error("Mailbox closed")]
    Closed,
}

struct QueueState {
    queue: VecDeque<MessageEnvelope>,
    closed: bool,
}

struct MailboxInner {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: Option<usize>,
    policy: OverflowPolicy,
    metrics: MailboxMetrics,
}

/// Strict-FIFO mailbox: many producers, exactly one consumer.
///
/// `Mailbox::new` returns a cloneable [`MailboxSender`] and the unique
/// [`MailboxReceiver`] the dispatcher drains. Capacity `None` means
/// unbounded (the single-node default); a bounded mailbox applies its
/// [`OverflowPolicy`] when full.
///
/// # Example
/// ```rust
/// use agora_rt::mailbox::{Mailbox, OverflowPolicy};
/// use agora_rt::message::{Message, MessageEnvelope};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (sender, mut receiver) = Mailbox::new(Some(16), OverflowPolicy::Fail);
/// sender.enqueue(MessageEnvelope::new(Message::new("PING"))).unwrap();
/// let envelope = receiver.recv().await.unwrap();
/// assert_eq!(envelope.message_type(), "PING");
/// # }
/// ```
pub struct Mailbox;

impl Mailbox {
    /// Create a mailbox, returning its producer and consumer halves.
    pub fn new(
        capacity: Option<usize>,
        policy: OverflowPolicy,
    ) -> (MailboxSender, MailboxReceiver) {
        let inner = Arc::new(MailboxInner {
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
            policy,
            metrics: MailboxMetrics::new(),
        });
        (
            MailboxSender {
                inner: Arc::clone(&inner),
            },
            MailboxReceiver { inner },
        )
    }
}

/// Cloneable producer handle for a mailbox.
#[derive(Clone)]
pub struct MailboxSender {
    inner: Arc<MailboxInner>,
}

impl MailboxSender {
    /// Enqueue an envelope, applying the overflow policy when full.
    ///
    /// The outcome reports drops under the drop policies (also visible in
    /// [`MailboxMetrics`]); only the `Fail` policy turns a full mailbox into
    /// an error.
    pub fn enqueue(&self, envelope: MessageEnvelope) -> Result<EnqueueOutcome, MailboxError> {
        let mut state = self.inner.state.lock();
        if state.closed {
            self.inner.metrics.record_rejected();
            return Err(MailboxError::Closed);
        }

        let mut outcome = EnqueueOutcome::Enqueued;
        if let Some(capacity) = self.inner.capacity {
            if state.queue.len() >= capacity {
                match self.inner.policy {
                    OverflowPolicy::Fail => {
                        self.inner.metrics.record_rejected();
                        return Err(MailboxError::Full { capacity });
                    }
                    OverflowPolicy::DropNewest => {
                        self.inner.metrics.record_dropped();
                        return Ok(EnqueueOutcome::DroppedNewest);
                    }
                    OverflowPolicy::DropOldest => {
                        state.queue.pop_front();
                        self.inner.metrics.record_dropped();
                        outcome = EnqueueOutcome::DroppedOldest;
                    }
                }
            }
        }

        state.queue.push_back(envelope);
        self.inner.metrics.record_enqueued();
        drop(state);
        self.inner.notify.notify_one();
        Ok(outcome)
    }

    /// Close the mailbox; subsequent enqueue fails with `Closed`.
    pub fn close(&self) {
        self.inner.state.lock().closed = true;
        self.inner.notify.notify_waiters();
    }

    /// Whether the mailbox has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mailbox traffic counters.
    pub fn metrics(&self) -> &MailboxMetrics {
        &self.inner.metrics
    }
}

/// Single-consumer receiving half of a mailbox.
///
/// Not `Clone`: exactly one dispatcher reads from a mailbox at a time.
pub struct MailboxReceiver {
    inner: Arc<MailboxInner>,
}

impl MailboxReceiver {
    /// Receive the next envelope, waiting if the queue is empty.
    ///
    /// Returns `None` once the mailbox is closed and drained.
    pub async fn recv(&mut self) -> Option<MessageEnvelope> {
        loop {
            let notified = self.inner.notify.notified();
            {
                let mut state = self.inner.state.lock();
                if let Some(envelope) = state.queue.pop_front() {
                    self.inner.metrics.record_dequeued();
                    return Some(envelope);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Result<MessageEnvelope, TryRecvError> {
        let mut state = self.inner.state.lock();
        if let Some(envelope) = state.queue.pop_front() {
            self.inner.metrics.record_dequeued();
            return Ok(envelope);
        }
        if state.closed {
            Err(TryRecvError::Closed)
        } else {
            Err(TryRecvError::Empty)
        }
    }

    /// Discard all queued messages, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let mut state = self.inner.state.lock();
        let removed = state.queue.len();
        for _ in 0..removed {
            self.inner.metrics.record_dropped();
        }
        state.queue.clear();
        removed
    }

    /// Close the mailbox from the consumer side.
    pub fn close(&self) {
        self.inner.state.lock().closed = true;
        self.inner.notify.notify_waiters();
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity (`None` = unbounded).
    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }

    /// Mailbox traffic counters.
    pub fn metrics(&self) -> &MailboxMetrics {
        &self.inner.metrics
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::Message;
    use serde_json::json;

    fn envelope(kind: &str) -> MessageEnvelope {
        MessageEnvelope::new(Message::new(kind))
    }

    #[tokio::test]
    async fn test_send_receive_fifo() {
        let (sender, mut receiver) = Mailbox::new(None, OverflowPolicy::Fail);

        for i in 0..10 {
            sender
                .enqueue(MessageEnvelope::new(Message::with_payload(
                    "N",
                    json!({"i": i}),
                )))
                .unwrap();
        }

        for i in 0..10 {
            let received = receiver.recv().await.unwrap();
            assert_eq!(received.message.i64_field("i"), Some(i));
        }
    }

    #[tokio::test]
    async fn test_fail_policy_reports_full() {
        let (sender, _receiver) = Mailbox::new(Some(2), OverflowPolicy::Fail);

        sender.enqueue(envelope("1")).unwrap();
        sender.enqueue(envelope("2")).unwrap();

        let result = sender.enqueue(envelope("3"));
        assert_eq!(result, Err(MailboxError::Full { capacity: 2 }));
        assert_eq!(sender.metrics().rejected(), 1);
    }

    #[tokio::test]
    async fn test_drop_newest_policy() {
        let (sender, mut receiver) = Mailbox::new(Some(2), OverflowPolicy::DropNewest);

        sender.enqueue(envelope("1")).unwrap();
        sender.enqueue(envelope("2")).unwrap();
        sender.enqueue(envelope("3")).unwrap(); // dropped

        assert_eq!(sender.metrics().dropped(), 1);
        assert_eq!(receiver.recv().await.unwrap().message_type(), "1");
        assert_eq!(receiver.recv().await.unwrap().message_type(), "2");
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_drop_oldest_policy() {
        let (sender, mut receiver) = Mailbox::new(Some(2), OverflowPolicy::DropOldest);

        sender.enqueue(envelope("1")).unwrap();
        sender.enqueue(envelope("2")).unwrap();
        sender.enqueue(envelope("3")).unwrap(); // evicts "1"

        assert_eq!(sender.metrics().dropped(), 1);
        assert_eq!(receiver.recv().await.unwrap().message_type(), "2");
        assert_eq!(receiver.recv().await.unwrap().message_type(), "3");
    }

    #[tokio::test]
    async fn test_closed_mailbox_rejects_enqueue() {
        let (sender, receiver) = Mailbox::new(None, OverflowPolicy::Fail);
        receiver.close();

        let result = sender.enqueue(envelope("late"));
        assert_eq!(result, Err(MailboxError::Closed));
    }

    #[tokio::test]
    async fn test_recv_drains_before_reporting_closed() {
        let (sender, mut receiver) = Mailbox::new(None, OverflowPolicy::Fail);
        sender.enqueue(envelope("queued")).unwrap();
        sender.close();

        assert_eq!(receiver.recv().await.unwrap().message_type(), "queued");
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_recv_wakes_on_enqueue() {
        let (sender, mut receiver) = Mailbox::new(None, OverflowPolicy::Fail);

        let handle = tokio::spawn(async move { receiver.recv().await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        sender.enqueue(envelope("wake")).unwrap();

        let received = handle.await.unwrap().unwrap();
        assert_eq!(received.message_type(), "wake");
    }

    #[tokio::test]
    async fn test_clear() {
        let (sender, mut receiver) = Mailbox::new(None, OverflowPolicy::Fail);
        sender.enqueue(envelope("1")).unwrap();
        sender.enqueue(envelope("2")).unwrap();

        assert_eq!(receiver.clear(), 2);
        assert!(receiver.is_empty());
        assert_eq!(receiver.metrics().dropped(), 2);
    }

    #[tokio::test]
    async fn test_multiple_producers() {
        let (sender, mut receiver) = Mailbox::new(None, OverflowPolicy::Fail);
        let sender2 = sender.clone();

        sender.enqueue(envelope("a")).unwrap();
        sender2.enqueue(envelope("b")).unwrap();

        assert_eq!(receiver.len(), 2);
        assert!(receiver.recv().await.is_some());
        assert!(receiver.recv().await.is_some());
    }
}
