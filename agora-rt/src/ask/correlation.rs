//! Correlation tracking for request-response patterns.
//!
//! The tracker is a process-wide, lock-free table of pending requests keyed
//! by correlation id. The first of (reply arrival, timeout, target stop)
//! wins; settlement goes through a oneshot channel so exactly one outcome
//! reaches the asker.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::oneshot;

// Layer 3: Internal module imports
use crate::mailbox::MailboxError;
use crate::message::Message;
use crate::util::{ActorAddress, CorrelationId};

/// Default per-request ask timeout.
pub const DEFAULT_ASK_TIMEOUT: Duration = Duration::from_secs(5);

/// Structured failures of the ask pattern.
#[derive(Error, Debug, Clone)]
pub enum AskError {
    /// No reply arrived within the configured timeout
    #[error(
        "Ask timed out after {timeout:?}: {actor_path} did not reply to {message_type} [{correlation_id}]"
    )]
    Timeout {
        actor_path: String,
        message_type: String,
        timeout: Duration,
        correlation_id: CorrelationId,
    },

    /// The target stopped before replying
    #[error("Actor stopped: {path}")]
    ActorStopped { path: String },

    /// No actor is registered under the target address
    #[error("Actor not found: {path}")]
    NotFound { path: String },

    /// A correlation id was reused while still in flight
    #[error("Correlation id already in flight: {0}")]
    DuplicateCorrelation(CorrelationId),

    /// A reply arrived that matches no pending request
    #[error("No pending request for correlation {0}")]
    Unroutable(CorrelationId),

    /// The target's mailbox refused the request envelope
    #[error("Mailbox rejected ask: {0}")]
    Mailbox(#[from] MailboxError),

    /// The pending request was dropped without settlement
    #[error("Ask canceled")]
    Canceled,
}

struct PendingRequest {
    target: ActorAddress,
    message_type: String,
    timeout: Duration,
    #[allow(dead_code)] // Recorded for diagnostics dumps
    started_at: DateTime<Utc>,
    response_tx: oneshot::Sender<Result<Message, AskError>>,
}

/// Receiver half of a pending ask, awaited by the asker.
pub struct PendingReply {
    correlation_id: CorrelationId,
    rx: oneshot::Receiver<Result<Message, AskError>>,
}

impl PendingReply {
    /// The correlation id of the request this reply belongs to.
    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    /// Wait for the request to settle.
    pub async fn settled(self) -> Result<Message, AskError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(AskError::Canceled),
        }
    }
}

/// Process-wide pending-request table for the ask pattern.
///
/// Clones share the same table (cheap `Arc` clone). Every registered request
/// settles exactly once: through [`resolve`](Self::resolve),
/// [`fail_timeout`](Self::fail_timeout), or
/// [`reject_all_for`](Self::reject_all_for).
#[derive(Clone, Default)]
pub struct CorrelationTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Default)]
struct TrackerInner {
    pending: DashMap<CorrelationId, PendingRequest>,
    completed: AtomicU64,
    timed_out: AtomicU64,
    rejected: AtomicU64,
}

impl CorrelationTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending request under a fresh correlation id.
    pub fn register(
        &self,
        target: &ActorAddress,
        message_type: &str,
        timeout: Duration,
    ) -> PendingReply {
        // Uuid v4 collisions are not a practical concern; loop anyway so the
        // in-flight uniqueness invariant holds unconditionally.
        loop {
            if let Ok(reply) =
                self.register_with_id(CorrelationId::new(), target, message_type, timeout)
            {
                return reply;
            }
        }
    }

    /// Register a pending request under a caller-chosen correlation id.
    ///
    /// Reusing an id that is still in flight is an error.
    pub fn register_with_id(
        &self,
        correlation_id: CorrelationId,
        target: &ActorAddress,
        message_type: &str,
        timeout: Duration,
    ) -> Result<PendingReply, AskError> {
        if self.inner.pending.contains_key(&correlation_id) {
            return Err(AskError::DuplicateCorrelation(correlation_id));
        }
        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(
            correlation_id,
            PendingRequest {
                target: target.clone(),
                message_type: message_type.to_string(),
                timeout,
                started_at: Utc::now(),
                response_tx: tx,
            },
        );
        Ok(PendingReply {
            correlation_id,
            rx,
        })
    }

    /// Route a reply to its pending request.
    ///
    /// Returns `Unroutable` when nothing is pending under the id; the
    /// caller dead-letters the reply.
    pub fn resolve(&self, correlation_id: CorrelationId, reply: Message) -> Result<(), AskError> {
        let (_, request) = self
            .inner
            .pending
            .remove(&correlation_id)
            .ok_or(AskError::Unroutable(correlation_id))?;
        self.inner.completed.fetch_add(1, Ordering::Relaxed);
        let _ = request.response_tx.send(Ok(reply));
        Ok(())
    }

    /// Settle a pending request as timed out.
    ///
    /// A later-arriving reply for the same id becomes unroutable.
    pub fn fail_timeout(&self, correlation_id: CorrelationId) {
        if let Some((_, request)) = self.inner.pending.remove(&correlation_id) {
            self.inner.timed_out.fetch_add(1, Ordering::Relaxed);
            let _ = request.response_tx.send(Err(AskError::Timeout {
                actor_path: request.target.path(),
                message_type: request.message_type,
                timeout: request.timeout,
                correlation_id,
            }));
        }
    }

    /// Withdraw a pending request without settling it toward the asker.
    ///
    /// Used when the request envelope itself could not be delivered.
    pub fn cancel(&self, correlation_id: CorrelationId) {
        self.inner.pending.remove(&correlation_id);
    }

    /// Reject every pending request addressed to a stopping actor.
    pub fn reject_all_for(&self, target: &ActorAddress) {
        let ids: Vec<CorrelationId> = self
            .inner
            .pending
            .iter()
            .filter(|entry| &entry.value().target == target)
            .map(|entry| *entry.key())
            .collect();
        for id in ids {
            if let Some((_, request)) = self.inner.pending.remove(&id) {
                self.inner.rejected.fetch_add(1, Ordering::Relaxed);
                let _ = request.response_tx.send(Err(AskError::ActorStopped {
                    path: request.target.path(),
                }));
            }
        }
    }

    /// Requests currently awaiting settlement.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Requests settled by a matched reply.
    pub fn completed_count(&self) -> u64 {
        self.inner.completed.load(Ordering::Relaxed)
    }

    /// Requests settled by timeout.
    pub fn timeout_count(&self) -> u64 {
        self.inner.timed_out.load(Ordering::Relaxed)
    }

    /// Requests rejected because their target stopped.
    pub fn rejected_count(&self) -> u64 {
        self.inner.rejected.load(Ordering::Relaxed)
    }

    /// Fraction of settled requests that timed out.
    pub fn timeout_rate(&self) -> f64 {
        let timed_out = self.timeout_count();
        let settled = self.completed_count() + timed_out + self.rejected_count();
        if settled == 0 {
            0.0
        } else {
            timed_out as f64 / settled as f64
        }
    }
}
