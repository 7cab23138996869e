//! Mailbox system for actor message queuing with overflow control.
//!
//! Each live actor owns exactly one mailbox: a strict-FIFO queue with any
//! number of producers and exactly one consumer (its dispatcher). Capacity is
//! unbounded by default and configurable per actor; a full mailbox follows
//! the configured [`OverflowPolicy`].
//!
//! tokio's mpsc channel cannot express drop-oldest, so the queue is a
//! mutex-guarded deque with a wake-up signal. The lock is held only for
//! push/pop, never across awaits.
//!
//! # Components
//!
//! - [`Mailbox`] - Constructor producing a sender/receiver pair
//! - [`MailboxSender`] - Cloneable producer handle
//! - [`MailboxReceiver`] - Single-consumer handle owned by the dispatcher
//! - [`OverflowPolicy`] - Full-mailbox behavior (Fail, DropNewest, DropOldest)
//! - [`MailboxMetrics`] - Atomic enqueue/dequeue/drop counters
//!
//! # Module Organization
//!
//! This mod.rs file contains ONLY module declarations and re-exports.

pub mod metrics;
pub mod overflow;
pub mod queue;

pub use metrics::MailboxMetrics;
pub use overflow::OverflowPolicy;
pub use queue::{
    EnqueueOutcome, Mailbox, MailboxError, MailboxReceiver, MailboxSender, TryRecvError,
};
