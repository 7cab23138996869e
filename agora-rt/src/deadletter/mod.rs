//! Dead-letter capture for undeliverable messages.
//!
//! Messages that cannot reach a handler (the target stopped, the mailbox
//! refused them, a reply lost its correlation) land here instead of
//! vanishing. The queue is a bounded ring buffer; operators drain it and
//! observers subscribe to captures as they happen.
//!
//! # Module Organization
//!
//! This mod.rs file contains ONLY module declarations and re-exports.

pub mod queue;

pub use queue::{DeadLetter, DeadLetterQueue, DeadLetterReason, DEFAULT_DEAD_LETTER_CAPACITY};
