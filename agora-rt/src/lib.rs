//! # agora-rt - In-Process Actor Runtime
//!
//! Compose application logic as isolated stateful actors that communicate
//! exclusively by asynchronous messages, with mailbox scheduling,
//! request/response correlation, hierarchical supervision, pub/sub event
//! emission, scheduled messaging, and a cached actor directory.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use agora_rt::prelude::*;
//! use async_trait::async_trait;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Behavior for Echo {
//!     async fn on_message(
//!         &self,
//!         message: &Message,
//!         _view: &ActorView,
//!     ) -> Result<MessagePlan, HandlerError> {
//!         match message.kind() {
//!             "PING" => Ok(HandlerResult::new()
//!                 .reply(Message::with_payload("PONG", message.payload().clone()))
//!                 .into()),
//!             _ => Ok(MessagePlan::Noop),
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let system = ActorSystem::new(SystemConfig::default())?;
//!     system.start().await?;
//!
//!     let echo = system.spawn().with_kind("echo").spawn(Echo).await?;
//!     let reply = echo.ask(Message::with_payload("PING", serde_json::json!({"n": 42}))).await?;
//!     assert_eq!(reply.kind(), "PONG");
//!
//!     system.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Core Concepts
//!
//! ## Behaviors and Message Plans
//!
//! A [`Behavior`](actor::Behavior) describes how an actor reacts. Handlers
//! never perform effects directly: they return a
//! [`MessagePlan`](plan::MessagePlan) describing events to emit, messages to
//! tell, asks with settlement callbacks, a reply, a context update, and the
//! interpreter executes it against the runtime.
//!
//! ## Scheduling Model
//!
//! Parallel actors, single-threaded per actor: any number of actors process
//! messages simultaneously, but within one actor messages are strictly
//! serialized, including across handler suspension points. The only
//! ordering guarantee beyond that is FIFO per (sender, receiver) pair.
//!
//! ## Supervision
//!
//! Failures surface to the supervising side, never to the dispatcher loop:
//! restart with windowed rate limiting and optional backoff, stop, or
//! escalate toward the guardian at the root of the tree.
//!
//! # Module Organization
//!
//! ## Core Runtime
//! - [`actor`] - Behavior contract, identity context, lifecycle
//! - [`message`] - Dynamic messages and envelopes
//! - [`mailbox`] - FIFO queues with overflow policies
//! - [`plan`] - Message-plan grammar and interpreter
//!
//! ## Communication
//! - [`ask`] - Correlation tracking and timeouts
//! - [`event`] - Per-actor event buses and auto-publish routing
//! - [`timer`] - Scheduled delivery with a virtual-clock test mode
//!
//! ## Fault Tolerance & Topology
//! - [`supervisor`] - Policies, backoff, supervision events
//! - [`hierarchy`] - Parent/child tree and event propagation
//!
//! ## Infrastructure
//! - [`system`] - ActorSystem facade, guardian, configuration
//! - [`directory`] - Address-to-location name service with TTL cache
//! - [`deadletter`] - Capture of undeliverable messages
//! - [`util`] - Addresses and identifiers

pub mod actor;
pub mod ask;
pub mod deadletter;
pub mod directory;
pub mod event;
pub mod hierarchy;
pub mod mailbox;
pub mod message;
pub mod plan;
pub mod prelude;
pub mod supervisor;
pub mod system;
pub mod timer;
pub mod util;

// Re-export commonly used types
pub use actor::{ActorStatus, ActorView, Behavior, HandlerError, IdentityContext};
pub use ask::{AskError, CorrelationTracker, TimeoutHandler, DEFAULT_ASK_TIMEOUT};
pub use deadletter::{DeadLetter, DeadLetterQueue, DeadLetterReason};
pub use directory::{Directory, DirectoryEntry, DirectoryEvent};
pub use event::{EventBus, PublishRegistry, Subscription};
pub use hierarchy::{HierarchyEvent, Propagation};
pub use mailbox::{Mailbox, MailboxError, OverflowPolicy};
pub use message::{Message, MessageEnvelope};
pub use plan::{
    AskInstruction, DomainEvent, ExecutionReport, HandlerResult, MessagePlan, SendInstruction,
};
pub use supervisor::{BackoffConfig, BackoffStrategy, SupervisionEvent, SupervisionPolicy};
pub use system::{ActorRef, ActorSystem, SpawnBuilder, StopPolicy, SystemConfig, SystemError};
pub use util::{ActorAddress, CorrelationId};
