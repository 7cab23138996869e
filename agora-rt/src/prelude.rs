//! Convenience re-exports for the common working set.
//!
//! ```rust
//! use agora_rt::prelude::*;
//! ```

pub use crate::actor::{
    current_actor_id, current_identity, ActorStatus, ActorView, Behavior, HandlerError,
    IdentityContext, StateEngine,
};
pub use crate::ask::{AskError, DEFAULT_ASK_TIMEOUT};
pub use crate::deadletter::{DeadLetter, DeadLetterReason};
pub use crate::directory::{Directory, DirectoryEvent};
pub use crate::event::Subscription;
pub use crate::hierarchy::{HierarchyEvent, Propagation};
pub use crate::mailbox::OverflowPolicy;
pub use crate::message::{Message, MessageEnvelope};
pub use crate::plan::{
    AskInstruction, DomainEvent, HandlerResult, MessagePlan, SendInstruction,
};
pub use crate::supervisor::{BackoffConfig, BackoffStrategy, SupervisionPolicy};
pub use crate::system::{
    ActorRef, ActorSystem, SpawnBuilder, StopPolicy, SystemConfig, SystemError,
};
pub use crate::timer::{ADVANCE_TIME, CANCEL_SCHEDULED, GET_SCHEDULED, SCHEDULE};
pub use crate::util::{ActorAddress, CorrelationId};
