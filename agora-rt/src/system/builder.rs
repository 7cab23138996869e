//! Fluent builder for spawning actors.

// Layer 1: Standard library
use std::sync::Arc;

// Layer 2: Third-party
// (none)

// Layer 3: Internal
use super::actor_system::{ActorRef, ActorSystem, ParentSpec, SpawnOptions};
use super::errors::SystemError;
use crate::actor::Behavior;
use crate::mailbox::OverflowPolicy;
use crate::supervisor::SupervisionPolicy;
use crate::util::ActorAddress;

/// Builder configuring one spawn.
///
/// Actors spawn as children of the guardian unless a parent is given.
///
/// # Examples
///
/// ```rust,ignore
/// let worker = system
///     .spawn()
///     .with_kind("worker")
///     .with_id("w-1")
///     .with_supervision(SupervisionPolicy::restart_limited(3))
///     .with_mailbox_capacity(256)
///     .spawn(WorkerBehavior::default())
///     .await?;
/// ```
pub struct SpawnBuilder {
    system: ActorSystem,
    options: SpawnOptions,
}

impl SpawnBuilder {
    pub(crate) fn new(system: ActorSystem) -> Self {
        Self {
            system,
            options: SpawnOptions::default(),
        }
    }

    /// Set the actor id (the last path segment). Random uuid when omitted.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.options.id = Some(id.into());
        self
    }

    /// Set the actor kind (the path scheme). Defaults to `actor`.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.options.kind = Some(kind.into());
        self
    }

    /// Spawn as a child of the given actor instead of the guardian.
    pub fn with_parent(mut self, parent: &ActorRef) -> Self {
        self.options.parent = ParentSpec::Of(parent.address().clone());
        self
    }

    /// Spawn as a child of the actor at the given address.
    pub fn with_parent_address(mut self, parent: ActorAddress) -> Self {
        self.options.parent = ParentSpec::Of(parent);
        self
    }

    /// Override the supervision policy for this actor.
    pub fn with_supervision(mut self, policy: SupervisionPolicy) -> Self {
        self.options.supervision = Some(policy);
        self
    }

    /// Bound the mailbox at `capacity` messages.
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.options.mailbox_capacity = Some(Some(capacity));
        self
    }

    /// Use an unbounded mailbox regardless of the system default.
    pub fn with_unbounded_mailbox(mut self) -> Self {
        self.options.mailbox_capacity = Some(None);
        self
    }

    /// Overflow policy for a bounded mailbox.
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.options.overflow_policy = Some(policy);
        self
    }

    /// Spawn the actor.
    pub async fn spawn<B>(self, behavior: B) -> Result<ActorRef, SystemError>
    where
        B: Behavior,
    {
        self.spawn_arc(Arc::new(behavior)).await
    }

    /// Spawn from an already-shared behavior.
    pub async fn spawn_arc(self, behavior: Arc<dyn Behavior>) -> Result<ActorRef, SystemError> {
        self.system.spawn_internal(behavior, self.options).await
    }
}
