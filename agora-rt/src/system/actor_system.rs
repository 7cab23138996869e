//! Actor system facade: spawn, lookup, dispatch, stop.
//!
//! The system owns every live actor's cell (behavior, context value,
//! mailbox, lifecycle, event bus) and the process-wide collaborators: the
//! hierarchy index, the directory, the correlation tracker, the timeout
//! handler, the auto-publish registry, and the dead-letter queue. Each actor
//! runs a dispatcher task that serializes its message handling; the
//! scheduling model is parallel actors, single-threaded per actor.

// Layer 1: Standard library
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

// Layer 2: Third-party
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

// Layer 3: Internal
use super::config::{StopPolicy, SystemConfig, DEFAULT_FLUSH_TIMEOUT};
use super::errors::SystemError;
use super::guardian::{self, GuardianBehavior};
use crate::actor::context::set_debug_validation;
use crate::actor::{
    with_identity, ActorLifecycle, ActorStatus, ActorView, Behavior, HandlerError,
    IdentityContext,
};
use crate::ask::{AskError, CorrelationTracker, TimeoutHandler};
use crate::deadletter::{DeadLetterQueue, DeadLetterReason};
use crate::directory::{CacheStats, Directory};
use crate::event::{EventBus, ListenerResult, PublishRegistry, Subscription};
use crate::hierarchy::{
    HierarchyIndex, HierarchyListener, Propagation, PropagationOutcome,
};
use crate::mailbox::{
    EnqueueOutcome, Mailbox, MailboxError, MailboxReceiver, MailboxSender, OverflowPolicy,
};
use crate::message::{Message, MessageEnvelope};
use crate::plan::{DomainEvent, PlanEffects, PlanError, PlanInterpreter};
use crate::supervisor::{
    ChildSupervision, SupervisionDecision, SupervisionEvent, SupervisionEventKind,
    SupervisionPolicy,
};
use crate::timer::{TimerBehavior, TIMER_ACTOR_ID, TIMER_ACTOR_KIND, TIMER_TICK};
use crate::util::{ActorAddress, CorrelationId};

/// Factory producing behaviors for guardian-driven spawns.
pub type BehaviorFactory = Arc<dyn Fn() -> Arc<dyn Behavior> + Send + Sync>;

/// System state enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SystemState {
    Idle,
    Running,
    ShuttingDown,
    Stopped,
}

/// Snapshot of runtime diagnostics.
#[derive(Debug, Clone)]
pub struct SystemStats {
    /// Live actors
    pub actor_count: usize,

    /// Whether the system accepts work
    pub running: bool,

    /// Messages processed, per actor path
    pub messages_processed: HashMap<String, u64>,

    /// Fraction of settled asks that timed out
    pub ask_timeout_rate: f64,

    /// Asks awaiting settlement
    pub ask_pending: usize,

    /// Directory cache effectiveness
    pub directory_cache: CacheStats,

    /// Captured dead letters
    pub dead_letter_count: usize,

    /// Identity-context diagnostics for the calling task
    pub identity: crate::actor::IdentityDiagnostics,
}

enum LoopAction {
    Continue,
    Break,
}

/// Where a spawned actor hangs in the tree.
#[derive(Clone, Default)]
pub(crate) enum ParentSpec {
    /// Child of the guardian (the default for top-level actors)
    #[default]
    Guardian,

    /// Tree root with no parent (system actors)
    Root,

    /// Child of a specific actor
    Of(ActorAddress),
}

#[derive(Clone, Default)]
pub(crate) struct SpawnOptions {
    pub id: Option<String>,
    pub kind: Option<String>,
    pub parent: ParentSpec,
    pub supervision: Option<SupervisionPolicy>,
    pub mailbox_capacity: Option<Option<usize>>,
    pub overflow_policy: Option<OverflowPolicy>,
}

/// Internal per-actor record: one cell per live actor.
pub(crate) struct ActorCell {
    pub(crate) address: ActorAddress,
    behavior: Arc<dyn Behavior>,
    state: RwLock<Value>,
    lifecycle: RwLock<ActorLifecycle>,
    pub(crate) mailbox_sender: MailboxSender,
    pub(crate) bus: EventBus,
    supervision: Mutex<ChildSupervision>,
    messages_processed: AtomicU64,
    stopping: AtomicBool,
    is_guardian: bool,
    task: Mutex<Option<JoinHandle<()>>>,
}

pub(crate) struct SystemShared {
    pub(crate) config: SystemConfig,
    pub(crate) cells: dashmap::DashMap<String, Arc<ActorCell>>,
    pub(crate) hierarchy: HierarchyIndex,
    pub(crate) directory: Directory,
    pub(crate) correlations: CorrelationTracker,
    pub(crate) timeouts: TimeoutHandler,
    pub(crate) registry: PublishRegistry,
    pub(crate) dead_letters: DeadLetterQueue,
    state: RwLock<SystemState>,
    in_flight: AtomicI64,
    test_mode: AtomicBool,
    guardian: RwLock<Option<ActorAddress>>,
    timer: RwLock<Option<ActorAddress>>,
    external_address: ActorAddress,
    pub(crate) factories: dashmap::DashMap<String, BehaviorFactory>,
}

/// Top-level handle on the actor runtime.
///
/// Cheap to clone; all clones share the same runtime. The system must be
/// [`start`](Self::start)ed before it spawns actors, and
/// [`stop`](Self::stop) winds the whole tree down in reverse-depth order.
///
/// # Example
/// ```rust,ignore
/// let system = ActorSystem::new(SystemConfig::default())?;
/// system.start().await?;
///
/// let echo = system.spawn().with_id("echo-1").spawn(EchoBehavior).await?;
/// let reply = echo.ask(Message::new("PING")).await?;
///
/// system.stop().await?;
/// ```
#[derive(Clone)]
pub struct ActorSystem {
    shared: Arc<SystemShared>,
}

impl ActorSystem {
    /// Create a system from a validated configuration.
    pub fn new(config: SystemConfig) -> Result<Self, SystemError> {
        config.validate().map_err(SystemError::ConfigError)?;
        set_debug_validation(config.debug);
        let shared = Arc::new(SystemShared {
            hierarchy: HierarchyIndex::new(config.max_hierarchy_depth),
            directory: Directory::new(config.directory_cache_size, config.directory_cache_ttl),
            correlations: CorrelationTracker::new(),
            timeouts: TimeoutHandler::new(),
            registry: PublishRegistry::new(),
            dead_letters: DeadLetterQueue::new(config.dead_letter_capacity),
            cells: dashmap::DashMap::new(),
            state: RwLock::new(SystemState::Idle),
            in_flight: AtomicI64::new(0),
            test_mode: AtomicBool::new(config.test_mode),
            guardian: RwLock::new(None),
            timer: RwLock::new(None),
            external_address: ActorAddress::generate("caller"),
            factories: dashmap::DashMap::new(),
            config,
        });
        Ok(Self { shared })
    }

    /// Start the system: spawns the guardian and the timer actor.
    pub async fn start(&self) -> Result<(), SystemError> {
        {
            let mut state = self.shared.state.write();
            match *state {
                SystemState::Idle => *state = SystemState::Running,
                SystemState::Running => return Ok(()),
                _ => return Err(SystemError::ShuttingDown),
            }
        }

        let guardian_behavior = Arc::new(GuardianBehavior::new(Arc::downgrade(&self.shared)));
        let guardian = self
            .spawn_internal(
                guardian_behavior,
                SpawnOptions {
                    id: Some(guardian::GUARDIAN_ID.to_string()),
                    kind: Some(guardian::GUARDIAN_KIND.to_string()),
                    parent: ParentSpec::Root,
                    supervision: Some(SupervisionPolicy::StopOnFailure),
                    ..Default::default()
                },
            )
            .await?;
        *self.shared.guardian.write() = Some(guardian.address().clone());

        let weak = Arc::downgrade(&self.shared);
        let timer_address = ActorAddress::local(TIMER_ACTOR_KIND, TIMER_ACTOR_ID)?;
        let tick_target = timer_address.clone();
        let timer_behavior = Arc::new(TimerBehavior::new(
            self.shared.timeouts.clone(),
            self.shared.config.test_mode,
            Arc::new(move || {
                if let Some(shared) = weak.upgrade() {
                    let _ = SystemShared::deliver(
                        &shared,
                        &tick_target,
                        MessageEnvelope::new(Message::new(TIMER_TICK)),
                    );
                }
            }),
        ));
        let timer = self
            .spawn_internal(
                timer_behavior,
                SpawnOptions {
                    id: Some(TIMER_ACTOR_ID.to_string()),
                    kind: Some(TIMER_ACTOR_KIND.to_string()),
                    parent: ParentSpec::Root,
                    supervision: Some(SupervisionPolicy::restart()),
                    ..Default::default()
                },
            )
            .await?;
        *self.shared.timer.write() = Some(timer.address().clone());
        Ok(())
    }

    /// Whether the system accepts work.
    pub fn is_running(&self) -> bool {
        *self.shared.state.read() == SystemState::Running
    }

    /// Stop every actor (descendants before ancestors, deepest trees first),
    /// then the timer and the guardian. Idempotent.
    pub async fn stop(&self) -> Result<(), SystemError> {
        {
            let mut state = self.shared.state.write();
            match *state {
                SystemState::Running => *state = SystemState::ShuttingDown,
                _ => return Ok(()),
            }
        }

        let shutdown_timeout = self.shared.config.shutdown_timeout;
        let result = timeout(shutdown_timeout, self.stop_all()).await;

        *self.shared.state.write() = SystemState::Stopped;
        result.map_err(|_| SystemError::ShutdownTimeout(shutdown_timeout))
    }

    async fn stop_all(&self) {
        let guardian = self.shared.guardian.read().clone();
        let timer = self.shared.timer.read().clone();

        // User actors hang under the guardian; stopping each child subtree
        // stops descendants before ancestors.
        if let Some(guardian_addr) = &guardian {
            for child in self.shared.hierarchy.children_of(guardian_addr) {
                SystemShared::stop_and_join(&self.shared, &child).await;
            }
        }
        // Stray roots (spawned with ParentSpec::Root by extensions)
        for address in self.shared.hierarchy.all_by_depth_desc() {
            let is_system = Some(&address) == guardian.as_ref() || Some(&address) == timer.as_ref();
            if !is_system && self.shared.cells.contains_key(&address.path()) {
                SystemShared::stop_and_join(&self.shared, &address).await;
            }
        }
        if let Some(timer_addr) = timer {
            SystemShared::stop_and_join(&self.shared, &timer_addr).await;
        }
        if let Some(guardian_addr) = guardian {
            SystemShared::stop_and_join(&self.shared, &guardian_addr).await;
        }
    }

    /// Begin spawning an actor.
    pub fn spawn(&self) -> super::builder::SpawnBuilder {
        super::builder::SpawnBuilder::new(self.clone())
    }

    /// Look up a live actor by address.
    pub fn lookup(&self, address: &ActorAddress) -> Option<ActorRef> {
        self.shared.cells.get(&address.path()).map(|cell| ActorRef {
            address: cell.address.clone(),
            shared: Arc::downgrade(&self.shared),
        })
    }

    /// Look up a live actor by path string.
    pub fn lookup_path(&self, path: &str) -> Option<ActorRef> {
        let address = ActorAddress::parse(path).ok()?;
        self.lookup(&address)
    }

    /// Addresses of every live actor.
    pub fn list_actors(&self) -> Vec<ActorAddress> {
        self.shared
            .cells
            .iter()
            .map(|entry| entry.value().address.clone())
            .collect()
    }

    /// The timer actor's handle, once the system is started.
    pub fn timer(&self) -> Option<ActorRef> {
        let address = self.shared.timer.read().clone()?;
        self.lookup(&address)
    }

    /// The guardian actor's handle, once the system is started.
    pub fn guardian(&self) -> Option<ActorRef> {
        let address = self.shared.guardian.read().clone()?;
        self.lookup(&address)
    }

    /// The actor directory.
    pub fn directory(&self) -> &Directory {
        &self.shared.directory
    }

    /// The dead-letter queue.
    pub fn dead_letters(&self) -> &DeadLetterQueue {
        &self.shared.dead_letters
    }

    /// Register a named behavior factory for guardian-driven spawns.
    pub fn register_behavior_factory(&self, name: impl Into<String>, factory: BehaviorFactory) {
        self.shared.factories.insert(name.into(), factory);
    }

    /// Runtime diagnostics.
    pub fn system_stats(&self) -> SystemStats {
        let messages_processed = self
            .shared
            .cells
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.value().messages_processed.load(Ordering::Relaxed),
                )
            })
            .collect();
        SystemStats {
            actor_count: self.shared.cells.len(),
            running: self.is_running(),
            messages_processed,
            ask_timeout_rate: self.shared.correlations.timeout_rate(),
            ask_pending: self.shared.correlations.pending_count(),
            directory_cache: self.shared.directory.cache_stats(),
            dead_letter_count: self.shared.dead_letters.len(),
            identity: crate::actor::context::diagnostics(),
        }
    }

    /// Switch the timer actor to the virtual clock and enable `flush()`.
    pub fn enable_test_mode(&self) {
        self.shared.test_mode.store(true, Ordering::Release);
        if let Some(timer) = self.timer() {
            let _ = timer.tell(Message::with_payload(
                crate::timer::SET_TEST_MODE,
                serde_json::json!({"enabled": true}),
            ));
        }
    }

    /// Block until every mailbox is empty and no handler is in flight.
    ///
    /// Requires test mode.
    pub async fn flush(&self) -> Result<(), SystemError> {
        if !self.shared.test_mode.load(Ordering::Acquire) {
            return Err(SystemError::TestModeRequired);
        }
        let flush_timeout = DEFAULT_FLUSH_TIMEOUT;
        timeout(flush_timeout, async {
            loop {
                if self.shared.in_flight.load(Ordering::Acquire) <= 0 {
                    // Settle once more: a handler may be between dequeue and
                    // its plan's sends.
                    tokio::task::yield_now().await;
                    if self.shared.in_flight.load(Ordering::Acquire) <= 0 {
                        return;
                    }
                }
                sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .map_err(|_| SystemError::FlushTimeout(flush_timeout))
    }

    pub(crate) async fn spawn_internal(
        &self,
        behavior: Arc<dyn Behavior>,
        options: SpawnOptions,
    ) -> Result<ActorRef, SystemError> {
        match *self.shared.state.read() {
            SystemState::Running => {}
            SystemState::ShuttingDown => return Err(SystemError::ShuttingDown),
            _ => return Err(SystemError::NotRunning),
        }

        let kind = options.kind.unwrap_or_else(|| "actor".to_string());
        let address = match options.id {
            Some(id) => ActorAddress::local(kind, id)?,
            None => ActorAddress::generate(&kind),
        };
        let path = address.path();
        if self.shared.cells.contains_key(&path) {
            return Err(SystemError::DuplicateActor(path));
        }

        let parent = match options.parent {
            ParentSpec::Root => None,
            ParentSpec::Of(parent_addr) => Some(parent_addr),
            ParentSpec::Guardian => self.shared.guardian.read().clone(),
        };

        let policy = options
            .supervision
            .or_else(|| behavior.supervision_strategy())
            .or_else(|| {
                parent.as_ref().and_then(|parent_addr| {
                    self.shared
                        .cells
                        .get(&parent_addr.path())
                        .map(|cell| cell.supervision.lock().policy().clone())
                })
            })
            .unwrap_or_else(|| self.shared.config.default_supervision.clone());

        match &parent {
            Some(parent_addr) => self.shared.hierarchy.insert_child(parent_addr, &address)?,
            None => self.shared.hierarchy.insert_root(&address)?,
        }

        let capacity = options
            .mailbox_capacity
            .unwrap_or(self.shared.config.default_mailbox_capacity);
        let overflow = options
            .overflow_policy
            .unwrap_or(self.shared.config.default_overflow_policy);
        let (mailbox_sender, receiver) = Mailbox::new(capacity, overflow);

        let cell = Arc::new(ActorCell {
            address: address.clone(),
            state: RwLock::new(behavior.initial_context()),
            lifecycle: RwLock::new(ActorLifecycle::new()),
            mailbox_sender,
            bus: EventBus::new(&path),
            supervision: Mutex::new(ChildSupervision::new(policy)),
            messages_processed: AtomicU64::new(0),
            stopping: AtomicBool::new(false),
            is_guardian: address.kind() == guardian::GUARDIAN_KIND
                && address.id() == guardian::GUARDIAN_ID,
            task: Mutex::new(None),
            behavior,
        });
        self.shared.cells.insert(path.clone(), Arc::clone(&cell));
        self.shared
            .directory
            .register(address.clone(), format!("inproc:{path}"));

        let shared = Arc::clone(&self.shared);
        let task_cell = Arc::clone(&cell);
        let task = tokio::spawn(async move {
            SystemShared::run_dispatcher(shared, task_cell, receiver).await;
        });
        *cell.task.lock() = Some(task);

        Ok(ActorRef {
            address,
            shared: Arc::downgrade(&self.shared),
        })
    }

    pub(crate) fn shared(&self) -> &Arc<SystemShared> {
        &self.shared
    }

    pub(crate) fn from_shared(shared: Arc<SystemShared>) -> Self {
        Self { shared }
    }
}

impl SystemShared {
    /// Deliver an envelope to a local mailbox, accounting in-flight work and
    /// dead-lettering on failure.
    pub(crate) fn deliver(
        shared: &Arc<SystemShared>,
        to: &ActorAddress,
        envelope: MessageEnvelope,
    ) -> Result<(), SystemError> {
        let Some(cell) = shared.cells.get(&to.path()).map(|c| Arc::clone(c.value())) else {
            shared
                .dead_letters
                .publish(envelope, DeadLetterReason::NoSuchActor);
            return Err(SystemError::ActorNotFound(to.path()));
        };
        if cell.stopping.load(Ordering::Acquire) {
            shared
                .dead_letters
                .publish(envelope, DeadLetterReason::TargetStopped);
            return Err(SystemError::ActorStopped(to.path()));
        }
        let backup = envelope.clone();
        match cell.mailbox_sender.enqueue(envelope) {
            Ok(EnqueueOutcome::Enqueued) => {
                shared.in_flight.fetch_add(1, Ordering::AcqRel);
                Ok(())
            }
            // One message in, one message out: no net in-flight change
            Ok(EnqueueOutcome::DroppedOldest) => Ok(()),
            Ok(EnqueueOutcome::DroppedNewest) => Ok(()),
            Err(MailboxError::Full { capacity }) => {
                shared
                    .dead_letters
                    .publish(backup, DeadLetterReason::MailboxRejected);
                Err(SystemError::Mailbox(MailboxError::Full { capacity }))
            }
            Err(MailboxError::Closed) => {
                shared
                    .dead_letters
                    .publish(backup, DeadLetterReason::TargetStopped);
                Err(SystemError::ActorStopped(to.path()))
            }
        }
    }

    pub(crate) fn tell_from(
        shared: &Arc<SystemShared>,
        to: &ActorAddress,
        message: Message,
        sender: Option<ActorAddress>,
    ) -> Result<(), SystemError> {
        let mut envelope = MessageEnvelope::new(message);
        envelope.sender = sender;
        Self::deliver(shared, to, envelope)
    }

    pub(crate) async fn ask_from(
        shared: &Arc<SystemShared>,
        to: &ActorAddress,
        message: Message,
        ask_timeout: Duration,
        reply_to: ActorAddress,
    ) -> Result<Message, AskError> {
        let pending = shared
            .correlations
            .register(to, message.kind(), ask_timeout);
        let correlation_id = pending.correlation_id();

        let tracker = shared.correlations.clone();
        let timeout_id = shared.timeouts.set_timeout(ask_timeout, move || {
            tracker.fail_timeout(correlation_id);
        });

        let envelope = MessageEnvelope::new(message)
            .with_sender(reply_to.clone())
            .with_reply_to(reply_to)
            .with_correlation_id(correlation_id);

        if let Err(error) = Self::deliver(shared, to, envelope) {
            shared.timeouts.clear_timeout(timeout_id);
            shared.correlations.cancel(correlation_id);
            return Err(match error {
                SystemError::ActorNotFound(path) => AskError::NotFound { path },
                SystemError::ActorStopped(path) => AskError::ActorStopped { path },
                SystemError::Mailbox(mailbox_error) => AskError::Mailbox(mailbox_error),
                _ => AskError::Canceled,
            });
        }

        let outcome = pending.settled().await;
        shared.timeouts.clear_timeout(timeout_id);
        outcome
    }

    fn emit_supervision(
        shared: &Arc<SystemShared>,
        child: &ActorAddress,
        kind: SupervisionEventKind,
        detail: Option<String>,
    ) {
        let Some(supervisor) = shared.hierarchy.parent_of(child) else {
            return;
        };
        let Some(cell) = shared.cells.get(&supervisor.path()).map(|c| Arc::clone(c.value())) else {
            return;
        };
        let mut event = SupervisionEvent::new(kind, supervisor.id(), child.id());
        if let Some(detail) = detail {
            event = event.with_detail(detail);
        }
        cell.bus.emit(&event.to_domain_event());
    }

    async fn run_dispatcher(
        shared: Arc<SystemShared>,
        cell: Arc<ActorCell>,
        mut receiver: MailboxReceiver,
    ) {
        if !Self::start_actor(&shared, &cell).await {
            Self::finalize(&shared, &cell, &mut receiver).await;
            return;
        }
        Self::emit_supervision(
            &shared,
            &cell.address,
            SupervisionEventKind::ChildStarted,
            None,
        );

        while let Some(envelope) = receiver.recv().await {
            if cell.stopping.load(Ordering::Acquire)
                && shared.config.stop_policy == StopPolicy::Discard
            {
                shared.in_flight.fetch_sub(1, Ordering::AcqRel);
                continue;
            }
            let action = Self::process_message(&shared, &cell, envelope).await;
            shared.in_flight.fetch_sub(1, Ordering::AcqRel);
            if matches!(action, LoopAction::Break) {
                break;
            }
        }

        Self::finalize(&shared, &cell, &mut receiver).await;
    }

    /// Run `on_start` under supervision. Returns whether the actor reached
    /// `Running`.
    async fn start_actor(shared: &Arc<SystemShared>, cell: &Arc<ActorCell>) -> bool {
        cell.lifecycle.write().transition_to(ActorStatus::Starting);
        loop {
            let view = ActorView::new(
                cell.address.clone(),
                cell.state.read().clone(),
                None,
                None,
            );
            let identity = IdentityContext::new(cell.address.id());
            let behavior = Arc::clone(&cell.behavior);
            let started =
                with_identity(identity, async move { behavior.on_start(&view).await }).await;
            match started {
                Ok(()) => {
                    cell.lifecycle.write().transition_to(ActorStatus::Running);
                    return true;
                }
                Err(error) => {
                    warn!(actor = %cell.address, reason = error.reason(), "actor failed to start");
                    cell.lifecycle.write().transition_to(ActorStatus::Error);
                    Self::emit_supervision(
                        shared,
                        &cell.address,
                        SupervisionEventKind::ChildFailed,
                        Some(error.reason().to_string()),
                    );
                    let decision = cell.supervision.lock().on_failure(error.is_fatal());
                    match decision {
                        SupervisionDecision::Restart { delay } => {
                            if !delay.is_zero() {
                                sleep(delay).await;
                            }
                            *cell.state.write() = cell.behavior.initial_context();
                            cell.lifecycle.write().transition_to(ActorStatus::Starting);
                            Self::emit_supervision(
                                shared,
                                &cell.address,
                                SupervisionEventKind::ChildRestarted,
                                None,
                            );
                            continue;
                        }
                        SupervisionDecision::Stop => return false,
                        SupervisionDecision::Escalate => {
                            Self::escalate(shared, cell, error.reason(), error.is_fatal());
                            return false;
                        }
                    }
                }
            }
        }
    }

    async fn process_message(
        shared: &Arc<SystemShared>,
        cell: &Arc<ActorCell>,
        envelope: MessageEnvelope,
    ) -> LoopAction {
        cell.messages_processed.fetch_add(1, Ordering::Relaxed);

        // An escalated child failure is handled by the supervision machinery
        // of this actor, not by its behavior. The guardian is the escalation
        // sink and handles these in its behavior instead.
        if !cell.is_guardian
            && envelope.message.kind() == guardian::ACTOR_FAILED
            && envelope.message.bool_field("_escalated") == Some(true)
        {
            let reason = envelope
                .message
                .str_field("reason")
                .unwrap_or("escalated child failure")
                .to_string();
            let fatal = envelope.message.bool_field("fatal") == Some(true);
            let error = if fatal {
                HandlerError::fatal(reason)
            } else {
                HandlerError::new(reason)
            };
            return Self::handle_failure(shared, cell, error).await;
        }

        let correlation = envelope.correlation_id;
        let mut identity = IdentityContext::new(cell.address.id());
        if let Some(id) = correlation {
            identity = identity.with_correlation(id);
        }

        let shared_for_effects = Arc::clone(shared);
        let cell_for_effects = Arc::clone(cell);
        let outcome: Result<(), HandlerError> = with_identity(identity, async move {
            let cell = cell_for_effects;
            let view = ActorView::new(
                cell.address.clone(),
                cell.state.read().clone(),
                envelope.sender.clone(),
                correlation,
            );
            let plan = cell.behavior.on_message(&envelope.message, &view).await?;
            let effects = CellEffects {
                shared: shared_for_effects,
                cell: Arc::clone(&cell),
            };
            let report = PlanInterpreter::run(
                plan,
                correlation,
                &cell.address.path(),
                envelope.message.kind(),
                &effects,
            )
            .await;
            if !report.success {
                debug!(
                    actor = %cell.address,
                    errors = report.errors.len(),
                    "plan executed with errors"
                );
            }
            Ok(())
        })
        .await;

        match outcome {
            Ok(()) => LoopAction::Continue,
            Err(error) => Self::handle_failure(shared, cell, error).await,
        }
    }

    async fn handle_failure(
        shared: &Arc<SystemShared>,
        cell: &Arc<ActorCell>,
        error: HandlerError,
    ) -> LoopAction {
        warn!(actor = %cell.address, reason = error.reason(), "handler failure");
        cell.lifecycle.write().transition_to(ActorStatus::Error);
        Self::emit_supervision(
            shared,
            &cell.address,
            SupervisionEventKind::ChildFailed,
            Some(error.reason().to_string()),
        );

        let decision = cell.supervision.lock().on_failure(error.is_fatal());
        match decision {
            SupervisionDecision::Restart { delay } => {
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                // Fresh context; the mailbox and its queued messages survive.
                *cell.state.write() = cell.behavior.initial_context();
                cell.lifecycle.write().transition_to(ActorStatus::Starting);
                let view = ActorView::new(
                    cell.address.clone(),
                    cell.state.read().clone(),
                    None,
                    None,
                );
                let identity = IdentityContext::new(cell.address.id());
                let behavior = Arc::clone(&cell.behavior);
                let restarted =
                    with_identity(identity, async move { behavior.on_start(&view).await }).await;
                match restarted {
                    Ok(()) => {
                        cell.lifecycle.write().transition_to(ActorStatus::Running);
                        Self::emit_supervision(
                            shared,
                            &cell.address,
                            SupervisionEventKind::ChildRestarted,
                            Some(error.reason().to_string()),
                        );
                        LoopAction::Continue
                    }
                    Err(start_error) => {
                        Box::pin(Self::handle_failure(shared, cell, start_error)).await
                    }
                }
            }
            SupervisionDecision::Stop => LoopAction::Break,
            SupervisionDecision::Escalate => {
                Self::escalate(shared, cell, error.reason(), error.is_fatal());
                LoopAction::Break
            }
        }
    }

    fn escalate(shared: &Arc<SystemShared>, cell: &Arc<ActorCell>, reason: &str, fatal: bool) {
        let target = shared
            .hierarchy
            .parent_of(&cell.address)
            .or_else(|| shared.guardian.read().clone());
        let Some(target) = target else {
            warn!(actor = %cell.address, "failure escalated past the root");
            return;
        };
        let message = Message::with_payload(
            guardian::ACTOR_FAILED,
            serde_json::json!({
                "path": cell.address.path(),
                "reason": reason,
                "fatal": fatal,
                "_escalated": true,
            }),
        );
        if let Err(error) = Self::tell_from(shared, &target, message, Some(cell.address.clone())) {
            warn!(actor = %cell.address, %error, "failed to escalate failure");
        }
    }

    /// Request an actor to stop and wait until it has.
    ///
    /// Safe to call for the calling actor itself: the join is skipped and
    /// the dispatcher finalizes after the current message.
    pub(crate) async fn stop_and_join(shared: &Arc<SystemShared>, address: &ActorAddress) {
        let Some(cell) = shared.cells.get(&address.path()).map(|c| Arc::clone(c.value())) else {
            return;
        };
        cell.stopping.store(true, Ordering::Release);
        cell.mailbox_sender.close();

        if crate::actor::current_actor_id().as_deref() == Some(address.id()) {
            return; // self-stop: the dispatcher finalizes after this message
        }

        let task = cell.task.lock().take();
        match task {
            Some(task) => {
                let _ = task.await;
            }
            None => {
                // Someone else is joining; wait for the cell to disappear.
                while shared.cells.contains_key(&address.path()) {
                    sleep(Duration::from_millis(2)).await;
                }
            }
        }
    }

    async fn finalize(
        shared: &Arc<SystemShared>,
        cell: &Arc<ActorCell>,
        receiver: &mut MailboxReceiver,
    ) {
        cell.stopping.store(true, Ordering::Release);
        cell.lifecycle.write().transition_to(ActorStatus::Stopping);
        cell.mailbox_sender.close();

        // Whatever is still queued will never be processed.
        while let Ok(envelope) = receiver.try_recv() {
            shared
                .dead_letters
                .publish(envelope, DeadLetterReason::TargetStopped);
            shared.in_flight.fetch_sub(1, Ordering::AcqRel);
        }

        // Descendants stop before this actor reaches `stopped`.
        for child in shared.hierarchy.children_of(&cell.address) {
            Box::pin(Self::stop_and_join(shared, &child)).await;
        }

        let view = ActorView::new(
            cell.address.clone(),
            cell.state.read().clone(),
            None,
            None,
        );
        let identity = IdentityContext::new(cell.address.id());
        let behavior = Arc::clone(&cell.behavior);
        if let Err(error) =
            with_identity(identity, async move { behavior.on_stop(&view).await }).await
        {
            warn!(actor = %cell.address, reason = error.reason(), "on_stop failed");
        }

        shared.correlations.reject_all_for(&cell.address);
        shared.timeouts.cancel_owned_by(cell.address.id());
        shared.directory.unregister(&cell.address);
        shared.registry.remove_subscriber(&cell.address.path());
        cell.bus.destroy();
        Self::emit_supervision(
            shared,
            &cell.address,
            SupervisionEventKind::ChildStopped,
            None,
        );
        shared.hierarchy.remove(&cell.address);
        cell.lifecycle.write().transition_to(ActorStatus::Stopped);
        shared.cells.remove(&cell.address.path());
        debug!(actor = %cell.address, "actor stopped");
    }
}

/// Plan effects bound to one actor's dispatch.
struct CellEffects {
    shared: Arc<SystemShared>,
    cell: Arc<ActorCell>,
}

#[async_trait]
impl PlanEffects for CellEffects {
    fn apply_context(&self, context: Value) {
        *self.cell.state.write() = context;
    }

    fn emit_event(&self, event: &DomainEvent) -> Result<(), PlanError> {
        if let Some(engine) = self.cell.behavior.state_engine() {
            engine.send(event);
        }
        self.cell.bus.emit(event);
        for target in self.shared.registry.route(&self.cell.address, event) {
            if target == self.cell.address {
                continue;
            }
            if let Err(error) = SystemShared::tell_from(
                &self.shared,
                &target,
                event.to_message(),
                Some(self.cell.address.clone()),
            ) {
                debug!(
                    publisher = %self.cell.address,
                    subscriber = %target,
                    %error,
                    "event delivery to subscriber failed"
                );
            }
        }
        Ok(())
    }

    fn tell(&self, to: &ActorAddress, message: Message) -> Result<(), PlanError> {
        SystemShared::tell_from(&self.shared, to, message, Some(self.cell.address.clone()))
            .map_err(|error| PlanError::SendFailed {
                to: to.path(),
                reason: error.to_string(),
            })
    }

    fn route_reply(
        &self,
        correlation_id: Option<CorrelationId>,
        message: Message,
    ) -> Result<(), PlanError> {
        let Some(correlation_id) = correlation_id else {
            self.shared.dead_letters.publish(
                MessageEnvelope::new(message).with_sender(self.cell.address.clone()),
                DeadLetterReason::UnroutableReply,
            );
            return Err(PlanError::ReplyWithoutCorrelation);
        };
        match self.shared.correlations.resolve(correlation_id, message.clone()) {
            Ok(()) => Ok(()),
            Err(_) => {
                self.shared.dead_letters.publish(
                    MessageEnvelope::new(message)
                        .with_sender(self.cell.address.clone())
                        .with_correlation_id(correlation_id),
                    DeadLetterReason::UnroutableReply,
                );
                Err(PlanError::UnroutableReply(correlation_id))
            }
        }
    }

    async fn ask(
        &self,
        to: &ActorAddress,
        message: Message,
        ask_timeout: Duration,
    ) -> Result<Message, AskError> {
        SystemShared::ask_from(
            &self.shared,
            to,
            message,
            ask_timeout,
            self.cell.address.clone(),
        )
        .await
    }
}

/// Handle on a spawned actor.
///
/// Immutable and cheap to clone; carries the address, never the mailbox or
/// state. Holding a ref after the actor stops is legal; operations then
/// fail with `ActorStopped`.
#[derive(Clone)]
pub struct ActorRef {
    address: ActorAddress,
    shared: Weak<SystemShared>,
}

impl ActorRef {
    /// The actor's address.
    pub fn address(&self) -> &ActorAddress {
        &self.address
    }

    /// The actor's path string.
    pub fn path(&self) -> String {
        self.address.path()
    }

    fn upgrade(&self) -> Result<Arc<SystemShared>, SystemError> {
        self.shared.upgrade().ok_or(SystemError::NotRunning)
    }

    /// Fire-and-forget send. Returns once the message is in the target's
    /// mailbox, or with the rejection.
    pub fn tell(&self, message: Message) -> Result<(), SystemError> {
        let shared = self.upgrade()?;
        SystemShared::tell_from(&shared, &self.address, message, None)
    }

    /// Alias for [`tell`](Self::tell).
    pub fn send(&self, message: Message) -> Result<(), SystemError> {
        self.tell(message)
    }

    /// Request/response with the system's default timeout.
    pub async fn ask(&self, message: Message) -> Result<Message, AskError> {
        let timeout = match self.shared.upgrade() {
            Some(shared) => shared.config.default_ask_timeout,
            None => {
                return Err(AskError::ActorStopped {
                    path: self.address.path(),
                })
            }
        };
        self.ask_with_timeout(message, timeout).await
    }

    /// Request/response with an explicit timeout.
    pub async fn ask_with_timeout(
        &self,
        message: Message,
        timeout: Duration,
    ) -> Result<Message, AskError> {
        let Some(shared) = self.shared.upgrade() else {
            return Err(AskError::ActorStopped {
                path: self.address.path(),
            });
        };
        let reply_to = shared.external_address.clone();
        SystemShared::ask_from(&shared, &self.address, message, timeout, reply_to).await
    }

    /// Stop the actor and every descendant. Idempotent.
    pub async fn stop(&self) -> Result<(), SystemError> {
        let shared = self.upgrade()?;
        SystemShared::stop_and_join(&shared, &self.address).await;
        Ok(())
    }

    /// Subscribe to the actor's emitted events.
    ///
    /// Returns a no-op subscription when the actor has already stopped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&DomainEvent) -> ListenerResult + Send + Sync + 'static,
    {
        match self.shared.upgrade() {
            Some(shared) => match shared.cells.get(&self.address.path()) {
                Some(cell) => cell.bus.subscribe(listener),
                None => Subscription::noop(),
            },
            None => Subscription::noop(),
        }
    }

    /// Subscribe to hierarchy events reaching this actor.
    pub fn subscribe_hierarchy(&self, listener: HierarchyListener) {
        if let Some(shared) = self.shared.upgrade() {
            shared.hierarchy.subscribe(&self.address, listener);
        }
    }

    /// Propagate an event along the tree from this actor.
    pub fn emit_hierarchy(
        &self,
        event: DomainEvent,
        direction: Propagation,
    ) -> Result<PropagationOutcome, SystemError> {
        let shared = self.upgrade()?;
        Ok(shared.hierarchy.propagate(&self.address, event, direction))
    }

    /// Propagate an event to ancestors.
    pub fn emit_to_parent(&self, event: DomainEvent) -> Result<PropagationOutcome, SystemError> {
        self.emit_hierarchy(event, Propagation::Up)
    }

    /// Propagate an event to descendants.
    pub fn emit_to_children(&self, event: DomainEvent) -> Result<PropagationOutcome, SystemError> {
        self.emit_hierarchy(event, Propagation::Down)
    }

    /// Parent of this actor, when it has one.
    pub fn parent(&self) -> Option<ActorRef> {
        let shared = self.shared.upgrade()?;
        let parent = shared.hierarchy.parent_of(&self.address)?;
        shared.cells.get(&parent.path()).map(|cell| ActorRef {
            address: cell.address.clone(),
            shared: Weak::clone(&self.shared),
        })
    }

    /// Direct children of this actor.
    pub fn children(&self) -> Vec<ActorRef> {
        match self.shared.upgrade() {
            Some(shared) => shared
                .hierarchy
                .children_of(&self.address)
                .into_iter()
                .map(|address| ActorRef {
                    address,
                    shared: Weak::clone(&self.shared),
                })
                .collect(),
            None => Vec::new(),
        }
    }

    /// Stop and unregister the child with the given id.
    ///
    /// Returns whether a child under that id existed.
    pub async fn remove_child(&self, id: &str) -> Result<bool, SystemError> {
        let shared = self.upgrade()?;
        let child = shared
            .hierarchy
            .children_of(&self.address)
            .into_iter()
            .find(|address| address.id() == id);
        match child {
            Some(address) => {
                SystemShared::stop_and_join(&shared, &address).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Current context value of the actor.
    pub fn snapshot(&self) -> Result<Value, SystemError> {
        let shared = self.upgrade()?;
        let result = match shared.cells.get(&self.address.path()) {
            Some(cell) => Ok(cell.state.read().clone()),
            None => Err(SystemError::ActorStopped(self.address.path())),
        };
        result
    }

    /// Current lifecycle status (`Stopped` once the actor is gone).
    pub fn status(&self) -> ActorStatus {
        match self.shared.upgrade() {
            Some(shared) => match shared.cells.get(&self.address.path()) {
                Some(cell) => cell.lifecycle.read().status(),
                None => ActorStatus::Stopped,
            },
            None => ActorStatus::Stopped,
        }
    }

    /// Messages this actor has processed.
    pub fn messages_processed(&self) -> u64 {
        match self.shared.upgrade() {
            Some(shared) => shared
                .cells
                .get(&self.address.path())
                .map(|cell| cell.messages_processed.load(Ordering::Relaxed))
                .unwrap_or(0),
            None => 0,
        }
    }
}

impl std::fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRef")
            .field("address", &self.address.path())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::plan::{HandlerResult, MessagePlan};
    use crate::timer::{ADVANCE_TIME, SCHEDULE};
    use serde_json::json;

    async fn test_system() -> ActorSystem {
        let config = SystemConfig::builder()
            .with_test_mode(true)
            .build()
            .unwrap();
        let system = ActorSystem::new(config).unwrap();
        system.start().await.unwrap();
        system
    }

    struct Echo;

    #[async_trait]
    impl Behavior for Echo {
        async fn on_message(
            &self,
            message: &Message,
            _view: &ActorView,
        ) -> Result<MessagePlan, HandlerError> {
            match message.kind() {
                "PING" => Ok(HandlerResult::new()
                    .reply(Message::with_payload("PONG", message.payload().clone()))
                    .into()),
                _ => Ok(MessagePlan::Noop),
            }
        }
    }

    struct Silent;

    #[async_trait]
    impl Behavior for Silent {
        async fn on_message(
            &self,
            _message: &Message,
            _view: &ActorView,
        ) -> Result<MessagePlan, HandlerError> {
            Ok(MessagePlan::Noop)
        }
    }

    struct Recorder;

    #[async_trait]
    impl Behavior for Recorder {
        fn initial_context(&self) -> Value {
            json!([])
        }

        async fn on_message(
            &self,
            message: &Message,
            view: &ActorView,
        ) -> Result<MessagePlan, HandlerError> {
            let mut seen = view.context().as_array().cloned().unwrap_or_default();
            if let Some(value) = message.field("i") {
                seen.push(value.clone());
            }
            Ok(HandlerResult::new().context(Value::Array(seen)).into())
        }
    }

    struct Counter;

    #[async_trait]
    impl Behavior for Counter {
        fn initial_context(&self) -> Value {
            json!({"n": 0})
        }

        async fn on_message(
            &self,
            message: &Message,
            view: &ActorView,
        ) -> Result<MessagePlan, HandlerError> {
            match message.kind() {
                "TICK" => {
                    let n = view.context()["n"].as_i64().unwrap_or(0);
                    Ok(HandlerResult::new().context(json!({"n": n + 1})).into())
                }
                _ => Ok(MessagePlan::Noop),
            }
        }
    }

    struct Flaky;

    #[async_trait]
    impl Behavior for Flaky {
        async fn on_message(
            &self,
            message: &Message,
            _view: &ActorView,
        ) -> Result<MessagePlan, HandlerError> {
            if message.kind() == "BOOM" {
                return Err(HandlerError::new("boom"));
            }
            Ok(MessagePlan::Noop)
        }
    }

    struct WhoAmI;

    #[async_trait]
    impl Behavior for WhoAmI {
        async fn on_message(
            &self,
            message: &Message,
            _view: &ActorView,
        ) -> Result<MessagePlan, HandlerError> {
            if message.kind() != "WHO" {
                return Ok(MessagePlan::Noop);
            }
            // The identity context must name this actor, even after a
            // suspension point.
            sleep(Duration::from_millis(5)).await;
            let id = crate::actor::current_actor_id().unwrap_or_default();
            Ok(HandlerResult::new()
                .reply(Message::with_payload("ME", json!({"id": id})))
                .into())
        }
    }

    struct Emitter;

    #[async_trait]
    impl Behavior for Emitter {
        async fn on_message(
            &self,
            message: &Message,
            _view: &ActorView,
        ) -> Result<MessagePlan, HandlerError> {
            match message.kind() {
                "GO" => Ok(MessagePlan::Emit(DomainEvent::with_payload(
                    "FIRED",
                    message.payload().clone(),
                ))),
                _ => Ok(MessagePlan::Noop),
            }
        }
    }

    #[tokio::test]
    async fn test_echo_ask_round_trip() {
        let system = test_system().await;
        let echo = system.spawn().with_kind("echo").spawn(Echo).await.unwrap();

        let reply = echo
            .ask(Message::with_payload("PING", json!({"n": 42})))
            .await
            .unwrap();
        assert_eq!(reply.kind(), "PONG");
        assert_eq!(reply.i64_field("n"), Some(42));

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_ask_timeout_is_structured() {
        let system = test_system().await;
        let silent = system.spawn().spawn(Silent).await.unwrap();

        let result = silent
            .ask_with_timeout(Message::new("Q"), Duration::from_millis(50))
            .await;

        match result {
            Err(AskError::Timeout {
                actor_path,
                message_type,
                timeout: reported,
                ..
            }) => {
                assert_eq!(actor_path, silent.path());
                assert_eq!(message_type, "Q");
                assert_eq!(reported, Duration::from_millis(50));
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_fifo_per_sender_receiver() {
        let system = test_system().await;
        let recorder = system.spawn().spawn(Recorder).await.unwrap();

        for i in 0..10 {
            recorder
                .tell(Message::with_payload("N", json!({"i": i})))
                .unwrap();
        }
        system.flush().await.unwrap();

        assert_eq!(
            recorder.snapshot().unwrap(),
            json!([0, 1, 2, 3, 4, 5, 6, 7, 8, 9])
        );
        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_supervision_restart_keeps_actor_alive() {
        let system = test_system().await;
        let flaky = system
            .spawn()
            .with_supervision(SupervisionPolicy::restart_limited(3))
            .spawn(Flaky)
            .await
            .unwrap();

        let restarts = Arc::new(AtomicU64::new(0));
        let restarts_clone = Arc::clone(&restarts);
        let child_id = flaky.address().id().to_string();
        let guardian = system.guardian().unwrap();
        let _subscription = guardian.subscribe(move |event| {
            if event.kind() == "child-restarted"
                && event.payload()["childId"] == json!(child_id)
            {
                restarts_clone.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });

        for kind in ["M", "BOOM", "M", "BOOM", "M"] {
            flaky.tell(Message::new(kind)).unwrap();
        }
        system.flush().await.unwrap();

        assert_eq!(flaky.status(), ActorStatus::Running);
        assert_eq!(flaky.messages_processed(), 5);
        assert_eq!(restarts.load(Ordering::SeqCst), 2);

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_budget_exhaustion_escalates_to_guardian() {
        let system = test_system().await;
        let flaky = system
            .spawn()
            .with_supervision(SupervisionPolicy::restart_limited(1))
            .spawn(Flaky)
            .await
            .unwrap();

        flaky.tell(Message::new("BOOM")).unwrap();
        flaky.tell(Message::new("BOOM")).unwrap();
        system.flush().await.unwrap();

        // Budget of one: the second failure escalates and the actor stops.
        assert_eq!(flaky.status(), ActorStatus::Stopped);
        assert!(system.lookup(flaky.address()).is_none());

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_transitivity() {
        let system = test_system().await;
        let parent = system.spawn().with_id("p").spawn(Silent).await.unwrap();
        let child = system
            .spawn()
            .with_id("c")
            .with_parent(&parent)
            .spawn(Silent)
            .await
            .unwrap();
        let grandchild = system
            .spawn()
            .with_id("g")
            .with_parent(&child)
            .spawn(Silent)
            .await
            .unwrap();

        parent.stop().await.unwrap();
        // After stop resolves, every descendant is stopped.
        assert_eq!(parent.status(), ActorStatus::Stopped);
        assert_eq!(child.status(), ActorStatus::Stopped);
        assert_eq!(grandchild.status(), ActorStatus::Stopped);
        assert!(system.lookup(child.address()).is_none());

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_children_and_remove_child() {
        let system = test_system().await;
        let parent = system.spawn().with_id("tree-p").spawn(Silent).await.unwrap();
        let _child = system
            .spawn()
            .with_id("tree-c")
            .with_parent(&parent)
            .spawn(Silent)
            .await
            .unwrap();

        let children = parent.children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].address().id(), "tree-c");
        assert_eq!(
            children[0].parent().map(|p| p.path()),
            Some(parent.path())
        );

        assert!(parent.remove_child("tree-c").await.unwrap());
        assert!(!parent.remove_child("tree-c").await.unwrap());
        assert!(parent.children().is_empty());

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let system = test_system().await;
        let actor = system.spawn().spawn(Silent).await.unwrap();

        actor.stop().await.unwrap();
        actor.stop().await.unwrap();
        assert_eq!(actor.status(), ActorStatus::Stopped);

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_operations_on_stopped_actor_fail() {
        let system = test_system().await;
        let actor = system.spawn().spawn(Echo).await.unwrap();
        actor.stop().await.unwrap();

        assert!(matches!(
            actor.tell(Message::new("PING")),
            Err(SystemError::ActorNotFound(_) | SystemError::ActorStopped(_))
        ));
        assert!(matches!(
            actor.snapshot(),
            Err(SystemError::ActorStopped(_))
        ));
        assert!(system.dead_letters().len() >= 1);

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_pending_ask_rejects_when_target_stops() {
        let system = test_system().await;
        let silent = system.spawn().spawn(Silent).await.unwrap();

        let asker = {
            let silent = silent.clone();
            tokio::spawn(async move {
                silent
                    .ask_with_timeout(Message::new("Q"), Duration::from_secs(30))
                    .await
            })
        };
        sleep(Duration::from_millis(50)).await;
        silent.stop().await.unwrap();

        match asker.await.unwrap() {
            Err(AskError::ActorStopped { path }) => assert_eq!(path, silent.path()),
            other => panic!("expected ActorStopped, got {other:?}"),
        }

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_scheduled_delivery_with_virtual_clock() {
        let system = test_system().await;
        let counter = system.spawn().with_id("counter").spawn(Counter).await.unwrap();
        let timer = system.timer().unwrap();

        timer
            .tell(Message::with_payload(
                SCHEDULE,
                json!({
                    "target": counter.path(),
                    "message": {"type": "TICK"},
                    "delay": 100,
                }),
            ))
            .unwrap();
        system.flush().await.unwrap();
        assert_eq!(counter.snapshot().unwrap(), json!({"n": 0}));

        timer
            .tell(Message::with_payload(ADVANCE_TIME, json!({"by": 100})))
            .unwrap();
        system.flush().await.unwrap();
        assert_eq!(counter.snapshot().unwrap(), json!({"n": 1}));

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_identity_isolation_across_actors() {
        let system = test_system().await;
        let a = system.spawn().with_id("ident-a").spawn(WhoAmI).await.unwrap();
        let b = system.spawn().with_id("ident-b").spawn(WhoAmI).await.unwrap();

        let (reply_a, reply_b) = tokio::join!(
            a.ask(Message::new("WHO")),
            b.ask(Message::new("WHO")),
        );
        assert_eq!(reply_a.unwrap().str_field("id"), Some("ident-a"));
        assert_eq!(reply_b.unwrap().str_field("id"), Some("ident-b"));

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_event_bus_subscription_on_ref() {
        let system = test_system().await;
        let emitter = system.spawn().spawn(Emitter).await.unwrap();

        let seen = Arc::new(AtomicU64::new(0));
        let seen_clone = Arc::clone(&seen);
        let subscription = emitter.subscribe(move |event| {
            if event.kind() == "FIRED" {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });

        emitter.tell(Message::new("GO")).unwrap();
        system.flush().await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        subscription.unsubscribe();
        emitter.tell(Message::new("GO")).unwrap();
        system.flush().await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_auto_publish_routes_to_filtered_subscribers() {
        let system = test_system().await;
        let emitter = system.spawn().spawn(Emitter).await.unwrap();
        let sink = system.spawn().spawn(Recorder).await.unwrap();

        system.shared().registry.subscribe(
            emitter.address(),
            &sink.path(),
            sink.address().clone(),
            ["FIRED".to_string()],
        );

        emitter
            .tell(Message::with_payload("GO", json!({"i": 7})))
            .unwrap();
        system.flush().await.unwrap();

        // The sink received the routed FIRED event as a told message.
        assert_eq!(sink.snapshot().unwrap(), json!([7]));

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_guardian_system_info_and_health() {
        let system = test_system().await;
        let _echo = system.spawn().spawn(Echo).await.unwrap();
        let guardian = system.guardian().unwrap();

        let info = guardian
            .ask(Message::new(guardian::GET_SYSTEM_INFO))
            .await
            .unwrap();
        assert_eq!(info.kind(), "SYSTEM_INFO");
        assert!(info.i64_field("actorCount").unwrap_or(0) >= 3);

        let health = guardian
            .ask(Message::new(guardian::SYSTEM_HEALTH_CHECK))
            .await
            .unwrap();
        assert_eq!(health.kind(), "HEALTH_OK");
        assert_eq!(health.bool_field("healthy"), Some(true));

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_guardian_spawns_registered_behaviors() {
        let system = test_system().await;
        system.register_behavior_factory("echo", Arc::new(|| Arc::new(Echo)));
        let guardian = system.guardian().unwrap();

        let spawned = guardian
            .ask(Message::with_payload(
                guardian::SPAWN_ACTOR,
                json!({"behavior": "echo", "id": "echo-by-guardian", "kind": "echo"}),
            ))
            .await
            .unwrap();
        assert_eq!(spawned.kind(), "ACTOR_SPAWNED");

        let path = spawned.str_field("path").unwrap().to_string();
        let echo = system.lookup_path(&path).unwrap();
        let reply = echo.ask(Message::new("PING")).await.unwrap();
        assert_eq!(reply.kind(), "PONG");

        let unknown = guardian
            .ask(Message::with_payload(
                guardian::SPAWN_ACTOR,
                json!({"behavior": "ghost"}),
            ))
            .await
            .unwrap();
        assert_eq!(unknown.kind(), "SPAWN_FAILED");

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_hierarchy_depth_limit() {
        let config = SystemConfig::builder()
            .with_test_mode(true)
            .with_max_hierarchy_depth(3)
            .build()
            .unwrap();
        let system = ActorSystem::new(config).unwrap();
        system.start().await.unwrap();

        // Guardian sits at depth 0; the chain may grow to depth 2.
        let a = system.spawn().spawn(Silent).await.unwrap();
        let b = system.spawn().with_parent(&a).spawn(Silent).await.unwrap();
        let too_deep = system.spawn().with_parent(&b).spawn(Silent).await;
        assert!(matches!(
            too_deep,
            Err(SystemError::Hierarchy(
                crate::hierarchy::HierarchyError::DepthLimitExceeded { .. }
            ))
        ));

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let system = test_system().await;
        let _first = system.spawn().with_id("dup").spawn(Silent).await.unwrap();
        let second = system.spawn().with_id("dup").spawn(Silent).await;
        assert!(matches!(second, Err(SystemError::DuplicateActor(_))));

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_directory_tracks_spawned_actors() {
        let system = test_system().await;
        let actor = system.spawn().with_kind("worker").spawn(Silent).await.unwrap();

        assert!(system.directory().lookup(actor.address()).is_some());
        assert_eq!(system.directory().list_by_kind("worker").len(), 1);

        actor.stop().await.unwrap();
        assert!(system.directory().lookup(actor.address()).is_none());

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_system_stats() {
        let system = test_system().await;
        let echo = system.spawn().spawn(Echo).await.unwrap();
        let _reply = echo.ask(Message::new("PING")).await.unwrap();

        let stats = system.system_stats();
        assert!(stats.running);
        assert!(stats.actor_count >= 3); // guardian, timer, echo
        assert_eq!(stats.ask_pending, 0);
        assert!(stats.messages_processed.values().sum::<u64>() >= 1);

        system.stop().await.unwrap();
        assert!(!system.is_running());
    }

    #[tokio::test]
    async fn test_flush_requires_test_mode() {
        let system = ActorSystem::new(SystemConfig::default()).unwrap();
        system.start().await.unwrap();

        assert!(matches!(
            system.flush().await,
            Err(SystemError::TestModeRequired)
        ));

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_system_stop_stops_everything() {
        let system = test_system().await;
        let a = system.spawn().spawn(Silent).await.unwrap();
        let b = system.spawn().with_parent(&a).spawn(Silent).await.unwrap();

        system.stop().await.unwrap();

        assert_eq!(a.status(), ActorStatus::Stopped);
        assert_eq!(b.status(), ActorStatus::Stopped);
        assert!(!system.is_running());
        // Idempotent
        system.stop().await.unwrap();
    }
}
