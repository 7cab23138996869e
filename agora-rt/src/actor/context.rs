//! Continuation-local actor identity.
//!
//! Library code invoked inside a handler needs to know which actor it is
//! running for, including in continuations after an `.await`. The identity
//! context is scoped with `tokio::task_local!`, Rust's continuation-local
//! storage: nested scopes shadow (the innermost wins), and concurrent tasks
//! on the same OS thread cannot observe each other's context.
//!
//! Debug-mode validation guards the invariants: a non-empty actor id and a
//! nesting depth within [`MAX_IDENTITY_DEPTH`]; violations are logged and a
//! fallback context is installed rather than poisoning the dispatch.

// Layer 1: Standard library imports
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use tracing::warn;

// Layer 3: Internal module imports
use crate::util::CorrelationId;

/// Maximum identity-context nesting depth before a warning is emitted.
pub const MAX_IDENTITY_DEPTH: u32 = 10;

static CONTEXTS_ENTERED: AtomicU64 = AtomicU64::new(0);
static DEBUG_VALIDATION: AtomicBool = AtomicBool::new(cfg!(debug_assertions));

tokio::task_local! {
    static IDENTITY: IdentityContext;
}

/// Identity carried alongside each message dispatch.
///
/// Visible to all code running "inside" the handler via [`current_identity`],
/// including after suspension points, and invisible to code running in any
/// other actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityContext {
    /// Id of the actor this dispatch belongs to
    pub actor_id: String,

    /// Correlation id when the dispatched message is part of an ask
    pub correlation_id: Option<CorrelationId>,

    /// Application-level request id, when one was propagated
    pub request_id: Option<String>,

    /// Nesting depth of this context
    pub depth: u32,

    /// When this context was created
    pub created_at: DateTime<Utc>,
}

impl IdentityContext {
    /// Create a root context for an actor.
    pub fn new(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            correlation_id: None,
            request_id: None,
            depth: 0,
            created_at: Utc::now(),
        }
    }

    /// Builder method: Set the correlation id.
    pub fn with_correlation(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Builder method: Set the request id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Age of this context in milliseconds.
    pub fn age_ms(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.created_at)
            .num_milliseconds()
    }
}

/// Snapshot of the active identity context for diagnostics.
#[derive(Debug, Clone)]
pub struct IdentityDiagnostics {
    /// Whether a context is active on the current task
    pub has_active: bool,

    /// Actor id of the active context
    pub actor_id: Option<String>,

    /// Nesting depth of the active context
    pub depth: u32,

    /// Age of the active context in milliseconds
    pub age_ms: i64,

    /// Contexts entered since process start
    pub contexts_entered: u64,
}

/// Enable or disable identity validation at runtime.
///
/// Defaults to on in debug builds. The system facade switches this from its
/// `debug` configuration flag.
pub fn set_debug_validation(enabled: bool) {
    DEBUG_VALIDATION.store(enabled, Ordering::Relaxed);
}

fn validate(ctx: &IdentityContext) -> Option<IdentityContext> {
    if !DEBUG_VALIDATION.load(Ordering::Relaxed) {
        return None;
    }
    if ctx.actor_id.is_empty() {
        warn!("identity context with empty actor id; installing fallback");
        let mut fallback = ctx.clone();
        fallback.actor_id = "unknown".to_string();
        return Some(fallback);
    }
    if ctx.depth > MAX_IDENTITY_DEPTH {
        warn!(
            actor_id = %ctx.actor_id,
            depth = ctx.depth,
            "identity context nesting exceeds {MAX_IDENTITY_DEPTH}"
        );
    }
    None
}

/// Execute `fut` with `ctx` installed as the active identity.
///
/// Everything inside `fut`, including continuations after awaits, observes
/// `ctx` through [`current_identity`]. Nesting installs a deeper context;
/// the previous one becomes visible again once `fut` completes.
pub async fn with_identity<F>(ctx: IdentityContext, fut: F) -> F::Output
where
    F: Future,
{
    let mut ctx = ctx;
    if let Some(active) = current_identity() {
        ctx.depth = ctx.depth.max(active.depth + 1);
    }
    if let Some(fallback) = validate(&ctx) {
        ctx = fallback;
    }
    CONTEXTS_ENTERED.fetch_add(1, Ordering::Relaxed);
    IDENTITY.scope(ctx, fut).await
}

/// The innermost active identity context, if any.
pub fn current_identity() -> Option<IdentityContext> {
    IDENTITY.try_with(|ctx| ctx.clone()).ok()
}

/// Id of the actor the current task is executing for, if any.
pub fn current_actor_id() -> Option<String> {
    IDENTITY.try_with(|ctx| ctx.actor_id.clone()).ok()
}

/// Diagnostics for the current task's identity state.
pub fn diagnostics() -> IdentityDiagnostics {
    let active = current_identity();
    IdentityDiagnostics {
        has_active: active.is_some(),
        actor_id: active.as_ref().map(|ctx| ctx.actor_id.clone()),
        depth: active.as_ref().map(|ctx| ctx.depth).unwrap_or(0),
        age_ms: active.as_ref().map(IdentityContext::age_ms).unwrap_or(0),
        contexts_entered: CONTEXTS_ENTERED.load(Ordering::Relaxed),
    }
}
