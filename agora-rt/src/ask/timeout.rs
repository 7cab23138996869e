//! Timeout facility backing the ask pattern and the timer actor.
//!
//! A lightweight set/clear wrapper over the host timer. Two guarantees:
//! a cleared timeout never fires (entry removal is the commit point, so the
//! race between clearing and firing settles atomically), and a fired
//! callback runs inside the identity context that was active when the
//! timeout was registered, when one existed.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use dashmap::DashMap;

// Layer 3: Internal module imports
use crate::actor::context::{current_identity, with_identity};

/// Identifier of an armed timeout.
pub type TimeoutId = u64;

struct TimeoutEntry {
    owner: Option<String>,
    // Present once the timer task is spawned; aborting is an optimization,
    // entry removal alone already prevents the callback from running.
    abort: Option<tokio::task::AbortHandle>,
}

/// Process-wide timeout manager.
///
/// Clones share the same table. Callbacks run on the tokio runtime; an
/// actor's timeouts can be released in one sweep via
/// [`cancel_owned_by`](Self::cancel_owned_by) when it stops.
///
/// # Example
/// ```rust
/// use agora_rt::ask::TimeoutHandler;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let handler = TimeoutHandler::new();
/// let id = handler.set_timeout(Duration::from_secs(60), || {});
/// assert!(handler.clear_timeout(id)); // never fires
/// # }
/// ```
#[derive(Clone, Default)]
pub struct TimeoutHandler {
    inner: Arc<HandlerInner>,
}

#[derive(Default)]
struct HandlerInner {
    active: DashMap<TimeoutId, TimeoutEntry>,
    next_id: AtomicU64,
}

impl TimeoutHandler {
    /// Create an empty timeout handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timeout with no owner tag.
    pub fn set_timeout<F>(&self, delay: Duration, callback: F) -> TimeoutId
    where
        F: FnOnce() + Send + 'static,
    {
        self.arm(None, delay, callback)
    }

    /// Arm a timeout tagged with an owning actor id.
    pub fn set_timeout_owned<F>(&self, owner: &str, delay: Duration, callback: F) -> TimeoutId
    where
        F: FnOnce() + Send + 'static,
    {
        self.arm(Some(owner.to_string()), delay, callback)
    }

    fn arm<F>(&self, owner: Option<String>, delay: Duration, callback: F) -> TimeoutId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let identity = current_identity();
        let inner = Arc::clone(&self.inner);

        // The entry must be armed before the timer task can possibly wake,
        // or a zero-delay timeout could race past its own registration.
        self.inner
            .active
            .insert(id, TimeoutEntry { owner, abort: None });

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Removal is the commit point: whoever removes the entry decides
            // whether the callback runs.
            if inner.active.remove(&id).is_none() {
                return;
            }
            match identity {
                Some(ctx) => with_identity(ctx, async move { callback() }).await,
                None => callback(),
            }
        });

        if let Some(mut entry) = self.inner.active.get_mut(&id) {
            entry.abort = Some(handle.abort_handle());
        }
        id
    }

    /// Clear an armed timeout. Returns `false` when it already fired or was
    /// already cleared; returns `true` when the callback will never run.
    pub fn clear_timeout(&self, id: TimeoutId) -> bool {
        if let Some((_, entry)) = self.inner.active.remove(&id) {
            if let Some(abort) = entry.abort {
                abort.abort();
            }
            true
        } else {
            false
        }
    }

    /// Clear every timeout tagged with `owner`. Returns how many were cleared.
    pub fn cancel_owned_by(&self, owner: &str) -> usize {
        let ids: Vec<TimeoutId> = self
            .inner
            .active
            .iter()
            .filter(|entry| entry.value().owner.as_deref() == Some(owner))
            .map(|entry| *entry.key())
            .collect();
        let mut cleared = 0;
        for id in ids {
            if self.clear_timeout(id) {
                cleared += 1;
            }
        }
        cleared
    }

    /// Number of currently armed timeouts.
    pub fn active_count(&self) -> usize {
        self.inner.active.len()
    }
}
