// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tracing::warn;

// Layer 3: Internal module imports
use crate::plan::DomainEvent;

/// Outcome of one listener invocation.
pub type ListenerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Event listener callback.
pub type EventListener = Arc<dyn Fn(&DomainEvent) -> ListenerResult + Send + Sync>;

struct BusInner {
    owner: String,
    listeners: Mutex<Vec<(u64, EventListener)>>,
    next_id: AtomicU64,
    destroyed: AtomicBool,
}

/// Per-actor event bus with synchronous, insertion-ordered delivery.
///
/// `emit` visits every subscriber before returning, in subscription order,
/// inside the emitter's identity context. A listener failure is logged and
/// does not affect sibling listeners. After `destroy`, `emit` is a warn-logged
/// no-op and `subscribe` hands out a no-op subscription.
///
/// # Example
/// ```rust
/// use agora_rt::event::EventBus;
/// use agora_rt::plan::DomainEvent;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// let bus = EventBus::new("worker://local/w-1");
/// let seen = Arc::new(AtomicU32::new(0));
/// let seen_clone = Arc::clone(&seen);
///
/// let subscription = bus.subscribe(move |_event| {
///     seen_clone.fetch_add(1, Ordering::SeqCst);
///     Ok(())
/// });
///
/// bus.emit(&DomainEvent::new("TICKED"));
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
///
/// subscription.unsubscribe();
/// bus.emit(&DomainEvent::new("TICKED"));
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a bus owned by the actor at `owner` (its address path).
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                owner: owner.into(),
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Register a listener; returns a handle that detaches it.
    ///
    /// Listeners are held in an insertion-ordered set. Subscribing to a
    /// destroyed bus returns a no-op subscription.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&DomainEvent) -> ListenerResult + Send + Sync + 'static,
    {
        if self.inner.destroyed.load(Ordering::Acquire) {
            return Subscription::noop();
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        Subscription {
            bus: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Broadcast an event to every subscriber, synchronously and in order.
    ///
    /// Returns the number of listeners visited.
    pub fn emit(&self, event: &DomainEvent) -> usize {
        if self.inner.destroyed.load(Ordering::Acquire) {
            warn!(owner = %self.inner.owner, event = event.kind(), "emit on destroyed event bus");
            return 0;
        }
        let snapshot: Vec<EventListener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in &snapshot {
            if let Err(error) = listener(event) {
                warn!(
                    owner = %self.inner.owner,
                    event = event.kind(),
                    %error,
                    "event listener failed"
                );
            }
        }
        snapshot.len()
    }

    /// Clear all subscribers and mark the bus destroyed.
    pub fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::Release);
        self.inner.listeners.lock().clear();
    }

    /// Whether `destroy` has been called.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

/// Handle detaching a bus listener.
///
/// Detaching is explicit: dropping the handle leaves the listener attached.
pub struct Subscription {
    bus: Weak<BusInner>,
    id: u64,
}

impl Subscription {
    /// A subscription attached to nothing.
    pub fn noop() -> Self {
        Self {
            bus: Weak::new(),
            id: u64::MAX,
        }
    }

    /// Remove the listener. Idempotent; after this returns the listener is
    /// never invoked again.
    pub fn unsubscribe(&self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    fn collect_bus() -> (EventBus, Arc<PlMutex<Vec<String>>>) {
        (EventBus::new("test://local/bus"), Arc::new(PlMutex::new(Vec::new())))
    }

    #[test]
    fn test_emit_visits_listeners_in_insertion_order() {
        let (bus, seen) = collect_bus();
        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            bus.subscribe(move |event| {
                seen.lock().push(format!("{tag}:{}", event.kind()));
                Ok(())
            });
        }

        let visited = bus.emit(&DomainEvent::new("E"));
        assert_eq!(visited, 3);
        assert_eq!(
            *seen.lock(),
            vec!["first:E".to_string(), "second:E".to_string(), "third:E".to_string()]
        );
    }

    #[test]
    fn test_listener_error_does_not_affect_siblings() {
        let (bus, seen) = collect_bus();
        bus.subscribe(|_| Err("listener exploded".into()));
        {
            let seen = Arc::clone(&seen);
            bus.subscribe(move |_| {
                seen.lock().push("survivor".to_string());
                Ok(())
            });
        }

        bus.emit(&DomainEvent::new("E"));
        assert_eq!(*seen.lock(), vec!["survivor".to_string()]);
    }

    #[test]
    fn test_unsubscribe_stops_invocations() {
        let (bus, seen) = collect_bus();
        let subscription = {
            let seen = Arc::clone(&seen);
            bus.subscribe(move |_| {
                seen.lock().push("hit".to_string());
                Ok(())
            })
        };

        bus.emit(&DomainEvent::new("E"));
        subscription.unsubscribe();
        bus.emit(&DomainEvent::new("E"));
        subscription.unsubscribe(); // idempotent

        assert_eq!(seen.lock().len(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_destroy_clears_and_disables() {
        let (bus, seen) = collect_bus();
        {
            let seen = Arc::clone(&seen);
            bus.subscribe(move |_| {
                seen.lock().push("hit".to_string());
                Ok(())
            });
        }

        bus.destroy();
        assert!(bus.is_destroyed());
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(bus.emit(&DomainEvent::new("E")), 0);
        assert!(seen.lock().is_empty());

        // Subscribing after destroy is a no-op
        let late = bus.subscribe(|_| Ok(()));
        assert_eq!(bus.listener_count(), 0);
        late.unsubscribe();
    }

    #[test]
    fn test_dropping_subscription_keeps_listener() {
        let (bus, seen) = collect_bus();
        {
            let seen = Arc::clone(&seen);
            let _subscription = bus.subscribe(move |_| {
                seen.lock().push("hit".to_string());
                Ok(())
            });
        } // handle dropped here

        bus.emit(&DomainEvent::new("E"));
        assert_eq!(seen.lock().len(), 1);
    }
}
