// Layer 1: Standard library imports
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;

// Layer 3: Internal module imports
use crate::plan::DomainEvent;
use crate::util::ActorAddress;

/// One subscriber's interest in a publisher's events.
#[derive(Debug, Clone)]
pub struct EventSubscription {
    /// Actor that receives matching events as told messages
    pub target: ActorAddress,

    /// Event types of interest; empty matches everything
    pub filter: HashSet<String>,
}

impl EventSubscription {
    fn matches(&self, event_type: &str) -> bool {
        self.filter.is_empty() || self.filter.contains(event_type)
    }
}

#[derive(Default)]
struct PublisherEntry {
    event_types: HashSet<String>,
    subscribers: HashMap<String, EventSubscription>,
}

/// Process-wide registry of publishing actors and their listeners.
///
/// Publishers are registered lazily, the first time a behavior is observed
/// emitting. Entries are keyed by the publisher's logical address path, so a
/// publisher's subscribers survive that actor's restarts: subscriptions
/// attach to the logical identity, not the live instance.
///
/// # Example
/// ```rust
/// use agora_rt::event::PublishRegistry;
/// use agora_rt::plan::DomainEvent;
/// use agora_rt::util::ActorAddress;
///
/// let registry = PublishRegistry::new();
/// let publisher = ActorAddress::local("source", "s-1").unwrap();
/// let listener = ActorAddress::local("sink", "k-1").unwrap();
///
/// registry.subscribe(&publisher, "sink-1", listener.clone(), ["USER_CREATED".to_string()]);
///
/// let targets = registry.route(&publisher, &DomainEvent::new("USER_CREATED"));
/// assert_eq!(targets, vec![listener]);
/// ```
#[derive(Clone, Default)]
pub struct PublishRegistry {
    publishers: Arc<DashMap<String, PublisherEntry>>,
}

impl PublishRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `publisher` emits the given event types.
    ///
    /// Idempotent; merges with what is already known about the publisher.
    pub fn register_publisher<I>(&self, publisher: &ActorAddress, event_types: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut entry = self.publishers.entry(publisher.path()).or_default();
        entry.event_types.extend(event_types);
    }

    /// Whether the publisher has been observed.
    pub fn is_registered(&self, publisher: &ActorAddress) -> bool {
        self.publishers.contains_key(&publisher.path())
    }

    /// Subscribe `target` to the publisher's events under `subscriber_id`.
    ///
    /// An empty filter matches every event type. Re-subscribing under the
    /// same id replaces the previous subscription.
    pub fn subscribe<I>(
        &self,
        publisher: &ActorAddress,
        subscriber_id: &str,
        target: ActorAddress,
        filter: I,
    ) where
        I: IntoIterator<Item = String>,
    {
        let mut entry = self.publishers.entry(publisher.path()).or_default();
        entry.subscribers.insert(
            subscriber_id.to_string(),
            EventSubscription {
                target,
                filter: filter.into_iter().collect(),
            },
        );
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, publisher: &ActorAddress, subscriber_id: &str) -> bool {
        match self.publishers.get_mut(&publisher.path()) {
            Some(mut entry) => entry.subscribers.remove(subscriber_id).is_some(),
            None => false,
        }
    }

    /// Targets whose filter matches `event`, lazily registering the
    /// publisher and recording the event type.
    pub fn route(&self, publisher: &ActorAddress, event: &DomainEvent) -> Vec<ActorAddress> {
        let mut entry = self.publishers.entry(publisher.path()).or_default();
        entry.event_types.insert(event.kind().to_string());
        entry
            .subscribers
            .values()
            .filter(|subscription| subscription.matches(event.kind()))
            .map(|subscription| subscription.target.clone())
            .collect()
    }

    /// Drop every subscription held by `subscriber_id` across publishers.
    pub fn remove_subscriber(&self, subscriber_id: &str) {
        for mut entry in self.publishers.iter_mut() {
            entry.subscribers.remove(subscriber_id);
        }
    }

    /// Number of observed publishers.
    pub fn publisher_count(&self) -> usize {
        self.publishers.len()
    }

    /// Number of subscriptions to a publisher.
    pub fn subscriber_count(&self, publisher: &ActorAddress) -> usize {
        self.publishers
            .get(&publisher.path())
            .map(|entry| entry.subscribers.len())
            .unwrap_or(0)
    }

    /// Event types a publisher has been observed emitting.
    pub fn event_types(&self, publisher: &ActorAddress) -> HashSet<String> {
        self.publishers
            .get(&publisher.path())
            .map(|entry| entry.event_types.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn publisher() -> ActorAddress {
        ActorAddress::local("source", "s-1").unwrap()
    }

    fn listener(id: &str) -> ActorAddress {
        ActorAddress::local("sink", id).unwrap()
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let registry = PublishRegistry::new();
        registry.subscribe(&publisher(), "all", listener("k-1"), []);

        assert_eq!(
            registry.route(&publisher(), &DomainEvent::new("ANYTHING")),
            vec![listener("k-1")]
        );
        assert_eq!(
            registry.route(&publisher(), &DomainEvent::new("ELSE")),
            vec![listener("k-1")]
        );
    }

    #[test]
    fn test_filter_restricts_routing() {
        let registry = PublishRegistry::new();
        registry.subscribe(
            &publisher(),
            "picky",
            listener("k-1"),
            ["USER_CREATED".to_string()],
        );

        assert_eq!(
            registry.route(&publisher(), &DomainEvent::new("USER_CREATED")),
            vec![listener("k-1")]
        );
        assert!(registry
            .route(&publisher(), &DomainEvent::new("USER_DELETED"))
            .is_empty());
    }

    #[test]
    fn test_route_lazily_registers_publisher() {
        let registry = PublishRegistry::new();
        assert!(!registry.is_registered(&publisher()));

        registry.route(&publisher(), &DomainEvent::new("SEEN"));

        assert!(registry.is_registered(&publisher()));
        assert!(registry.event_types(&publisher()).contains("SEEN"));
    }

    #[test]
    fn test_subscriptions_survive_publisher_restart() {
        let registry = PublishRegistry::new();
        registry.subscribe(&publisher(), "sub", listener("k-1"), []);

        // A restart re-registers the same logical path; subscribers remain.
        registry.register_publisher(&publisher(), ["E".to_string()]);

        assert_eq!(registry.subscriber_count(&publisher()), 1);
        assert_eq!(
            registry.route(&publisher(), &DomainEvent::new("E")),
            vec![listener("k-1")]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let registry = PublishRegistry::new();
        registry.subscribe(&publisher(), "sub", listener("k-1"), []);

        assert!(registry.unsubscribe(&publisher(), "sub"));
        assert!(!registry.unsubscribe(&publisher(), "sub"));
        assert!(registry
            .route(&publisher(), &DomainEvent::new("E"))
            .is_empty());
    }

    #[test]
    fn test_remove_subscriber_across_publishers() {
        let registry = PublishRegistry::new();
        let other = ActorAddress::local("source", "s-2").unwrap();
        registry.subscribe(&publisher(), "sub", listener("k-1"), []);
        registry.subscribe(&other, "sub", listener("k-1"), []);

        registry.remove_subscriber("sub");

        assert_eq!(registry.subscriber_count(&publisher()), 0);
        assert_eq!(registry.subscriber_count(&other), 0);
    }

    #[test]
    fn test_resubscribe_replaces_filter() {
        let registry = PublishRegistry::new();
        registry.subscribe(&publisher(), "sub", listener("k-1"), ["A".to_string()]);
        registry.subscribe(&publisher(), "sub", listener("k-2"), ["B".to_string()]);

        assert_eq!(registry.subscriber_count(&publisher()), 1);
        assert!(registry
            .route(&publisher(), &DomainEvent::new("A"))
            .is_empty());
        assert_eq!(
            registry.route(&publisher(), &DomainEvent::new("B")),
            vec![listener("k-2")]
        );
    }
}
