// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::plan::DomainEvent;
use crate::util::ActorAddress;

/// Direction an event travels along the actor tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Propagation {
    /// Toward ancestors, nearest first.
    Up,

    /// Toward descendants, breadth-first.
    Down,

    /// Both directions.
    Bidirectional,
}

/// Event traveling the tree, with a shared handled mark.
///
/// Propagation visits nodes until one marks the event handled or the edge of
/// the tree is reached. The mark is shared across every view of the event.
#[derive(Clone)]
pub struct HierarchyEvent {
    event: DomainEvent,
    direction: Propagation,
    source: ActorAddress,
    handled: Arc<AtomicBool>,
}

impl HierarchyEvent {
    /// Create an event originating at `source`.
    pub fn new(source: ActorAddress, event: DomainEvent, direction: Propagation) -> Self {
        Self {
            event,
            direction,
            source,
            handled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The carried domain event.
    pub fn event(&self) -> &DomainEvent {
        &self.event
    }

    /// Travel direction.
    pub fn direction(&self) -> Propagation {
        self.direction
    }

    /// Actor that emitted the event.
    pub fn source(&self) -> &ActorAddress {
        &self.source
    }

    /// Stop further propagation.
    pub fn mark_handled(&self) {
        self.handled.store(true, Ordering::Release);
    }

    /// Whether a visited node marked the event handled.
    pub fn is_handled(&self) -> bool {
        self.handled.load(Ordering::Acquire)
    }
}

/// Listener invoked for events reaching a node.
pub type HierarchyListener = Arc<dyn Fn(&HierarchyEvent) + Send + Sync>;

/// Result of one propagation pass.
#[derive(Debug, Clone)]
pub struct PropagationOutcome {
    /// Nodes the event was delivered to, in visit order
    pub visited: Vec<ActorAddress>,

    /// Node that marked the event handled, when one did
    pub handled_by: Option<ActorAddress>,
}
