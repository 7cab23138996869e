// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use thiserror::Error;

// Layer 3: Internal module imports
use super::propagation::{
    HierarchyEvent, HierarchyListener, Propagation, PropagationOutcome,
};
use crate::plan::DomainEvent;
use crate::util::ActorAddress;

/// Default maximum tree depth.
pub const DEFAULT_MAX_HIERARCHY_DEPTH: usize = 10;

/// Tree registration failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    /// Adding the child would exceed the depth limit
    #[error("Hierarchy depth limit exceeded (max {max})")]
    DepthLimitExceeded { max: usize },

    /// The parent address is not in the tree
    #[error("Unknown parent: {0}")]
    UnknownParent(String),

    /// The address is already registered
    #[error("Already registered: {0}")]
    AlreadyRegistered(String),
}

#[derive(Default)]
struct HierarchyNode {
    parent: Option<ActorAddress>,
    children: Vec<ActorAddress>,
    depth: usize,
    listeners: Vec<HierarchyListener>,
}

/// Address-keyed actor tree.
///
/// Nodes reference each other by address only; the parent pointer is a
/// read-only handle resolved on demand, so the tree never holds owning
/// pointers both ways.
#[derive(Clone)]
pub struct HierarchyIndex {
    nodes: Arc<DashMap<String, HierarchyNode>>,
    max_depth: usize,
}

impl HierarchyIndex {
    /// Create an empty tree with the given depth limit.
    pub fn new(max_depth: usize) -> Self {
        Self {
            nodes: Arc::new(DashMap::new()),
            max_depth,
        }
    }

    /// Register a root actor.
    pub fn insert_root(&self, address: &ActorAddress) -> Result<(), HierarchyError> {
        self.insert(address, None)
    }

    /// Register `child` under `parent`.
    ///
    /// Rejects children that would exceed the depth limit.
    pub fn insert_child(
        &self,
        parent: &ActorAddress,
        child: &ActorAddress,
    ) -> Result<(), HierarchyError> {
        self.insert(child, Some(parent.clone()))
    }

    fn insert(
        &self,
        address: &ActorAddress,
        parent: Option<ActorAddress>,
    ) -> Result<(), HierarchyError> {
        let path = address.path();
        if self.nodes.contains_key(&path) {
            return Err(HierarchyError::AlreadyRegistered(path));
        }
        let depth = match &parent {
            None => 0,
            Some(parent_addr) => {
                let parent_depth = self
                    .nodes
                    .get(&parent_addr.path())
                    .map(|node| node.depth)
                    .ok_or_else(|| HierarchyError::UnknownParent(parent_addr.path()))?;
                let depth = parent_depth + 1;
                if depth >= self.max_depth {
                    return Err(HierarchyError::DepthLimitExceeded {
                        max: self.max_depth,
                    });
                }
                depth
            }
        };
        if let Some(parent_addr) = &parent {
            if let Some(mut parent_node) = self.nodes.get_mut(&parent_addr.path()) {
                parent_node.children.push(address.clone());
            }
        }
        self.nodes.insert(
            path,
            HierarchyNode {
                parent,
                children: Vec::new(),
                depth,
                listeners: Vec::new(),
            },
        );
        Ok(())
    }

    /// Unregister an actor, detaching it from its parent.
    ///
    /// Descendants are not removed; stopping code walks them first via
    /// [`descendants_post_order`](Self::descendants_post_order).
    pub fn remove(&self, address: &ActorAddress) {
        let path = address.path();
        let parent = self
            .nodes
            .remove(&path)
            .and_then(|(_, node)| node.parent);
        if let Some(parent_addr) = parent {
            if let Some(mut parent_node) = self.nodes.get_mut(&parent_addr.path()) {
                parent_node.children.retain(|child| child != address);
            }
        }
    }

    /// Whether the address is registered.
    pub fn contains(&self, address: &ActorAddress) -> bool {
        self.nodes.contains_key(&address.path())
    }

    /// Parent of an actor, when it has one.
    pub fn parent_of(&self, address: &ActorAddress) -> Option<ActorAddress> {
        self.nodes
            .get(&address.path())
            .and_then(|node| node.parent.clone())
    }

    /// Direct children of an actor.
    pub fn children_of(&self, address: &ActorAddress) -> Vec<ActorAddress> {
        self.nodes
            .get(&address.path())
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    /// Depth of an actor (roots are at 0).
    pub fn depth_of(&self, address: &ActorAddress) -> Option<usize> {
        self.nodes.get(&address.path()).map(|node| node.depth)
    }

    /// Every registered actor, deepest first. Used for reverse-depth stop.
    pub fn all_by_depth_desc(&self) -> Vec<ActorAddress> {
        let mut entries: Vec<(usize, ActorAddress)> = Vec::new();
        for entry in self.nodes.iter() {
            if let Ok(address) = ActorAddress::parse(entry.key()) {
                entries.push((entry.value().depth, address));
            }
        }
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        entries.into_iter().map(|(_, address)| address).collect()
    }

    /// Descendants of an actor in post-order (children before parents).
    ///
    /// The actor itself is not included. Stopping in this order satisfies
    /// the invariant that every descendant stops before its ancestor.
    pub fn descendants_post_order(&self, address: &ActorAddress) -> Vec<ActorAddress> {
        let mut result = Vec::new();
        for child in self.children_of(address) {
            result.extend(self.descendants_post_order(&child));
            result.push(child);
        }
        result
    }

    /// Ancestors of an actor, nearest first.
    pub fn ancestors(&self, address: &ActorAddress) -> Vec<ActorAddress> {
        let mut result = Vec::new();
        let mut cursor = self.parent_of(address);
        while let Some(ancestor) = cursor {
            cursor = self.parent_of(&ancestor);
            result.push(ancestor);
        }
        result
    }

    /// Attach a hierarchy listener to a node.
    pub fn subscribe(&self, address: &ActorAddress, listener: HierarchyListener) {
        if let Some(mut node) = self.nodes.get_mut(&address.path()) {
            node.listeners.push(listener);
        }
    }

    /// Propagate an event from `source` along the tree.
    ///
    /// Visits nodes in direction order (ancestors nearest-first for `Up`,
    /// descendants breadth-first for `Down`, both for `Bidirectional`),
    /// delivering to each node's hierarchy listeners, and stops as soon as a
    /// listener marks the event handled or the edge is reached.
    pub fn propagate(
        &self,
        source: &ActorAddress,
        event: DomainEvent,
        direction: Propagation,
    ) -> PropagationOutcome {
        let hierarchy_event = HierarchyEvent::new(source.clone(), event, direction);
        let mut outcome = PropagationOutcome {
            visited: Vec::new(),
            handled_by: None,
        };

        match direction {
            Propagation::Up => self.walk_up(source, &hierarchy_event, &mut outcome),
            Propagation::Down => self.walk_down(source, &hierarchy_event, &mut outcome),
            Propagation::Bidirectional => {
                self.walk_up(source, &hierarchy_event, &mut outcome);
                if outcome.handled_by.is_none() {
                    self.walk_down(source, &hierarchy_event, &mut outcome);
                }
            }
        }
        outcome
    }

    fn deliver(
        &self,
        node_address: &ActorAddress,
        event: &HierarchyEvent,
        outcome: &mut PropagationOutcome,
    ) -> bool {
        let listeners: Vec<HierarchyListener> = self
            .nodes
            .get(&node_address.path())
            .map(|node| node.listeners.clone())
            .unwrap_or_default();
        outcome.visited.push(node_address.clone());
        for listener in listeners {
            listener(event);
        }
        if event.is_handled() {
            outcome.handled_by = Some(node_address.clone());
            return true;
        }
        false
    }

    fn walk_up(
        &self,
        source: &ActorAddress,
        event: &HierarchyEvent,
        outcome: &mut PropagationOutcome,
    ) {
        for ancestor in self.ancestors(source) {
            if self.deliver(&ancestor, event, outcome) {
                return;
            }
        }
    }

    fn walk_down(
        &self,
        source: &ActorAddress,
        event: &HierarchyEvent,
        outcome: &mut PropagationOutcome,
    ) {
        let mut frontier: VecDeque<ActorAddress> = self.children_of(source).into();
        while let Some(node) = frontier.pop_front() {
            if self.deliver(&node, event, outcome) {
                return;
            }
            frontier.extend(self.children_of(&node));
        }
    }

    /// Number of registered actors.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for HierarchyIndex {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HIERARCHY_DEPTH)
    }
}
