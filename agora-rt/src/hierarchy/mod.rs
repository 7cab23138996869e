//! Parent/child actor tree with directional event propagation.
//!
//! Actors form a tree: a child's lifetime is dominated by its parent's, and
//! events can travel the tree upward, downward, or both. Cyclic ownership is
//! avoided by construction: the index holds addresses, and a node's parent
//! is a read-only handle looked up on demand, never an owning pointer.
//!
//! # Components
//!
//! - [`HierarchyIndex`] - Address-keyed tree with depth accounting
//! - [`Propagation`] / [`HierarchyEvent`] - Directional events with a handled mark
//! - [`HierarchyError`] - Depth-limit and registration failures
//!
//! # Module Organization
//!
//! This mod.rs file contains ONLY module declarations and re-exports.

pub mod propagation;
pub mod tree;

pub use propagation::{HierarchyEvent, HierarchyListener, Propagation, PropagationOutcome};
pub use tree::{HierarchyError, HierarchyIndex, DEFAULT_MAX_HIERARCHY_DEPTH};
