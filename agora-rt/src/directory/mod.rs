//! Actor directory: a name service with a TTL lookup cache.
//!
//! The directory maps actor addresses to opaque location strings: a
//! dispatcher handle for in-process actors, a transport address for remote
//! ones. An LRU/TTL cache fronts the source of truth; interested parties
//! observe registration changes through a broadcast subscription.
//!
//! # Components
//!
//! - [`Directory`] - Source of truth plus cache and change events
//! - [`DirectoryEntry`] / [`DirectoryEvent`]
//! - [`DirectoryCache`] - TTL cache with LRU-by-last-access eviction
//!
//! # Module Organization
//!
//! This mod.rs file contains ONLY module declarations and re-exports.

pub mod cache;
pub mod directory;

pub use cache::{CacheStats, DirectoryCache};
pub use directory::{
    Directory, DirectoryEntry, DirectoryEvent, DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TTL,
};
