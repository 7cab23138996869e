// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;

// Layer 3: Internal module imports
use super::cache::{CacheStats, DirectoryCache};
use crate::util::ActorAddress;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Default capacity of the lookup cache.
pub const DEFAULT_CACHE_SIZE: usize = 1000;

/// Default TTL of cached lookups.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// One registration in the directory.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// Registered address
    pub address: ActorAddress,

    /// Opaque location: dispatcher handle for in-process actors, transport
    /// address for remote ones
    pub location: String,

    /// When the registration happened
    pub registered_at: DateTime<Utc>,

    /// Last successful lookup
    pub last_accessed: DateTime<Utc>,
}

/// Change notification emitted on (un)registration.
#[derive(Debug, Clone)]
pub enum DirectoryEvent {
    /// An address was registered or overwritten
    Registered {
        address: ActorAddress,
        location: String,
        timestamp: DateTime<Utc>,
    },

    /// An address was removed
    Unregistered {
        address: ActorAddress,
        timestamp: DateTime<Utc>,
    },
}

/// Name service mapping actor addresses to locations.
///
/// A TTL cache fronts the source of truth: lookups hit the cache first and
/// repopulate it on miss. Lookup failures return `None`, never an error.
///
/// # Example
/// ```rust
/// use agora_rt::directory::Directory;
/// use agora_rt::util::ActorAddress;
///
/// let directory = Directory::with_defaults();
/// let addr = ActorAddress::local("worker", "w-1").unwrap();
///
/// directory.register(addr.clone(), "inproc:mailbox-17");
/// assert_eq!(directory.lookup(&addr), Some("inproc:mailbox-17".to_string()));
/// assert_eq!(directory.lookup(&ActorAddress::local("worker", "ghost").unwrap()), None);
/// ```
#[derive(Clone)]
pub struct Directory {
    inner: Arc<DirectoryInner>,
}

struct DirectoryInner {
    entries: DashMap<String, DirectoryEntry>,
    cache: DirectoryCache,
    changes: broadcast::Sender<DirectoryEvent>,
}

impl Directory {
    /// Create a directory with the given cache geometry.
    pub fn new(max_cache_size: usize, cache_ttl: Duration) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(DirectoryInner {
                entries: DashMap::new(),
                cache: DirectoryCache::new(max_cache_size, cache_ttl),
                changes,
            }),
        }
    }

    /// Create a directory with the default cache geometry.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TTL)
    }

    /// Register an address. Duplicates overwrite and emit `Registered`.
    pub fn register(&self, address: ActorAddress, location: impl Into<String>) {
        let location = location.into();
        let now = Utc::now();
        let path = address.path();
        self.inner.entries.insert(
            path.clone(),
            DirectoryEntry {
                address: address.clone(),
                location: location.clone(),
                registered_at: now,
                last_accessed: now,
            },
        );
        // Keep the cache coherent with the overwrite
        self.inner.cache.insert(&path, &location);
        let _ = self.inner.changes.send(DirectoryEvent::Registered {
            address,
            location,
            timestamp: now,
        });
    }

    /// Remove an address. Returns whether it was registered.
    pub fn unregister(&self, address: &ActorAddress) -> bool {
        let path = address.path();
        let removed = self.inner.entries.remove(&path).is_some();
        if removed {
            self.inner.cache.invalidate(&path);
            let _ = self.inner.changes.send(DirectoryEvent::Unregistered {
                address: address.clone(),
                timestamp: Utc::now(),
            });
        }
        removed
    }

    /// Resolve an address to its location.
    ///
    /// Cache hit within TTL answers directly; otherwise the source of truth
    /// is consulted and the cache repopulated. Unknown addresses are `None`.
    pub fn lookup(&self, address: &ActorAddress) -> Option<String> {
        let path = address.path();
        if let Some(location) = self.inner.cache.get(&path) {
            return Some(location);
        }
        let mut entry = self.inner.entries.get_mut(&path)?;
        entry.last_accessed = Utc::now();
        let location = entry.location.clone();
        drop(entry);
        self.inner.cache.insert(&path, &location);
        Some(location)
    }

    /// Resolve a raw path string.
    pub fn lookup_path(&self, path: &str) -> Option<String> {
        ActorAddress::parse(path)
            .ok()
            .and_then(|address| self.lookup(&address))
    }

    /// All registrations of a given actor kind.
    pub fn list_by_kind(&self, kind: &str) -> Vec<DirectoryEntry> {
        self.inner
            .entries
            .iter()
            .filter(|entry| entry.value().address.kind() == kind)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Every registration.
    pub fn get_all(&self) -> Vec<DirectoryEntry> {
        self.inner
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Observe registration changes.
    pub fn subscribe_to_changes(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.inner.changes.subscribe()
    }

    /// Drop expired cache entries, returning how many were removed.
    pub fn sweep_cache(&self) -> usize {
        self.inner.cache.sweep_expired()
    }

    /// Cache effectiveness counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::with_defaults()
    }
}
