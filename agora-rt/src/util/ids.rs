// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// Layer 3: Internal module imports
// (none)

/// Node name used for actors living in the current process.
pub const LOCAL_NODE: &str = "local";

/// Errors raised when parsing or constructing actor addresses.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Path did not match `<kind>://<node>/<id>`
    #[error("Invalid actor path: {0}")]
    InvalidPath(String),

    /// A path segment contained characters outside `[A-Za-z0-9_.-]`
    #[error("Invalid address segment: {0:?}")]
    InvalidSegment(String),
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Actor address for message routing and directory lookup.
///
/// An address is a value type identified by its `path`, formatted
/// `<kind>://<node>/<id>`. Two addresses with equal paths refer to the same
/// logical actor, and the path stays stable across restarts of that actor.
///
/// # Example
/// ```rust
/// use agora_rt::util::ActorAddress;
///
/// let addr = ActorAddress::local("worker", "w-1").unwrap();
/// assert_eq!(addr.path(), "worker://local/w-1");
///
/// let parsed = ActorAddress::parse("worker://local/w-1").unwrap();
/// assert_eq!(parsed, addr);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActorAddress {
    id: String,
    kind: String,
    node: String,
}

impl ActorAddress {
    /// Create an address from its parts, validating every segment.
    pub fn new(
        kind: impl Into<String>,
        node: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<Self, AddressError> {
        let kind = kind.into();
        let node = node.into();
        let id = id.into();
        for segment in [&kind, &node, &id] {
            if !valid_segment(segment) {
                return Err(AddressError::InvalidSegment(segment.clone()));
            }
        }
        Ok(Self { id, kind, node })
    }

    /// Create an address on the local node.
    pub fn local(kind: impl Into<String>, id: impl Into<String>) -> Result<Self, AddressError> {
        Self::new(kind, LOCAL_NODE, id)
    }

    /// Generate an address on the local node with a fresh uuid id.
    ///
    /// Falls back to the `actor` kind when the requested kind is not a valid
    /// segment, so generated addresses are always well-formed.
    pub fn generate(kind: &str) -> Self {
        let kind = if valid_segment(kind) { kind } else { "actor" };
        Self {
            id: Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            node: LOCAL_NODE.to_string(),
        }
    }

    /// Parse a `<kind>://<node>/<id>` path.
    pub fn parse(path: &str) -> Result<Self, AddressError> {
        let (kind, rest) = path
            .split_once("://")
            .ok_or_else(|| AddressError::InvalidPath(path.to_string()))?;
        let (node, id) = rest
            .split_once('/')
            .ok_or_else(|| AddressError::InvalidPath(path.to_string()))?;
        Self::new(kind, node, id)
    }

    /// The actor id segment.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The actor kind segment (the `type` part of the path).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The node segment.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// The canonical path string.
    pub fn path(&self) -> String {
        format!("{}://{}/{}", self.kind, self.node, self.id)
    }

    /// Whether the address names an actor on the local node.
    pub fn is_local(&self) -> bool {
        self.node == LOCAL_NODE
    }
}

impl Display for ActorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.kind, self.node, self.id)
    }
}

impl TryFrom<String> for ActorAddress {
    type Error = AddressError;

    fn try_from(path: String) -> Result<Self, Self::Error> {
        Self::parse(&path)
    }
}

impl From<ActorAddress> for String {
    fn from(address: ActorAddress) -> Self {
        address.path()
    }
}

/// Unique identifier pairing an ask request with its reply.
///
/// Correlation ids are uuid v4, unique across the lifetime of the system.
///
/// # Example
/// ```rust
/// use agora_rt::util::CorrelationId;
///
/// let id1 = CorrelationId::new();
/// let id2 = CorrelationId::new();
/// assert_ne!(id1, id2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a new random CorrelationId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create CorrelationId from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
