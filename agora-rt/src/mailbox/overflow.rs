// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Behavior of `enqueue` when a bounded mailbox is at capacity.
///
/// # Policy Selection
///
/// - **Fail**: the sender learns about the rejection immediately. Right for
///   request/response traffic and anything the sender must not lose silently.
/// - **DropNewest**: the incoming message is discarded. Right for best-effort
///   telemetry where the freshest backlog matters less than the queue head.
/// - **DropOldest**: the queue head is discarded to admit the incoming
///   message. Right for state-update streams where only the latest matters.
///
/// Drops under either drop policy are accounted in the mailbox metrics;
/// nothing is ever discarded silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum OverflowPolicy {
    /// Refuse the message and report `MailboxError::Full` to the sender.
    #[default]
    Fail,

    /// Discard the incoming message.
    DropNewest,

    /// Discard the oldest queued message to make room.
    DropOldest,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fail => write!(f, "fail"),
            Self::DropNewest => write!(f, "dropNewest"),
            Self::DropOldest => write!(f, "dropOldest"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_fail() {
        assert_eq!(OverflowPolicy::default(), OverflowPolicy::Fail);
    }

    #[test]
    fn test_policy_display() {
        assert_eq!(OverflowPolicy::Fail.to_string(), "fail");
        assert_eq!(OverflowPolicy::DropNewest.to_string(), "dropNewest");
        assert_eq!(OverflowPolicy::DropOldest.to_string(), "dropOldest");
    }

    #[test]
    fn test_policy_serde() {
        let json = serde_json::to_string(&OverflowPolicy::DropOldest).unwrap();
        assert_eq!(json, "\"dropOldest\"");
        let back: OverflowPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OverflowPolicy::DropOldest);
    }
}
