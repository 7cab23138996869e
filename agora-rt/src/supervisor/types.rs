//! Type definitions for the supervision framework.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

// Layer 3: Internal module imports
use super::backoff::BackoffConfig;
use crate::plan::DomainEvent;

/// Default restart budget within the restart window.
pub const DEFAULT_MAX_RESTARTS: u32 = 5;

/// Default sliding window for counting restarts.
pub const DEFAULT_RESTART_WINDOW: Duration = Duration::from_secs(60);

/// What the supervising side does when a child's handler fails.
///
/// Inherited from the parent at spawn time unless the behavior or the spawn
/// options override it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum SupervisionPolicy {
    /// Recreate the actor with a fresh context, keeping its mailbox.
    ///
    /// Restart attempts are counted in a sliding `restart_window`; exceeding
    /// `max_restarts` escalates to the parent's supervisor. An optional
    /// backoff delays each restart.
    RestartOnFailure {
        max_restarts: u32,
        #[serde(with = "window_millis")]
        restart_window: Duration,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        backoff: Option<BackoffConfig>,
    },

    /// Stop the actor; its pending asks reject with `ActorStopped`.
    StopOnFailure,

    /// Propagate the failure to the parent's supervisor.
    Escalate,
}

impl SupervisionPolicy {
    /// Restart with the default budget and window, no backoff.
    pub fn restart() -> Self {
        Self::RestartOnFailure {
            max_restarts: DEFAULT_MAX_RESTARTS,
            restart_window: DEFAULT_RESTART_WINDOW,
            backoff: None,
        }
    }

    /// Restart with a custom budget inside the default window.
    pub fn restart_limited(max_restarts: u32) -> Self {
        Self::RestartOnFailure {
            max_restarts,
            restart_window: DEFAULT_RESTART_WINDOW,
            backoff: None,
        }
    }

    /// Restart with backoff between attempts.
    pub fn restart_with_backoff(max_restarts: u32, backoff: BackoffConfig) -> Self {
        Self::RestartOnFailure {
            max_restarts,
            restart_window: DEFAULT_RESTART_WINDOW,
            backoff: Some(backoff),
        }
    }
}

impl Default for SupervisionPolicy {
    /// Conservative default: stop the failed actor.
    fn default() -> Self {
        Self::StopOnFailure
    }
}

mod window_millis {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Kind of supervision event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SupervisionEventKind {
    ChildStarted,
    ChildFailed,
    ChildRestarted,
    ChildStopped,
}

impl SupervisionEventKind {
    /// Event-type string used on the wire and on event buses.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChildStarted => "child-started",
            Self::ChildFailed => "child-failed",
            Self::ChildRestarted => "child-restarted",
            Self::ChildStopped => "child-stopped",
        }
    }
}

/// Supervision event emitted on the supervising actor's event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisionEvent {
    /// What happened
    pub kind: SupervisionEventKind,

    /// Id of the supervising actor
    pub supervisor_id: String,

    /// Id of the affected child
    pub child_id: String,

    /// When it happened
    pub timestamp: DateTime<Utc>,

    /// Failure description for `child-failed` / `child-restarted`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SupervisionEvent {
    /// Create an event stamped now.
    pub fn new(
        kind: SupervisionEventKind,
        supervisor_id: impl Into<String>,
        child_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            supervisor_id: supervisor_id.into(),
            child_id: child_id.into(),
            timestamp: Utc::now(),
            detail: None,
        }
    }

    /// Builder method: Attach a failure description.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Render as a domain event for bus emission.
    pub fn to_domain_event(&self) -> DomainEvent {
        let mut payload = json!({
            "supervisorId": self.supervisor_id,
            "childId": self.child_id,
            "timestamp": self.timestamp.timestamp_millis(),
        });
        if let (Some(detail), Some(object)) = (&self.detail, payload.as_object_mut()) {
            object.insert("detail".to_string(), json!(detail));
        }
        DomainEvent::with_payload(self.kind.as_str(), payload)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_stop() {
        assert_eq!(SupervisionPolicy::default(), SupervisionPolicy::StopOnFailure);
    }

    #[test]
    fn test_restart_constructors() {
        match SupervisionPolicy::restart() {
            SupervisionPolicy::RestartOnFailure {
                max_restarts,
                restart_window,
                backoff,
            } => {
                assert_eq!(max_restarts, DEFAULT_MAX_RESTARTS);
                assert_eq!(restart_window, DEFAULT_RESTART_WINDOW);
                assert!(backoff.is_none());
            }
            other => panic!("unexpected policy: {other:?}"),
        }

        match SupervisionPolicy::restart_limited(3) {
            SupervisionPolicy::RestartOnFailure { max_restarts, .. } => {
                assert_eq!(max_restarts, 3)
            }
            other => panic!("unexpected policy: {other:?}"),
        }
    }

    #[test]
    fn test_policy_serde() {
        let policy = SupervisionPolicy::restart_limited(3);
        let json = serde_json::to_value(&policy).unwrap();
        assert_eq!(json["strategy"], "restart-on-failure");
        assert_eq!(json["max_restarts"], 3);

        let back: SupervisionPolicy = serde_json::from_value(json).unwrap();
        assert_eq!(back, policy);
    }

    #[test]
    fn test_event_kind_strings() {
        assert_eq!(SupervisionEventKind::ChildStarted.as_str(), "child-started");
        assert_eq!(SupervisionEventKind::ChildFailed.as_str(), "child-failed");
        assert_eq!(
            SupervisionEventKind::ChildRestarted.as_str(),
            "child-restarted"
        );
        assert_eq!(SupervisionEventKind::ChildStopped.as_str(), "child-stopped");
    }

    #[test]
    fn test_event_to_domain_event() {
        let event = SupervisionEvent::new(
            SupervisionEventKind::ChildRestarted,
            "parent-1",
            "child-1",
        )
        .with_detail("boom");

        let domain = event.to_domain_event();
        assert_eq!(domain.kind(), "child-restarted");
        assert_eq!(domain.payload()["supervisorId"], "parent-1");
        assert_eq!(domain.payload()["childId"], "child-1");
        assert_eq!(domain.payload()["detail"], "boom");
        assert!(domain.payload()["timestamp"].is_i64());
    }
}
