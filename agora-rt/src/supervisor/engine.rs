//! Per-child supervision decisions.
//!
//! The decision engine owns one [`ChildSupervision`] per supervised actor:
//! the policy, the sliding window of recent restarts, and the backoff state.
//! On each failure it answers with a [`SupervisionDecision`] the dispatcher
//! acts on.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};

// Layer 3: Internal module imports
use super::backoff::RestartBackoff;
use super::types::SupervisionPolicy;

/// What the dispatcher does with a failed actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionDecision {
    /// Recreate the actor after the given delay.
    Restart { delay: Duration },

    /// Stop the actor permanently.
    Stop,

    /// Hand the failure to the parent's supervisor.
    Escalate,
}

/// Supervision state for one supervised child.
///
/// Restart attempts live in a sliding time window; old attempts expire and
/// no longer count toward the limit, so a child is never permanently locked
/// out by failures long past.
#[derive(Debug, Clone)]
pub struct ChildSupervision {
    policy: SupervisionPolicy,
    restarts: VecDeque<DateTime<Utc>>,
    backoff: Option<RestartBackoff>,
}

impl ChildSupervision {
    /// Create decision state for a child under `policy`.
    pub fn new(policy: SupervisionPolicy) -> Self {
        let backoff = match &policy {
            SupervisionPolicy::RestartOnFailure {
                backoff: Some(config),
                ..
            } => Some(RestartBackoff::new(config.clone())),
            _ => None,
        };
        Self {
            policy,
            restarts: VecDeque::new(),
            backoff,
        }
    }

    /// Decide what to do about a failure.
    ///
    /// `fatal` failures are never restarted, regardless of policy.
    pub fn on_failure(&mut self, fatal: bool) -> SupervisionDecision {
        match self.policy.clone() {
            SupervisionPolicy::StopOnFailure => SupervisionDecision::Stop,
            SupervisionPolicy::Escalate => SupervisionDecision::Escalate,
            SupervisionPolicy::RestartOnFailure {
                max_restarts,
                restart_window,
                ..
            } => {
                if fatal {
                    return SupervisionDecision::Stop;
                }
                self.expire_old_restarts(restart_window);
                if self.restarts.len() >= max_restarts as usize {
                    return SupervisionDecision::Escalate;
                }
                self.restarts.push_back(Utc::now());
                let delay = self
                    .backoff
                    .as_mut()
                    .map(RestartBackoff::next_delay)
                    .unwrap_or(Duration::ZERO);
                SupervisionDecision::Restart { delay }
            }
        }
    }

    /// Restarts currently inside the window.
    pub fn restart_count(&mut self) -> usize {
        if let SupervisionPolicy::RestartOnFailure { restart_window, .. } = self.policy {
            self.expire_old_restarts(restart_window);
        }
        self.restarts.len()
    }

    /// The policy in effect.
    pub fn policy(&self) -> &SupervisionPolicy {
        &self.policy
    }

    fn expire_old_restarts(&mut self, window: Duration) {
        let Ok(window) = chrono::Duration::from_std(window) else {
            return;
        };
        let cutoff = Utc::now() - window;
        while let Some(&oldest) = self.restarts.front() {
            if oldest < cutoff {
                self.restarts.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::supervisor::backoff::{BackoffConfig, BackoffStrategy};

    #[test]
    fn test_stop_policy_always_stops() {
        let mut child = ChildSupervision::new(SupervisionPolicy::StopOnFailure);
        assert_eq!(child.on_failure(false), SupervisionDecision::Stop);
        assert_eq!(child.on_failure(false), SupervisionDecision::Stop);
    }

    #[test]
    fn test_escalate_policy_escalates() {
        let mut child = ChildSupervision::new(SupervisionPolicy::Escalate);
        assert_eq!(child.on_failure(false), SupervisionDecision::Escalate);
    }

    #[test]
    fn test_restart_within_budget() {
        let mut child = ChildSupervision::new(SupervisionPolicy::restart_limited(3));

        for _ in 0..3 {
            assert_eq!(
                child.on_failure(false),
                SupervisionDecision::Restart {
                    delay: Duration::ZERO
                }
            );
        }
        assert_eq!(child.restart_count(), 3);

        // Budget exhausted within the window
        assert_eq!(child.on_failure(false), SupervisionDecision::Escalate);
    }

    #[test]
    fn test_fatal_failure_stops_despite_restart_policy() {
        let mut child = ChildSupervision::new(SupervisionPolicy::restart());
        assert_eq!(child.on_failure(true), SupervisionDecision::Stop);
    }

    #[test]
    fn test_window_expiry_restores_budget() {
        let mut child = ChildSupervision::new(SupervisionPolicy::RestartOnFailure {
            max_restarts: 1,
            restart_window: Duration::from_millis(20),
            backoff: None,
        });

        assert!(matches!(
            child.on_failure(false),
            SupervisionDecision::Restart { .. }
        ));
        assert_eq!(child.on_failure(false), SupervisionDecision::Escalate);

        std::thread::sleep(Duration::from_millis(30));

        // The earlier restart expired out of the window
        assert!(matches!(
            child.on_failure(false),
            SupervisionDecision::Restart { .. }
        ));
    }

    #[test]
    fn test_backoff_delays_grow() {
        let mut child = ChildSupervision::new(SupervisionPolicy::restart_with_backoff(
            10,
            BackoffConfig {
                strategy: BackoffStrategy::Exponential,
                base: Duration::from_millis(100),
                multiplier: 2.0,
                jitter: 0.0,
                max_delay: Duration::from_secs(60),
                reset_after: Duration::from_secs(30),
            },
        ));

        assert_eq!(
            child.on_failure(false),
            SupervisionDecision::Restart {
                delay: Duration::from_millis(100)
            }
        );
        assert_eq!(
            child.on_failure(false),
            SupervisionDecision::Restart {
                delay: Duration::from_millis(200)
            }
        );
    }
}
