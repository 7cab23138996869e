//! System configuration with sensible defaults.

// Layer 1: Standard library
use std::time::Duration;

// Layer 2: Third-party
use serde::{Deserialize, Serialize};

// Layer 3: Internal
use crate::ask::DEFAULT_ASK_TIMEOUT;
use crate::directory::{DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TTL};
use crate::hierarchy::DEFAULT_MAX_HIERARCHY_DEPTH;
use crate::mailbox::OverflowPolicy;
use crate::supervisor::SupervisionPolicy;

/// Default timeout for graceful system shutdown (30 seconds).
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for `flush()` in test mode (10 seconds).
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// What happens to queued messages when an actor stops.
///
/// Restarts are unaffected: a restarted actor always keeps its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StopPolicy {
    /// Drop whatever is still queued.
    #[default]
    Discard,

    /// Process the backlog before `on_stop` runs.
    Drain,
}

/// System-wide configuration for the actor runtime.
///
/// # Examples
///
/// ```rust
/// use agora_rt::system::SystemConfig;
/// use std::time::Duration;
///
/// let config = SystemConfig::builder()
///     .with_test_mode(true)
///     .with_ask_timeout(Duration::from_millis(200))
///     .build()
///     .unwrap();
/// assert!(config.test_mode);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Default mailbox capacity (`None` = unbounded, the single-node default)
    pub default_mailbox_capacity: Option<usize>,

    /// Default overflow policy for bounded mailboxes
    pub default_overflow_policy: OverflowPolicy,

    /// Default per-request ask timeout
    #[serde(with = "duration_millis")]
    pub default_ask_timeout: Duration,

    /// Supervision policy for actors that neither override it nor inherit one
    pub default_supervision: SupervisionPolicy,

    /// Maximum actor tree depth
    pub max_hierarchy_depth: usize,

    /// Timeout for graceful system shutdown
    #[serde(with = "duration_millis")]
    pub shutdown_timeout: Duration,

    /// What happens to queued messages when an actor stops
    pub stop_policy: StopPolicy,

    /// Dead-letter ring buffer capacity
    pub dead_letter_capacity: usize,

    /// Directory lookup cache capacity
    pub directory_cache_size: usize,

    /// Directory lookup cache TTL
    #[serde(with = "duration_millis")]
    pub directory_cache_ttl: Duration,

    /// Enable validation, context-depth warnings, developer diagnostics
    pub debug: bool,

    /// Virtual-clock timer and deterministic `flush()`
    pub test_mode: bool,
}

mod duration_millis {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            default_mailbox_capacity: None,
            default_overflow_policy: OverflowPolicy::Fail,
            default_ask_timeout: DEFAULT_ASK_TIMEOUT,
            default_supervision: SupervisionPolicy::StopOnFailure,
            max_hierarchy_depth: DEFAULT_MAX_HIERARCHY_DEPTH,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            stop_policy: StopPolicy::Discard,
            dead_letter_capacity: crate::deadletter::DEFAULT_DEAD_LETTER_CAPACITY,
            directory_cache_size: DEFAULT_CACHE_SIZE,
            directory_cache_ttl: DEFAULT_CACHE_TTL,
            debug: cfg!(debug_assertions),
            test_mode: false,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|value| matches!(value.trim(), "1" | "true" | "TRUE" | "yes"))
}

impl SystemConfig {
    /// Create a configuration builder.
    pub fn builder() -> SystemConfigBuilder {
        SystemConfigBuilder::default()
    }

    /// Defaults overridden by `AGORA_DEBUG` and `AGORA_TEST_MODE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(debug) = env_flag("AGORA_DEBUG") {
            config.debug = debug;
        }
        if let Some(test_mode) = env_flag("AGORA_TEST_MODE") {
            config.test_mode = test_mode;
        }
        config
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(capacity) = self.default_mailbox_capacity {
            if capacity == 0 {
                return Err("default_mailbox_capacity must be > 0 when bounded".to_string());
            }
        }
        if self.default_ask_timeout.is_zero() {
            return Err("default_ask_timeout must be > 0".to_string());
        }
        if self.shutdown_timeout.is_zero() {
            return Err("shutdown_timeout must be > 0".to_string());
        }
        if self.max_hierarchy_depth == 0 {
            return Err("max_hierarchy_depth must be > 0".to_string());
        }
        if self.dead_letter_capacity == 0 {
            return Err("dead_letter_capacity must be > 0".to_string());
        }
        Ok(())
    }
}

/// Builder for [`SystemConfig`] with a fluent API.
#[derive(Debug, Default)]
pub struct SystemConfigBuilder {
    config: SystemConfig,
}

impl SystemConfigBuilder {
    /// Set the default mailbox capacity (`None` = unbounded).
    pub fn with_mailbox_capacity(mut self, capacity: Option<usize>) -> Self {
        self.config.default_mailbox_capacity = capacity;
        self
    }

    /// Set the default overflow policy.
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.config.default_overflow_policy = policy;
        self
    }

    /// Set the default ask timeout.
    pub fn with_ask_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_ask_timeout = timeout;
        self
    }

    /// Set the default supervision policy for top-level actors.
    pub fn with_default_supervision(mut self, policy: SupervisionPolicy) -> Self {
        self.config.default_supervision = policy;
        self
    }

    /// Set the maximum hierarchy depth.
    pub fn with_max_hierarchy_depth(mut self, depth: usize) -> Self {
        self.config.max_hierarchy_depth = depth;
        self
    }

    /// Set the graceful shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Set the stop policy for queued messages.
    pub fn with_stop_policy(mut self, policy: StopPolicy) -> Self {
        self.config.stop_policy = policy;
        self
    }

    /// Set the dead-letter buffer capacity.
    pub fn with_dead_letter_capacity(mut self, capacity: usize) -> Self {
        self.config.dead_letter_capacity = capacity;
        self
    }

    /// Set the directory cache geometry.
    pub fn with_directory_cache(mut self, size: usize, ttl: Duration) -> Self {
        self.config.directory_cache_size = size;
        self.config.directory_cache_ttl = ttl;
        self
    }

    /// Enable or disable debug validation and diagnostics.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Enable or disable test mode (virtual clock + `flush()`).
    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.config.test_mode = test_mode;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<SystemConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SystemConfig::default();
        assert_eq!(config.default_mailbox_capacity, None);
        assert_eq!(config.default_overflow_policy, OverflowPolicy::Fail);
        assert_eq!(config.default_ask_timeout, Duration::from_secs(5));
        assert_eq!(config.max_hierarchy_depth, DEFAULT_MAX_HIERARCHY_DEPTH);
        assert_eq!(config.stop_policy, StopPolicy::Discard);
        assert!(!config.test_mode);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SystemConfig::builder()
            .with_mailbox_capacity(Some(64))
            .with_overflow_policy(OverflowPolicy::DropOldest)
            .with_ask_timeout(Duration::from_millis(250))
            .with_test_mode(true)
            .with_stop_policy(StopPolicy::Drain)
            .build()
            .unwrap();

        assert_eq!(config.default_mailbox_capacity, Some(64));
        assert_eq!(config.default_overflow_policy, OverflowPolicy::DropOldest);
        assert_eq!(config.default_ask_timeout, Duration::from_millis(250));
        assert!(config.test_mode);
        assert_eq!(config.stop_policy, StopPolicy::Drain);
    }

    #[test]
    fn test_validation_rejects_zero_bounded_capacity() {
        let result = SystemConfig::builder()
            .with_mailbox_capacity(Some(0))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_rejects_zero_ask_timeout() {
        let result = SystemConfig::builder()
            .with_ask_timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let config = SystemConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: SystemConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.default_ask_timeout, config.default_ask_timeout);
        assert_eq!(back.stop_policy, config.stop_policy);
    }
}
