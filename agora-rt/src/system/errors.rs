//! System-level error types.

// Layer 1: Standard library
use std::time::Duration;

// Layer 2: Third-party
use thiserror::Error;

// Layer 3: Internal
use crate::hierarchy::HierarchyError;
use crate::mailbox::MailboxError;
use crate::util::AddressError;

/// System-level errors for actor runtime operations.
#[derive(Error, Debug)]
pub enum SystemError {
    /// No actor registered under the address
    #[error("Actor not found: {0}")]
    ActorNotFound(String),

    /// Operation on an actor that has stopped
    #[error("Actor stopped: {0}")]
    ActorStopped(String),

    /// An actor already exists under the requested id
    #[error("Actor already exists: {0}")]
    DuplicateActor(String),

    /// The system has not been started
    #[error("Actor system is not running")]
    NotRunning,

    /// The system is shutting down and refuses new work
    #[error("System shutdown in progress")]
    ShuttingDown,

    /// Actor startup failed
    #[error("Failed to spawn actor: {0}")]
    SpawnFailed(String),

    /// Tree registration failed
    #[error("Hierarchy error: {0}")]
    Hierarchy(#[from] HierarchyError),

    /// Mailbox refused a message
    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    /// Malformed actor address
    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Graceful shutdown did not finish in time
    #[error("Shutdown timeout exceeded after {0:?}")]
    ShutdownTimeout(Duration),

    /// `flush()` did not reach quiescence in time
    #[error("Flush timeout exceeded after {0:?}")]
    FlushTimeout(Duration),

    /// Operation requires test mode
    #[error("Operation requires test mode")]
    TestModeRequired,
}

impl SystemError {
    /// Whether the operation may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SystemError::Mailbox(MailboxError::Full { .. }) | SystemError::FlushTimeout(_)
        )
    }

    /// Whether the system cannot continue operating.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SystemError::ShuttingDown | SystemError::ShutdownTimeout(_)
        )
    }

    /// Whether the error can be handled without stopping the system.
    pub fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            SystemError::ActorNotFound("a://local/x".to_string()).to_string(),
            "Actor not found: a://local/x"
        );
        assert_eq!(
            SystemError::NotRunning.to_string(),
            "Actor system is not running"
        );
        assert!(SystemError::ShutdownTimeout(Duration::from_secs(30))
            .to_string()
            .contains("30"));
    }

    #[test]
    fn test_transient_errors() {
        let full = SystemError::Mailbox(MailboxError::Full { capacity: 8 });
        assert!(full.is_transient());
        assert!(!full.is_fatal());
        assert!(full.is_recoverable());

        let not_found = SystemError::ActorNotFound("x".to_string());
        assert!(!not_found.is_transient());
        assert!(not_found.is_recoverable());
    }

    #[test]
    fn test_fatal_errors() {
        assert!(SystemError::ShuttingDown.is_fatal());
        assert!(!SystemError::ShuttingDown.is_recoverable());
        assert!(SystemError::ShutdownTimeout(Duration::from_secs(1)).is_fatal());
    }

    #[test]
    fn test_conversions() {
        let system_err: SystemError = MailboxError::Closed.into();
        assert!(matches!(
            system_err,
            SystemError::Mailbox(MailboxError::Closed)
        ));

        let system_err: SystemError =
            HierarchyError::DepthLimitExceeded { max: 10 }.into();
        assert!(matches!(system_err, SystemError::Hierarchy(_)));
    }
}
