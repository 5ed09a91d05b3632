//! Structured error types for the café core.
//!
//! Every failure mode is a pattern-matchable `thiserror` enum rather than a
//! string. Which layer recovers from which error:
//!
//! - [`CommandError`] is recovered by the dispatcher: its `Display` text is the
//!   line sent back to the issuing client, and the session continues.
//! - [`OrderError::InvalidTransition`] is an internal invariant violation. Client
//!   input never reaches it; if it fires, the affected Order is torn down and
//!   the rest of the service keeps running.
//! - [`RegistryError`] surfaces membership conflicts (duplicate names) and
//!   lookups for identities that are no longer connected.
//! - [`SessionError`] covers connection I/O and handshake failures.
//! - [`ConfigError`] rejects configurations the scheduler cannot run with.

use std::time::Duration;

use thiserror::Error;

use crate::kind::Kind;
use crate::order::Stage;

// =============================================================================
// Order Errors
// =============================================================================

/// Failure of an [`Order`](crate::Order) transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// A move asked for more stock than the source stage holds.
    ///
    /// The order is left untouched when this is returned.
    #[error("cannot move {requested} {kind} out of the {stage}: only {available} present")]
    InvalidTransition {
        kind: Kind,
        stage: Stage,
        requested: u32,
        available: u32,
    },
}

// =============================================================================
// Command Errors
// =============================================================================

/// A client line that could not be turned into a command.
///
/// The `Display` output is exactly what the client sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Input that matches no known command.
    #[error("Error - Unknown command")]
    Unknown {
        /// The normalised input, kept for logging.
        input: String,
    },

    /// An `order` command that named no items (or only zero quantities).
    #[error("Invalid order: No valid items found in the command.")]
    NoItems,

    /// A line longer than the session accepts. Its bytes were discarded.
    #[error("Error - Command too long (limit is {limit} bytes)")]
    LineTooLong { limit: usize },
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Session registry membership failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Another live session already uses this identity.
    #[error("identity {identity} is already connected")]
    DuplicateIdentity { identity: String },

    /// The identity has no registry entry.
    #[error("identity {identity} is not connected")]
    NotConnected { identity: String },
}

// =============================================================================
// Session Errors
// =============================================================================

/// Connection-level failures for a single client session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading from or writing to the client failed.
    #[error("session i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The client closed the connection before naming itself.
    #[error("connection closed before handshake")]
    ClosedBeforeHandshake,

    /// The client sent an empty name.
    #[error("client sent an empty name")]
    EmptyName,

    /// The handshake line exceeded the session's line limit.
    #[error("handshake line longer than {limit} bytes")]
    LineTooLong { limit: usize },

    /// The handshake name collided with a live session.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// =============================================================================
// Config Errors
// =============================================================================

/// Rejected [`CafeConfig`](crate::CafeConfig) values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Batches must move at least one unit.
    #[error("batch size must be at least 1")]
    ZeroBatchSize,

    /// Every kind needs a non-zero preparation time.
    #[error("preparation time for {kind} must be non-zero (got {duration:?})")]
    ZeroPreparation { kind: Kind, duration: Duration },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_display() {
        let err = OrderError::InvalidTransition {
            kind: Kind::Tea,
            stage: Stage::Waiting,
            requested: 3,
            available: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("3 tea"));
        assert!(msg.contains("waiting area"));
        assert!(msg.contains("only 1"));
    }

    #[test]
    fn test_command_error_is_client_text() {
        let err = CommandError::Unknown {
            input: "dance".into(),
        };
        assert_eq!(err.to_string(), "Error - Unknown command");
        assert_eq!(
            CommandError::NoItems.to_string(),
            "Invalid order: No valid items found in the command."
        );
    }

    #[test]
    fn test_session_error_wraps_registry_error() {
        let err: SessionError = RegistryError::DuplicateIdentity {
            identity: "ada".into(),
        }
        .into();

        match &err {
            SessionError::Registry(RegistryError::DuplicateIdentity { identity }) => {
                assert_eq!(identity, "ada");
            }
            other => panic!("expected DuplicateIdentity, got {other:?}"),
        }
        assert!(err.to_string().contains("already connected"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::ZeroPreparation {
            kind: Kind::Coffee,
            duration: Duration::ZERO,
        };
        assert!(err.to_string().contains("coffee"));
    }
}
