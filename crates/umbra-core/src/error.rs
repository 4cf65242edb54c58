//! Error types for the session state machine.
//!
//! Each variant maps onto one class of the client's error taxonomy:
//! application-level errors are shown to the user and the session survives,
//! handshake failures end the current attempt.

use std::time::Duration;

use thiserror::Error;
use umbra_crypto::CipherError;

use crate::session::Phase;

/// Errors raised by [`crate::Session`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Invalid state transition attempted.
    #[error("invalid state transition: cannot {operation} in phase {phase:?}")]
    InvalidPhase {
        /// Current phase when error occurred.
        phase: Phase,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// An IRC line was submitted before the cipher handshake completed.
    #[error("encryption is not ready; line dropped")]
    EncryptionNotReady,

    /// Relay key material was unusable.
    #[error("handshake failed: {0}")]
    Handshake(#[from] CipherError),

    /// No welcome numeric within the registration window.
    #[error("registration timed out after {elapsed:?}")]
    RegistrationTimeout {
        /// How long we waited.
        elapsed: Duration,
    },

    /// A user join came too soon after registration.
    #[error("please wait {} more seconds before joining channels", wait_secs(.remaining))]
    JoinTooEarly {
        /// Time until joins are allowed.
        remaining: Duration,
    },

    /// A user join was attempted before registration.
    #[error("not connected")]
    NotRegistered,
}

/// Whole seconds to wait, rounded up and never zero.
fn wait_secs(remaining: &Duration) -> u64 {
    (remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)).max(1)
}

impl SessionError {
    /// Returns true if the attempt that raised this may succeed when retried
    /// on a fresh connection.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RegistrationTimeout { .. } | Self::Handshake(_))
    }
}
