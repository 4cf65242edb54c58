//! Client error types.

use thiserror::Error;
use umbra_core::{Phase, SessionError};

/// Errors from [`crate::Client::handle`].
///
/// Errors caused by user input are shown in the current buffer instead of
/// being returned; only caller mistakes surface here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// An event arrived that makes no sense in the current phase.
    #[error("unexpected {event} while {phase:?}")]
    UnexpectedEvent {
        /// Event name.
        event: &'static str,
        /// Phase when it arrived, `None` without a session.
        phase: Option<Phase>,
    },

    /// Selected a buffer that does not exist.
    #[error("unknown buffer: {0}")]
    UnknownBuffer(String),

    /// Slash command with missing arguments.
    #[error("usage: {0}")]
    Usage(&'static str),

    /// Plain text typed in a buffer with no conversation target.
    #[error("no conversation selected; use /join or /query")]
    NoTarget,

    /// Session-level failure.
    #[error(transparent)]
    Session(#[from] SessionError),
}
