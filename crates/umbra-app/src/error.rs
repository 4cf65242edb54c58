//! Runtime errors.

use thiserror::Error;
use umbra_proto::ProtocolError;

/// Errors from [`crate::Runtime`] and [`crate::RuntimeHandle`].
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// An outbound envelope could not be encoded.
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] ProtocolError),

    /// The runtime task has ended.
    #[error("runtime stopped")]
    Stopped,
}
