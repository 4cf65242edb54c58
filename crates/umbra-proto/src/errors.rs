//! Protocol error types.

use thiserror::Error;

/// Errors from decoding relay envelopes.
///
/// These only cover the envelope layer. IRC lines that fail to parse are
/// dropped by [`crate::classify`] and never surface as errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame was not valid JSON or had the wrong shape.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// Envelope `type` is not one we understand.
    #[error("unknown envelope type: {0}")]
    UnknownType(String),

    /// Required field absent for the envelope type.
    #[error("envelope type {kind} is missing field {field}")]
    MissingField {
        /// Envelope type being decoded.
        kind: &'static str,
        /// Name of the missing field.
        field: &'static str,
    },
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
