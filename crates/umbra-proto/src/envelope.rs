//! Relay envelopes.
//!
//! Every transport frame is one JSON object. The `type` field distinguishes
//! control envelopes from data envelopes:
//!
//! ```text
//! {"type":"encryption_init","key":"<b64 32B>","iv":"<b64 16B>"}   relay -> client
//! {"type":"encryption_ack"}                                     client -> relay
//! {"type":"irc_message","encrypted":true,"data":"<b64>"}          both
//! {"type":"error","error":"..","code":"..","action":".."}         relay -> client
//! ```
//!
//! Data envelopes from the relay may omit `type`; any object carrying `data`
//! without a control type decodes as [`Envelope::IrcMessage`].

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

const TYPE_ENCRYPTION_INIT: &str = "encryption_init";
const TYPE_ENCRYPTION_ACK: &str = "encryption_ack";
const TYPE_IRC_MESSAGE: &str = "irc_message";
const TYPE_ERROR: &str = "error";

/// A decoded relay envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// Session key material issued by the relay, once per connection.
    EncryptionInit {
        /// Base64 encoded 32-byte key.
        key: String,
        /// Base64 encoded 16-byte IV.
        iv: String,
    },

    /// Client acknowledgment that key material was installed.
    EncryptionAck,

    /// IRC payload.
    IrcMessage {
        /// Whether `data` is ciphertext.
        encrypted: bool,
        /// Base64 ciphertext (or plaintext when `encrypted` is false).
        data: String,
    },

    /// Relay-side failure.
    Error(RelayError),
}

/// Error reported by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayError {
    /// Human-readable description.
    pub error: String,
    /// Machine-readable code.
    pub code: RelayErrorCode,
    /// Suggested corrective action, if the relay provided one.
    pub action: Option<String>,
}

/// Relay error codes.
///
/// Codes not listed here are preserved verbatim in [`RelayErrorCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayErrorCode {
    /// No bearer credential was presented.
    TokenMissing,
    /// Bearer credential has expired.
    TokenExpired,
    /// Bearer credential was rejected.
    TokenInvalid,
    /// The API key behind the credential is disabled.
    ApiKeyDisabled,
    /// Too many connection attempts.
    RateLimited,
    /// Any other code.
    Other(String),
}

impl RelayErrorCode {
    /// Parse a wire code. Matching is case-insensitive.
    pub fn from_code(code: &str) -> Self {
        match code.to_ascii_uppercase().as_str() {
            "TOKEN_MISSING" => Self::TokenMissing,
            "TOKEN_EXPIRED" => Self::TokenExpired,
            "TOKEN_INVALID" => Self::TokenInvalid,
            "API_KEY_DISABLED" => Self::ApiKeyDisabled,
            "RATE_LIMITED" => Self::RateLimited,
            _ => Self::Other(code.to_string()),
        }
    }

    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::TokenMissing => "TOKEN_MISSING",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenInvalid => "TOKEN_INVALID",
            Self::ApiKeyDisabled => "API_KEY_DISABLED",
            Self::RateLimited => "RATE_LIMITED",
            Self::Other(code) => code,
        }
    }

    /// Returns true if retrying with the same credential cannot succeed.
    /// Auth-fatal errors suppress automatic reconnection.
    pub fn is_auth_fatal(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Corrective guidance shown to the user. `None` for unknown codes.
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            Self::TokenMissing => Some("Sign in again to obtain an access token, then reconnect."),
            Self::TokenExpired => Some("Your session has expired. Sign in again, then reconnect."),
            Self::TokenInvalid => Some("Your access token was rejected. Sign in again, then reconnect."),
            Self::ApiKeyDisabled => Some("This client has been disabled by the service operator."),
            Self::RateLimited => Some("Too many connection attempts. Wait a few minutes before reconnecting."),
            Self::Other(_) => None,
        }
    }
}

/// On-the-wire shape shared by all envelope types.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encrypted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<String>,
}

impl Envelope {
    /// Build an encrypted IRC data envelope.
    pub fn encrypted(data: impl Into<String>) -> Self {
        Self::IrcMessage { encrypted: true, data: data.into() }
    }

    /// Returns true for control envelopes (everything except IRC data).
    pub fn is_control(&self) -> bool {
        !matches!(self, Self::IrcMessage { .. })
    }

    /// Decode one transport frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Malformed` if the frame is not a JSON object
    /// - `ProtocolError::UnknownType` for an unrecognised `type`
    /// - `ProtocolError::MissingField` if a required field is absent
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawEnvelope = serde_json::from_str(text)?;

        match raw.kind.as_deref() {
            Some(TYPE_ENCRYPTION_INIT) => {
                let key = raw.key.ok_or(ProtocolError::MissingField {
                    kind: TYPE_ENCRYPTION_INIT,
                    field: "key",
                })?;
                let iv = raw
                    .iv
                    .ok_or(ProtocolError::MissingField { kind: TYPE_ENCRYPTION_INIT, field: "iv" })?;
                Ok(Self::EncryptionInit { key, iv })
            },
            Some(TYPE_ENCRYPTION_ACK) => Ok(Self::EncryptionAck),
            Some(TYPE_ERROR) => Ok(Self::Error(RelayError {
                error: raw.error.unwrap_or_default(),
                code: RelayErrorCode::from_code(raw.code.as_deref().unwrap_or_default()),
                action: raw.action,
            })),
            Some(TYPE_IRC_MESSAGE) | None => {
                let data = raw
                    .data
                    .ok_or(ProtocolError::MissingField { kind: TYPE_IRC_MESSAGE, field: "data" })?;
                Ok(Self::IrcMessage { encrypted: raw.encrypted.unwrap_or(false), data })
            },
            Some(other) => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }

    /// Encode as a JSON transport frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Malformed` if serialization fails
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let raw = match self {
            Self::EncryptionInit { key, iv } => RawEnvelope {
                kind: Some(TYPE_ENCRYPTION_INIT.to_string()),
                key: Some(key.clone()),
                iv: Some(iv.clone()),
                ..RawEnvelope::default()
            },
            Self::EncryptionAck => RawEnvelope {
                kind: Some(TYPE_ENCRYPTION_ACK.to_string()),
                ..RawEnvelope::default()
            },
            Self::IrcMessage { encrypted, data } => RawEnvelope {
                kind: Some(TYPE_IRC_MESSAGE.to_string()),
                encrypted: Some(*encrypted),
                data: Some(data.clone()),
                ..RawEnvelope::default()
            },
            Self::Error(err) => RawEnvelope {
                kind: Some(TYPE_ERROR.to_string()),
                error: Some(err.error.clone()),
                code: Some(err.code.as_str().to_string()),
                action: err.action.clone(),
                ..RawEnvelope::default()
            },
        };

        Ok(serde_json::to_string(&raw)?)
    }
}
