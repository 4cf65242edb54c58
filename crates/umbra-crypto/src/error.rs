//! Cipher error types.

use thiserror::Error;

/// Errors from installing key material or decrypting frames.
///
/// Messages never include key bytes or plaintext.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Key or IV field was not valid base64.
    #[error("invalid base64 in {field}")]
    InvalidEncoding {
        /// Which input was malformed (`key`, `iv` or `ciphertext`).
        field: &'static str,
    },

    /// Decoded key or IV has the wrong length.
    #[error("invalid {field} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Which input was malformed.
        field: &'static str,
        /// Required length in bytes.
        expected: usize,
        /// Length received.
        actual: usize,
    },

    /// Padding check failed (wrong key, truncated or tampered ciphertext).
    #[error("decryption failed: bad padding")]
    BadPadding,

    /// Decrypted bytes are not UTF-8.
    #[error("decryption produced invalid UTF-8")]
    InvalidUtf8,
}
