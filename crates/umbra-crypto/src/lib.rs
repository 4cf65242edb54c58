//! Umbra Cryptographic Primitives
//!
//! The relay is the key authority: it issues a 256-bit key and a 128-bit IV
//! once per connection in its `encryption_init` envelope. The client never
//! generates session keys of its own.
//!
//! # Key Lifecycle
//!
//! ```text
//! encryption_init (base64 key, iv)
//!        │
//!        ▼
//! SessionKeys::from_base64 ──► CipherSession
//!        │                          │
//!        │                 encrypt / decrypt (AES-256-CBC, PKCS#7, base64)
//!        ▼                          │
//! disconnect / reconnect ───► dropped and zeroized
//! ```
//!
//! Key material lives exactly as long as one connection. A reconnect receives
//! fresh material from the relay; nothing is carried over.
//!
//! # Failure isolation
//!
//! [`CipherSession::decrypt`] reports failures as errors, and
//! [`CipherSession::decrypt_or_placeholder`] degrades a single corrupt frame to
//! [`DECRYPTION_FAILED_PLACEHOLDER`] so one bad frame never aborts a session.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod cipher;
mod error;

pub use cipher::{
    CipherSession, DECRYPTION_FAILED_PLACEHOLDER, IV_SIZE, KEY_SIZE, SessionKeys,
};
pub use error::CipherError;
