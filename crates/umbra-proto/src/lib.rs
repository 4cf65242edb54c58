//! Umbra wire protocol
//!
//! Two layers live here, both free of I/O:
//!
//! - [`Envelope`]: the JSON frames exchanged with the relay. Control frames
//!   carry the session key material and relay errors; data frames carry
//!   base64 ciphertext.
//! - [`Line`] and [`classify`]: the IRC line grammar applied to decrypted
//!   payloads. Classification is an ordered set of pure functions over an
//!   immutable line, so it can be tested without a network or UI.
//!
//! Lines that match no rule classify to `None` and are dropped by the caller.
//! A malformed line never produces an error.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope;
pub mod errors;
pub mod inbound;
pub mod line;

pub use envelope::{Envelope, RelayError, RelayErrorCode};
pub use errors::ProtocolError;
pub use inbound::{Inbound, classify};
pub use line::{Line, split_lines};
