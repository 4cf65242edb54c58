//! Umbra core state machines
//!
//! Pure, I/O-free building blocks of the bridge client:
//!
//! - [`env`]: time and randomness abstraction for deterministic tests
//! - [`timer`]: single-shot timers with explicit cancellation
//! - [`session`]: per-connection phase machine (handshake, registration,
//!   join pacing)
//! - [`buffer`] and [`roster`]: conversation logs, unread markers and channel
//!   member lists
//! - [`reconnect`]: the reconnection supervisor
//!
//! Methods take time as a parameter and return actions for the caller to
//! execute, so every behavior can be driven with a virtual clock.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod buffer;
pub mod config;
pub mod env;
pub mod error;
pub mod reconnect;
pub mod roster;
pub mod session;
pub mod timer;

pub use buffer::{Buffer, BufferStore, Message, MessageKind, STATUS_BUFFER};
pub use config::{ClientConfig, ConnectRequest, Timing};
pub use env::{Environment, Instant};
pub use error::SessionError;
pub use reconnect::Supervisor;
pub use roster::{Member, Roster};
pub use session::{Opened, Phase, Session, SessionAction};
pub use timer::Timer;
