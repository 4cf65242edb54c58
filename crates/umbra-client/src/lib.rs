//! Client
//!
//! Action-based client state machine for the Umbra bridge. Composes the
//! per-connection session, the buffer store and the reconnection supervisor,
//! and turns user input into encrypted protocol lines.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO and Action-Based patterns as
//! [`umbra_core`]. It receives events ([`ClientEvent`]), processes them
//! through pure state machine logic, and returns actions ([`ClientAction`]) for
//! the caller to execute.
//!
//! # Components
//!
//! - [`Client`]: Top-level state machine for one relay connection at a time
//! - [`Command`]: Parsed user input
//! - [`ClientView`]: Snapshot handed to the presentation layer
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::ConnectedTransport`]: WebSocket connection to the relay
//! - [`transport::connect`]: Connect with a bearer credential and optional
//!   certificate pin

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod command;
mod error;
mod event;

#[cfg(feature = "transport")]
pub mod transport;

pub use client::Client;
pub use command::Command;
pub use error::ClientError;
pub use event::{ClientAction, ClientEvent, ClientView, TransportEvent};
pub use umbra_core::{ClientConfig, ConnectRequest, Environment, Phase, Timing};
