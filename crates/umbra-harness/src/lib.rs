//! Deterministic simulation harness for the Umbra bridge client.
//!
//! - [`SimEnv`]: virtual clock and seeded RNG implementing
//!   [`umbra_core::Environment`]. Sleeping advances the clock instantly.
//! - [`SimRelay`]: the relay and IRC network behind it. Issues session keys,
//!   seals server lines and opens the client's envelopes.
//! - [`SimClient`]: the sans-IO client wired straight to a [`SimRelay`], for
//!   tests that step events and time by hand.
//! - [`SimDriver`]: [`umbra_app::Driver`] that records outbound frames and
//!   replays injected transport events, so the production runtime runs
//!   unchanged in tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sim_client;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_relay;

pub use sim_client::{SimClient, SimClientError};
pub use sim_driver::{SimDriver, SimDriverError};
pub use sim_env::{SimEnv, SimInstant};
pub use sim_relay::{SimRelay, SimRelayError};
