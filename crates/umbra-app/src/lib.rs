//! Application layer for the Umbra bridge client.
//!
//! - [`Driver`]: platform-specific relay I/O
//! - [`Runtime`]: event loop owning the [`umbra_client::Client`]; every state
//!   change happens on its task, in arrival order
//! - [`RuntimeHandle`]: how the presentation layer talks to the runtime and
//!   observes [`umbra_client::ClientView`] updates

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod driver;
mod error;
mod runtime;

pub use driver::Driver;
pub use error::RuntimeError;
pub use runtime::{Runtime, RuntimeHandle};
