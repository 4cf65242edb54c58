//! Driver trait for abstracting relay I/O.
//!
//! The [`Driver`] trait decouples the runtime from a specific transport.
//! Production wraps the WebSocket transport; simulation records frames and
//! replays scripted relay traffic. The generic [`crate::Runtime`] runs the
//! same orchestration over both.

use std::future::Future;

use umbra_client::TransportEvent;

/// Abstracts relay I/O for the runtime.
///
/// At most one transport is open at a time. Opening replaces any previous
/// transport, and events from a replaced transport are never delivered.
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Open a transport to the relay for `server`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    fn open(&mut self, server: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Send one encoded envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if no transport is open or the write fails.
    fn send(&mut self, frame: String) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Next event from the open transport.
    ///
    /// Only polled while [`Driver::is_open`] is true. `None` means the
    /// transport vanished without a close frame.
    fn recv(&mut self) -> impl Future<Output = Option<TransportEvent>> + Send;

    /// Whether a transport is open.
    fn is_open(&self) -> bool;

    /// Close the transport. A no-op when none is open.
    fn close(&mut self);
}
