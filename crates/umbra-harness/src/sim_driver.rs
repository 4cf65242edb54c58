//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` stands in for the WebSocket driver. Clones share state, so a
//! test keeps one clone to inject relay traffic and inspect outbound frames
//! while the [`umbra_app::Runtime`] owns the other.

use std::{
    collections::VecDeque,
    future::poll_fn,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Poll, Waker},
};

use thiserror::Error;
use tracing::debug;
use umbra_app::Driver;
use umbra_client::TransportEvent;

/// Error type for the simulation driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimDriverError {
    /// Open was scripted to fail.
    #[error("connection refused: {0}")]
    Refused(String),

    /// Send attempted with no open transport.
    #[error("transport not open")]
    NotOpen,
}

#[derive(Default)]
struct SharedState {
    incoming: VecDeque<TransportEvent>,
    outgoing: Vec<String>,
    open: bool,
    opens: Vec<String>,
    closes: usize,
    refuse_next_open: Option<String>,
    stall_next_open: bool,
    waker: Option<Waker>,
}

/// Simulation driver for deterministic testing.
#[derive(Clone, Default)]
pub struct SimDriver {
    state: Arc<Mutex<SharedState>>,
}

impl SimDriver {
    /// Create a new simulation driver.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, event: TransportEvent) {
        let mut state = self.state();
        state.incoming.push_back(event);
        if let Some(waker) = state.waker.take() {
            waker.wake();
        }
    }

    /// Queue a frame from the relay.
    pub fn inject_frame(&self, frame: impl Into<String>) {
        self.push(TransportEvent::Frame(frame.into()));
    }

    /// Queue a close from the relay.
    pub fn inject_close(&self, reason: Option<&str>) {
        self.push(TransportEvent::Closed { reason: reason.map(str::to_string) });
    }

    /// Queue a transport failure.
    pub fn inject_error(&self, message: &str) {
        self.push(TransportEvent::Errored { message: message.to_string() });
    }

    /// Make the next `open` fail.
    pub fn refuse_next_open(&self, message: &str) {
        self.state().refuse_next_open = Some(message.to_string());
    }

    /// Make the next `open` hang forever.
    pub fn stall_next_open(&self) {
        self.state().stall_next_open = true;
    }

    /// Take all captured outgoing frames.
    pub fn take_outgoing(&self) -> Vec<String> {
        std::mem::take(&mut self.state().outgoing)
    }

    /// Server identifiers passed to every successful `open`.
    pub fn opens(&self) -> Vec<String> {
        self.state().opens.clone()
    }

    /// Number of times an open transport was closed.
    pub fn closes(&self) -> usize {
        self.state().closes
    }

    /// Whether injected events are still waiting.
    pub fn has_pending(&self) -> bool {
        !self.state().incoming.is_empty()
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;

    async fn open(&mut self, server: &str) -> Result<(), Self::Error> {
        let stalled = {
            let mut state = self.state();
            if let Some(message) = state.refuse_next_open.take() {
                return Err(SimDriverError::Refused(message));
            }
            std::mem::take(&mut state.stall_next_open)
        };
        if stalled {
            debug!(server, "sim open stalled");
            std::future::pending::<()>().await;
        }

        let mut state = self.state();
        debug!(server, "sim transport opened");
        state.incoming.clear();
        state.open = true;
        state.opens.push(server.to_string());
        Ok(())
    }

    async fn send(&mut self, frame: String) -> Result<(), Self::Error> {
        let mut state = self.state();
        if !state.open {
            return Err(SimDriverError::NotOpen);
        }
        state.outgoing.push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        let shared = Arc::clone(&self.state);
        poll_fn(move |cx| {
            let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
            match state.incoming.pop_front() {
                Some(event) => {
                    if !matches!(event, TransportEvent::Frame(_)) {
                        state.open = false;
                    }
                    Poll::Ready(Some(event))
                },
                None => {
                    state.waker = Some(cx.waker().clone());
                    Poll::Pending
                },
            }
        })
        .await
    }

    fn is_open(&self) -> bool {
        self.state().open
    }

    fn close(&mut self) {
        let mut state = self.state();
        if state.open {
            state.open = false;
            state.closes += 1;
        }
    }
}
