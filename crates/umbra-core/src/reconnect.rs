//! Reconnection supervisor.
//!
//! Schedules a single retry after an unexpected loss. A manual disconnect or
//! an authentication failure suppresses scheduling until the next explicit
//! connect. At most one retry is pending at a time.

use std::time::Duration;

use tracing::{debug, info};

use crate::{config::ConnectRequest, env::Instant, timer::Timer};

/// Decides whether and when to reconnect.
#[derive(Debug, Clone)]
pub struct Supervisor<I: Instant> {
    delay: Duration,
    suppressed: bool,
    pending: Timer<I>,
    last_request: Option<ConnectRequest>,
}

impl<I: Instant> Supervisor<I> {
    /// Supervisor retrying after `delay`.
    pub fn new(delay: Duration) -> Self {
        Self { delay, suppressed: false, pending: Timer::idle(), last_request: None }
    }

    /// An explicit connect: clear suppression, cancel any pending retry and
    /// remember the target.
    pub fn connect(&mut self, request: ConnectRequest) {
        self.suppressed = false;
        if self.pending.cancel() {
            debug!("pending reconnect cancelled by explicit connect");
        }
        self.last_request = Some(request);
    }

    /// Block retries until the next explicit connect.
    pub fn suppress(&mut self) {
        self.suppressed = true;
        self.pending.cancel();
    }

    /// Whether retries are blocked.
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Whether a retry is scheduled.
    pub fn is_pending(&self) -> bool {
        self.pending.is_pending()
    }

    /// Join `channel` on retries instead of the channel originally
    /// requested. The next explicit connect overrides it.
    pub fn follow_channel(&mut self, channel: &str) {
        if let Some(request) = self.last_request.as_mut() {
            request.channel = channel.to_string();
        }
    }

    /// The connection was lost unexpectedly. Schedule one retry unless
    /// suppressed or already pending. Returns true if scheduled.
    pub fn connection_lost(&mut self, now: I) -> bool {
        if self.suppressed || self.pending.is_pending() || self.last_request.is_none() {
            return false;
        }
        self.pending.schedule(now, self.delay);
        info!(delay = ?self.delay, "reconnect scheduled");
        true
    }

    /// When the pending retry is due.
    pub fn deadline(&self) -> Option<I> {
        self.pending.deadline()
    }

    /// Returns the target to reconnect to if the retry is due.
    pub fn poll(&mut self, now: I) -> Option<ConnectRequest> {
        if self.suppressed || !self.pending.fire(now) {
            return None;
        }
        self.last_request.clone()
    }
}
