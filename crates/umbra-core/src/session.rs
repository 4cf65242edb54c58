//! Per-connection session state machine.
//!
//! One [`Session`] exists per connection attempt and is replaced wholesale on
//! reconnect. It owns the cipher for that attempt, the registration guard and
//! the post-registration join delay.
//!
//! ```text
//! Disconnected ──open──► Handshaking ──encryption_init──► Registering
//!       ▲                                                      │
//!       │                                             001/376/422
//!       └─────────────── close / error ◄──────── Ready ◄───────┘
//! ```
//!
//! # Invariants
//!
//! - No IRC line is sealed before the relay's key material is installed.
//! - The registration guard runs from transport open until a welcome numeric
//!   and is cancelled by it.
//! - The automatic JOIN is sent at most once, and only after the join delay.
//! - [`Session::close`] cancels both timers and drops the cipher; repeating it
//!   is a no-op.

use tracing::{debug, info, warn};
use umbra_crypto::{CipherSession, SessionKeys};
use umbra_proto::Envelope;

use crate::{
    config::{ClientConfig, ConnectRequest, Timing},
    env::Instant,
    error::SessionError,
    timer::{Timer, earliest},
};

/// Connection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No transport, or the transport is gone.
    Disconnected,
    /// Transport open, waiting for `encryption_init`.
    Handshaking,
    /// NICK/USER sent, waiting for a welcome numeric.
    Registering,
    /// Registered with the IRC network.
    Ready,
}

/// Actions produced by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Send an envelope to the relay.
    Send(Envelope),
    /// End this attempt.
    Close {
        /// Why the attempt ended.
        error: SessionError,
    },
}

/// Decrypted data payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opened {
    /// CRLF-separated IRC lines.
    Plain(String),
    /// Decryption failed; holds the placeholder shown to the user.
    Garbled(String),
}

/// State of one connection attempt.
#[derive(Debug)]
pub struct Session<I: Instant> {
    phase: Phase,
    cipher: Option<CipherSession>,
    nickname: String,
    nickserv_password: Option<String>,
    request: ConnectRequest,
    timing: Timing,
    opened_at: Option<I>,
    connected_at: Option<I>,
    registration: Timer<I>,
    join: Timer<I>,
    last_joined: Option<String>,
}

impl<I: Instant> Session<I> {
    /// Create a disconnected session for `request`.
    ///
    /// `nickname` is the resolved nickname (see
    /// [`ClientConfig::resolve_nickname`]).
    pub fn new(config: &ClientConfig, nickname: impl Into<String>, request: ConnectRequest) -> Self {
        Self {
            phase: Phase::Disconnected,
            cipher: None,
            nickname: nickname.into(),
            nickserv_password: config.nickserv_password.clone(),
            request,
            timing: config.timing,
            opened_at: None,
            connected_at: None,
            registration: Timer::idle(),
            join: Timer::idle(),
            last_joined: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether registration completed.
    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    /// Whether lines can be sealed.
    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Our nickname as currently known.
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Record a confirmed nickname change.
    pub fn set_nickname(&mut self, nickname: impl Into<String>) {
        self.nickname = nickname.into();
    }

    /// Returns true if `nick` is ours.
    pub fn is_self(&self, nick: &str) -> bool {
        self.nickname.eq_ignore_ascii_case(nick)
    }

    /// Most recently joined channel.
    pub fn last_joined(&self) -> Option<&str> {
        self.last_joined.as_deref()
    }

    /// Remember a channel we joined.
    pub fn set_last_joined(&mut self, channel: impl Into<String>) {
        self.last_joined = Some(channel.into());
    }

    /// We left `channel`; forget it if it was the last one joined.
    pub fn left_channel(&mut self, channel: &str) {
        if self.last_joined.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(channel)) {
            self.last_joined = None;
        }
    }

    /// Earliest pending timer deadline.
    pub fn next_deadline(&self) -> Option<I> {
        earliest([self.registration.deadline(), self.join.deadline()])
    }

    /// Transport is open: start the handshake and the registration guard.
    ///
    /// # Errors
    ///
    /// `SessionError::InvalidPhase` unless the session is disconnected.
    pub fn transport_opened(&mut self, now: I) -> Result<(), SessionError> {
        if self.phase != Phase::Disconnected {
            return Err(SessionError::InvalidPhase { phase: self.phase, operation: "open transport" });
        }

        self.phase = Phase::Handshaking;
        self.opened_at = Some(now);
        self.registration.schedule(now, self.timing.registration_timeout);
        info!(server = %self.request.server, "transport open, awaiting key material");
        Ok(())
    }

    /// Install relay-issued key material and start registration.
    ///
    /// Emits the acknowledgment first, then the sealed NICK and USER lines.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidPhase` unless handshaking
    /// - `SessionError::Handshake` if the key or IV is unusable
    pub fn begin_handshake(&mut self, key: &str, iv: &str) -> Result<Vec<SessionAction>, SessionError> {
        if self.phase != Phase::Handshaking {
            return Err(SessionError::InvalidPhase { phase: self.phase, operation: "begin handshake" });
        }

        let keys = SessionKeys::from_base64(key, iv)?;
        self.cipher = Some(CipherSession::new(keys));
        self.phase = Phase::Registering;
        info!(nickname = %self.nickname, "encryption established, registering");

        let nick = self.seal(&format!("NICK {}", self.nickname))?;
        let user = self.seal(&format!("USER {0} 0 * :{0}", self.nickname))?;
        Ok(vec![
            SessionAction::Send(Envelope::EncryptionAck),
            SessionAction::Send(nick),
            SessionAction::Send(user),
        ])
    }

    /// A welcome numeric arrived.
    ///
    /// The first one completes registration: cancels the guard, records the
    /// connection time, identifies with NickServ if configured and schedules
    /// the automatic JOIN. Later ones are ignored.
    pub fn welcome(&mut self, now: I) -> Vec<SessionAction> {
        if self.phase != Phase::Registering {
            return Vec::new();
        }

        self.phase = Phase::Ready;
        self.registration.cancel();
        self.connected_at = Some(now);
        info!(nickname = %self.nickname, "registered");

        let mut actions = Vec::new();
        if let Some(password) = &self.nickserv_password {
            match self.seal(&format!("PRIVMSG NickServ :IDENTIFY {password}")) {
                Ok(envelope) => actions.push(SessionAction::Send(envelope)),
                Err(e) => warn!(error = %e, "could not identify with NickServ"),
            }
        }
        if !self.request.channel.is_empty() {
            self.join.schedule(now, self.timing.join_delay);
        }
        actions
    }

    /// The requested nickname is taken. During registration, retry with `_`
    /// appended; afterwards the current nickname stays.
    pub fn nick_in_use(&mut self, rejected: &str) -> Vec<SessionAction> {
        if self.phase != Phase::Registering {
            return Vec::new();
        }

        self.nickname = format!("{rejected}_");
        debug!(nickname = %self.nickname, "nickname in use, retrying");
        match self.seal(&format!("NICK {}", self.nickname)) {
            Ok(envelope) => vec![SessionAction::Send(envelope)],
            Err(_) => Vec::new(),
        }
    }

    /// Fire due timers.
    pub fn tick(&mut self, now: I) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        if self.registration.fire(now) && self.phase != Phase::Ready {
            let elapsed = self.opened_at.map_or(self.timing.registration_timeout, |t| now - t);
            warn!(?elapsed, "registration timed out");
            actions.push(SessionAction::Close { error: SessionError::RegistrationTimeout { elapsed } });
        }

        if self.join.fire(now) && self.phase == Phase::Ready {
            let channel = self.request.channel.clone();
            match self.seal(&format!("JOIN {channel}")) {
                Ok(envelope) => {
                    info!(%channel, "joining");
                    self.last_joined = Some(channel);
                    actions.push(SessionAction::Send(envelope));
                },
                Err(e) => warn!(error = %e, "automatic join dropped"),
            }
        }

        actions
    }

    /// Check whether a user JOIN may be sent now.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotRegistered` before registration
    /// - `SessionError::JoinTooEarly` within the join gate
    pub fn check_join(&self, now: I) -> Result<(), SessionError> {
        let connected_at = match (self.phase, self.connected_at) {
            (Phase::Ready, Some(at)) => at,
            _ => return Err(SessionError::NotRegistered),
        };

        let elapsed = now - connected_at;
        if elapsed < self.timing.join_gate {
            return Err(SessionError::JoinTooEarly { remaining: self.timing.join_gate - elapsed });
        }
        Ok(())
    }

    /// Encrypt one IRC line into a data envelope.
    ///
    /// # Errors
    ///
    /// `SessionError::EncryptionNotReady` before the handshake. The line is
    /// dropped, never queued.
    pub fn seal(&self, line: &str) -> Result<Envelope, SessionError> {
        let cipher = self.cipher.as_ref().ok_or(SessionError::EncryptionNotReady)?;
        Ok(Envelope::encrypted(cipher.encrypt(line)))
    }

    /// Decrypt a data payload.
    ///
    /// A frame that fails to decrypt becomes [`Opened::Garbled`] carrying the
    /// placeholder text.
    ///
    /// # Errors
    ///
    /// `SessionError::EncryptionNotReady` before the handshake.
    pub fn open(&self, data: &str) -> Result<Opened, SessionError> {
        let cipher = self.cipher.as_ref().ok_or(SessionError::EncryptionNotReady)?;
        let (text, ok) = cipher.decrypt_or_placeholder(data);
        if ok {
            Ok(Opened::Plain(text))
        } else {
            warn!("frame failed to decrypt");
            Ok(Opened::Garbled(text))
        }
    }

    /// End the attempt: cancel timers and discard the key material.
    ///
    /// Returns false if the session was already closed.
    pub fn close(&mut self) -> bool {
        self.registration.cancel();
        self.join.cancel();
        self.cipher = None;
        if self.phase == Phase::Disconnected && self.opened_at.is_none() {
            return false;
        }
        let was_open = self.phase != Phase::Disconnected;
        self.phase = Phase::Disconnected;
        self.opened_at = None;
        if was_open {
            info!("session closed");
        }
        true
    }
}
