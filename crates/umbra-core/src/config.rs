//! Client configuration.
//!
//! Settings come from the settings collaborator (nickname, NickServ
//! credential, join/quit suppression) and are fixed for the life of a
//! [`crate::Session`]. Timing constants encode constraints imposed by the
//! IRC network behind the relay.

use std::time::Duration;

use crate::env::Environment;

/// Time allowed from transport open to a welcome numeric.
pub const DEFAULT_REGISTRATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between registration and the automatic JOIN.
///
/// Deliberately above the network's 10 second post-registration join
/// restriction.
pub const DEFAULT_JOIN_DELAY: Duration = Duration::from_secs(11);

/// Minimum time after registration before a user `/join` is forwarded.
pub const DEFAULT_JOIN_GATE: Duration = Duration::from_secs(10);

/// Delay before the single reconnection attempt after an unexpected loss.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Registration guard duration.
    pub registration_timeout: Duration,
    /// Delay before the automatic JOIN.
    pub join_delay: Duration,
    /// Minimum age of a registration before user joins are allowed.
    pub join_gate: Duration,
    /// Reconnection delay.
    pub reconnect_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            registration_timeout: DEFAULT_REGISTRATION_TIMEOUT,
            join_delay: DEFAULT_JOIN_DELAY,
            join_gate: DEFAULT_JOIN_GATE,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// User-level settings.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct ClientConfig {
    /// Preferred nickname. Empty means "generate one".
    pub nickname: String,
    /// NickServ password sent via IDENTIFY after registration.
    pub nickserv_password: Option<String>,
    /// Hide join/part/quit/kick status lines.
    pub suppress_join_quit: bool,
    /// Timing parameters.
    pub timing: Timing,
}

impl ClientConfig {
    /// Settings with the given nickname and default timing.
    pub fn new(nickname: impl Into<String>) -> Self {
        Self { nickname: nickname.into(), ..Self::default() }
    }

    /// Nickname to register with: the configured one, or `anon` followed by
    /// four random digits when none is set.
    pub fn resolve_nickname<E: Environment>(&self, env: &E) -> String {
        let nickname = self.nickname.trim();
        if nickname.is_empty() {
            format!("anon{:04}", env.random_u64() % 10_000)
        } else {
            nickname.to_string()
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("nickname", &self.nickname)
            .field("nickserv_password", &self.nickserv_password.as_ref().map(|_| "<redacted>"))
            .field("suppress_join_quit", &self.suppress_join_quit)
            .field("timing", &self.timing)
            .finish()
    }
}

/// Caller-supplied connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// IRC network identifier understood by the relay.
    pub server: String,
    /// Channel joined automatically after registration. Empty for none.
    pub channel: String,
}

impl ConnectRequest {
    /// Build a request.
    pub fn new(server: impl Into<String>, channel: impl Into<String>) -> Self {
        Self { server: server.into(), channel: channel.into() }
    }
}
