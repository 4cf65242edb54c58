//! Client events, actions and the UI view.

use umbra_core::{Buffer, ConnectRequest, Member, Phase};
use umbra_proto::Envelope;

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Opening and closing the transport when asked to
/// - Forwarding transport frames and lifecycle notifications
/// - Delivering a `Tick` when [`crate::Client::next_deadline`] passes
/// - Forwarding user input and buffer selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Explicit connect. Clears reconnect suppression.
    Connect(ConnectRequest),

    /// The transport requested by [`ClientAction::Open`] is open.
    TransportOpened,

    /// A text frame arrived from the relay.
    FrameReceived(String),

    /// The transport closed.
    TransportClosed {
        /// Close reason reported by the peer, if any.
        reason: Option<String>,
    },

    /// The transport failed.
    TransportErrored {
        /// Error text. Never contains the credential.
        message: String,
    },

    /// A line typed by the user.
    Input(String),

    /// The user switched buffers.
    SelectBuffer(String),

    /// Manual disconnect. Suppresses reconnection.
    Disconnect {
        /// QUIT message.
        reason: Option<String>,
    },

    /// Time passed; fire due timers.
    Tick,
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Open a new transport to the relay for `server`.
    Open {
        /// IRC network identifier understood by the relay.
        server: String,
    },

    /// Send an envelope over the open transport.
    Send(Envelope),

    /// Close the transport. Emitted at most once per transport.
    Close,

    /// Observable state changed; refresh the view.
    Changed,
}

/// Events produced by a relay transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived.
    Frame(String),
    /// The relay closed the connection.
    Closed {
        /// Close reason, if any.
        reason: Option<String>,
    },
    /// The connection failed.
    Errored {
        /// Error text, credential redacted.
        message: String,
    },
}

impl From<TransportEvent> for ClientEvent {
    fn from(event: TransportEvent) -> Self {
        match event {
            TransportEvent::Frame(frame) => Self::FrameReceived(frame),
            TransportEvent::Closed { reason } => Self::TransportClosed { reason },
            TransportEvent::Errored { message } => Self::TransportErrored { message },
        }
    }
}

/// Snapshot of everything the presentation layer shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientView {
    /// All buffers in creation order.
    pub buffers: Vec<Buffer>,
    /// Name of the current buffer.
    pub current: String,
    /// Buffers with unread messages.
    pub unread: Vec<String>,
    /// Roster of the current buffer; empty for non-channels.
    pub roster: Vec<Member>,
    /// Whether the session is registered.
    pub connected: bool,
    /// Connection phase.
    pub phase: Phase,
    /// Our nickname.
    pub nickname: String,
}

impl ClientView {
    /// The current buffer.
    pub fn current_buffer(&self) -> Option<&Buffer> {
        self.buffers.iter().find(|b| b.name() == self.current)
    }
}
