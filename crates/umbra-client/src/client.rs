//! Client state machine.
//!
//! The [`Client`] composes one [`Session`] per connection attempt with the
//! [`BufferStore`] and the reconnection [`Supervisor`]. Every mutation happens
//! inside [`Client::handle`], so a single caller task serializes all state
//! changes.

use tracing::{debug, info, warn};
use umbra_core::{
    BufferStore, ClientConfig, ConnectRequest, Environment, Message, MessageKind, Opened, Phase,
    Session, SessionAction, SessionError, Supervisor, timer::earliest,
};
use umbra_proto::{Envelope, Inbound, RelayError, classify, inbound::is_channel, split_lines};

use crate::{
    command::Command,
    error::ClientError,
    event::{ClientAction, ClientEvent, ClientView},
};

/// Default QUIT message.
const DEFAULT_QUIT_MESSAGE: &str = "leaving";

/// Actions accumulated while handling one event.
#[derive(Default)]
struct Outcome {
    actions: Vec<ClientAction>,
    changed: bool,
}

impl Outcome {
    fn push(&mut self, action: ClientAction) {
        self.actions.push(action);
    }

    fn finish(mut self) -> Vec<ClientAction> {
        if self.changed {
            self.actions.push(ClientAction::Changed);
        }
        self.actions
    }
}

/// Bridge client.
pub struct Client<E: Environment> {
    /// Environment for time and randomness.
    env: E,

    /// User settings.
    config: ClientConfig,

    /// Nickname used for the next registration.
    nickname: String,

    /// Current attempt. `None` while disconnected.
    session: Option<Session<E::Instant>>,

    /// Whether a transport exists that has not been closed yet.
    transport_open: bool,

    /// Conversation buffers and rosters.
    buffers: BufferStore,

    /// Reconnection policy.
    supervisor: Supervisor<E::Instant>,
}

impl<E: Environment> Client<E> {
    /// Create a disconnected client.
    pub fn new(env: E, config: ClientConfig) -> Self {
        let nickname = config.resolve_nickname(&env);
        let supervisor = Supervisor::new(config.timing.reconnect_delay);
        Self {
            env,
            config,
            nickname,
            session: None,
            transport_open: false,
            buffers: BufferStore::new(),
            supervisor,
        }
    }

    /// Our nickname.
    pub fn nickname(&self) -> &str {
        self.session.as_ref().map_or(self.nickname.as_str(), Session::nickname)
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.session.as_ref().map_or(Phase::Disconnected, Session::phase)
    }

    /// Whether the session is registered.
    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_ready)
    }

    /// Buffers and rosters.
    pub fn buffers(&self) -> &BufferStore {
        &self.buffers
    }

    /// Whether automatic reconnection is currently blocked.
    pub fn is_reconnect_suppressed(&self) -> bool {
        self.supervisor.is_suppressed()
    }

    /// Whether a reconnection attempt is scheduled.
    pub fn is_reconnect_pending(&self) -> bool {
        self.supervisor.is_pending()
    }

    /// When the caller should deliver the next [`ClientEvent::Tick`].
    pub fn next_deadline(&self) -> Option<E::Instant> {
        earliest([self.session.as_ref().and_then(Session::next_deadline), self.supervisor.deadline()])
    }

    /// Snapshot for the presentation layer.
    pub fn view(&self) -> ClientView {
        ClientView {
            buffers: self.buffers.buffers().to_vec(),
            current: self.buffers.current_name().to_string(),
            unread: self.buffers.unread().into_iter().map(str::to_string).collect(),
            roster: self.buffers.current_roster().map(|r| r.members().to_vec()).unwrap_or_default(),
            connected: self.is_connected(),
            phase: self.phase(),
            nickname: self.nickname().to_string(),
        }
    }

    /// Process an event.
    ///
    /// # Errors
    ///
    /// - `ClientError::UnexpectedEvent` for transport events without a
    ///   pending attempt
    /// - `ClientError::UnknownBuffer` when selecting a buffer that does not
    ///   exist
    /// - `ClientError::Session` for out-of-phase relay frames
    pub fn handle(&mut self, event: ClientEvent) -> Result<Vec<ClientAction>, ClientError> {
        let mut out = Outcome::default();

        match event {
            ClientEvent::Connect(request) => {
                self.supervisor.connect(request.clone());
                self.start(request, &mut out);
            },
            ClientEvent::TransportOpened => self.handle_opened(&mut out)?,
            ClientEvent::FrameReceived(text) => self.handle_frame(&text, &mut out)?,
            ClientEvent::TransportClosed { reason } => {
                let detail = reason.map_or_else(String::new, |r| format!(": {r}"));
                self.handle_lost(&format!("connection closed{detail}"), &mut out);
            },
            ClientEvent::TransportErrored { message } => {
                self.handle_lost(&format!("connection error: {message}"), &mut out);
            },
            ClientEvent::Input(text) => self.handle_input(&text, &mut out),
            ClientEvent::SelectBuffer(name) => {
                if self.buffers.get(&name).is_none() {
                    return Err(ClientError::UnknownBuffer(name));
                }
                self.buffers.select(&name);
                out.changed = true;
            },
            ClientEvent::Disconnect { reason } => self.disconnect(reason, &mut out),
            ClientEvent::Tick => self.handle_tick(&mut out),
        }

        Ok(out.finish())
    }

    fn start(&mut self, request: ConnectRequest, out: &mut Outcome) {
        self.teardown(false, out);
        self.buffers.clear();

        info!(server = %request.server, channel = %request.channel, "connecting");
        let server = request.server.clone();
        self.session = Some(Session::new(&self.config, self.nickname.clone(), request));
        self.transport_open = true;
        self.status(MessageKind::Info, format!("connecting to {server}"));
        out.push(ClientAction::Open { server });
        out.changed = true;
    }

    /// End the current attempt. Closes the transport if it is still open and
    /// optionally schedules a reconnect. Returns false if nothing was active.
    fn teardown(&mut self, reconnect: bool, out: &mut Outcome) -> bool {
        let Some(mut session) = self.session.take() else {
            return false;
        };
        session.close();

        if self.transport_open {
            self.transport_open = false;
            out.push(ClientAction::Close);
        }
        if reconnect {
            if let Some(channel) = session.last_joined() {
                self.supervisor.follow_channel(channel);
            }
        }
        if reconnect && self.supervisor.connection_lost(self.env.now()) {
            let delay = self.config.timing.reconnect_delay;
            self.status(MessageKind::Info, format!("reconnecting in {} seconds", delay.as_secs()));
        }
        out.changed = true;
        true
    }

    fn handle_opened(&mut self, out: &mut Outcome) -> Result<(), ClientError> {
        let now = self.env.now();
        let session = self
            .session
            .as_mut()
            .ok_or(ClientError::UnexpectedEvent { event: "transport open", phase: None })?;
        session.transport_opened(now)?;

        self.status(MessageKind::Info, "connected to relay, negotiating encryption");
        out.changed = true;
        Ok(())
    }

    fn handle_lost(&mut self, message: &str, out: &mut Outcome) {
        if self.session.is_none() {
            debug!("transport event after teardown ignored");
            return;
        }

        warn!(%message, "transport lost");
        self.transport_open = false;
        self.status(MessageKind::Error, message);
        self.teardown(true, out);
    }

    fn disconnect(&mut self, reason: Option<String>, out: &mut Outcome) {
        self.supervisor.suppress();
        let Some(session) = self.session.as_ref() else {
            return;
        };

        let reason = reason.unwrap_or_else(|| DEFAULT_QUIT_MESSAGE.to_string());
        if let Ok(envelope) = session.seal(&format!("QUIT :{reason}")) {
            out.push(ClientAction::Send(envelope));
        }
        info!("manual disconnect");
        self.teardown(false, out);
        self.status(MessageKind::Info, "disconnected");
    }

    fn handle_tick(&mut self, out: &mut Outcome) {
        let now = self.env.now();

        let actions = self.session.as_mut().map(|s| s.tick(now)).unwrap_or_default();
        for action in actions {
            match action {
                SessionAction::Send(envelope) => out.push(ClientAction::Send(envelope)),
                SessionAction::Close { error } => {
                    self.status(MessageKind::Error, error.to_string());
                    self.teardown(error.is_transient(), out);
                },
            }
        }

        if self.session.is_none() {
            if let Some(request) = self.supervisor.poll(now) {
                info!(server = %request.server, "reconnecting");
                self.start(request, out);
            }
        }
    }

    fn handle_frame(&mut self, text: &str, out: &mut Outcome) -> Result<(), ClientError> {
        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "dropping undecodable frame");
                return Ok(());
            },
        };
        let Some(session) = self.session.as_mut() else {
            debug!("frame without session dropped");
            return Ok(());
        };

        match envelope {
            Envelope::EncryptionInit { key, iv } => match session.begin_handshake(&key, &iv) {
                Ok(actions) => {
                    for action in actions {
                        if let SessionAction::Send(envelope) = action {
                            out.push(ClientAction::Send(envelope));
                        }
                    }
                    self.status(MessageKind::Info, "encryption established, registering");
                    out.changed = true;
                },
                Err(e @ SessionError::Handshake(_)) => {
                    warn!(error = %e, "handshake failed");
                    self.status(MessageKind::Error, e.to_string());
                    self.teardown(true, out);
                },
                Err(e) => return Err(e.into()),
            },
            Envelope::EncryptionAck => debug!("unexpected encryption_ack from relay"),
            Envelope::IrcMessage { encrypted: false, .. } => {
                warn!("plaintext IRC envelope dropped");
            },
            Envelope::IrcMessage { encrypted: true, data } => {
                match session.open(&data) {
                    Ok(Opened::Plain(payload)) => {
                        for line in split_lines(&payload) {
                            self.handle_line(line, out);
                        }
                    },
                    Ok(Opened::Garbled(placeholder)) => {
                        let ts = self.env.wall_clock_secs();
                        self.buffers.append_current(Message::status(MessageKind::Error, placeholder, ts));
                        out.changed = true;
                    },
                    Err(e) => debug!(error = %e, "data frame before handshake dropped"),
                }
            },
            Envelope::Error(error) => self.handle_relay_error(&error, out),
        }
        Ok(())
    }

    fn handle_relay_error(&mut self, error: &RelayError, out: &mut Outcome) {
        warn!(code = error.code.as_str(), "relay error");

        let mut text = format!("relay error ({}): {}", error.code.as_str(), error.error);
        if let Some(guidance) = error.code.guidance() {
            text.push(' ');
            text.push_str(guidance);
        }
        if let Some(action) = &error.action {
            text.push(' ');
            text.push_str(action);
        }
        self.status(MessageKind::Error, text);
        out.changed = true;

        if error.code.is_auth_fatal() {
            self.supervisor.suppress();
            self.teardown(false, out);
        }
    }

    fn handle_line(&mut self, line: &str, out: &mut Outcome) {
        let Some(inbound) = classify(line) else {
            debug!(len = line.len(), "dropping unrecognized line");
            return;
        };
        let now = self.env.now();
        let ts = self.env.wall_clock_secs();
        let suppress = self.config.suppress_join_quit;
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match inbound {
            Inbound::Welcome { text, .. } => {
                if !text.is_empty() {
                    self.buffers.append_status(Message::status(MessageKind::Info, text, ts));
                }
                let was_ready = session.is_ready();
                for action in session.welcome(now) {
                    if let SessionAction::Send(envelope) = action {
                        out.push(ClientAction::Send(envelope));
                    }
                }
                if !was_ready {
                    let text = format!("registered as {}", session.nickname());
                    self.buffers.append_status(Message::status(MessageKind::Info, text, ts));
                }
            },
            Inbound::NickInUse { nick } => {
                let text = format!("nickname {nick} is already in use");
                self.buffers.append_status(Message::status(MessageKind::Error, text, ts));
                for action in session.nick_in_use(&nick) {
                    if let SessionAction::Send(envelope) = action {
                        out.push(ClientAction::Send(envelope));
                    }
                }
            },
            Inbound::JoinFailed { channel, reason, .. } => {
                let text = format!("cannot join {channel}: {reason}");
                self.buffers.append_status(Message::status(MessageKind::Error, text, ts));
            },
            Inbound::Numeric { text, .. } => {
                self.buffers.append_status(Message::status(MessageKind::Info, text, ts));
            },
            Inbound::Names { channel, members } => self.buffers.apply_names(&channel, &members),
            Inbound::NamesEnd { channel } => self.buffers.finish_names(&channel),
            Inbound::Privmsg { sender, target, body, action } => {
                let private = !is_channel(&target);
                let buffer = if private { sender.clone() } else { target };
                let kind = if action { MessageKind::Action } else { MessageKind::Chat };
                let message = Message::new(kind, sender, body, ts).with_private(private);
                self.buffers.append(&buffer, message);
            },
            Inbound::Notice { sender, target, body, from_user } => {
                let (buffer, private) = if !from_user || !session.is_ready() {
                    (umbra_core::STATUS_BUFFER.to_string(), false)
                } else if is_channel(&target) {
                    (target, false)
                } else {
                    (sender.clone(), true)
                };
                let message =
                    Message::chat(sender, body, ts).with_notice(true).with_private(private);
                self.buffers.append(&buffer, message);
            },
            Inbound::Join { nick, channel } => {
                if session.is_self(&nick) {
                    session.set_last_joined(channel.clone());
                    self.buffers.select(&channel);
                    self.buffers.expect_names(&channel);
                    match session.seal(&format!("NAMES {channel}")) {
                        Ok(envelope) => out.push(ClientAction::Send(envelope)),
                        Err(e) => debug!(error = %e, "NAMES request dropped"),
                    }
                } else {
                    self.buffers.add_member(&channel, &nick);
                }
                if !suppress {
                    let text = format!("{nick} has joined {channel}");
                    self.buffers.append(&channel, Message::status(MessageKind::Event, text, ts));
                }
            },
            Inbound::Part { nick, channel, reason } => {
                if session.is_self(&nick) {
                    session.left_channel(&channel);
                    self.buffers.drop_roster(&channel);
                } else {
                    self.buffers.remove_member(&channel, &nick);
                }
                if !suppress {
                    let text = format!("{nick} has left {channel}{}", with_reason(reason.as_deref()));
                    self.buffers.append(&channel, Message::status(MessageKind::Event, text, ts));
                }
            },
            Inbound::Kick { channel, nick, by, reason } => {
                if session.is_self(&nick) {
                    session.left_channel(&channel);
                    self.buffers.drop_roster(&channel);
                } else {
                    self.buffers.remove_member(&channel, &nick);
                }
                if !suppress {
                    let text = format!("{nick} was kicked by {by}{}", with_reason(reason.as_deref()));
                    self.buffers.append(&channel, Message::status(MessageKind::Event, text, ts));
                }
            },
            Inbound::Quit { nick, reason } => {
                self.buffers.remove_everywhere(&nick);
                if !suppress {
                    let text = format!("{nick} has quit{}", with_reason(reason.as_deref()));
                    self.buffers.append_current(Message::status(MessageKind::Event, text, ts));
                }
            },
            Inbound::Nick { old, new } => {
                if session.is_self(&old) {
                    session.set_nickname(new.clone());
                    self.nickname.clone_from(&new);
                }
                self.buffers.rename_everywhere(&old, &new);
                let text = format!("{old} is now known as {new}");
                self.buffers.append_current(Message::status(MessageKind::Event, text, ts));
            },
            Inbound::Ping { token } => {
                match session.seal(&format!("PONG :{token}")) {
                    Ok(envelope) => out.push(ClientAction::Send(envelope)),
                    Err(e) => debug!(error = %e, "PONG dropped"),
                }
                return;
            },
            Inbound::ServerError { message } => {
                let text = format!("server closed link: {message}");
                self.buffers.append_status(Message::status(MessageKind::Error, text, ts));
            },
        }

        out.changed = true;
    }

    fn handle_input(&mut self, text: &str, out: &mut Outcome) {
        let result = match Command::parse(text) {
            Ok(Some(command)) => self.dispatch(command, out),
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            debug!(error = %e, "input rejected");
            let ts = self.env.wall_clock_secs();
            self.buffers.append_current(Message::status(MessageKind::Error, e.to_string(), ts));
            out.changed = true;
        }
    }

    fn dispatch(&mut self, command: Command, out: &mut Outcome) -> Result<(), ClientError> {
        let ts = self.env.wall_clock_secs();
        let me = self.nickname().to_string();

        match command {
            Command::Say(text) => {
                let target = self.conversation()?;
                self.send(&format!("PRIVMSG {target} :{text}"), out)?;
                self.echo(&target, Message::chat(me.clone(), text, ts), out);
            },
            Command::Me { text } => {
                let target = self.conversation()?;
                self.send(&format!("PRIVMSG {target} :\u{1}ACTION {text}\u{1}"), out)?;
                let message = Message::new(MessageKind::Action, me, text, ts);
                self.echo(&target, message, out);
            },
            Command::Msg { target, text } => {
                self.send(&format!("PRIVMSG {target} :{text}"), out)?;
                self.echo(&target, Message::chat(me.clone(), text, ts), out);
            },
            Command::Notice { target, text } => {
                self.send(&format!("NOTICE {target} :{text}"), out)?;
                let message = Message::chat(me.clone(), text, ts).with_notice(true);
                self.echo(&target, message, out);
            },
            Command::Join { channel } => {
                let now = self.env.now();
                let session = self.session.as_ref().ok_or(SessionError::NotRegistered)?;
                session.check_join(now)?;
                self.send(&format!("JOIN {channel}"), out)?;
            },
            Command::Query { nick } => {
                self.buffers.select(&nick);
                out.changed = true;
            },
            Command::Part { channel, reason } => {
                let channel = match channel {
                    Some(channel) => channel,
                    None => self.current_channel().ok_or(ClientError::Usage("/part [channel] [reason]"))?,
                };
                match reason {
                    Some(reason) => self.send(&format!("PART {channel} :{reason}"), out)?,
                    None => self.send(&format!("PART {channel}"), out)?,
                }
            },
            Command::Nick { nick } => self.send(&format!("NICK {nick}"), out)?,
            Command::Names { channel } => {
                let channel = match channel {
                    Some(channel) => channel,
                    None => self.current_channel().ok_or(ClientError::Usage("/names [channel]"))?,
                };
                self.send(&format!("NAMES {channel}"), out)?;
                self.buffers.expect_names(&channel);
                out.changed = true;
            },
            Command::Quit { reason } => self.disconnect(reason, out),
            Command::Raw(line) => self.send(&line, out)?,
        }
        Ok(())
    }

    /// Seal and queue one line. Dropped, never queued, if encryption is not
    /// ready.
    fn send(&self, line: &str, out: &mut Outcome) -> Result<(), ClientError> {
        let session = self.session.as_ref().ok_or(SessionError::NotRegistered)?;
        let envelope = session.seal(line)?;
        out.push(ClientAction::Send(envelope));
        Ok(())
    }

    fn echo(&mut self, target: &str, message: Message, out: &mut Outcome) {
        let message = message.with_private(!is_channel(target));
        self.buffers.append(target, message);
        out.changed = true;
    }

    /// Target of the current buffer; `Status` has none.
    fn conversation(&self) -> Result<String, ClientError> {
        let current = self.buffers.current_name();
        if current == umbra_core::STATUS_BUFFER {
            return Err(ClientError::NoTarget);
        }
        Ok(current.to_string())
    }

    fn current_channel(&self) -> Option<String> {
        let current = self.buffers.current_name();
        is_channel(current).then(|| current.to_string())
    }

    fn status(&mut self, kind: MessageKind, text: impl Into<String>) {
        let ts = self.env.wall_clock_secs();
        self.buffers.append_status(Message::status(kind, text, ts));
    }
}

fn with_reason(reason: Option<&str>) -> String {
    reason.map_or_else(String::new, |r| format!(" ({r})"))
}
