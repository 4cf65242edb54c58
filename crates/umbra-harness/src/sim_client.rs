//! Client wired directly to a [`SimRelay`].
//!
//! Drives the sans-IO [`Client`] without a runtime: every `Send` action is
//! handed to the relay, and tests step virtual time explicitly.

use std::time::Duration;

use umbra_client::{Client, ClientAction, ClientConfig, ClientError, ClientEvent, ConnectRequest};
use umbra_core::{Buffer, Message};

use crate::{SimEnv, SimRelay, SimRelayError};

/// Client, relay and clock for one simulated user.
pub struct SimClient {
    env: SimEnv,
    relay: SimRelay,
    client: Client<SimEnv>,
}

impl SimClient {
    /// Disconnected client with the default seed.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_env(SimEnv::new(), config)
    }

    /// Disconnected client sharing `env`.
    pub fn with_env(env: SimEnv, config: ClientConfig) -> Self {
        let relay = SimRelay::new(&env);
        let client = Client::new(env.clone(), config);
        Self { env, relay, client }
    }

    /// The client.
    pub fn client(&self) -> &Client<SimEnv> {
        &self.client
    }

    /// The relay.
    pub fn relay(&self) -> &SimRelay {
        &self.relay
    }

    /// The clock.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Handle one event and forward outbound envelopes to the relay.
    ///
    /// # Errors
    ///
    /// Returns the client's error unchanged. Relay-side failures surface as
    /// [`SimClientError::Relay`].
    pub fn handle(&mut self, event: ClientEvent) -> Result<Vec<ClientAction>, SimClientError> {
        let actions = self.client.handle(event)?;
        for action in &actions {
            if let ClientAction::Send(envelope) = action {
                let frame = envelope.encode().map_err(SimRelayError::from)?;
                self.relay.accept(&frame)?;
            }
        }
        Ok(actions)
    }

    /// Deliver server lines in one encrypted frame.
    ///
    /// # Errors
    ///
    /// See [`SimClient::handle`].
    pub fn server(&mut self, lines: &[&str]) -> Result<Vec<ClientAction>, SimClientError> {
        let frame = self.relay.server_frame(lines);
        self.frame(frame)
    }

    /// Deliver a raw frame.
    ///
    /// # Errors
    ///
    /// See [`SimClient::handle`].
    pub fn frame(&mut self, frame: String) -> Result<Vec<ClientAction>, SimClientError> {
        self.handle(ClientEvent::FrameReceived(frame))
    }

    /// Type a line.
    ///
    /// # Errors
    ///
    /// See [`SimClient::handle`].
    pub fn input(&mut self, line: &str) -> Result<Vec<ClientAction>, SimClientError> {
        self.handle(ClientEvent::Input(line.to_string()))
    }

    /// Advance the clock and deliver a tick.
    ///
    /// # Errors
    ///
    /// See [`SimClient::handle`].
    pub fn advance(&mut self, duration: Duration) -> Result<Vec<ClientAction>, SimClientError> {
        self.env.advance(duration);
        self.handle(ClientEvent::Tick)
    }

    /// Connect, open the transport and complete the key exchange.
    ///
    /// # Errors
    ///
    /// See [`SimClient::handle`].
    pub fn handshake(&mut self, server: &str, channel: &str) -> Result<(), SimClientError> {
        self.handle(ClientEvent::Connect(ConnectRequest::new(server, channel)))?;
        self.open()
    }

    /// Acknowledge an `Open` and complete the key exchange.
    ///
    /// # Errors
    ///
    /// See [`SimClient::handle`].
    pub fn open(&mut self) -> Result<(), SimClientError> {
        self.handle(ClientEvent::TransportOpened)?;
        let init = self.relay.init_frame();
        self.frame(init)?;
        Ok(())
    }

    /// Handshake and receive the welcome numeric. Lines sent so far are
    /// discarded.
    ///
    /// # Errors
    ///
    /// See [`SimClient::handle`].
    pub fn register(&mut self, server: &str, channel: &str) -> Result<(), SimClientError> {
        self.handshake(server, channel)?;
        let welcome = format!(":irc.sim 001 {} :Welcome to the network", self.client.nickname());
        self.server(&[&welcome])?;
        self.relay.take_lines();
        Ok(())
    }

    /// Lines the relay received since the last call.
    pub fn sent(&mut self) -> Vec<String> {
        self.relay.take_lines()
    }

    /// Buffer by name.
    pub fn buffer(&self, name: &str) -> Option<&Buffer> {
        self.client.buffers().get(name)
    }

    /// Messages in the current buffer.
    pub fn current_messages(&self) -> &[Message] {
        self.client.buffers().current().messages()
    }
}

/// Errors from [`SimClient`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SimClientError {
    /// The client rejected the event.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The relay rejected a client frame.
    #[error(transparent)]
    Relay(#[from] SimRelayError),
}
