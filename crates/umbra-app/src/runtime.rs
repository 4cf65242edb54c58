//! Generic runtime for client orchestration.
//!
//! The Runtime drives the event loop, coordinating between:
//! - [`Client`]: protocol state machine
//! - [`Driver`]: platform-specific relay I/O
//! - [`RuntimeHandle`]: user commands in, view snapshots out
//!
//! All events, whatever their source, are handled one at a time on the task
//! that runs the loop, so buffer, roster and phase updates are serialized.

use std::{collections::VecDeque, pin::pin, time::Duration};

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use umbra_client::{Client, ClientAction, ClientConfig, ClientEvent, ClientView, ConnectRequest};
use umbra_core::env::{Environment, until};

use crate::{Driver, RuntimeError};

/// Capacity of the command channel.
const COMMAND_CAPACITY: usize = 64;

/// How an in-flight transport open ended.
enum Opening {
    /// The driver finished, or the open timed out.
    Finished(ClientEvent),
    /// A command that replaces the attempt arrived first.
    Interrupted(ClientEvent),
    /// The command channel closed.
    Abandoned,
}

/// Generic runtime that owns the [`Client`] and a [`Driver`].
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `E`: Environment for time and randomness
pub struct Runtime<D, E>
where
    D: Driver,
    E: Environment,
{
    driver: D,
    env: E,
    client: Client<E>,
    commands: mpsc::Receiver<ClientEvent>,
    commands_open: bool,
    /// Commands received while an open was in flight.
    deferred: VecDeque<ClientEvent>,
    open_timeout: Duration,
    view: watch::Sender<ClientView>,
}

impl<D, E> Runtime<D, E>
where
    D: Driver,
    E: Environment,
{
    /// Create a runtime and the handle used to drive it.
    pub fn new(driver: D, env: E, config: ClientConfig) -> (Self, RuntimeHandle) {
        let open_timeout = config.timing.registration_timeout;
        let client = Client::new(env.clone(), config);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (view_tx, view_rx) = watch::channel(client.view());

        let runtime = Self {
            driver,
            env,
            client,
            commands: commands_rx,
            commands_open: true,
            deferred: VecDeque::new(),
            open_timeout,
            view: view_tx,
        };
        (runtime, RuntimeHandle { commands: commands_tx, view: view_rx })
    }

    /// Run until every [`RuntimeHandle`] is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if an outbound envelope cannot be encoded.
    pub async fn run(mut self) -> Result<(), RuntimeError> {
        while self.step().await? {}
        self.driver.close();
        Ok(())
    }

    /// Wait for and handle one event.
    ///
    /// Commands parked during a transport open go first. Otherwise sources
    /// are polled in priority order: transport events, then user commands,
    /// then the next timer deadline. Returns `false` once the command channel
    /// has closed.
    ///
    /// # Errors
    ///
    /// Returns an error if an outbound envelope cannot be encoded.
    pub async fn step(&mut self) -> Result<bool, RuntimeError> {
        if let Some(event) = self.deferred.pop_front() {
            self.dispatch(event).await?;
            return Ok(self.commands_open);
        }

        let delay = self.client.next_deadline().map(|deadline| until(self.env.now(), deadline));
        let transport_open = self.driver.is_open();

        let event = tokio::select! {
            biased;

            transport = self.driver.recv(), if transport_open => {
                transport.map_or(ClientEvent::TransportClosed { reason: None }, ClientEvent::from)
            },
            command = self.commands.recv(), if self.commands_open => match command {
                Some(event) => event,
                None => {
                    debug!("command channel closed");
                    self.commands_open = false;
                    return Ok(false);
                },
            },
            () = wait(&self.env, delay) => ClientEvent::Tick,
        };

        self.dispatch(event).await?;
        Ok(self.commands_open)
    }

    /// Handle an event and execute the resulting actions. Events produced by
    /// executing actions are handled before returning.
    async fn dispatch(&mut self, event: ClientEvent) -> Result<(), RuntimeError> {
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            let actions = match self.client.handle(event) {
                Ok(actions) => actions,
                Err(e) => {
                    warn!(error = %e, "event rejected");
                    continue;
                },
            };

            for action in actions {
                match action {
                    ClientAction::Open { server } => match self.open(&server).await {
                        Opening::Finished(event) => pending.push_back(event),
                        Opening::Interrupted(event) => {
                            self.driver.close();
                            pending.push_back(event);
                        },
                        Opening::Abandoned => self.driver.close(),
                    },
                    ClientAction::Send(envelope) => {
                        let frame = envelope.encode()?;
                        if let Err(e) = self.driver.send(frame).await {
                            pending.push_back(ClientEvent::TransportErrored { message: e.to_string() });
                        }
                    },
                    ClientAction::Close => self.driver.close(),
                    ClientAction::Changed => {
                        self.view.send_replace(self.client.view());
                    },
                }
            }
        }
        Ok(())
    }

    /// Open a transport while still serving commands.
    ///
    /// The open is bounded by the registration timeout. `Connect` and
    /// `Disconnect` cancel it; other commands wait in `deferred` until the
    /// attempt has settled.
    async fn open(&mut self, server: &str) -> Opening {
        let mut open = pin!(self.driver.open(server));
        let mut expired = pin!(self.env.sleep(self.open_timeout));

        loop {
            tokio::select! {
                biased;

                result = &mut open => {
                    return Opening::Finished(match result {
                        Ok(()) => ClientEvent::TransportOpened,
                        Err(e) => ClientEvent::TransportErrored { message: e.to_string() },
                    });
                },
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(event @ (ClientEvent::Connect(_) | ClientEvent::Disconnect { .. })) => {
                        debug!(server, "open cancelled");
                        return Opening::Interrupted(event);
                    },
                    Some(event) => self.deferred.push_back(event),
                    None => {
                        debug!("command channel closed during open");
                        self.commands_open = false;
                        return Opening::Abandoned;
                    },
                },
                () = &mut expired => {
                    warn!(server, "open timed out");
                    let secs = self.open_timeout.as_secs();
                    return Opening::Finished(ClientEvent::TransportErrored {
                        message: format!("no connection after {secs} seconds"),
                    });
                },
            }
        }
    }

    /// The client state machine.
    pub fn client(&self) -> &Client<E> {
        &self.client
    }

    /// The driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutable access to the driver.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

/// Sleep for `delay`, or forever when there is nothing to wait for.
async fn wait<E: Environment>(env: &E, delay: Option<Duration>) {
    match delay {
        Some(delay) => env.sleep(delay).await,
        None => std::future::pending().await,
    }
}

/// Handle for submitting user intents and observing the view.
#[derive(Clone)]
pub struct RuntimeHandle {
    commands: mpsc::Sender<ClientEvent>,
    view: watch::Receiver<ClientView>,
}

impl RuntimeHandle {
    /// Submit an event to the runtime.
    ///
    /// # Errors
    ///
    /// `RuntimeError::Stopped` if the runtime has ended.
    pub async fn submit(&self, event: ClientEvent) -> Result<(), RuntimeError> {
        self.commands.send(event).await.map_err(|_| RuntimeError::Stopped)
    }

    /// Connect to `server`, joining `channel` after registration.
    ///
    /// # Errors
    ///
    /// `RuntimeError::Stopped` if the runtime has ended.
    pub async fn connect(&self, server: &str, channel: &str) -> Result<(), RuntimeError> {
        self.submit(ClientEvent::Connect(ConnectRequest::new(server, channel))).await
    }

    /// Submit a line of user input.
    ///
    /// # Errors
    ///
    /// `RuntimeError::Stopped` if the runtime has ended.
    pub async fn input(&self, line: impl Into<String>) -> Result<(), RuntimeError> {
        self.submit(ClientEvent::Input(line.into())).await
    }

    /// Switch to another buffer.
    ///
    /// # Errors
    ///
    /// `RuntimeError::Stopped` if the runtime has ended.
    pub async fn select_buffer(&self, name: impl Into<String>) -> Result<(), RuntimeError> {
        self.submit(ClientEvent::SelectBuffer(name.into())).await
    }

    /// Disconnect and suppress automatic reconnection.
    ///
    /// # Errors
    ///
    /// `RuntimeError::Stopped` if the runtime has ended.
    pub async fn disconnect(&self, reason: Option<String>) -> Result<(), RuntimeError> {
        self.submit(ClientEvent::Disconnect { reason }).await
    }

    /// Latest view snapshot.
    pub fn view(&self) -> ClientView {
        self.view.borrow().clone()
    }

    /// Receiver notified after every change.
    pub fn subscribe(&self) -> watch::Receiver<ClientView> {
        self.view.clone()
    }
}
