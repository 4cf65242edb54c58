//! Driver over the WebSocket relay transport.

use umbra_app::Driver;
use umbra_client::{
    TransportEvent,
    transport::{self, ConnectedTransport, TransportConfig, TransportError},
};

/// [`Driver`] that owns at most one [`ConnectedTransport`].
pub struct RelayDriver {
    config: TransportConfig,
    transport: Option<ConnectedTransport>,
}

impl RelayDriver {
    /// Driver for the relay described by `config`. Nothing is opened yet.
    pub fn new(config: TransportConfig) -> Self {
        Self { config, transport: None }
    }
}

impl Driver for RelayDriver {
    type Error = TransportError;

    async fn open(&mut self, server: &str) -> Result<(), Self::Error> {
        // Dropping the old handle stops its task, so stale events never arrive.
        self.transport = None;
        self.transport = Some(transport::connect(&self.config, server).await?);
        Ok(())
    }

    async fn send(&mut self, frame: String) -> Result<(), Self::Error> {
        match &self.transport {
            Some(transport) => transport.send(frame).await,
            None => Err(TransportError::Closed),
        }
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        let event = self.transport.as_mut()?.recv().await;
        if !matches!(event, Some(TransportEvent::Frame(_))) {
            self.transport = None;
        }
        event
    }

    fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.stop();
        }
    }
}
