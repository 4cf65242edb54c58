//! WebSocket transport to the relay.
//!
//! Provides [`ConnectedTransport`], which owns one WebSocket connection and
//! exchanges text frames over channels. This is a thin layer: every frame is
//! handed to the Sans-IO [`crate::Client`] unchanged.
//!
//! TLS uses rustls. When a [`CertificatePin`] is configured and the relay
//! host equals the pinned host, the server certificate must match the pinned
//! SHA-256 fingerprint; every other host gets standard WebPKI validation.
//!
//! The bearer credential travels in the `Authorization` header and is
//! redacted from every error this module produces.

use std::{fmt, sync::Arc};

use futures_util::{SinkExt, StreamExt};
use rustls::{
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
    client::{
        WebPkiServerVerifier,
        danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    },
    crypto::CryptoProvider,
    pki_types::{CertificateDer, ServerName, UnixTime},
};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config,
    tungstenite::{
        Message,
        client::IntoClientRequest,
        http::{HeaderValue, header::AUTHORIZATION},
    },
};
use tracing::{debug, info, warn};

use crate::event::TransportEvent;

/// Placeholder substituted for the credential in error text.
const REDACTED: &str = "<redacted>";

/// Capacity of the frame channels.
const CHANNEL_CAPACITY: usize = 64;

/// Transport errors. Messages never contain the credential.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Relay URL or server identifier is unusable.
    #[error("invalid relay address: {0}")]
    InvalidUrl(String),

    /// Certificate pin is malformed.
    #[error("invalid certificate pin: {0}")]
    InvalidPin(String),

    /// Credential cannot be sent as a header value.
    #[error("credential contains characters not allowed in a header")]
    InvalidCredential,

    /// TLS configuration failed.
    #[error("tls error: {0}")]
    Tls(String),

    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The connection task is gone.
    #[error("transport closed")]
    Closed,
}

/// Pinned relay certificate.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificatePin {
    /// Host the pin applies to.
    pub host: String,
    /// SHA-256 of the DER-encoded end-entity certificate.
    pub sha256: [u8; 32],
}

impl CertificatePin {
    /// Parse a hex fingerprint, with or without `:` separators.
    ///
    /// # Errors
    ///
    /// `TransportError::InvalidPin` if the text is not 32 bytes of hex.
    pub fn parse(host: impl Into<String>, fingerprint: &str) -> Result<Self, TransportError> {
        let cleaned: String = fingerprint.chars().filter(|c| *c != ':' && !c.is_whitespace()).collect();
        let bytes = hex::decode(&cleaned).map_err(|e| TransportError::InvalidPin(e.to_string()))?;
        let sha256 = <[u8; 32]>::try_from(bytes.as_slice())
            .map_err(|_| TransportError::InvalidPin(format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(Self { host: host.into(), sha256 })
    }

    /// Whether the pin governs `server_name`.
    pub fn applies_to(&self, server_name: &ServerName<'_>) -> bool {
        server_name.to_str().eq_ignore_ascii_case(&self.host)
    }
}

impl fmt::Debug for CertificatePin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificatePin")
            .field("host", &self.host)
            .field("sha256", &hex::encode(self.sha256))
            .finish()
    }
}

/// Relay connection settings.
#[derive(Clone)]
pub struct TransportConfig {
    /// `wss://` (or `ws://`) URL of the relay.
    pub bridge_url: String,
    /// Bearer credential from the authentication service.
    pub credential: String,
    /// Optional certificate pin for the relay host.
    pub pin: Option<CertificatePin>,
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("bridge_url", &self.bridge_url)
            .field("credential", &REDACTED)
            .field("pin", &self.pin)
            .finish()
    }
}

impl TransportConfig {
    /// Remove the credential from `text`.
    pub fn redact(&self, text: &str) -> String {
        if self.credential.is_empty() { text.to_string() } else { text.replace(&self.credential, REDACTED) }
    }

    /// Relay URL for `server`.
    ///
    /// # Errors
    ///
    /// `TransportError::InvalidUrl` for an empty or unusual server identifier.
    pub fn url_for(&self, server: &str) -> Result<String, TransportError> {
        let valid = !server.is_empty()
            && server.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !valid {
            return Err(TransportError::InvalidUrl(format!("bad server identifier {server:?}")));
        }
        let separator = if self.bridge_url.contains('?') { '&' } else { '?' };
        Ok(format!("{}{separator}server={server}", self.bridge_url))
    }
}

/// Handle to one open relay connection.
///
/// Dropping the handle stops the connection task. After `Closed` or
/// `Errored` the handle is spent; reconnecting always builds a new one.
pub struct ConnectedTransport {
    to_relay: mpsc::Sender<String>,
    events: mpsc::Receiver<TransportEvent>,
    abort_handle: tokio::task::AbortHandle,
}

impl ConnectedTransport {
    /// Queue one frame.
    ///
    /// # Errors
    ///
    /// `TransportError::Closed` if the connection task has ended.
    pub async fn send(&self, frame: String) -> Result<(), TransportError> {
        self.to_relay.send(frame).await.map_err(|_| TransportError::Closed)
    }

    /// Next transport event. `None` once the connection task is gone.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Stop the connection.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

impl Drop for ConnectedTransport {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}

/// Open a connection to the relay for `server`.
///
/// # Errors
///
/// Any [`TransportError`]; the credential is redacted from the text.
pub async fn connect(config: &TransportConfig, server: &str) -> Result<ConnectedTransport, TransportError> {
    let url = config.url_for(server)?;
    let mut request =
        url.as_str().into_client_request().map_err(|e| TransportError::InvalidUrl(config.redact(&e.to_string())))?;
    let bearer = HeaderValue::from_str(&format!("Bearer {}", config.credential))
        .map_err(|_| TransportError::InvalidCredential)?;
    request.headers_mut().insert(AUTHORIZATION, bearer);

    let connector = Connector::Rustls(Arc::new(tls_config(config.pin.clone())?));
    let (stream, _response) = connect_async_tls_with_config(request, None, false, Some(connector))
        .await
        .map_err(|e| TransportError::Connection(config.redact(&e.to_string())))?;
    info!(%server, "relay connection open");

    let (to_relay_tx, to_relay_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let handle = tokio::spawn(run_connection(stream, to_relay_rx, events_tx, config.clone()));

    Ok(ConnectedTransport { to_relay: to_relay_tx, events: events_rx, abort_handle: handle.abort_handle() })
}

/// Build the rustls client configuration.
///
/// # Errors
///
/// `TransportError::Tls` if the provider or verifier cannot be built.
pub fn tls_config(pin: Option<CertificatePin>) -> Result<ClientConfig, TransportError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let roots = Arc::new(RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()));
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| TransportError::Tls(e.to_string()))?;

    let config = match pin {
        Some(pin) => {
            let webpki = WebPkiServerVerifier::builder_with_provider(roots, provider.clone())
                .build()
                .map_err(|e| TransportError::Tls(e.to_string()))?;
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(PinnedCertVerifier { pin, webpki, provider }))
                .with_no_client_auth()
        },
        None => builder.with_root_certificates(roots).with_no_client_auth(),
    };
    Ok(config)
}

/// Bridge between the channels and the WebSocket.
async fn run_connection(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut to_relay: mpsc::Receiver<String>,
    events: mpsc::Sender<TransportEvent>,
    config: TransportConfig,
) {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            outbound = to_relay.recv() => match outbound {
                Some(frame) => {
                    if let Err(e) = write.send(Message::text(frame)).await {
                        let message = config.redact(&e.to_string());
                        let _ = events.send(TransportEvent::Errored { message }).await;
                        return;
                    }
                },
                None => {
                    debug!("transport handle dropped, closing");
                    let _ = write.close().await;
                    return;
                },
            },
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if events.send(TransportEvent::Frame(text.to_string())).await.is_err() {
                        return;
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                    let _ = events.send(TransportEvent::Closed { reason }).await;
                    return;
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    let message = config.redact(&e.to_string());
                    warn!(%message, "relay connection failed");
                    let _ = events.send(TransportEvent::Errored { message }).await;
                    return;
                },
                None => {
                    let _ = events.send(TransportEvent::Closed { reason: None }).await;
                    return;
                },
            },
        }
    }
}

/// Certificate verifier applying the fingerprint pin to the pinned host and
/// WebPKI validation to every other host.
#[derive(Debug)]
struct PinnedCertVerifier {
    pin: CertificatePin,
    webpki: Arc<WebPkiServerVerifier>,
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if !self.pin.applies_to(server_name) {
            return self.webpki.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now);
        }

        let fingerprint: [u8; 32] = Sha256::digest(end_entity.as_ref()).into();
        if fingerprint == self.pin.sha256 {
            Ok(ServerCertVerified::assertion())
        } else {
            warn!(host = %self.pin.host, "certificate fingerprint mismatch");
            Err(rustls::Error::General("certificate fingerprint mismatch".into()))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FINGERPRINT: &str = "AB:CD:EF:01:23:45:67:89:AB:CD:EF:01:23:45:67:89:AB:CD:EF:01:23:45:67:89:AB:CD:EF:01:23:45:67:89";

    fn config() -> TransportConfig {
        TransportConfig {
            bridge_url: "wss://relay.example.net/irc".into(),
            credential: "s3cret-token".into(),
            pin: None,
        }
    }

    #[test]
    fn pin_parses_with_and_without_separators() {
        let with = CertificatePin::parse("relay.example.net", FINGERPRINT).unwrap();
        let without = CertificatePin::parse("relay.example.net", &FINGERPRINT.replace(':', "")).unwrap();
        assert_eq!(with, without);
        assert_eq!(with.sha256[0], 0xAB);

        assert!(matches!(CertificatePin::parse("h", "abcd"), Err(TransportError::InvalidPin(_))));
        assert!(matches!(CertificatePin::parse("h", "zz"), Err(TransportError::InvalidPin(_))));
    }

    #[test]
    fn pin_applies_only_to_its_host() {
        let pin = CertificatePin::parse("relay.example.net", FINGERPRINT).unwrap();
        let pinned = ServerName::try_from("Relay.Example.NET").unwrap();
        let other = ServerName::try_from("cdn.example.net").unwrap();
        assert!(pin.applies_to(&pinned));
        assert!(!pin.applies_to(&other));
    }

    #[test]
    fn credential_is_redacted() {
        let config = config();
        let redacted = config.redact("401 for Bearer s3cret-token at relay");
        assert!(!redacted.contains("s3cret-token"));
        assert!(redacted.contains(REDACTED));
        assert!(!format!("{config:?}").contains("s3cret-token"));
    }

    #[test]
    fn url_carries_server_identifier() {
        let mut config = config();
        assert_eq!(config.url_for("libera").unwrap(), "wss://relay.example.net/irc?server=libera");

        config.bridge_url = "wss://relay.example.net/irc?v=2".into();
        assert_eq!(config.url_for("oftc.net").unwrap(), "wss://relay.example.net/irc?v=2&server=oftc.net");

        assert!(matches!(config.url_for(""), Err(TransportError::InvalidUrl(_))));
        assert!(matches!(config.url_for("a b&c"), Err(TransportError::InvalidUrl(_))));
    }

    #[test]
    fn tls_config_builds_with_and_without_pin() {
        assert!(tls_config(None).is_ok());
        let pin = CertificatePin::parse("relay.example.net", FINGERPRINT).unwrap();
        assert!(tls_config(Some(pin)).is_ok());
    }
}
