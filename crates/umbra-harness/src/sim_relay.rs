//! Simulated relay.
//!
//! Plays the relay and the IRC network behind it: issues session keys, seals
//! server lines into encrypted envelopes and opens whatever the client sends.
//! Lines sent by the client are recorded in order for assertions.

use thiserror::Error;
use tracing::trace;
use umbra_core::Environment;
use umbra_crypto::{CipherError, CipherSession, IV_SIZE, KEY_SIZE, SessionKeys};
use umbra_proto::{Envelope, ProtocolError, RelayError, RelayErrorCode, split_lines};

/// Errors from handling client frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimRelayError {
    /// Frame did not decode.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Ciphertext did not open with the session keys.
    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// Client sent IRC data without encryption.
    #[error("client sent plaintext IRC data")]
    Plaintext,

    /// Client sent a control envelope only the relay may send.
    #[error("unexpected envelope from client: {0:?}")]
    Unexpected(Envelope),
}

/// Relay stand-in holding one session's keys.
pub struct SimRelay {
    keys: SessionKeys,
    cipher: CipherSession,
    lines: Vec<String>,
    acks: usize,
}

impl SimRelay {
    /// Relay with keys drawn from the environment's RNG.
    pub fn new<E: Environment>(env: &E) -> Self {
        let mut key = [0u8; KEY_SIZE];
        let mut iv = [0u8; IV_SIZE];
        env.random_bytes(&mut key);
        env.random_bytes(&mut iv);
        Self::with_keys(SessionKeys::new(key, iv))
    }

    /// Relay with fixed keys.
    pub fn with_keys(keys: SessionKeys) -> Self {
        let cipher = CipherSession::new(keys.clone());
        Self { keys, cipher, lines: Vec::new(), acks: 0 }
    }

    /// The `encryption_init` frame that starts a session.
    pub fn init_frame(&self) -> String {
        let (key, iv) = self.keys.to_base64();
        encode(&Envelope::EncryptionInit { key, iv })
    }

    /// Seal server lines into one encrypted frame.
    pub fn server_frame(&self, lines: &[&str]) -> String {
        let payload = lines.join("\r\n");
        encode(&Envelope::encrypted(self.cipher.encrypt(&payload)))
    }

    /// An encrypted frame whose ciphertext fails to open.
    pub fn garbled_frame(&self) -> String {
        encode(&Envelope::encrypted("bm90IGNpcGhlcnRleHQ="))
    }

    /// IRC data sent without encryption.
    pub fn plaintext_frame(&self, line: &str) -> String {
        encode(&Envelope::IrcMessage { encrypted: false, data: line.to_string() })
    }

    /// A relay error frame.
    pub fn error_frame(&self, code: &str, message: &str) -> String {
        encode(&Envelope::Error(RelayError {
            error: message.to_string(),
            code: RelayErrorCode::from_code(code),
            action: None,
        }))
    }

    /// Handle one frame from the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame does not decode, is plaintext data, or
    /// does not open with this session's keys.
    pub fn accept(&mut self, frame: &str) -> Result<(), SimRelayError> {
        match Envelope::decode(frame)? {
            Envelope::EncryptionAck => {
                self.acks += 1;
                Ok(())
            },
            Envelope::IrcMessage { encrypted: true, data } => {
                let payload = self.cipher.decrypt(&data)?;
                for line in split_lines(&payload) {
                    trace!(line, "client line");
                    self.lines.push(line.to_string());
                }
                Ok(())
            },
            Envelope::IrcMessage { encrypted: false, .. } => Err(SimRelayError::Plaintext),
            other => Err(SimRelayError::Unexpected(other)),
        }
    }

    /// Handle a batch of client frames.
    ///
    /// # Errors
    ///
    /// Stops at the first frame [`SimRelay::accept`] rejects.
    pub fn accept_all<I, S>(&mut self, frames: I) -> Result<(), SimRelayError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        frames.into_iter().try_for_each(|frame| self.accept(frame.as_ref()))
    }

    /// Lines received so far.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Drain the received lines.
    pub fn take_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }

    /// Number of `encryption_ack` envelopes received.
    pub fn acks(&self) -> usize {
        self.acks
    }

    /// Session keys.
    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }
}

fn encode(envelope: &Envelope) -> String {
    // Envelopes built here always serialize.
    envelope.encode().unwrap_or_default()
}
