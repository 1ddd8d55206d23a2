//! Message Bus
//!
//! Frames [`WireMessage`]s over the transport: JSON on the way out,
//! sealed by the secure channel once it is ready. Also owns the two
//! setup-phase rituals (the hello liveness exchange and the key
//! exchange), including the drop-on-mismatch header wait both rely on.
//! After setup, undecodable or unauthenticated frames are logged and
//! dropped; the session keeps running.

use std::thread;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::error::{Error, Result};
use crate::net::protocol::{Header, WireMessage};
use crate::net::secure::SecureChannel;
use crate::net::transport::{ReceiveTimeout, Role, Transport};

/// Interval between repeated `hello` probes from the connector.
const HELLO_INTERVAL: Duration = Duration::from_millis(500);

/// Poll interval inside the hello loop.
const HELLO_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Mismatched messages tolerated by a setup-phase header wait.
pub const MAX_DROPPED_MESSAGES: u32 = 200;

/// Linger applied when a setup phase gives up and tears the channel down.
const TEARDOWN_LINGER: Duration = Duration::from_millis(100);

/// Tagged-message layer over one transport channel.
#[derive(Debug)]
pub struct MessageBus {
    transport: Transport,
    secure: SecureChannel,
}

impl MessageBus {
    /// Wrap a connected transport; the channel starts unkeyed.
    pub fn new(transport: Transport) -> Self {
        let secure = SecureChannel::new(transport.role());
        Self { transport, secure }
    }

    /// Role of the underlying transport.
    pub fn role(&self) -> Role {
        self.transport.role()
    }

    /// Whether frames are sealed end-to-end yet.
    pub fn is_encrypted(&self) -> bool {
        self.secure.is_ready()
    }

    /// Serialize, seal once the channel is ready, and hand to the
    /// transport. Before the key exchange completes only the hello and
    /// key-exchange messages travel, in the clear.
    pub fn send(&mut self, msg: &WireMessage) -> Result<()> {
        let plain = serde_json::to_vec(msg)?;
        let frame = match self.secure.cipher() {
            Some(cipher) => cipher.encrypt(&plain)?,
            None => {
                debug!("sending '{}' in the clear (channel unkeyed)", msg.header());
                plain
            }
        };
        debug!("sending '{}'", msg.header());
        self.transport.send(frame)
    }

    /// Inverse of [`MessageBus::send`].
    ///
    /// Frames that fail authentication or deserialization are logged and
    /// swallowed as `Ok(None)`; they must never crash the loop.
    pub fn receive(&mut self, timeout: ReceiveTimeout) -> Result<Option<WireMessage>> {
        let Some(frame) = self.transport.receive(timeout)? else {
            return Ok(None);
        };

        let plain = match self.secure.cipher() {
            Some(cipher) => match cipher.decrypt(&frame) {
                Ok(plain) => plain,
                Err(_) => {
                    warn!("dropping undecryptable frame ({} bytes)", frame.len());
                    return Ok(None);
                }
            },
            None => frame,
        };

        match serde_json::from_slice::<WireMessage>(&plain) {
            Ok(msg) => {
                debug!("received '{}'", msg.header());
                Ok(Some(msg))
            }
            Err(e) => {
                warn!("dropping malformed message: {}", e);
                Ok(None)
            }
        }
    }

    /// Setup-phase wait: receive until a message with `expected` arrives,
    /// discarding anything else.
    ///
    /// Each received frame, matching or not, decodable or not, spends
    /// one attempt. A receive timeout aborts immediately; an exhausted
    /// budget fails with [`Error::HandshakeExhausted`]. Only used before
    /// the session is ready, where no application messages exist yet.
    pub fn wait_for_header(
        &mut self,
        expected: Header,
        max_attempts: u32,
        per_attempt: Duration,
    ) -> Result<WireMessage> {
        for _ in 0..max_attempts {
            match self.receive(ReceiveTimeout::Bounded(per_attempt))? {
                Some(msg) if msg.header() == expected => return Ok(msg),
                Some(msg) => {
                    debug!("discarding '{}' while waiting for '{}'", msg.header(), expected);
                }
                None => {}
            }
        }
        Err(Error::HandshakeExhausted {
            header: expected,
            attempts: max_attempts,
        })
    }

    /// Liveness handshake bounding the connection phase.
    ///
    /// The connector re-sends `hello` every half second; whichever side
    /// receives a `hello` answers it immediately, and either the answer or
    /// an inbound `hello` counts as contact. On deadline expiry the queued
    /// outbound data is dropped and the phase fails.
    pub fn exchange_hello(&mut self, deadline: Duration) -> Result<()> {
        let expiry = Instant::now() + deadline;
        let mut last_hello: Option<Instant> = None;

        loop {
            if self.role() == Role::Connector
                && last_hello.map_or(true, |t| t.elapsed() >= HELLO_INTERVAL)
            {
                self.send(&WireMessage::hello())?;
                last_hello = Some(Instant::now());
            }

            match self.receive(ReceiveTimeout::Immediate)? {
                Some(WireMessage::Hello { .. }) => {
                    self.send(&WireMessage::hello_answer())?;
                    info!("peer said hello");
                    return Ok(());
                }
                Some(WireMessage::HelloAnswer { .. }) => {
                    info!("peer answered hello");
                    return Ok(());
                }
                Some(msg) => {
                    debug!("ignoring '{}' during hello exchange", msg.header());
                }
                None => {}
            }

            if Instant::now() >= expiry {
                self.transport.close_gracefully(TEARDOWN_LINGER);
                return Err(Error::Timeout(deadline));
            }
            thread::sleep(HELLO_POLL_INTERVAL);
        }
    }

    /// Role-dispatched key exchange. Fatal on any failure; the session
    /// must not continue unkeyed.
    pub fn establish_encryption(&mut self, config: &GameConfig) -> Result<()> {
        match self.role() {
            Role::Listener => self.listener_key_exchange(config),
            Role::Connector => self.connector_key_exchange(config),
        }
    }

    fn listener_key_exchange(&mut self, config: &GameConfig) -> Result<()> {
        let der = self.secure.generate_keypair(config.key_bits)?;
        self.send(&WireMessage::Pubkey {
            der_hex: hex::encode(&der),
        })?;

        let msg = self.wait_for_header(
            Header::EncryptedSymmKey,
            MAX_DROPPED_MESSAGES,
            config.handshake_timeout,
        )?;
        let WireMessage::EncryptedSymmKey { ciphertext_hex } = msg else {
            return Err(Error::UnexpectedMessage {
                expected: Header::EncryptedSymmKey,
                got: msg.header(),
            });
        };
        let ciphertext = hex::decode(ciphertext_hex)
            .map_err(|_| Error::MalformedPayload(Header::EncryptedSymmKey))?;

        self.secure.install_symmetric_key(&ciphertext)
    }

    fn connector_key_exchange(&mut self, config: &GameConfig) -> Result<()> {
        let msg = self.wait_for_header(
            Header::Pubkey,
            MAX_DROPPED_MESSAGES,
            config.handshake_timeout,
        )?;
        let WireMessage::Pubkey { der_hex } = msg else {
            return Err(Error::UnexpectedMessage {
                expected: Header::Pubkey,
                got: msg.header(),
            });
        };
        let der = hex::decode(der_hex).map_err(|_| Error::MalformedPayload(Header::Pubkey))?;
        debug!(
            "received peer public key (fingerprint {})",
            &hex::encode(Sha256::digest(&der))[..8]
        );

        let ciphertext = self.secure.generate_symmetric_key(&der)?;
        self.send(&WireMessage::EncryptedSymmKey {
            ciphertext_hex: hex::encode(ciphertext),
        })
    }

    /// Tear the channel down, dropping whatever is still queued after the
    /// linger.
    pub fn close(&mut self, linger: Duration) {
        self.transport.close_gracefully(linger);
    }
}
