//! Error Taxonomy
//!
//! Fatal conditions abort the setup phase; steady-state decode problems are
//! logged and dropped by the message bus and never surface here. Benign
//! "nothing received yet" is `Ok(None)`, not an error.

use std::time::Duration;

use thiserror::Error;

use crate::net::protocol::Header;
use crate::net::transport::Role;

/// Fatal session errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Nothing received within the bound.
    #[error("Receive timed out after {0:?}")]
    Timeout(Duration),

    /// The expected header never arrived within the retry budget.
    #[error("No '{header}' message within {attempts} attempts")]
    HandshakeExhausted {
        /// Header that was waited for.
        header: Header,
        /// Retry budget that was spent.
        attempts: u32,
    },

    /// The listener could not recover the symmetric key with its private
    /// key. The secure channel never becomes ready.
    #[error("Cannot decrypt symmetric key with private key")]
    AsymmetricDecryption,

    /// Key size outside the accepted range.
    #[error("Invalid RSA key size: {0} bits (need >= 1024 and a multiple of 256)")]
    InvalidKeySize(usize),

    /// A role-specific operation was invoked on the wrong role.
    #[error("Operation not valid in {0:?} role")]
    InvalidRole(Role),

    /// Encryption was requested before the secure channel was established.
    #[error("Secure channel is not ready")]
    ChannelNotReady,

    /// Symmetric encryption failed.
    #[error("Symmetric encryption failed")]
    Encryption,

    /// A handshake payload could not be decoded.
    #[error("Malformed '{0}' payload")]
    MalformedPayload(Header),

    /// A setup wait returned a message of the wrong kind.
    #[error("Expected '{expected}' but handled '{got}'")]
    UnexpectedMessage {
        /// Header that was expected.
        expected: Header,
        /// Header that was actually seen.
        got: Header,
    },

    /// Connection establishment failed.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// RSA key generation or encryption failure.
    #[error("RSA failure: {0}")]
    Rsa(#[from] rsa::Error),

    /// Public key encoding failure.
    #[error("Key encoding failed: {0}")]
    KeyEncoding(String),

    /// Underlying WebSocket failure.
    #[error("Transport error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Underlying socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire serialization failure on the send path.
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
