//! Protocol Messages
//!
//! Wire format for peer-to-peer communication. Every frame is one
//! serialized [`WireMessage`]; the `header` tag drives dispatch. The union
//! is closed: an unknown header fails deserialization instead of being
//! silently ignored. Messages are serialized as JSON for debugging ease
//! (internally tagged enums cannot travel as bincode), with binary blobs
//! carried as hex strings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::game::board::Cell;
use crate::game::player::Player;

/// Greeting carried by `hello`; the answer carries it reversed.
pub const HELLO_GREETING: &str = "hello_fiverow_peer";

// =============================================================================
// HEADERS
// =============================================================================

/// Dispatch tag of a wire message.
///
/// The vocabulary is fixed; [`WireMessage`] variants map onto it 1:1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Header {
    /// Liveness probe sent by the connector until answered.
    Hello,
    /// Immediate answer to a `hello`.
    HelloAnswer,
    /// Listener's RSA public key.
    Pubkey,
    /// Connector's symmetric key, RSA-encrypted to the listener.
    EncryptedSymmKey,
    /// Listener's full configuration.
    ServerConfig,
    /// Request for the receiver's player record.
    GetPlayer,
    /// The sender's player record.
    MyPlayer,
    /// A board placement.
    Move,
    /// Game-flow request (`new_game`, `next_player`, `start_game`).
    PartnerRequest,
    /// Diagnostic loop-back probe originated by the listener.
    EchoListener,
    /// Diagnostic loop-back probe originated by the connector.
    EchoConnector,
}

impl Header {
    /// The on-wire tag string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Header::Hello => "hello",
            Header::HelloAnswer => "hello_answer",
            Header::Pubkey => "pubkey",
            Header::EncryptedSymmKey => "encrypted_symm_key",
            Header::ServerConfig => "server_config",
            Header::GetPlayer => "get_player",
            Header::MyPlayer => "my_player",
            Header::Move => "move",
            Header::PartnerRequest => "partner_request",
            Header::EchoListener => "echo_listener",
            Header::EchoConnector => "echo_connector",
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Game-flow requests carried under the `partner_request` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerRequestKind {
    /// Ask the peer for a rematch after a finished game.
    NewGame,
    /// Commit the rematch: both sides reset their boards.
    NextPlayer,
    /// Mark the session in progress at the very first game start.
    StartGame,
}

// =============================================================================
// WIRE MESSAGES
// =============================================================================

/// Every message that may appear on the wire.
///
/// Internally tagged by `header`; dispatch over the union is an exhaustive
/// `match` wherever it is consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "header", rename_all = "snake_case")]
pub enum WireMessage {
    /// Liveness probe. Answered immediately by whichever side receives it.
    Hello {
        /// Fixed greeting, see [`HELLO_GREETING`].
        token: String,
    },

    /// Answer to a `hello`; carries the greeting reversed.
    HelloAnswer {
        /// Reversed greeting.
        token: String,
    },

    /// Listener's RSA public key (PKCS#1 DER, hex encoded).
    Pubkey {
        /// Hex-encoded DER bytes.
        der_hex: String,
    },

    /// Session key, RSA-encrypted with the listener's public key.
    EncryptedSymmKey {
        /// Hex-encoded RSA ciphertext.
        ciphertext_hex: String,
    },

    /// The listener's full configuration. The connector adopts only the
    /// board-shape subset from it.
    ServerConfig {
        /// Listener-side configuration.
        config: GameConfig,
    },

    /// Request for the receiver's player record. Payload intentionally
    /// empty; any side may send it.
    GetPlayer,

    /// The sender's own player record. Also re-sent after a turn-conflict
    /// resolution and after a score change.
    MyPlayer {
        /// Sender's player.
        player: Player,
    },

    /// A placement made by the sender's player.
    Move {
        /// Target cell in grid coordinates.
        cell: Cell,
    },

    /// Game-flow request.
    PartnerRequest {
        /// Which request.
        request: PartnerRequestKind,
    },

    /// Loop-back probe originated by the listener. The connector echoes it
    /// back verbatim; the listener treats a received copy as the returned
    /// probe.
    EchoListener {
        /// Opaque probe payload.
        payload: String,
    },

    /// Loop-back probe originated by the connector; mirror of
    /// [`WireMessage::EchoListener`].
    EchoConnector {
        /// Opaque probe payload.
        payload: String,
    },
}

impl WireMessage {
    /// Dispatch tag of this message.
    pub const fn header(&self) -> Header {
        match self {
            WireMessage::Hello { .. } => Header::Hello,
            WireMessage::HelloAnswer { .. } => Header::HelloAnswer,
            WireMessage::Pubkey { .. } => Header::Pubkey,
            WireMessage::EncryptedSymmKey { .. } => Header::EncryptedSymmKey,
            WireMessage::ServerConfig { .. } => Header::ServerConfig,
            WireMessage::GetPlayer => Header::GetPlayer,
            WireMessage::MyPlayer { .. } => Header::MyPlayer,
            WireMessage::Move { .. } => Header::Move,
            WireMessage::PartnerRequest { .. } => Header::PartnerRequest,
            WireMessage::EchoListener { .. } => Header::EchoListener,
            WireMessage::EchoConnector { .. } => Header::EchoConnector,
        }
    }

    /// A fresh `hello` probe.
    pub fn hello() -> Self {
        WireMessage::Hello {
            token: HELLO_GREETING.to_string(),
        }
    }

    /// The answer to a `hello`: the greeting reversed.
    pub fn hello_answer() -> Self {
        WireMessage::HelloAnswer {
            token: HELLO_GREETING.chars().rev().collect(),
        }
    }
}
