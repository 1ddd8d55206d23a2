//! Session Events
//!
//! The presentation surface of the core: everything the embedding frame
//! loop needs to show is reported as an event. The session queues them
//! and the caller drains the queue once per frame; the core never draws,
//! plays audio, or blocks on the display side.

use serde::{Deserialize, Serialize};

use crate::game::board::{Cell, GameStatus};
use crate::game::player::Player;

/// Events emitted by the session for display purposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// The peer answered the liveness handshake.
    Connected,

    /// The symmetric cipher is established end-to-end.
    SecureChannelReady,

    /// The connector adopted the listener's board rules.
    BoardRulesApplied {
        /// Grid columns.
        width: u16,
        /// Grid rows.
        height: u16,
        /// Required run length.
        win_length: u16,
    },

    /// The opponent's record arrived or changed (name, turn, score).
    OpponentKnown {
        /// The opponent as last announced.
        player: Player,
    },

    /// The first game of the session started.
    GameStarted,

    /// A placement was accepted on the local board.
    MoveApplied {
        /// The placed cell.
        cell: Cell,
        /// Owner of the placement.
        player: u8,
    },

    /// A local placement targeted an occupied cell. Reported locally
    /// only; nothing was sent to the peer.
    MoveRejected {
        /// The rejected target.
        cell: Cell,
    },

    /// The game finished.
    GameOver {
        /// Win or tie.
        status: GameStatus,
    },

    /// The peer asked for a rematch; confirm with
    /// [`crate::game::session::GameSession::request_rematch`].
    RematchRequested,

    /// Both sides agreed; the board was reset and play resumed.
    RematchStarted,

    /// An echo probe we sent came back.
    EchoReturned {
        /// The probe payload.
        payload: String,
    },
}
