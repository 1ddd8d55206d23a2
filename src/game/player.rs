//! Player Identity
//!
//! The record each side keeps for itself and announces over `my_player`.
//! Id and name are fixed at creation; the turn flag alternates with every
//! accepted move and the score carries across rematches.

use serde::{Deserialize, Serialize};

/// One of the two players. Id 0 belongs to the listener, id 1 to the
/// connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Player id, 0 or 1.
    pub id: u8,
    /// Display name.
    pub name: String,
    /// Whether this player moves next. Exactly one of the two players
    /// holds the turn during an active game.
    pub turn: bool,
    /// Games won in this session.
    pub score: u32,
}

impl Player {
    /// Create a player.
    pub fn new(id: u8, name: impl Into<String>, turn: bool) -> Self {
        Self {
            id,
            name: name.into(),
            turn,
            score: 0,
        }
    }

    /// Credit a won game.
    pub fn record_win(&mut self) {
        self.score += 1;
    }
}
