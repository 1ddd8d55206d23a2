//! Game Logic Module
//!
//! The replicated board game: model, identity, and the session state
//! machine that keeps two peers in agreement.
//!
//! ## Module Structure
//!
//! - `board`: Grid model, win and tie detection
//! - `player`: Player identity, turn flag, score
//! - `events`: Presentation events for the embedding frame loop
//! - `session`: Setup sequence and the turn-state protocol

pub mod board;
pub mod events;
pub mod player;
pub mod session;

// Re-export key types
pub use board::{Axis, Board, Cell, GameStatus, PlaceError};
pub use events::SessionEvent;
pub use player::Player;
pub use session::{GameSession, SetupPhase};
