//! # Fiverow Core
//!
//! Secure session layer and peer-to-peer turn-state protocol for a
//! two-player five-in-a-row game. Two independent processes, one in the
//! listener role and one in the connector role, agree on connection
//! status, identity, and game state purely through message exchange.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       FIVEROW CORE                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  net/            - Secure session layer                     │
//! │  ├── transport.rs- Point-to-point WebSocket channel          │
//! │  ├── secure.rs   - RSA key exchange, XChaCha20-Poly1305      │
//! │  ├── protocol.rs - Closed wire-message union                 │
//! │  └── bus.rs      - Framing, hello liveness, header waits     │
//! │                                                              │
//! │  game/           - Replicated turn state machine             │
//! │  ├── board.rs    - Grid model, win/tie detection             │
//! │  ├── player.rs   - Identity, turn flag, score                │
//! │  ├── events.rs   - Presentation events                       │
//! │  └── session.rs  - Setup sequence and move protocol          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Replication Guarantee
//!
//! There is no arbiter: each peer validates every move, its own and the
//! opponent's, through the identical acceptance path. Given the ordered,
//! lossless channel the transport provides, the two board copies can
//! never diverge.
//!
//! Rendering, widgets, audio, configuration files, and process startup
//! are external collaborators: the core consumes a [`GameConfig`],
//! accepts clicked cells via [`game::session::GameSession::submit_move`],
//! and reports everything displayable as [`game::events::SessionEvent`]s.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod game;
pub mod net;

// Re-export commonly used types
pub use config::GameConfig;
pub use error::{Error, Result};
pub use game::{Axis, Board, Cell, GameSession, GameStatus, Player, SessionEvent, SetupPhase};
pub use net::{Header, MessageBus, ReceiveTimeout, Role, Transport, WireMessage};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
