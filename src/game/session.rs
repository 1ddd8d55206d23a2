//! Game Session
//!
//! The replicated turn-based state machine. Two independent processes
//! each run one `GameSession`; there is no arbiter between them. Both
//! sides validate every move through the identical local path, which is
//! what keeps the two board copies equal using nothing but message
//! exchange.
//!
//! Setup is sequential and bounded (hello, key exchange, config sync,
//! player exchange); play is poll-driven from the embedding frame loop
//! via [`GameSession::pump`].

use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::error::{Error, Result};
use crate::game::board::{Board, Cell, GameStatus, PlaceError};
use crate::game::events::SessionEvent;
use crate::game::player::Player;
use crate::net::bus::{MessageBus, MAX_DROPPED_MESSAGES};
use crate::net::protocol::{Header, PartnerRequestKind, WireMessage};
use crate::net::transport::{ReceiveTimeout, Role, Transport};

/// Linger applied to queued outbound data at shutdown.
const SHUTDOWN_LINGER: Duration = Duration::from_millis(100);

/// Pause between polls inside the bounded setup loops.
const SETUP_POLL_INTERVAL: Duration = Duration::from_millis(50);

// =============================================================================
// SETUP PHASES
// =============================================================================

/// Connection/setup progress of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupPhase {
    /// No contact with the peer yet.
    Disconnected,
    /// The liveness handshake completed.
    HelloExchanged,
    /// The symmetric key is established on both sides.
    KeyEstablished,
    /// Board rules are agreed (listener's are authoritative).
    ConfigSynced,
    /// Both player records are known.
    PlayersExchanged,
    /// Setup finished; play is driven by the frame loop.
    Ready,
}

// =============================================================================
// GAME SESSION
// =============================================================================

/// One end of a two-peer session: secure channel, player identities, and
/// the replicated board.
#[derive(Debug)]
pub struct GameSession {
    role: Role,
    config: GameConfig,
    bus: MessageBus,
    phase: SetupPhase,
    board: Board,
    local: Player,
    remote: Option<Player>,
    game_on: bool,
    status: Option<GameStatus>,
    /// This side asked for a rematch.
    rematch_confirmed: bool,
    /// The peer asked for a rematch.
    rematch_requested: bool,
    events: VecDeque<SessionEvent>,
}

impl GameSession {
    /// Listener role: bind the configured port, wait for a peer, and run
    /// the whole setup sequence. Blocks until the session is ready or a
    /// setup deadline fails it.
    pub fn host(config: GameConfig, player_name: &str) -> Result<Self> {
        let transport = Transport::listen(config.port, config.connection_timeout)?;
        Self::establish(MessageBus::new(transport), config, player_name)
    }

    /// Connector role: dial `host` on the configured port and run the
    /// whole setup sequence.
    pub fn join(host: &str, config: GameConfig, player_name: &str) -> Result<Self> {
        let transport = Transport::connect(host, config.port, config.connection_timeout)?;
        Self::establish(MessageBus::new(transport), config, player_name)
    }

    fn establish(bus: MessageBus, config: GameConfig, player_name: &str) -> Result<Self> {
        let role = bus.role();
        let name = if player_name.is_empty() {
            match role {
                Role::Listener => "listener's player".to_string(),
                Role::Connector => "connector's player".to_string(),
            }
        } else {
            player_name.to_string()
        };

        let mut session = Self {
            role,
            board: Board::new(config.grid_width, config.grid_height, config.win_length),
            local: Player::new(role.player_id(), name, config.first_move),
            config,
            bus,
            phase: SetupPhase::Disconnected,
            remote: None,
            game_on: false,
            status: None,
            rematch_confirmed: false,
            rematch_requested: false,
            events: VecDeque::new(),
        };

        session.bus.exchange_hello(session.config.connection_timeout)?;
        session.phase = SetupPhase::HelloExchanged;
        session.events.push_back(SessionEvent::Connected);

        session.bus.establish_encryption(&session.config)?;
        session.phase = SetupPhase::KeyEstablished;
        session.events.push_back(SessionEvent::SecureChannelReady);

        session.sync_config()?;
        session.phase = SetupPhase::ConfigSynced;

        session.exchange_players()?;
        session.phase = SetupPhase::PlayersExchanged;

        session.bus.send(&WireMessage::PartnerRequest {
            request: PartnerRequestKind::StartGame,
        })?;
        session.phase = SetupPhase::Ready;
        info!("session ready as {:?}", role);

        Ok(session)
    }

    // =========================================================================
    // SETUP PHASES
    // =========================================================================

    /// The listener announces its configuration; the connector adopts the
    /// board-shape subset and rebuilds its board accordingly.
    fn sync_config(&mut self) -> Result<()> {
        match self.role {
            Role::Listener => self.bus.send(&WireMessage::ServerConfig {
                config: self.config.clone(),
            }),
            Role::Connector => {
                let msg = self.bus.wait_for_header(
                    Header::ServerConfig,
                    MAX_DROPPED_MESSAGES,
                    self.config.handshake_timeout,
                )?;
                let WireMessage::ServerConfig { config: remote } = msg else {
                    return Err(Error::UnexpectedMessage {
                        expected: Header::ServerConfig,
                        got: msg.header(),
                    });
                };

                self.config.adopt_board_rules(&remote);
                self.board = Board::new(
                    self.config.grid_width,
                    self.config.grid_height,
                    self.config.win_length,
                );
                self.events.push_back(SessionEvent::BoardRulesApplied {
                    width: self.config.grid_width,
                    height: self.config.grid_height,
                    win_length: self.config.win_length,
                });
                Ok(())
            }
        }
    }

    /// Trade player records with the peer, then resolve a turn conflict.
    ///
    /// This phase must keep answering the peer's own `get_player` while
    /// waiting, so it dispatches everything through the regular handler
    /// instead of a drop-on-mismatch wait.
    fn exchange_players(&mut self) -> Result<()> {
        self.bus.send(&WireMessage::GetPlayer)?;

        let expiry = Instant::now() + self.config.handshake_timeout;
        while self.remote.is_none() {
            if Instant::now() >= expiry {
                return Err(Error::Timeout(self.config.handshake_timeout));
            }
            match self.bus.receive(ReceiveTimeout::Bounded(self.config.receive_timeout)) {
                Ok(Some(msg)) => self.handle_message(msg)?,
                Ok(None) => {}
                // The peer may still be in an earlier phase; ask again.
                Err(Error::Timeout(_)) => self.bus.send(&WireMessage::GetPlayer)?,
                Err(e) => return Err(e),
            }
        }

        if self.remote.as_ref().is_some_and(|r| r.turn == self.local.turn) {
            self.resolve_turn_conflict()?;
        }
        Ok(())
    }

    /// Both sides computed the same turn value for themselves. The
    /// listener flips its own flag and re-announces; the connector keeps
    /// its original assignment and waits for the corrected record.
    fn resolve_turn_conflict(&mut self) -> Result<()> {
        match self.role {
            Role::Listener => {
                self.local.turn = !self.local.turn;
                info!("turn conflict resolved in favor of the connector");
                self.bus.send(&WireMessage::MyPlayer {
                    player: self.local.clone(),
                })
            }
            Role::Connector => {
                let expiry = Instant::now() + self.config.handshake_timeout;
                while self.remote.as_ref().is_some_and(|r| r.turn == self.local.turn) {
                    if Instant::now() >= expiry {
                        return Err(Error::Timeout(self.config.handshake_timeout));
                    }
                    match self
                        .bus
                        .receive(ReceiveTimeout::Bounded(self.config.receive_timeout))
                    {
                        Ok(Some(msg)) => self.handle_message(msg)?,
                        Ok(None) => thread::sleep(SETUP_POLL_INTERVAL),
                        Err(Error::Timeout(_)) => {}
                        Err(e) => return Err(e),
                    }
                }
                Ok(())
            }
        }
    }

    // =========================================================================
    // FRAME-LOOP SURFACE
    // =========================================================================

    /// One frame tick: drain everything the peer sent and dispatch it.
    /// Never blocks.
    pub fn pump(&mut self) -> Result<()> {
        loop {
            match self.bus.receive(ReceiveTimeout::Immediate)? {
                Some(msg) => self.handle_message(msg)?,
                None => return Ok(()),
            }
        }
    }

    /// Submit a placement for the local player (a clicked cell from the
    /// input surface). Silently ignored when no game is in progress or it
    /// is not the local player's turn.
    pub fn submit_move(&mut self, cell: Cell) -> Result<()> {
        self.process_move(cell, self.local.id)
    }

    /// Ask the peer for a rematch after a finished game. The rematch
    /// begins once both sides have asked.
    pub fn request_rematch(&mut self) -> Result<()> {
        if self.status.is_none() {
            debug!("rematch request ignored, no finished game");
            return Ok(());
        }
        if !self.rematch_confirmed {
            self.rematch_confirmed = true;
            self.bus.send(&WireMessage::PartnerRequest {
                request: PartnerRequestKind::NewGame,
            })?;
        }
        self.maybe_begin_rematch()
    }

    /// Send a diagnostic loop-back probe tagged with our role. The peer
    /// echoes it back verbatim and [`SessionEvent::EchoReturned`] reports
    /// the round trip.
    pub fn send_echo_probe(&mut self, payload: impl Into<String>) -> Result<()> {
        let payload = payload.into();
        let msg = match self.role {
            Role::Listener => WireMessage::EchoListener { payload },
            Role::Connector => WireMessage::EchoConnector { payload },
        };
        self.bus.send(&msg)
    }

    /// Drain all queued presentation events.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    /// Flush and close the channel, dropping whatever is still queued
    /// after a short linger.
    pub fn shutdown(mut self) {
        self.bus.close(SHUTDOWN_LINGER);
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Role this session was constructed with.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Setup progress.
    pub fn phase(&self) -> SetupPhase {
        self.phase
    }

    /// Effective configuration (after the connector adopted the
    /// listener's board rules).
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The replicated board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// This side's player.
    pub fn local_player(&self) -> &Player {
        &self.local
    }

    /// The opponent as last announced, once known.
    pub fn opponent(&self) -> Option<&Player> {
        self.remote.as_ref()
    }

    /// Whether a game is currently in progress.
    pub fn is_in_progress(&self) -> bool {
        self.game_on
    }

    /// Result of the finished game, if any.
    pub fn status(&self) -> Option<GameStatus> {
        self.status
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    fn handle_message(&mut self, msg: WireMessage) -> Result<()> {
        match msg {
            // Late liveness probes are answered any time.
            WireMessage::Hello { .. } => self.bus.send(&WireMessage::hello_answer()),
            WireMessage::HelloAnswer { .. } => {
                debug!("stray hello answer, already connected");
                Ok(())
            }

            WireMessage::Pubkey { .. } | WireMessage::EncryptedSymmKey { .. } => {
                warn!(
                    "dropping '{}' outside the key exchange",
                    msg.header()
                );
                Ok(())
            }

            WireMessage::ServerConfig { .. } => {
                warn!("dropping server config after the sync phase");
                Ok(())
            }

            WireMessage::GetPlayer => self.bus.send(&WireMessage::MyPlayer {
                player: self.local.clone(),
            }),

            WireMessage::MyPlayer { player } => {
                debug!(
                    "opponent is '{}' (id {}, turn {}, score {})",
                    player.name, player.id, player.turn, player.score
                );
                self.remote = Some(player.clone());
                self.events.push_back(SessionEvent::OpponentKnown { player });
                Ok(())
            }

            WireMessage::Move { cell } => match self.remote.as_ref().map(|r| r.id) {
                Some(opponent_id) => self.process_move(cell, opponent_id),
                None => {
                    warn!("dropping move before player exchange");
                    Ok(())
                }
            },

            WireMessage::PartnerRequest { request } => self.handle_partner_request(request),

            WireMessage::EchoListener { payload } => self.handle_echo(Role::Listener, payload),
            WireMessage::EchoConnector { payload } => self.handle_echo(Role::Connector, payload),
        }
    }

    fn handle_partner_request(&mut self, request: PartnerRequestKind) -> Result<()> {
        match request {
            PartnerRequestKind::StartGame => {
                if !self.game_on && self.status.is_none() {
                    self.game_on = true;
                    self.events.push_back(SessionEvent::GameStarted);
                    info!("game started");
                } else {
                    debug!("ignoring start_game, session already saw play");
                }
                Ok(())
            }
            PartnerRequestKind::NewGame => {
                self.rematch_requested = true;
                self.next_player();
                self.events.push_back(SessionEvent::RematchRequested);
                self.maybe_begin_rematch()
            }
            PartnerRequestKind::NextPlayer => {
                self.next_player();
                Ok(())
            }
        }
    }

    fn handle_echo(&mut self, origin: Role, payload: String) -> Result<()> {
        if origin == self.role {
            // Our own probe completed the loop.
            debug!("echo probe returned");
            self.events.push_back(SessionEvent::EchoReturned { payload });
            Ok(())
        } else {
            let msg = match origin {
                Role::Listener => WireMessage::EchoListener { payload },
                Role::Connector => WireMessage::EchoConnector { payload },
            };
            self.bus.send(&msg)
        }
    }

    // =========================================================================
    // MOVES
    // =========================================================================

    /// The shared acceptance path for local and remote moves. Running the
    /// identical rule on both peers is what keeps the two boards equal.
    fn process_move(&mut self, cell: Cell, player_id: u8) -> Result<()> {
        if !self.game_on {
            debug!("dropped move ({}, {}), game is not on", cell.x, cell.y);
            return Ok(());
        }
        if !self.player_on_move(player_id) {
            debug!(
                "dropped move ({}, {}), player {} is not on move",
                cell.x, cell.y, player_id
            );
            return Ok(());
        }

        match self.board.place(cell, player_id) {
            Ok(()) => {}
            Err(PlaceError::Occupied { cell }) => {
                // Local-only rejection; nothing crosses the wire.
                self.events.push_back(SessionEvent::MoveRejected { cell });
                return Ok(());
            }
            Err(PlaceError::OutOfGrid { cell }) => {
                warn!("dropped move ({}, {}) outside the grid", cell.x, cell.y);
                return Ok(());
            }
        }

        let status = self.board.evaluate_last_move();
        self.next_player();
        if player_id == self.local.id {
            self.bus.send(&WireMessage::Move { cell })?;
        }
        self.events
            .push_back(SessionEvent::MoveApplied { cell, player: player_id });

        if let Some(status) = status {
            self.finish_game(status)?;
        }
        Ok(())
    }

    fn finish_game(&mut self, status: GameStatus) -> Result<()> {
        self.game_on = false;
        self.status = Some(status);

        if let GameStatus::Win { origin, axis, player } = status {
            info!(
                "winning move ({}, {}) on {:?} by player {}",
                origin.x, origin.y, axis, player
            );
            if player == self.local.id {
                self.local.record_win();
                self.bus.send(&WireMessage::MyPlayer {
                    player: self.local.clone(),
                })?;
            }
        } else {
            info!("the match ended in a tie");
        }

        self.events.push_back(SessionEvent::GameOver { status });
        Ok(())
    }

    /// Alternate both turn flags.
    fn next_player(&mut self) {
        self.local.turn = !self.local.turn;
        if let Some(remote) = self.remote.as_mut() {
            remote.turn = !remote.turn;
        }
    }

    fn player_on_move(&self, player_id: u8) -> bool {
        if player_id == self.local.id {
            return self.local.turn;
        }
        match self.remote.as_ref() {
            Some(remote) if player_id == remote.id => remote.turn,
            _ => false,
        }
    }

    /// Start the next game once both sides have asked for it.
    fn maybe_begin_rematch(&mut self) -> Result<()> {
        if !(self.rematch_confirmed && self.rematch_requested) {
            return Ok(());
        }
        self.bus.send(&WireMessage::PartnerRequest {
            request: PartnerRequestKind::NextPlayer,
        })?;
        self.board.clear();
        self.status = None;
        self.rematch_confirmed = false;
        self.rematch_requested = false;
        self.game_on = true;
        self.events.push_back(SessionEvent::RematchStarted);
        info!("rematch started");
        Ok(())
    }
}
