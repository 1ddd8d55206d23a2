//! Session Configuration
//!
//! One explicit configuration struct passed into the core's constructors.
//! The embedding process owns loading/persistence; the core only reads it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::net::transport::Role;

/// Configuration consumed by the core, fixed at session start.
///
/// The listener's copy is authoritative for the board shape: after key
/// establishment it sends the whole struct tagged `server_config` and the
/// connector overwrites its own grid and win-length values from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Number of grid columns.
    pub grid_width: u16,
    /// Number of grid rows.
    pub grid_height: u16,
    /// Contiguous same-owner run required to win.
    pub win_length: u16,
    /// TCP port the listener binds and the connector dials.
    pub port: u16,
    /// RSA key size in bits. Must be >= 1024 and a multiple of 256.
    pub key_bits: usize,
    /// Deadline for establishing the connection (accept/dial plus the
    /// hello exchange).
    pub connection_timeout: Duration,
    /// Per-message receive bound during steady-state bounded waits.
    pub receive_timeout: Duration,
    /// Per-attempt receive bound during the key-exchange waits.
    pub handshake_timeout: Duration,
    /// Whether this side's player takes the opening move. Conflicting
    /// values on the two sides are resolved during player exchange.
    pub first_move: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid_width: 15,
            grid_height: 15,
            win_length: 5,
            port: 14522,
            key_bits: 1024,
            connection_timeout: Duration::from_secs(5),
            receive_timeout: Duration::from_secs(3),
            handshake_timeout: Duration::from_secs(15),
            first_move: false,
        }
    }
}

impl GameConfig {
    /// Default configuration for a role. The listener is granted the
    /// opening move by default.
    pub fn for_role(role: Role) -> Self {
        Self {
            first_move: matches!(role, Role::Listener),
            ..Self::default()
        }
    }

    /// Adopt the board-shape subset from the listener's configuration.
    ///
    /// Only grid dimensions and win length are taken; ports, timeouts and
    /// key sizes stay local.
    pub fn adopt_board_rules(&mut self, remote: &GameConfig) {
        self.grid_width = remote.grid_width;
        self.grid_height = remote.grid_height;
        self.win_length = remote.win_length;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = GameConfig::default();
        assert_eq!(config.grid_width, 15);
        assert_eq!(config.grid_height, 15);
        assert_eq!(config.win_length, 5);
        assert_eq!(config.port, 14522);
        assert_eq!(config.key_bits, 1024);
        assert_eq!(config.connection_timeout, Duration::from_secs(5));
        assert_eq!(config.receive_timeout, Duration::from_secs(3));
        assert_eq!(config.handshake_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_first_move_defaults_to_listener() {
        assert!(GameConfig::for_role(Role::Listener).first_move);
        assert!(!GameConfig::for_role(Role::Connector).first_move);
    }

    #[test]
    fn test_adopt_board_rules_takes_only_the_board_subset() {
        let mut local = GameConfig::for_role(Role::Connector);
        local.port = 9999;
        let mut remote = GameConfig::for_role(Role::Listener);
        remote.grid_width = 19;
        remote.grid_height = 19;
        remote.win_length = 6;
        remote.port = 14522;
        remote.key_bits = 2048;

        local.adopt_board_rules(&remote);

        assert_eq!(local.grid_width, 19);
        assert_eq!(local.grid_height, 19);
        assert_eq!(local.win_length, 6);
        // Local transport settings are untouched.
        assert_eq!(local.port, 9999);
        assert_eq!(local.key_bits, 1024);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = GameConfig::for_role(Role::Listener);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: GameConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
