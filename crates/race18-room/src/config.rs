//! Game constants and room configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The score everyone is racing towards. Going over is a bust.
pub const TARGET_SCORE: u32 = 18;

/// Longest display name accepted, in characters, after trimming.
pub const MAX_PLAYER_NAME_LEN: usize = 20;

/// Tunables for rooms and the registry sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Maximum players allowed in one room.
    pub max_players: usize,

    /// A room older than this that still has fewer than two players is
    /// removed by the sweep. Measured from room creation.
    pub idle_timeout: Duration,

    /// How often the registry is swept for empty or stale rooms.
    pub sweep_interval: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: 4,
            idle_timeout: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.max_players, 4);
        assert_eq!(config.idle_timeout, Duration::from_secs(1800));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
    }
}
