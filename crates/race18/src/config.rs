//! Server configuration.

use race18_room::RoomConfig;
use serde::{Deserialize, Serialize};

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Everything needed to start a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to. Port `0` picks a free one.
    pub bind_addr: String,

    /// Room capacity, idle timeout and sweep interval.
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            room: RoomConfig::default(),
        }
    }
}
