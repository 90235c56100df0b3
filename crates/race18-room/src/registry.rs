//! The room registry: creates rooms, finds them by code, and sweeps out
//! the ones nobody is using.

use std::collections::HashMap;
use std::time::Instant;

use race18_protocol::RoomId;
use rand::Rng;

use crate::{Dice, GameRoom, RoomConfig, ServerDice};

/// Characters used in room codes. No `0`/`O` or `1`/`I` to keep codes
/// easy to read out loud.
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a room code.
pub const ROOM_CODE_LEN: usize = 6;

/// Builds the dice for each new room.
pub type DiceFactory = Box<dyn Fn() -> Box<dyn Dice> + Send>;

/// Owns every live room, keyed by code.
///
/// There is exactly one registry per server, owned by the dispatcher and
/// passed in explicitly. Nothing here is global.
pub struct RoomRegistry {
    rooms: HashMap<RoomId, GameRoom>,
    config: RoomConfig,
    dice: DiceFactory,
}

impl RoomRegistry {
    /// Creates an empty registry whose rooms roll [`ServerDice`].
    pub fn new(config: RoomConfig) -> Self {
        Self::with_dice(config, Box::new(|| Box::new(ServerDice::new())))
    }

    /// Creates an empty registry with a custom dice source per room.
    pub fn with_dice(config: RoomConfig, dice: DiceFactory) -> Self {
        Self {
            rooms: HashMap::new(),
            config,
            dice,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates an empty room under a fresh, unused code.
    pub fn create_room(&mut self, now: Instant) -> &mut GameRoom {
        let room_id = loop {
            let candidate = random_room_code();
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        let room = GameRoom::new(room_id.clone(), self.config.max_players, (self.dice)(), now);
        tracing::info!(%room_id, "room created");
        self.rooms.entry(room_id).or_insert(room)
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&GameRoom> {
        self.rooms.get(room_id)
    }

    pub fn get_mut(&mut self, room_id: &RoomId) -> Option<&mut GameRoom> {
        self.rooms.get_mut(room_id)
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Removes a room unconditionally.
    pub fn remove(&mut self, room_id: &RoomId) -> Option<GameRoom> {
        let room = self.rooms.remove(room_id)?;
        tracing::info!(%room_id, "room removed");
        Some(room)
    }

    /// Removes the room if nobody is left in it. Returns `true` if it was
    /// removed.
    pub fn remove_if_empty(&mut self, room_id: &RoomId) -> bool {
        match self.rooms.get(room_id) {
            Some(room) if room.is_empty() => self.remove(room_id).is_some(),
            _ => false,
        }
    }

    /// Drops every room that is empty, or older than the idle timeout
    /// with fewer than two players. Returns the removed codes.
    pub fn sweep(&mut self, now: Instant) -> Vec<RoomId> {
        let idle_timeout = self.config.idle_timeout;
        let mut removed = Vec::new();
        self.rooms.retain(|room_id, room| {
            let keep = !room.is_empty() && !room.is_stale(now, idle_timeout);
            if !keep {
                removed.push(room_id.clone());
            }
            keep
        });
        if !removed.is_empty() {
            tracing::info!(count = removed.len(), rooms = ?removed, "swept idle rooms");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.keys().cloned().collect()
    }
}

fn random_room_code() -> RoomId {
    let mut rng = rand::rng();
    let code: String = (0..ROOM_CODE_LEN)
        .map(|_| char::from(ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())]))
        .collect();
    RoomId::new(code)
}
