//! A single room: roster, turn cursor, and one round of the game.
//!
//! `GameRoom` is plain data with synchronous methods. It is owned by the
//! [`RoomRegistry`](crate::RoomRegistry), which in turn is owned by the
//! dispatcher task, so every method here runs to completion before any
//! other event touches the room.

use std::time::{Duration, Instant};

use race18_protocol::{PlayerId, PlayerView, RoomId, RoomSnapshot, ServerEvent};
use race18_session::Outbox;

use crate::{ActionOutcome, Dice, GameState, Player, RoomError};

/// The result of an accepted roll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollResult {
    pub player_id: PlayerId,
    pub player_name: String,
    pub roll: u8,
    pub outcome: ActionOutcome,
}

/// What happens after a roll or hold has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEnd {
    /// The round is over. `winner` is `None` if everyone busted.
    GameOver { winner: Option<PlayerView> },
    /// The turn moved on. `None` if nobody is left active.
    Next(Option<PlayerId>),
}

/// A game room.
///
/// The roster is kept in join order, which is also turn order. The turn
/// cursor is an index into the roster and always stays in bounds while
/// the roster is non-empty.
#[derive(Debug)]
pub struct GameRoom {
    id: RoomId,
    max_players: usize,
    players: Vec<Player>,
    current_turn: usize,
    game: GameState,
    created_at: Instant,
}

impl GameRoom {
    pub fn new(id: RoomId, max_players: usize, dice: Box<dyn Dice>, created_at: Instant) -> Self {
        Self {
            id,
            max_players,
            players: Vec::with_capacity(max_players),
            current_turn: 0,
            game: GameState::new(dice),
            created_at,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    /// The roster, in turn order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id() == *id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// The raw turn cursor.
    pub fn turn_index(&self) -> usize {
        self.current_turn
    }

    /// Returns `true` if the room never filled up and has outlived
    /// `idle_timeout`, counted from creation.
    pub fn is_stale(&self, now: Instant, idle_timeout: Duration) -> bool {
        self.players.len() < 2 && now.saturating_duration_since(self.created_at) > idle_timeout
    }

    // -----------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------

    /// Adds a player at the end of the roster.
    ///
    /// The round starts automatically as soon as a second player is in.
    ///
    /// # Errors
    /// - [`RoomError::RoomFull`]: the room is at capacity
    /// - [`RoomError::AlreadyInRoom`]: a player with this id is present
    pub fn add_player(&mut self, player: Player) -> Result<(), RoomError> {
        if self.is_full() {
            return Err(RoomError::RoomFull(self.id.clone()));
        }
        if self.player(&player.id()).is_some() {
            return Err(RoomError::AlreadyInRoom(player.id()));
        }

        tracing::info!(room_id = %self.id, player_id = %player.id(), name = player.name(), "player joined");
        self.players.push(player);

        if self.players.len() >= 2 && !self.game.is_started() {
            self.game.start();
            tracing::info!(room_id = %self.id, players = self.players.len(), "game started");
        }
        Ok(())
    }

    /// Removes a player and returns them.
    ///
    /// If the cursor falls off the end it goes back to 0, not to the
    /// player who followed the leaver. A started round that drops below
    /// two players ends immediately, without a winner.
    ///
    /// # Errors
    /// [`RoomError::PlayerNotFound`] if the id is not on the roster.
    pub fn remove_player(&mut self, id: &PlayerId) -> Result<Player, RoomError> {
        let index = self
            .players
            .iter()
            .position(|p| p.id() == *id)
            .ok_or(RoomError::PlayerNotFound(*id))?;

        let player = self.players.remove(index);
        if self.current_turn >= self.players.len() {
            self.current_turn = 0;
        }
        tracing::info!(room_id = %self.id, player_id = %id, players = self.players.len(), "player left");

        if self.players.len() < 2 && self.game.is_started() && !self.game.is_over() {
            self.game.end_without_winner();
            tracing::info!(room_id = %self.id, "game ended: not enough players");
        }
        Ok(player)
    }

    // -----------------------------------------------------------------
    // Turns
    // -----------------------------------------------------------------

    /// The player whose turn it is.
    ///
    /// If the player at the cursor is no longer active, the cursor moves
    /// forward until it finds one, giving up after one full lap. Returns
    /// `None` if nobody is active or the roster is empty.
    pub fn current_player(&mut self) -> Option<&Player> {
        let index = self.current_index()?;
        self.players.get(index)
    }

    fn current_index(&mut self) -> Option<usize> {
        for _ in 0..self.players.len() {
            if self.players[self.current_turn].is_active() {
                return Some(self.current_turn);
            }
            self.next_turn();
        }
        None
    }

    /// Moves the cursor to the next seat, wrapping around.
    pub fn next_turn(&mut self) {
        if !self.players.is_empty() {
            self.current_turn = (self.current_turn + 1) % self.players.len();
        }
    }

    /// Checks that `player_id` may act right now and returns their index.
    fn ensure_turn(&mut self, player_id: &PlayerId) -> Result<usize, RoomError> {
        let index = self
            .players
            .iter()
            .position(|p| p.id() == *player_id)
            .ok_or(RoomError::PlayerNotFound(*player_id))?;
        if !self.game.is_started() {
            return Err(RoomError::GameNotStarted);
        }
        if self.game.is_over() {
            return Err(RoomError::GameOver);
        }
        if self.current_index() != Some(index) {
            return Err(RoomError::NotYourTurn);
        }
        Ok(index)
    }

    // -----------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------

    /// Rolls for `player_id` and applies the result to their score.
    ///
    /// # Errors
    /// `PlayerNotFound`, `GameNotStarted`, `GameOver` or `NotYourTurn`.
    /// Nothing changes on error.
    pub fn roll(&mut self, player_id: &PlayerId) -> Result<RollResult, RoomError> {
        let index = self.ensure_turn(player_id)?;
        let roll = self.game.roll_dice();
        let player = &mut self.players[index];
        let outcome = self.game.update_score(player, roll);

        tracing::debug!(room_id = %self.id, %player_id, roll, score = outcome.score, "dice rolled");
        Ok(RollResult {
            player_id: *player_id,
            player_name: player.name().to_string(),
            roll,
            outcome,
        })
    }

    /// Holds for `player_id`.
    ///
    /// # Errors
    /// The same as [`roll`](Self::roll).
    pub fn hold(&mut self, player_id: &PlayerId) -> Result<ActionOutcome, RoomError> {
        let index = self.ensure_turn(player_id)?;
        let outcome = self.game.hold(&mut self.players[index])?;
        tracing::debug!(room_id = %self.id, %player_id, score = outcome.score, "player held");
        Ok(outcome)
    }

    /// Ends the round if it is finished; reports whether it is over.
    pub fn check_game_over(&mut self) -> bool {
        let was_over = self.game.is_over();
        let over = self.game.check_game_over(&mut self.players);
        if over && !was_over {
            tracing::info!(room_id = %self.id, winner = ?self.game.winner(), "game over");
        }
        over
    }

    /// Wraps up the action that was just applied: either the round is
    /// over, or the turn passes to the next active player.
    pub fn finish_turn(&mut self) -> TurnEnd {
        if self.check_game_over() {
            return TurnEnd::GameOver {
                winner: self.winner_view(),
            };
        }
        self.next_turn();
        TurnEnd::Next(self.current_player().map(Player::id))
    }

    /// The winner's public view, if the round has one.
    pub fn winner_view(&self) -> Option<PlayerView> {
        let winner = self.game.winner()?;
        self.player(&winner).map(Player::view)
    }

    /// Starts a fresh round with the same roster.
    ///
    /// Every player goes back to 0 and active, the cursor to the first
    /// seat. The round restarts right away if at least two players remain.
    pub fn reset_game(&mut self) {
        self.game.reset();
        for player in &mut self.players {
            player.reset();
        }
        self.current_turn = 0;
        if self.players.len() >= 2 {
            self.game.start();
        }
        tracing::info!(room_id = %self.id, players = self.players.len(), "game reset");
    }

    // -----------------------------------------------------------------
    // Views and delivery
    // -----------------------------------------------------------------

    /// The room as clients see it. Does not move the cursor.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id.clone(),
            players: self.players.iter().map(Player::view).collect(),
            current_turn: self.players.get(self.current_turn).map(Player::id),
            game_started: self.game.is_started(),
            game_over: self.game.is_over(),
            winner: self.game.winner(),
        }
    }

    /// Sends `event` to every member.
    pub fn broadcast(&self, outbox: &impl Outbox, event: ServerEvent) {
        for player in &self.players {
            outbox.deliver(player.session(), event.clone());
        }
    }

    /// Sends `event` to every member except `except`.
    pub fn broadcast_except(&self, outbox: &impl Outbox, except: &PlayerId, event: ServerEvent) {
        for player in self.players.iter().filter(|p| p.id() != *except) {
            outbox.deliver(player.session(), event.clone());
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
