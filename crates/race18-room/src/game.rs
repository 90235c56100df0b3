//! The Race to 18 rules engine.
//!
//! [`GameState`] is pure rules: it knows how a roll changes a score, what
//! holding means, when the round is over and who won. It knows nothing
//! about rooms, turns or connections. [`GameRoom`](crate::GameRoom)
//! decides *who* may act; this module decides *what happens* when they do.

use std::collections::VecDeque;
use std::fmt;

use race18_protocol::{ActionStatus, PlayerId, PlayerStatus};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Player, RoomError, TARGET_SCORE};

// ---------------------------------------------------------------------------
// Dice
// ---------------------------------------------------------------------------

/// A source of six-sided die rolls.
///
/// Rolls are always produced on the server. No client message carries a
/// roll value, so a client has no way to pick or replay one.
pub trait Dice: Send {
    /// Returns a value in `1..=6`.
    fn roll(&mut self) -> u8;
}

/// Uniform rolls from an OS-seeded `StdRng`. The production source.
pub struct ServerDice {
    rng: StdRng,
}

impl ServerDice {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl Default for ServerDice {
    fn default() -> Self {
        Self::new()
    }
}

impl Dice for ServerDice {
    fn roll(&mut self) -> u8 {
        self.rng.random_range(1..=6)
    }
}

/// Replays a fixed sequence of rolls, cycling when it runs out.
///
/// Used to script games in tests and demos.
#[derive(Debug, Clone)]
pub struct ScriptedDice {
    rolls: VecDeque<u8>,
}

impl ScriptedDice {
    /// # Panics
    /// If `rolls` is empty or contains a value outside `1..=6`.
    pub fn new(rolls: impl IntoIterator<Item = u8>) -> Self {
        let rolls: VecDeque<u8> = rolls.into_iter().collect();
        assert!(!rolls.is_empty(), "scripted dice need at least one roll");
        assert!(
            rolls.iter().all(|r| (1..=6).contains(r)),
            "die faces are 1..=6"
        );
        Self { rolls }
    }
}

impl Dice for ScriptedDice {
    fn roll(&mut self) -> u8 {
        let roll = self.rolls.pop_front().unwrap_or(1);
        self.rolls.push_back(roll);
        roll
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What a roll or hold did to the acting player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub status: ActionStatus,
    /// Human-readable summary, shown to the whole room.
    pub message: String,
    /// Score after the action (the final score for a hold).
    pub score: u32,
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// Round flags, the winner, and the dice.
///
/// Invariant: `winner` is `Some` only while `over` is true. It stays
/// `None` at game over when every player busted, or when the round was
/// cut short because the room dropped below two players.
pub struct GameState {
    started: bool,
    over: bool,
    winner: Option<PlayerId>,
    dice: Box<dyn Dice>,
}

impl GameState {
    pub fn new(dice: Box<dyn Dice>) -> Self {
        Self {
            started: false,
            over: false,
            winner: None,
            dice,
        }
    }

    /// The target score (always [`TARGET_SCORE`]).
    pub fn target(&self) -> u32 {
        TARGET_SCORE
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    /// Marks the round as started. Does not check the player count; that
    /// is the room's job.
    pub fn start(&mut self) {
        self.started = true;
    }

    /// Clears every flag for a fresh round. The caller restarts it.
    pub fn reset(&mut self) {
        self.started = false;
        self.over = false;
        self.winner = None;
    }

    /// Ends the round without picking a winner.
    pub(crate) fn end_without_winner(&mut self) {
        self.over = true;
    }

    /// Rolls the die.
    pub fn roll_dice(&mut self) -> u8 {
        let roll = self.dice.roll();
        debug_assert!((1..=6).contains(&roll), "die rolled {roll}");
        roll
    }

    /// Adds `roll` to the player's score and classifies the result.
    ///
    /// - over the target → player is bust
    /// - exactly the target → player won, the round is over
    /// - otherwise → still playing
    ///
    /// The score is never clamped: overshooting *is* the bust.
    pub fn update_score(&mut self, player: &mut Player, roll: u8) -> ActionOutcome {
        player.score += u32::from(roll);
        let score = player.score;

        if score > TARGET_SCORE {
            player.status = PlayerStatus::Bust;
            ActionOutcome {
                status: ActionStatus::Bust,
                message: format!("{} rolled a {roll} and busted with {score}!", player.name()),
                score,
            }
        } else if score == TARGET_SCORE {
            player.status = PlayerStatus::Won;
            self.over = true;
            self.winner = Some(player.id());
            tracing::info!(player_id = %player.id(), "perfect score");
            ActionOutcome {
                status: ActionStatus::Perfect,
                message: format!(
                    "{} rolled a {roll} and hit {TARGET_SCORE} exactly!",
                    player.name()
                ),
                score,
            }
        } else {
            ActionOutcome {
                status: ActionStatus::Playing,
                message: format!("{} rolled a {roll}. Score: {score}", player.name()),
                score,
            }
        }
    }

    /// Locks in the player's score.
    ///
    /// # Errors
    /// [`RoomError::CannotHold`] if the player is not active. Nothing is
    /// changed in that case.
    pub fn hold(&self, player: &mut Player) -> Result<ActionOutcome, RoomError> {
        if !player.is_active() {
            return Err(RoomError::CannotHold(player.status));
        }
        player.status = PlayerStatus::Held;
        Ok(ActionOutcome {
            status: ActionStatus::Held,
            message: format!("{} holds at {}", player.name(), player.score),
            score: player.score,
        })
    }

    /// Returns `true` if the round is over, ending it first if nobody is
    /// left active.
    ///
    /// A round ends when someone hits the target exactly (already flagged
    /// by [`update_score`](Self::update_score)) or when every player has
    /// stopped, by busting or holding. In the second case the winner is
    /// determined here.
    pub fn check_game_over(&mut self, players: &mut [Player]) -> bool {
        if self.over {
            return true;
        }
        if players.iter().any(Player::is_active) {
            return false;
        }
        self.over = true;
        self.determine_winner(players);
        true
    }

    /// Picks the winner among held and won players.
    ///
    /// The highest score wins. Ties go to the player who comes first in
    /// roster order (join order). The winner's status becomes `Won`, even
    /// if they got there by holding. If everyone busted there is no
    /// winner.
    pub fn determine_winner(&mut self, players: &mut [Player]) -> Option<PlayerId> {
        let mut best: Option<usize> = None;
        for (i, p) in players.iter().enumerate() {
            if !p.status.is_winner_candidate() {
                continue;
            }
            match best {
                Some(b) if players[b].score >= p.score => {}
                _ => best = Some(i),
            }
        }

        self.winner = best.map(|i| {
            let winner = &mut players[i];
            winner.status = PlayerStatus::Won;
            winner.id()
        });
        self.winner
    }
}

impl fmt::Debug for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameState")
            .field("started", &self.started)
            .field("over", &self.over)
            .field("winner", &self.winner)
            .finish_non_exhaustive()
    }
}

// =========================================================================
// Tests
// =========================================================================
