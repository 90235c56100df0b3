//! The session handler: turns client events into room operations and
//! room results into broadcasts.
//!
//! All game state lives in one [`Dispatcher`], owned by a single Tokio
//! task (see [`spawn_dispatcher`]). Connection tasks send it [`Inbound`]
//! commands over a channel. Each command is handled to completion before
//! the next one starts, so no two events ever observe a half-applied
//! roll, and no locks are needed around rooms or sessions.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use race18_protocol::{ClientEvent, PlayerView, RoomId, ServerEvent};
use race18_room::{
    GameRoom, Player, RoomError, RoomRegistry, TurnEnd, validate_player_name,
};
use race18_session::{Binding, Outbox, SessionError, SessionId, SessionRegistry, SessionSender};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::Race18Error;

/// Sent to the client instead of the details of an unexpected failure.
pub const INTERNAL_ERROR: &str = "Internal server error";

/// Sent when a frame is not a well-formed client event.
pub const INVALID_MESSAGE: &str = "Invalid message";

/// Capacity of the dispatcher's command channel.
const COMMAND_CHANNEL_SIZE: usize = 1024;

/// A command for the dispatcher task.
#[derive(Debug)]
pub enum Inbound {
    /// A connection was accepted. Events for it go to `sender`.
    Connected {
        session: SessionId,
        sender: SessionSender,
    },
    /// A decoded client event.
    Event {
        session: SessionId,
        event: ClientEvent,
    },
    /// A frame that did not decode. Answered with one ERROR.
    Malformed { session: SessionId },
    /// The connection closed or failed.
    Disconnected { session: SessionId },
}

/// Owns every room and session, and applies events to them.
pub struct Dispatcher {
    rooms: RoomRegistry,
    sessions: SessionRegistry,
}

impl Dispatcher {
    pub fn new(rooms: RoomRegistry) -> Self {
        Self {
            rooms,
            sessions: SessionRegistry::new(),
        }
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Applies one command.
    ///
    /// A panic inside event handling is caught here: it is logged and the
    /// sender gets a generic error, while every other room and session
    /// carries on.
    pub fn handle(&mut self, inbound: Inbound, now: Instant) {
        match inbound {
            Inbound::Connected { session, sender } => {
                if let Err(e) = self.sessions.connect(session, sender) {
                    tracing::warn!(%session, error = %e, "duplicate connect");
                }
            }
            Inbound::Event { session, event } => {
                let name = event.name();
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    self.handle_event(session, event, now)
                }));
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => self.reject(session, name, e),
                    Err(_) => {
                        tracing::error!(%session, event = name, "panic while handling event");
                        self.sessions.deliver(session, ServerEvent::error(INTERNAL_ERROR));
                    }
                }
            }
            Inbound::Malformed { session } => {
                self.sessions.deliver(session, ServerEvent::error(INVALID_MESSAGE));
            }
            Inbound::Disconnected { session } => self.disconnect(session),
        }
        self.evict_lagging();
    }

    /// Disconnects every session that could not keep up with its outbound
    /// queue. Their writer tasks see the channel close and shut the
    /// connection down.
    fn evict_lagging(&mut self) {
        loop {
            // Telling a room about one eviction can overflow another queue.
            let lagging = self.sessions.take_lagging();
            if lagging.is_empty() {
                return;
            }
            for session in lagging {
                tracing::info!(%session, "evicting slow session");
                self.disconnect(session);
            }
        }
    }

    /// Sends the single ERROR for a rejected event.
    fn reject(&self, session: SessionId, event: &'static str, error: Race18Error) {
        let message = match error {
            Race18Error::Room(e) => {
                tracing::debug!(%session, event, reason = %e, "event rejected");
                e.to_string()
            }
            other => {
                tracing::error!(%session, event, error = %other, "event failed");
                INTERNAL_ERROR.to_string()
            }
        };
        self.sessions.deliver(session, ServerEvent::error(message));
    }

    /// Routes one client event. `Err` means nothing was changed.
    pub fn handle_event(
        &mut self,
        session: SessionId,
        event: ClientEvent,
        now: Instant,
    ) -> Result<(), Race18Error> {
        tracing::debug!(%session, event = event.name(), "handling event");
        match event {
            ClientEvent::CreateRoom { player_name } => self.create_room(session, &player_name, now),
            ClientEvent::JoinRoom {
                room_id,
                player_name,
            } => self.join_room(session, &room_id, &player_name),
            ClientEvent::RollDice => self.roll(session),
            ClientEvent::Hold => self.hold(session),
            ClientEvent::NewGame => self.new_game(session),
            ClientEvent::LeaveRoom => self.leave_room(session),
        }
    }

    // -----------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------

    fn create_room(
        &mut self,
        session: SessionId,
        raw_name: &str,
        now: Instant,
    ) -> Result<(), Race18Error> {
        let name = validate_player_name(raw_name)?;
        self.ensure_unbound(session)?;

        let player = Player::new(name, session);
        let player_id = player.id();
        let room = self.rooms.create_room(now);
        let room_id = room.id().clone();
        room.add_player(player)?;
        let room_state = room.snapshot();
        self.sessions.bind(session, room_id.clone(), player_id)?;

        self.sessions.deliver(
            session,
            ServerEvent::RoomCreated {
                room_id,
                player_id,
                room_state,
            },
        );
        Ok(())
    }

    fn join_room(
        &mut self,
        session: SessionId,
        raw_room_id: &str,
        raw_name: &str,
    ) -> Result<(), Race18Error> {
        let name = validate_player_name(raw_name)?;
        let room_id = RoomId::normalize(raw_room_id);
        if room_id.is_empty() {
            return Err(RoomError::MissingRoomId.into());
        }
        self.ensure_unbound(session)?;

        let room = find_room(&mut self.rooms, &room_id)?;
        let player = Player::new(name, session);
        let player_id = player.id();
        room.add_player(player)?;
        self.sessions.bind(session, room_id, player_id)?;

        let joined = ServerEvent::PlayerJoined {
            player_id,
            room_state: room.snapshot(),
        };
        self.sessions.deliver(session, joined.clone());
        room.broadcast_except(&self.sessions, &player_id, joined);
        Ok(())
    }

    fn leave_room(&mut self, session: SessionId) -> Result<(), Race18Error> {
        let binding = self.sessions.unbind(session).ok_or(RoomError::NotInRoom)?;
        self.remove_from_room(binding);
        Ok(())
    }

    /// Forgets a connection, removing its player from their room.
    pub fn disconnect(&mut self, session: SessionId) {
        match self.sessions.disconnect(session) {
            Ok(Some(binding)) => self.remove_from_room(binding),
            Ok(None) => {}
            Err(e) => tracing::debug!(%session, error = %e, "disconnect for unknown session"),
        }
    }

    fn remove_from_room(&mut self, binding: Binding) {
        let Binding { room_id, player_id } = binding;
        let Some(room) = self.rooms.get_mut(&room_id) else {
            tracing::debug!(%room_id, %player_id, "room already gone");
            return;
        };
        let player = match room.remove_player(&player_id) {
            Ok(player) => player,
            Err(e) => {
                tracing::debug!(%room_id, error = %e, "player already removed");
                return;
            }
        };
        if self.rooms.remove_if_empty(&room_id) {
            return;
        }
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };

        // The leaver may have been the last active player.
        let live = room.game().is_started() && !room.game().is_over();
        let ended = live && room.check_game_over();
        if live && !ended {
            // Move the cursor onto someone who can act before snapshotting.
            room.current_player();
        }

        room.broadcast(
            &self.sessions,
            ServerEvent::PlayerLeft {
                player_id,
                room_state: room.snapshot(),
                message: format!("{} left the game", player.name()),
            },
        );
        if ended {
            announce_game_over(room, &self.sessions, room.winner_view());
        }
    }

    // -----------------------------------------------------------------
    // Gameplay
    // -----------------------------------------------------------------

    fn roll(&mut self, session: SessionId) -> Result<(), Race18Error> {
        let binding = self.binding(session)?;
        let room = find_room(&mut self.rooms, &binding.room_id)?;
        let result = room.roll(&binding.player_id)?;

        room.broadcast(
            &self.sessions,
            ServerEvent::DiceRolled {
                player_id: result.player_id,
                player_name: result.player_name,
                roll: result.roll,
                new_score: result.outcome.score,
                status: result.outcome.status,
                message: result.outcome.message,
            },
        );
        finish_turn(room, &self.sessions);
        Ok(())
    }

    fn hold(&mut self, session: SessionId) -> Result<(), Race18Error> {
        let binding = self.binding(session)?;
        let room = find_room(&mut self.rooms, &binding.room_id)?;
        let outcome = room.hold(&binding.player_id)?;

        room.broadcast(
            &self.sessions,
            ServerEvent::GameStateUpdate {
                room_state: room.snapshot(),
                message: outcome.message,
            },
        );
        finish_turn(room, &self.sessions);
        Ok(())
    }

    fn new_game(&mut self, session: SessionId) -> Result<(), Race18Error> {
        let binding = self.binding(session)?;
        let room = find_room(&mut self.rooms, &binding.room_id)?;
        room.reset_game();

        let message = if room.game().is_started() {
            "New game started!"
        } else {
            "Game reset. Waiting for another player to join"
        };
        room.broadcast(
            &self.sessions,
            ServerEvent::GameStateUpdate {
                room_state: room.snapshot(),
                message: message.to_string(),
            },
        );
        Ok(())
    }

    // -----------------------------------------------------------------
    // Housekeeping
    // -----------------------------------------------------------------

    /// Removes empty and idle rooms. Players still seated in a swept room
    /// are detached from it and told why.
    pub fn sweep(&mut self, now: Instant) -> Vec<RoomId> {
        let removed = self.rooms.sweep(now);
        for room_id in &removed {
            for session in self.sessions.unbind_room(room_id) {
                self.sessions.deliver(
                    session,
                    ServerEvent::error(format!("Room {room_id} was closed after being idle")),
                );
            }
        }
        self.evict_lagging();
        removed
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    fn ensure_unbound(&self, session: SessionId) -> Result<(), Race18Error> {
        let entry = self
            .sessions
            .get(session)
            .ok_or(SessionError::NotFound(session))?;
        match &entry.binding {
            Some(binding) => Err(RoomError::AlreadyJoined(binding.room_id.clone()).into()),
            None => Ok(()),
        }
    }

    fn binding(&self, session: SessionId) -> Result<Binding, RoomError> {
        self.sessions
            .binding(session)
            .cloned()
            .ok_or(RoomError::NotInRoom)
    }
}

fn find_room<'a>(rooms: &'a mut RoomRegistry, room_id: &RoomId) -> Result<&'a mut GameRoom, RoomError> {
    rooms
        .get_mut(room_id)
        .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))
}

/// Broadcasts what follows an accepted roll or hold: GAME_OVER if the
/// round just ended, TURN_CHANGED otherwise.
fn finish_turn(room: &mut GameRoom, outbox: &impl Outbox) {
    match room.finish_turn() {
        TurnEnd::GameOver { winner } => announce_game_over(room, outbox, winner),
        TurnEnd::Next(current_turn) => room.broadcast(
            outbox,
            ServerEvent::TurnChanged {
                current_turn,
                room_state: room.snapshot(),
            },
        ),
    }
}

fn announce_game_over(room: &GameRoom, outbox: &impl Outbox, winner: Option<PlayerView>) {
    let message = match &winner {
        Some(w) => format!("{} wins with {}!", w.name, w.score),
        None => "Everyone busted! No winner this round.".to_string(),
    };
    room.broadcast(
        outbox,
        ServerEvent::GameOver {
            winner,
            room_state: room.snapshot(),
            message,
        },
    );
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Cheap, cloneable handle for sending commands to the dispatcher task.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    sender: mpsc::Sender<Inbound>,
}

impl DispatcherHandle {
    /// Registers a connection and the channel its events go out on.
    pub async fn connect(&self, session: SessionId, sender: SessionSender) -> Result<(), Race18Error> {
        self.send(Inbound::Connected { session, sender }).await
    }

    /// Forwards a decoded client event.
    pub async fn event(&self, session: SessionId, event: ClientEvent) -> Result<(), Race18Error> {
        self.send(Inbound::Event { session, event }).await
    }

    /// Reports a frame that could not be decoded.
    pub async fn malformed(&self, session: SessionId) -> Result<(), Race18Error> {
        self.send(Inbound::Malformed { session }).await
    }

    /// Reports that a connection is gone.
    pub async fn disconnect(&self, session: SessionId) -> Result<(), Race18Error> {
        self.send(Inbound::Disconnected { session }).await
    }

    async fn send(&self, inbound: Inbound) -> Result<(), Race18Error> {
        self.sender
            .send(inbound)
            .await
            .map_err(|_| Race18Error::DispatcherClosed)
    }
}

/// Spawns the dispatcher task.
///
/// The task interleaves commands with a periodic sweep, one at a time,
/// and stops once every [`DispatcherHandle`] has been dropped.
pub fn spawn_dispatcher(
    dispatcher: Dispatcher,
    sweep_interval: Duration,
) -> (DispatcherHandle, JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    let task = tokio::spawn(run_dispatcher(dispatcher, receiver, sweep_interval));
    (DispatcherHandle { sender }, task)
}

async fn run_dispatcher(
    mut dispatcher: Dispatcher,
    mut receiver: mpsc::Receiver<Inbound>,
    sweep_interval: Duration,
) {
    let mut sweep = tokio::time::interval(sweep_interval);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick fires immediately; nothing to sweep yet.
    sweep.tick().await;

    tracing::info!(?sweep_interval, "dispatcher started");
    loop {
        tokio::select! {
            inbound = receiver.recv() => match inbound {
                Some(inbound) => dispatcher.handle(inbound, now()),
                None => break,
            },
            _ = sweep.tick() => {
                dispatcher.sweep(now());
            }
        }
    }
    tracing::info!(rooms = dispatcher.rooms.len(), "dispatcher stopped");
}

/// Wall-clock `Instant` that follows Tokio's clock, so paused-time tests
/// can age rooms.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use race18_protocol::{ActionStatus, PlayerId, PlayerStatus};
    use race18_room::{RoomConfig, ScriptedDice};
    use race18_session::OUTBOUND_CHANNEL_SIZE;
    use tokio::sync::mpsc::error::TryRecvError;

    use super::*;

    fn dispatcher(rolls: &'static [u8]) -> Dispatcher {
        Dispatcher::new(RoomRegistry::with_dice(
            RoomConfig::default(),
            Box::new(move || Box::new(ScriptedDice::new(rolls.iter().copied()))),
        ))
    }

    fn connect(d: &mut Dispatcher, id: u64) -> mpsc::Receiver<ServerEvent> {
        let (tx, rx) = mpsc::channel(OUTBOUND_CHANNEL_SIZE);
        d.handle(
            Inbound::Connected {
                session: SessionId(id),
                sender: tx,
            },
            Instant::now(),
        );
        rx
    }

    fn send(d: &mut Dispatcher, id: u64, event: ClientEvent) {
        d.handle(
            Inbound::Event {
                session: SessionId(id),
                event,
            },
            Instant::now(),
        );
    }

    fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn create(name: &str) -> ClientEvent {
        ClientEvent::CreateRoom {
            player_name: name.into(),
        }
    }

    fn join(room_id: &RoomId, name: &str) -> ClientEvent {
        ClientEvent::JoinRoom {
            room_id: room_id.to_string(),
            player_name: name.into(),
        }
    }

    fn errors(events: &[ServerEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                ServerEvent::Error { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Alice creates, Bob joins. Returns (room, alice, bob) with both
    /// inboxes drained.
    fn two_player_room(
        d: &mut Dispatcher,
        alice_rx: &mut mpsc::Receiver<ServerEvent>,
        bob_rx: &mut mpsc::Receiver<ServerEvent>,
    ) -> (RoomId, PlayerId, PlayerId) {
        send(d, 1, create("Alice"));
        let (room_id, alice) = match drain(alice_rx).pop() {
            Some(ServerEvent::RoomCreated {
                room_id, player_id, ..
            }) => (room_id, player_id),
            other => panic!("expected ROOM_CREATED, got {other:?}"),
        };
        send(d, 2, join(&room_id, "Bob"));
        let bob = match drain(bob_rx).pop() {
            Some(ServerEvent::PlayerJoined { player_id, .. }) => player_id,
            other => panic!("expected PLAYER_JOINED, got {other:?}"),
        };
        drain(alice_rx);
        (room_id, alice, bob)
    }

    // =====================================================================
    // CREATE_ROOM / JOIN_ROOM
    // =====================================================================

    #[test]
    fn test_create_room_replies_only_to_creator() {
        let mut d = dispatcher(&[1]);
        let mut rx = connect(&mut d, 1);

        send(&mut d, 1, create("  Alice "));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ServerEvent::RoomCreated {
                room_id,
                player_id,
                room_state,
            } => {
                assert_eq!(room_state.room_id, *room_id);
                assert_eq!(room_state.players.len(), 1);
                assert_eq!(room_state.players[0].id, *player_id);
                assert_eq!(room_state.players[0].name, "Alice");
                assert!(!room_state.game_started);
            }
            other => panic!("expected ROOM_CREATED, got {other:?}"),
        }
        assert_eq!(d.rooms().len(), 1);
    }

    #[test]
    fn test_create_room_blank_name_is_rejected() {
        let mut d = dispatcher(&[1]);
        let mut rx = connect(&mut d, 1);

        send(&mut d, 1, create("   "));

        assert_eq!(errors(&drain(&mut rx)), vec!["Player name is required"]);
        assert!(d.rooms().is_empty());
    }

    #[test]
    fn test_create_room_twice_is_rejected() {
        let mut d = dispatcher(&[1]);
        let mut rx = connect(&mut d, 1);
        send(&mut d, 1, create("Alice"));
        drain(&mut rx);

        send(&mut d, 1, create("Alice"));

        let errs = errors(&drain(&mut rx));
        assert_eq!(errs.len(), 1);
        assert!(errs[0].starts_with("You are already in room"));
        assert_eq!(d.rooms().len(), 1);
    }

    #[test]
    fn test_join_room_notifies_joiner_and_others() {
        let mut d = dispatcher(&[1]);
        let mut alice_rx = connect(&mut d, 1);
        let mut bob_rx = connect(&mut d, 2);
        send(&mut d, 1, create("Alice"));
        let room_id = d.rooms().room_ids().remove(0);
        drain(&mut alice_rx);

        // Lower-case with whitespace still finds the room.
        let raw = format!(" {} ", room_id.as_str().to_lowercase());
        send(
            &mut d,
            2,
            ClientEvent::JoinRoom {
                room_id: raw,
                player_name: "Bob".into(),
            },
        );

        let to_bob = drain(&mut bob_rx);
        let to_alice = drain(&mut alice_rx);
        assert_eq!(to_bob.len(), 1);
        assert_eq!(to_bob, to_alice);
        match &to_bob[0] {
            ServerEvent::PlayerJoined { room_state, .. } => {
                assert!(room_state.game_started);
                assert_eq!(room_state.players.len(), 2);
                assert_eq!(room_state.current_turn, Some(room_state.players[0].id));
            }
            other => panic!("expected PLAYER_JOINED, got {other:?}"),
        }
    }

    #[test]
    fn test_join_room_validation_order() {
        let mut d = dispatcher(&[1]);
        let mut rx = connect(&mut d, 1);

        send(
            &mut d,
            1,
            ClientEvent::JoinRoom {
                room_id: "ABCDEF".into(),
                player_name: "".into(),
            },
        );
        send(
            &mut d,
            1,
            ClientEvent::JoinRoom {
                room_id: "  ".into(),
                player_name: "Bob".into(),
            },
        );
        send(&mut d, 1, join(&RoomId::new("NOPE99"), "Bob"));

        assert_eq!(
            errors(&drain(&mut rx)),
            vec![
                "Player name is required",
                "Room ID is required",
                "Room NOPE99 not found",
            ]
        );
    }

    #[test]
    fn test_join_room_full_is_rejected() {
        let mut d = dispatcher(&[1]);
        let mut rxs: Vec<_> = (1..=5).map(|id| connect(&mut d, id)).collect();
        send(&mut d, 1, create("P1"));
        let room_id = d.rooms().room_ids().remove(0);
        for id in 2..=5 {
            send(&mut d, id, join(&room_id, &format!("P{id}")));
        }

        let last = drain(&mut rxs[4]);
        assert_eq!(errors(&last), vec![format!("Room {room_id} is full")]);
        assert_eq!(d.rooms().get(&room_id).unwrap().player_count(), 4);
        assert!(d.sessions().binding(SessionId(5)).is_none());
    }

    // =====================================================================
    // ROLL_DICE / HOLD
    // =====================================================================

    #[test]
    fn test_roll_broadcasts_roll_then_turn_change() {
        let mut d = dispatcher(&[4]);
        let mut alice_rx = connect(&mut d, 1);
        let mut bob_rx = connect(&mut d, 2);
        let (_, alice, bob) = two_player_room(&mut d, &mut alice_rx, &mut bob_rx);

        send(&mut d, 1, ClientEvent::RollDice);

        let events = drain(&mut bob_rx);
        assert_eq!(events, drain(&mut alice_rx));
        assert_eq!(events.len(), 2);
        match &events[0] {
            ServerEvent::DiceRolled {
                player_id,
                player_name,
                roll,
                new_score,
                status,
                ..
            } => {
                assert_eq!(*player_id, alice);
                assert_eq!(player_name, "Alice");
                assert_eq!(*roll, 4);
                assert_eq!(*new_score, 4);
                assert_eq!(*status, ActionStatus::Playing);
            }
            other => panic!("expected DICE_ROLLED, got {other:?}"),
        }
        match &events[1] {
            ServerEvent::TurnChanged {
                current_turn,
                room_state,
            } => {
                assert_eq!(*current_turn, Some(bob));
                assert_eq!(room_state.current_turn, Some(bob));
            }
            other => panic!("expected TURN_CHANGED, got {other:?}"),
        }
    }

    #[test]
    fn test_roll_out_of_turn_sends_one_error_and_changes_nothing() {
        let mut d = dispatcher(&[4]);
        let mut alice_rx = connect(&mut d, 1);
        let mut bob_rx = connect(&mut d, 2);
        let (room_id, _, _) = two_player_room(&mut d, &mut alice_rx, &mut bob_rx);
        let before = d.rooms().get(&room_id).unwrap().snapshot();

        send(&mut d, 2, ClientEvent::RollDice);

        assert_eq!(drain(&mut bob_rx), vec![ServerEvent::error("Not your turn")]);
        assert!(drain(&mut alice_rx).is_empty());
        assert_eq!(d.rooms().get(&room_id).unwrap().snapshot(), before);
    }

    #[test]
    fn test_roll_without_room_is_rejected() {
        let mut d = dispatcher(&[4]);
        let mut rx = connect(&mut d, 1);

        send(&mut d, 1, ClientEvent::RollDice);
        send(&mut d, 1, ClientEvent::Hold);
        send(&mut d, 1, ClientEvent::NewGame);
        send(&mut d, 1, ClientEvent::LeaveRoom);

        assert_eq!(errors(&drain(&mut rx)), vec!["You are not in a room"; 4]);
    }

    #[test]
    fn test_roll_before_second_player_is_rejected() {
        let mut d = dispatcher(&[4]);
        let mut rx = connect(&mut d, 1);
        send(&mut d, 1, create("Alice"));
        drain(&mut rx);

        send(&mut d, 1, ClientEvent::RollDice);

        assert_eq!(
            drain(&mut rx),
            vec![ServerEvent::error("Waiting for another player to join")]
        );
    }

    #[test]
    fn test_perfect_roll_sends_game_over_without_turn_change() {
        let mut d = dispatcher(&[6]);
        let mut alice_rx = connect(&mut d, 1);
        let mut bob_rx = connect(&mut d, 2);
        let (room_id, alice, _) = two_player_room(&mut d, &mut alice_rx, &mut bob_rx);

        for id in [1, 2, 1, 2] {
            send(&mut d, id, ClientEvent::RollDice);
        }
        drain(&mut bob_rx);
        send(&mut d, 1, ClientEvent::RollDice);

        let events = drain(&mut bob_rx);
        let names: Vec<&str> = events.iter().map(ServerEvent::name).collect();
        assert_eq!(names, vec!["DICE_ROLLED", "GAME_OVER"]);
        match &events[1] {
            ServerEvent::GameOver {
                winner,
                room_state,
                message,
            } => {
                let winner = winner.as_ref().unwrap();
                assert_eq!(winner.id, alice);
                assert_eq!(winner.status, PlayerStatus::Won);
                assert!(room_state.game_over);
                assert_eq!(room_state.winner, Some(alice));
                assert_eq!(message, "Alice wins with 18!");
            }
            other => panic!("expected GAME_OVER, got {other:?}"),
        }

        send(&mut d, 2, ClientEvent::RollDice);
        assert_eq!(drain(&mut bob_rx), vec![ServerEvent::error("Game is over")]);
        assert!(d.rooms().get(&room_id).unwrap().game().is_over());
    }

    #[test]
    fn test_hold_broadcasts_state_update_then_turn_change() {
        let mut d = dispatcher(&[3]);
        let mut alice_rx = connect(&mut d, 1);
        let mut bob_rx = connect(&mut d, 2);
        let (_, _, bob) = two_player_room(&mut d, &mut alice_rx, &mut bob_rx);

        send(&mut d, 1, ClientEvent::Hold);

        let events = drain(&mut alice_rx);
        match &events[..] {
            [
                ServerEvent::GameStateUpdate { message, .. },
                ServerEvent::TurnChanged { current_turn, .. },
            ] => {
                assert_eq!(message, "Alice holds at 0");
                assert_eq!(*current_turn, Some(bob));
            }
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn test_everyone_busts_game_over_without_winner() {
        let mut d = dispatcher(&[5]);
        let mut alice_rx = connect(&mut d, 1);
        let mut bob_rx = connect(&mut d, 2);
        two_player_room(&mut d, &mut alice_rx, &mut bob_rx);

        for id in [1, 2, 1, 2, 1, 2, 1, 2] {
            send(&mut d, id, ClientEvent::RollDice);
        }

        let events = drain(&mut alice_rx);
        match events.last() {
            Some(ServerEvent::GameOver {
                winner, message, ..
            }) => {
                assert!(winner.is_none());
                assert_eq!(message, "Everyone busted! No winner this round.");
            }
            other => panic!("expected GAME_OVER, got {other:?}"),
        }
        assert!(errors(&events).is_empty());
    }

    // =====================================================================
    // NEW_GAME
    // =====================================================================

    #[test]
    fn test_new_game_resets_room_for_everyone() {
        let mut d = dispatcher(&[6]);
        let mut alice_rx = connect(&mut d, 1);
        let mut bob_rx = connect(&mut d, 2);
        let (room_id, _, _) = two_player_room(&mut d, &mut alice_rx, &mut bob_rx);
        for id in [1, 2, 1, 2, 1] {
            send(&mut d, id, ClientEvent::RollDice);
        }
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        send(&mut d, 2, ClientEvent::NewGame);

        let events = drain(&mut alice_rx);
        assert_eq!(events, drain(&mut bob_rx));
        match &events[..] {
            [ServerEvent::GameStateUpdate { room_state, message }] => {
                assert_eq!(message, "New game started!");
                assert!(room_state.game_started);
                assert!(!room_state.game_over);
                assert_eq!(room_state.winner, None);
                assert!(room_state.players.iter().all(|p| p.score == 0));
            }
            other => panic!("unexpected events {other:?}"),
        }
        assert!(!d.rooms().get(&room_id).unwrap().game().is_over());
    }

    // =====================================================================
    // LEAVE_ROOM / disconnect
    // =====================================================================

    #[test]
    fn test_disconnect_notifies_remaining_players() {
        let mut d = dispatcher(&[2]);
        let mut alice_rx = connect(&mut d, 1);
        let mut bob_rx = connect(&mut d, 2);
        let (room_id, _, bob) = two_player_room(&mut d, &mut alice_rx, &mut bob_rx);

        d.handle(
            Inbound::Disconnected {
                session: SessionId(2),
            },
            Instant::now(),
        );

        match &drain(&mut alice_rx)[..] {
            [ServerEvent::PlayerLeft {
                player_id,
                room_state,
                message,
            }] => {
                assert_eq!(*player_id, bob);
                assert_eq!(message, "Bob left the game");
                assert_eq!(room_state.players.len(), 1);
                assert!(room_state.game_over, "fewer than two players ends the round");
                assert_eq!(room_state.winner, None);
            }
            other => panic!("unexpected events {other:?}"),
        }
        assert!(d.rooms().contains(&room_id));
        assert!(!d.sessions().contains(SessionId(2)));
    }

    #[test]
    fn test_last_player_leaving_deletes_room() {
        let mut d = dispatcher(&[2]);
        let mut rx = connect(&mut d, 1);
        send(&mut d, 1, create("Alice"));
        drain(&mut rx);

        send(&mut d, 1, ClientEvent::LeaveRoom);

        assert!(d.rooms().is_empty());
        assert!(drain(&mut rx).is_empty());
        assert!(d.sessions().contains(SessionId(1)), "connection stays open");

        // Free to create another room afterwards.
        send(&mut d, 1, create("Alice"));
        assert_eq!(d.rooms().len(), 1);
    }

    #[test]
    fn test_leaving_last_active_player_ends_round() {
        let mut d = dispatcher(&[3]);
        let mut rxs: Vec<_> = (1..=3).map(|id| connect(&mut d, id)).collect();
        send(&mut d, 1, create("A"));
        let room_id = d.rooms().room_ids().remove(0);
        send(&mut d, 2, join(&room_id, "B"));
        send(&mut d, 3, join(&room_id, "C"));

        // A rolls 3, B and C hold at 0, then A leaves: nobody is active.
        send(&mut d, 1, ClientEvent::RollDice);
        send(&mut d, 2, ClientEvent::Hold);
        send(&mut d, 3, ClientEvent::Hold);
        for rx in &mut rxs {
            drain(rx);
        }
        send(&mut d, 1, ClientEvent::LeaveRoom);

        let events = drain(&mut rxs[1]);
        let names: Vec<&str> = events.iter().map(ServerEvent::name).collect();
        assert_eq!(names, vec!["PLAYER_LEFT", "GAME_OVER"]);
        match &events[1] {
            ServerEvent::GameOver { winner, message, .. } => {
                assert_eq!(winner.as_ref().unwrap().name, "B", "tie goes to the earlier seat");
                assert_eq!(message, "B wins with 0!");
            }
            other => panic!("expected GAME_OVER, got {other:?}"),
        }
    }

    // =====================================================================
    // Malformed frames / slow clients
    // =====================================================================

    #[test]
    fn test_malformed_frame_gets_one_invalid_message_error() {
        let mut d = dispatcher(&[1]);
        let mut rx = connect(&mut d, 1);

        d.handle(Inbound::Malformed { session: SessionId(1) }, Instant::now());

        assert_eq!(drain(&mut rx), vec![ServerEvent::error(INVALID_MESSAGE)]);
        assert!(d.sessions().contains(SessionId(1)));
    }

    #[test]
    fn test_slow_session_is_evicted_from_room() {
        let mut d = dispatcher(&[1]);
        let mut alice_rx = connect(&mut d, 1);
        let (tx, mut bob_rx) = mpsc::channel(1);
        d.handle(
            Inbound::Connected {
                session: SessionId(2),
                sender: tx,
            },
            Instant::now(),
        );
        let (room_id, _, bob) = two_player_room(&mut d, &mut alice_rx, &mut bob_rx);

        // Bob stops reading: DICE_ROLLED fills his queue, TURN_CHANGED overflows it.
        send(&mut d, 1, ClientEvent::RollDice);

        assert!(!d.sessions().contains(SessionId(2)));
        let room = d.rooms().get(&room_id).unwrap();
        assert_eq!(room.player_count(), 1);
        assert!(room.player(&bob).is_none());

        let names: Vec<_> = drain(&mut alice_rx).iter().map(|e| e.name()).collect();
        assert_eq!(names, ["DICE_ROLLED", "TURN_CHANGED", "PLAYER_LEFT"]);

        assert_eq!(bob_rx.try_recv().unwrap().name(), "DICE_ROLLED");
        assert!(matches!(bob_rx.try_recv(), Err(TryRecvError::Disconnected)));
    }

    // =====================================================================
    // Sweep
    // =====================================================================

    #[test]
    fn test_sweep_detaches_players_from_idle_room() {
        let mut d = dispatcher(&[1]);
        let mut rx = connect(&mut d, 1);
        let t0 = Instant::now();
        d.handle(
            Inbound::Event {
                session: SessionId(1),
                event: create("Alone"),
            },
            t0,
        );
        drain(&mut rx);

        let removed = d.sweep(t0 + RoomConfig::default().idle_timeout + Duration::from_secs(1));

        assert_eq!(removed.len(), 1);
        assert!(d.rooms().is_empty());
        assert!(d.sessions().binding(SessionId(1)).is_none());
        assert_eq!(errors(&drain(&mut rx)).len(), 1);
    }

    // =====================================================================
    // Actor
    // =====================================================================

    #[tokio::test]
    async fn test_spawned_dispatcher_processes_commands_in_order() {
        let (handle, task) = spawn_dispatcher(dispatcher(&[1]), Duration::from_secs(60));
        let (tx, mut rx) = mpsc::channel(OUTBOUND_CHANNEL_SIZE);

        handle.connect(SessionId(1), tx).await.unwrap();
        handle.event(SessionId(1), create("Alice")).await.unwrap();
        handle.event(SessionId(1), ClientEvent::RollDice).await.unwrap();

        let created = rx.recv().await.unwrap();
        assert_eq!(created.name(), "ROOM_CREATED");
        let rejected = rx.recv().await.unwrap();
        assert_eq!(rejected, ServerEvent::error("Waiting for another player to join"));

        handle.disconnect(SessionId(1)).await.unwrap();
        drop(handle);
        task.await.unwrap();
        assert!(rx.recv().await.is_none(), "session sender dropped on disconnect");
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_dispatcher_sweeps_on_interval() {
        let config = RoomConfig {
            idle_timeout: Duration::from_secs(120),
            sweep_interval: Duration::from_secs(60),
            ..RoomConfig::default()
        };
        let d = Dispatcher::new(RoomRegistry::with_dice(
            config.clone(),
            Box::new(|| Box::new(ScriptedDice::new([1]))),
        ));
        let (handle, _task) = spawn_dispatcher(d, config.sweep_interval);
        let (tx, mut rx) = mpsc::channel(OUTBOUND_CHANNEL_SIZE);
        handle.connect(SessionId(1), tx).await.unwrap();
        handle.event(SessionId(1), create("Alone")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().name(), "ROOM_CREATED");

        tokio::time::sleep(Duration::from_secs(181)).await;

        match rx.recv().await.unwrap() {
            ServerEvent::Error { message } => assert!(message.contains("closed after being idle")),
            other => panic!("expected ERROR, got {other:?}"),
        }
        handle.event(SessionId(1), ClientEvent::RollDice).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), ServerEvent::error("You are not in a room"));
    }
}
