//! One room = one independent game session: its players, current puzzle,
//! timers, and a broadcast channel every member's connection listens on.

pub mod events;
pub mod tasks;

use crate::host::{GameHost, HostContext};
use crate::protocol::{PlayerInfo, ScoreEntry, ServerMessage};
use crate::puzzles::PuzzleStore;
use crate::reveal::masked_display;
use crate::types::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

/// Broadcast backlog per room before slow receivers start lagging.
const BROADCAST_CAPACITY: usize = 256;

/// Authoritative state of a single room. Only ever mutated with the room
/// mutex held; timed activities re-validate `state` after every sleep before
/// touching anything.
pub struct Room {
    pub id: RoomId,
    pub players: HashMap<PlayerId, Player>,
    pub current_puzzle: Option<Arc<Puzzle>>,
    pub revealed_positions: HashSet<usize>,
    pub state: RoomState,
    pub round_number: u32,
    pub buzzed_player: Option<PlayerId>,
    pub remaining_time: u32,
    pub answer_remaining_time: u32,
    pub config: GameConfig,
    /// Set once the last player has left and the registry is dropping the
    /// room. A join that raced in on a stale handle must not use it.
    pub(crate) closed: bool,
    /// A round start is committing (narration in flight); blocks a second
    /// concurrent start.
    round_starting: bool,
    tx: broadcast::Sender<ServerMessage>,
    tasks: RoomTasks,
}

/// Handles to the concurrently running activities, at most one of each.
#[derive(Default)]
struct RoomTasks {
    revealer: Option<JoinHandle<()>>,
    round_timer: Option<JoinHandle<()>>,
    answer_timer: Option<JoinHandle<()>>,
    /// Pending delayed transition into the next round.
    advance: Option<JoinHandle<()>>,
}

impl Room {
    fn new(id: RoomId, config: GameConfig) -> Self {
        let (tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            id,
            players: HashMap::new(),
            current_puzzle: None,
            revealed_positions: HashSet::new(),
            state: RoomState::Waiting,
            round_number: 1,
            buzzed_player: None,
            remaining_time: 0,
            answer_remaining_time: 0,
            config,
            closed: false,
            round_starting: false,
            tx,
            tasks: RoomTasks::default(),
        }
    }

    /// Send a message to every current room member. Delivery to a member
    /// that already dropped its receiver is silently skipped.
    pub fn broadcast(&self, msg: ServerMessage) {
        let _ = self.tx.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.tx.subscribe()
    }

    pub fn roster(&self) -> Vec<PlayerInfo> {
        self.players.values().map(PlayerInfo::from).collect()
    }

    pub fn score_map(&self) -> HashMap<PlayerId, ScoreEntry> {
        self.players
            .iter()
            .map(|(id, p)| {
                (
                    id.clone(),
                    ScoreEntry {
                        name: p.name.clone(),
                        score: p.score,
                    },
                )
            })
            .collect()
    }

    pub fn host_context(&self) -> HostContext {
        HostContext {
            round: self.round_number,
            scores: self
                .players
                .values()
                .map(|p| (p.name.clone(), p.score))
                .collect(),
        }
    }

    pub fn any_can_buzz(&self) -> bool {
        self.players.values().any(|p| p.can_buzz)
    }

    /// Current masked board, empty string outside a round.
    pub fn puzzle_display(&self) -> String {
        match &self.current_puzzle {
            Some(puzzle) => masked_display(&puzzle.answer, &self.revealed_positions),
            None => String::new(),
        }
    }

    pub(crate) fn cancel_revealer(&mut self) {
        if let Some(task) = self.tasks.revealer.take() {
            task.abort();
        }
    }

    pub(crate) fn cancel_round_timer(&mut self) {
        if let Some(task) = self.tasks.round_timer.take() {
            task.abort();
        }
    }

    pub(crate) fn cancel_answer_timer(&mut self) {
        if let Some(task) = self.tasks.answer_timer.take() {
            task.abort();
        }
    }

    /// Cancel the three timed activities. The pending round-advance task is
    /// deliberately left alone: it is the one calling this on its way into
    /// the next round, and aborting it here would cut that round short.
    pub(crate) fn cancel_timed_activities(&mut self) {
        self.cancel_revealer();
        self.cancel_round_timer();
        self.cancel_answer_timer();
    }

    /// Stop everything. Called when the room is removed from the registry.
    pub(crate) fn shutdown(&mut self) {
        self.closed = true;
        self.cancel_timed_activities();
        if let Some(task) = self.tasks.advance.take() {
            task.abort();
        }
    }
}

/// Cloneable handle bundling a room with the process-wide collaborators its
/// tasks need (commentary host, puzzle catalog).
#[derive(Clone)]
pub struct RoomHandle {
    pub room: Arc<Mutex<Room>>,
    pub host: Arc<GameHost>,
    pub puzzles: Arc<PuzzleStore>,
}

impl RoomHandle {
    pub fn new(
        id: RoomId,
        config: GameConfig,
        host: Arc<GameHost>,
        puzzles: Arc<PuzzleStore>,
    ) -> Self {
        Self {
            room: Arc::new(Mutex::new(Room::new(id, config))),
            host,
            puzzles,
        }
    }

    /// Remove a player, broadcasting the updated roster to whoever is left.
    /// Returns true when the room is now empty. A disconnecting buzzer keeps
    /// the answer window: the answer timer clears the slot on expiry.
    pub async fn remove_player(&self, player_id: &PlayerId) -> bool {
        let mut room = self.room.lock().await;
        if room.players.remove(player_id).is_some() {
            tracing::info!("Player {} left room {}", player_id, room.id);
        }
        if room.players.is_empty() {
            room.shutdown();
            true
        } else {
            let roster = room.roster();
            room.broadcast(ServerMessage::PlayerUpdate { players: roster });
            false
        }
    }
}
