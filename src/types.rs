use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opaque ID types for type safety
pub type PlayerId = String;
pub type RoomId = String;

/// A single toss-up puzzle. Loaded once at startup and shared read-only
/// across rooms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Puzzle {
    pub category: String,
    /// Uppercase letters, spaces and punctuation.
    pub answer: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Per-connection player. Owned exclusively by its room.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    /// Reset to true at every round start; cleared for the rest of the round
    /// when this player answers wrong or lets the answer timer run out.
    pub can_buzz: bool,
}

impl Player {
    pub fn new(name: String) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            name,
            score: 0,
            can_buzz: true,
        }
    }
}

/// Room lifecycle states.
///
/// Invariant: `buzzed_player` is set iff the room is in `WaitingAnswer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Waiting,
    BuzzerActive,
    WaitingAnswer,
    RoundOver,
}

/// Fixed per-room game parameters. Tests inject shorter values.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Round time budget in seconds.
    pub round_time_limit: u32,
    /// Seconds a buzzed-in player has to answer.
    pub answer_time_limit: u32,
    /// Points awarded for a correct answer.
    pub answer_points: u32,
    /// Pause between a round ending and the next one starting.
    pub next_round_delay: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_time_limit: 45,
            answer_time_limit: 10,
            answer_points: 100,
            next_round_delay: Duration::from_secs(3),
        }
    }
}
