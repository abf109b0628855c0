use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    StartGame,
    BuzzIn,
    SubmitAnswer { answer: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent to the joining connection only.
    Welcome {
        player_id: PlayerId,
        player_name: String,
        room_id: RoomId,
        message: String,
        #[serde(flatten)]
        audio: Option<AudioClip>,
    },
    /// Full roster with scores, re-broadcast on every roster or score change.
    PlayerUpdate {
        players: Vec<PlayerInfo>,
    },
    RoundStart {
        round_number: u32,
        category: String,
        host_message: String,
        puzzle_display: String,
        time_limit: u32,
        #[serde(flatten)]
        audio: Option<AudioClip>,
    },
    BuzzerActive {
        message: String,
    },
    PuzzleUpdate {
        puzzle_display: String,
        revealed_positions: Vec<usize>,
        category: String,
    },
    TimerUpdate {
        remaining_time: u32,
        is_paused: bool,
    },
    PlayerBuzzed {
        player_name: String,
        answer_time_limit: u32,
        message: String,
    },
    AnswerReceived {
        message: String,
    },
    AnswerTimerUpdate {
        remaining_time: u32,
        total_time: u32,
        is_paused: bool,
    },
    AnswerTimeout {
        player_name: String,
        host_message: String,
        message: String,
    },
    TimerResumed {
        message: String,
    },
    CorrectAnswer {
        winner: String,
        answer: String,
        host_message: String,
        scores: HashMap<PlayerId, ScoreEntry>,
        #[serde(flatten)]
        audio: Option<AudioClip>,
    },
    IncorrectAnswer {
        player_name: String,
        guess: String,
        host_message: String,
        #[serde(flatten)]
        audio: Option<AudioClip>,
    },
    /// Round ended because no eligible buzzers remain.
    RoundTimeout {
        answer: String,
        host_message: String,
        #[serde(flatten)]
        audio: Option<AudioClip>,
    },
    /// Round ended because the round clock ran out.
    TimerExpired {
        message: String,
        host_message: String,
        answer: String,
        #[serde(flatten)]
        audio: Option<AudioClip>,
    },
    /// Free-form host narration, e.g. when every letter has been revealed.
    HostMessage {
        message: String,
        round_complete: bool,
        #[serde(flatten)]
        audio: Option<AudioClip>,
    },
    Error {
        code: String,
        msg: String,
    },
}

/// Roster entry as broadcast to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
}

impl From<&Player> for PlayerInfo {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            score: p.score,
        }
    }
}

/// Score map entry carried by `correct_answer`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreEntry {
    pub name: String,
    pub score: u32,
}

/// Base64-encoded synthesized narration, attached only when TTS succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioClip {
    pub audio: String,
    pub audio_format: String,
}
