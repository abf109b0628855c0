//! Inbound player events. All state transitions for a room happen behind its
//! mutex, so no two events for the same room are ever applied concurrently;
//! a simultaneous second buzz simply finds the slot taken and is dropped.
//!
//! Answer verdicts are decided and committed under the lock first; only the
//! narration of an already-decided verdict runs unlocked, re-validated
//! before its broadcast.

use super::tasks::{spawn_answer_timer, RoundEndMessage};
use super::RoomHandle;
use crate::host::HostEvent;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::types::{PlayerId, RoomState};

/// Dispatch one inbound event. Out-of-state events are rejected silently,
/// with no side effects (the guards in the state table).
pub async fn handle_message(handle: &RoomHandle, player_id: &PlayerId, msg: ClientMessage) {
    match msg {
        ClientMessage::StartGame => handle_start_game(handle).await,
        ClientMessage::BuzzIn => handle_buzz_in(handle, player_id).await,
        ClientMessage::SubmitAnswer { answer } => {
            handle_submit_answer(handle, player_id, answer).await
        }
    }
}

async fn handle_start_game(handle: &RoomHandle) {
    {
        let room = handle.room.lock().await;
        if room.state != RoomState::Waiting {
            tracing::debug!("Room {}: start_game ignored, game already running", room.id);
            return;
        }
    }
    // start_round re-checks state and rejects a racing second start itself.
    handle.start_round().await;
}

async fn handle_buzz_in(handle: &RoomHandle, player_id: &PlayerId) {
    let mut room = handle.room.lock().await;
    if room.state != RoomState::BuzzerActive || room.buzzed_player.is_some() {
        tracing::debug!("Room {}: buzz from {} lost the race", room.id, player_id);
        return;
    }
    let player_name = match room.players.get(player_id) {
        Some(p) if p.can_buzz => p.name.clone(),
        Some(p) => {
            tracing::debug!("Room {}: {} has no buzz left this round", room.id, p.name);
            return;
        }
        None => return,
    };

    room.buzzed_player = Some(player_id.clone());
    room.state = RoomState::WaitingAnswer;
    room.answer_remaining_time = room.config.answer_time_limit;

    // Letters stop coming out while an answer is pending. The round timer
    // keeps running but freezes on its own once it sees WaitingAnswer.
    room.cancel_revealer();

    let answer_time_limit = room.config.answer_time_limit;
    room.broadcast(ServerMessage::PlayerBuzzed {
        player_name: player_name.clone(),
        answer_time_limit,
        message: format!(
            "{} buzzed in! Timer paused. You have {} seconds to answer...",
            player_name, answer_time_limit
        ),
    });

    room.tasks.answer_timer = Some(spawn_answer_timer(handle.clone()));
}

/// Outcome of an answer, decided under the room lock before narration.
enum Verdict {
    Correct { winner: String, answer: String },
    Incorrect { player_name: String, guess: String },
}

async fn handle_submit_answer(handle: &RoomHandle, player_id: &PlayerId, answer: String) {
    let (verdict, round_number, context) = {
        let mut room = handle.room.lock().await;
        if room.state != RoomState::WaitingAnswer
            || room.buzzed_player.as_ref() != Some(player_id)
        {
            tracing::debug!(
                "Room {}: answer from {} rejected, they don't hold the buzzer",
                room.id,
                player_id
            );
            return;
        }
        let puzzle = match room.current_puzzle.clone() {
            Some(p) => p,
            None => return,
        };

        room.broadcast(ServerMessage::AnswerReceived {
            message: "Answer submitted. Checking...".to_string(),
        });
        room.cancel_answer_timer();

        let guess = answer.trim().to_uppercase();
        let correct_answer = puzzle.answer.to_uppercase();

        let verdict = if guess == correct_answer {
            let points = room.config.answer_points;
            let winner = match room.players.get_mut(player_id) {
                Some(p) => {
                    p.score += points;
                    p.name.clone()
                }
                None => {
                    room.buzzed_player = None;
                    room.state = RoomState::BuzzerActive;
                    return;
                }
            };
            // The round is won: stop the clock and the reveal schedule now,
            // and close the buzzer before narration starts.
            room.cancel_round_timer();
            room.cancel_revealer();
            room.buzzed_player = None;
            room.state = RoomState::RoundOver;
            Verdict::Correct {
                winner,
                answer: correct_answer,
            }
        } else {
            // Burn the buzz now; the buzzer reopens once the verdict has
            // been narrated and broadcast. The answer timer is already
            // cancelled, so nothing else moves the room meanwhile.
            let player_name = match room.players.get_mut(player_id) {
                Some(p) => {
                    p.can_buzz = false;
                    p.name.clone()
                }
                None => {
                    room.buzzed_player = None;
                    room.state = RoomState::BuzzerActive;
                    return;
                }
            };
            Verdict::Incorrect { player_name, guess }
        };
        (verdict, room.round_number, room.host_context())
    };

    match verdict {
        Verdict::Correct { winner, answer } => {
            let host_message = handle
                .host
                .narrate(
                    &HostEvent::CorrectAnswer {
                        player_name: winner.clone(),
                        answer: answer.clone(),
                    },
                    Some(&context),
                )
                .await;
            let audio = handle.host.synthesize(&host_message).await;

            let mut room = handle.room.lock().await;
            if room.state != RoomState::RoundOver
                || room.round_number != round_number
                || room.players.is_empty()
            {
                return;
            }
            let scores = room.score_map();
            room.broadcast(ServerMessage::CorrectAnswer {
                winner,
                answer,
                host_message,
                scores,
                audio,
            });
            let roster = room.roster();
            room.broadcast(ServerMessage::PlayerUpdate { players: roster });
            handle.schedule_advance(&mut room);
        }
        Verdict::Incorrect { player_name, guess } => {
            let host_message = handle
                .host
                .narrate(
                    &HostEvent::IncorrectAnswer {
                        player_name: player_name.clone(),
                        guess: guess.clone(),
                    },
                    Some(&context),
                )
                .await;
            let audio = handle.host.synthesize(&host_message).await;

            let ended = {
                let mut room = handle.room.lock().await;
                if room.state != RoomState::WaitingAnswer
                    || room.buzzed_player.as_ref() != Some(player_id)
                    || room.round_number != round_number
                {
                    return;
                }
                room.broadcast(ServerMessage::IncorrectAnswer {
                    player_name,
                    guess,
                    host_message,
                    audio,
                });

                // Hand the buzzer back; the reveal schedule stays cancelled,
                // only the round clock picks back up.
                room.buzzed_player = None;
                room.state = RoomState::BuzzerActive;
                room.broadcast(ServerMessage::TimerResumed {
                    message: "Timer resumed! Other players can still buzz in.".to_string(),
                });

                // A buzz that landed right as the round clock hit zero leaves
                // no live round timer to expire; the round ends here instead.
                if room.remaining_time == 0 {
                    room.state = RoomState::RoundOver;
                    Some(RoundEndMessage::TimerExpired)
                } else if !room.any_can_buzz() {
                    room.state = RoomState::RoundOver;
                    Some(RoundEndMessage::RoundTimeout)
                } else {
                    None
                }
            };
            if let Some(msg) = ended {
                handle.finish_round(msg).await;
            }
        }
    }
}
