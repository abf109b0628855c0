//! The three timed activities of a round (letter revealer, round timer,
//! answer timer) plus round start/advance orchestration.
//!
//! Every task follows the same shape: lock the room, re-check `state`, act,
//! release, sleep. Cancellation is a `JoinHandle::abort` paired with those
//! guards, so an aborted or stale task never broadcasts again and never
//! overwrites state set by whoever cancelled it.
//!
//! Host commentary is never awaited with the room lock held: callers snapshot
//! what the narrator needs, release, narrate, then re-lock and re-validate
//! before broadcasting. Timers keep ticking and events keep flowing while the
//! model is thinking.

use super::RoomHandle;
use crate::host::HostEvent;
use crate::protocol::ServerMessage;
use crate::reveal::{masked_display, reveal_order};
use crate::types::RoomState;
use std::time::Duration;

impl RoomHandle {
    /// Pick a puzzle, narrate the round intro, then commit the reset room
    /// state and kick off the round timer and letter revealer. The commit
    /// happens after narration so nobody can buzz into a round that has not
    /// been announced yet; `round_starting` keeps a second start from
    /// interleaving with the narration window.
    pub async fn start_round(&self) {
        let (puzzle, order, round_number, context) = {
            let mut room = self.room.lock().await;
            if room.round_starting
                || room.players.is_empty()
                || !matches!(room.state, RoomState::Waiting | RoomState::RoundOver)
            {
                return;
            }
            room.round_starting = true;
            room.cancel_timed_activities();

            let (puzzle, order) = {
                let mut rng = rand::rng();
                let puzzle = self.puzzles.choose(&mut rng);
                let order = reveal_order(&puzzle.answer, &mut rng);
                (puzzle, order)
            };
            (puzzle, order, room.round_number, room.host_context())
        };

        let host_message = self
            .host
            .narrate(
                &HostEvent::RoundStart {
                    round_number,
                    category: puzzle.category.clone(),
                },
                Some(&context),
            )
            .await;
        let audio = self.host.synthesize(&host_message).await;

        let mut room = self.room.lock().await;
        room.round_starting = false;
        if room.players.is_empty() || room.round_number != round_number {
            return;
        }

        room.revealed_positions.clear();
        room.buzzed_player = None;
        room.state = RoomState::BuzzerActive;
        room.remaining_time = room.config.round_time_limit;
        for player in room.players.values_mut() {
            player.can_buzz = true;
        }
        room.current_puzzle = Some(puzzle.clone());

        room.broadcast(ServerMessage::RoundStart {
            round_number,
            category: puzzle.category.clone(),
            host_message,
            puzzle_display: masked_display(&puzzle.answer, &room.revealed_positions),
            time_limit: room.config.round_time_limit,
            audio,
        });
        room.broadcast(ServerMessage::BuzzerActive {
            message: "Buzzer is active! Buzz in if you know the answer!".to_string(),
        });

        room.tasks.round_timer = Some(spawn_round_timer(self.clone()));
        room.tasks.revealer = Some(spawn_revealer(self.clone(), order));

        tracing::debug!(
            "Room {}: round {} started ({})",
            room.id,
            round_number,
            puzzle.category
        );
    }

    /// After the inter-round delay, bump the round number and start the next
    /// round. Spawned as its own task so the timer that ended the round is
    /// never the one aborted mid-restart.
    pub fn schedule_advance(&self, room: &mut super::Room) {
        let handle = self.clone();
        let delay = room.config.next_round_delay;
        room.tasks.advance = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            {
                let mut room = handle.room.lock().await;
                if room.state != RoomState::RoundOver || room.players.is_empty() {
                    return;
                }
                room.round_number += 1;
            }
            handle.start_round().await;
        }));
    }

    /// Announce the end of a round and schedule the next one. The caller has
    /// already set `state` to `RoundOver` under the lock; narration runs
    /// unlocked and the result is re-validated against the round it
    /// described before anything is broadcast.
    pub(super) async fn finish_round(&self, msg: RoundEndMessage) {
        let (answer, round_number, context) = {
            let room = self.room.lock().await;
            if room.state != RoomState::RoundOver {
                return;
            }
            let answer = match &room.current_puzzle {
                Some(puzzle) => puzzle.answer.clone(),
                None => return,
            };
            (answer, room.round_number, room.host_context())
        };

        let host_message = self
            .host
            .narrate(
                &HostEvent::RoundComplete {
                    answer: answer.clone(),
                },
                Some(&context),
            )
            .await;
        let audio = self.host.synthesize(&host_message).await;

        let mut room = self.room.lock().await;
        if room.state != RoomState::RoundOver
            || room.round_number != round_number
            || room.players.is_empty()
        {
            return;
        }

        room.broadcast(match msg {
            RoundEndMessage::TimerExpired => ServerMessage::TimerExpired {
                message: "Time's up!".to_string(),
                host_message,
                answer,
                audio,
            },
            RoundEndMessage::RoundTimeout => ServerMessage::RoundTimeout {
                answer,
                host_message,
                audio,
            },
            RoundEndMessage::AllRevealed => ServerMessage::HostMessage {
                message: host_message,
                round_complete: true,
                audio,
            },
        });
        self.schedule_advance(&mut room);
    }
}

/// Which wire message announces the end of the round.
pub(super) enum RoundEndMessage {
    /// The 45 second round clock ran out.
    TimerExpired,
    /// No player left with buzzing rights.
    RoundTimeout,
    /// Every letter got revealed without a buzz.
    AllRevealed,
}

/// Gradually disclose letters in the precomputed order, pacing down once
/// enough of the board is visible to be solvable.
fn spawn_revealer(handle: RoomHandle, order: Vec<usize>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let total = order.len();
        let mut revealed_count = 0usize;

        for position in order {
            let pause = {
                let mut room = handle.room.lock().await;
                // Someone buzzed or the round ended while we slept.
                if room.state != RoomState::BuzzerActive {
                    return;
                }
                let puzzle = match room.current_puzzle.clone() {
                    Some(p) => p,
                    None => return,
                };

                room.revealed_positions.insert(position);
                revealed_count += 1;

                let puzzle_display = masked_display(&puzzle.answer, &room.revealed_positions);
                let mut revealed_positions: Vec<usize> =
                    room.revealed_positions.iter().copied().collect();
                revealed_positions.sort_unstable();
                room.broadcast(ServerMessage::PuzzleUpdate {
                    puzzle_display,
                    revealed_positions,
                    category: puzzle.category.clone(),
                });

                // Leave think-time once the board is solvable.
                if revealed_count as f64 >= 3.0_f64.max(total as f64 * 0.4) {
                    Duration::from_secs(3)
                } else {
                    Duration::from_secs(2)
                }
            };
            tokio::time::sleep(pause).await;
        }

        // All letters out and nobody buzzed: the round is over.
        let ended = {
            let mut room = handle.room.lock().await;
            if room.state == RoomState::BuzzerActive {
                room.state = RoomState::RoundOver;
                true
            } else {
                false
            }
        };
        if ended {
            handle.finish_round(RoundEndMessage::AllRevealed).await;
        }
    })
}

/// Count the round budget down one second at a time, freezing (not merely
/// slowing) while an answer is pending.
fn spawn_round_timer(handle: RoomHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let paused = {
                let room = handle.room.lock().await;
                if room.remaining_time == 0
                    || matches!(room.state, RoomState::RoundOver | RoomState::Waiting)
                {
                    break;
                }
                let paused = room.state == RoomState::WaitingAnswer;
                room.broadcast(ServerMessage::TimerUpdate {
                    remaining_time: room.remaining_time,
                    is_paused: paused,
                });
                paused
            };

            if paused {
                // Cooperative pause: keep the frozen value visible on a
                // slower cadence, decrement nothing.
                tokio::time::sleep(Duration::from_secs(2)).await;
            } else {
                tokio::time::sleep(Duration::from_secs(1)).await;
                let mut room = handle.room.lock().await;
                room.remaining_time = room.remaining_time.saturating_sub(1);
            }
        }

        let ended = {
            let mut room = handle.room.lock().await;
            if room.remaining_time == 0
                && !matches!(room.state, RoomState::RoundOver | RoomState::WaitingAnswer)
            {
                room.state = RoomState::RoundOver;
                true
            } else {
                false
            }
        };
        if ended {
            handle.finish_round(RoundEndMessage::TimerExpired).await;
        }
    })
}

/// Count down the buzzed-in player's answer window; on expiry forfeit their
/// turn and hand the buzzer back, or end the round if nobody is left.
pub(super) fn spawn_answer_timer(handle: RoomHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            {
                let room = handle.room.lock().await;
                if room.answer_remaining_time == 0 || room.state != RoomState::WaitingAnswer {
                    break;
                }
                room.broadcast(ServerMessage::AnswerTimerUpdate {
                    remaining_time: room.answer_remaining_time,
                    total_time: room.config.answer_time_limit,
                    is_paused: false,
                });
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
            let mut room = handle.room.lock().await;
            room.answer_remaining_time = room.answer_remaining_time.saturating_sub(1);
        }

        let ended = {
            let mut room = handle.room.lock().await;
            if room.answer_remaining_time == 0 && room.state == RoomState::WaitingAnswer {
                // The buzzer may have disconnected during the window; the
                // slot is cleared either way so the room can never wedge in
                // WaitingAnswer.
                let buzzed = room
                    .buzzed_player
                    .as_ref()
                    .and_then(|id| room.players.get(id))
                    .map(|p| p.id.clone());
                if let Some(player_id) = buzzed {
                    let player = room
                        .players
                        .get_mut(&player_id)
                        .map(|p| {
                            p.can_buzz = false;
                            p.name.clone()
                        })
                        .unwrap_or_default();
                    room.broadcast(ServerMessage::AnswerTimeout {
                        player_name: player.clone(),
                        host_message: format!("{} took too long to answer! Time's up.", player),
                        message: "Answer time expired!".to_string(),
                    });
                }

                room.buzzed_player = None;
                room.state = RoomState::BuzzerActive;
                room.broadcast(ServerMessage::TimerResumed {
                    message: "Main timer resumed! Other players can still buzz in.".to_string(),
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
            } else {
                None
            }
        };
        if let Some(msg) = ended {
            handle.finish_round(msg).await;
        }
    })
}
