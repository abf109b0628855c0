use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::Receiver;
use tossup::host::{GameHost, HostResult, NarrateRequest, Narrator};
use tossup::protocol::{ClientMessage, ServerMessage};
use tossup::puzzles::PuzzleStore;
use tossup::registry::RoomRegistry;
use tossup::room::events::handle_message;
use tossup::types::{Difficulty, GameConfig, Puzzle, RoomState};

/// Registry with a static host and a single known puzzle, so every round is
/// "LAPTOP COMPUTER" and the answer checks are deterministic.
fn test_registry() -> Arc<RoomRegistry> {
    let store = PuzzleStore::new(vec![Puzzle {
        category: "THING".to_string(),
        answer: "LAPTOP COMPUTER".to_string(),
        difficulty: Difficulty::Medium,
    }]);
    Arc::new(RoomRegistry::new(
        Arc::new(GameHost::disabled()),
        Arc::new(store),
        GameConfig::default(),
    ))
}

/// Narrator that takes five seconds per line, for checking that nothing in
/// the room waits on commentary.
struct PonderousNarrator;

#[async_trait]
impl Narrator for PonderousNarrator {
    async fn narrate(&self, _request: NarrateRequest) -> HostResult<String> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("What a game!".to_string())
    }

    fn name(&self) -> &str {
        "ponderous"
    }
}

fn slow_host_registry() -> Arc<RoomRegistry> {
    let store = PuzzleStore::new(vec![Puzzle {
        category: "THING".to_string(),
        answer: "LAPTOP COMPUTER".to_string(),
        difficulty: Difficulty::Medium,
    }]);
    Arc::new(RoomRegistry::new(
        Arc::new(GameHost::with_narrator(Box::new(PonderousNarrator))),
        Arc::new(store),
        GameConfig::default(),
    ))
}

/// Read broadcasts until one matches, failing after a generous scan budget.
async fn next_matching(
    rx: &mut Receiver<ServerMessage>,
    pred: impl Fn(&ServerMessage) -> bool,
) -> ServerMessage {
    for _ in 0..500 {
        let msg = rx.recv().await.expect("broadcast channel closed");
        if pred(&msg) {
            return msg;
        }
    }
    panic!("expected broadcast never arrived");
}

#[tokio::test(start_paused = true)]
async fn round_start_masks_the_puzzle_and_arms_the_buzzer() {
    let registry = test_registry();
    let joined = registry.join("R1", Some("Alice".to_string())).await;
    let mut rx = joined.rx;

    handle_message(&joined.handle, &joined.player_id, ClientMessage::StartGame).await;

    let round_start =
        next_matching(&mut rx, |m| matches!(m, ServerMessage::RoundStart { .. })).await;
    match round_start {
        ServerMessage::RoundStart {
            round_number,
            category,
            puzzle_display,
            time_limit,
            ..
        } => {
            assert_eq!(round_number, 1);
            assert_eq!(category, "THING");
            // Spaces stay visible, every letter is hidden.
            assert_eq!(puzzle_display, "______ ________");
            assert_eq!(time_limit, 45);
        }
        other => panic!("unexpected message: {:?}", other),
    }

    next_matching(&mut rx, |m| matches!(m, ServerMessage::BuzzerActive { .. })).await;

    let room = joined.handle.room.lock().await;
    assert_eq!(room.state, RoomState::BuzzerActive);
    assert_eq!(room.round_number, 1);
}

#[tokio::test(start_paused = true)]
async fn correct_answer_scores_and_auto_starts_the_next_round() {
    let registry = test_registry();
    let joined = registry.join("R1", Some("Alice".to_string())).await;
    let mut rx = joined.rx;

    handle_message(&joined.handle, &joined.player_id, ClientMessage::StartGame).await;
    next_matching(&mut rx, |m| matches!(m, ServerMessage::BuzzerActive { .. })).await;

    handle_message(&joined.handle, &joined.player_id, ClientMessage::BuzzIn).await;
    next_matching(&mut rx, |m| matches!(m, ServerMessage::PlayerBuzzed { .. })).await;

    // Case-insensitive, whitespace-trimmed comparison.
    handle_message(
        &joined.handle,
        &joined.player_id,
        ClientMessage::SubmitAnswer {
            answer: "  laptop computer ".to_string(),
        },
    )
    .await;

    let correct =
        next_matching(&mut rx, |m| matches!(m, ServerMessage::CorrectAnswer { .. })).await;
    match correct {
        ServerMessage::CorrectAnswer {
            winner,
            answer,
            scores,
            ..
        } => {
            assert_eq!(winner, "Alice");
            assert_eq!(answer, "LAPTOP COMPUTER");
            assert_eq!(scores[&joined.player_id].score, 100);
        }
        other => panic!("unexpected message: {:?}", other),
    }

    // Scores broadcast follows the result, then the next round starts on its
    // own after the fixed delay.
    next_matching(&mut rx, |m| matches!(m, ServerMessage::PlayerUpdate { .. })).await;
    let next_round =
        next_matching(&mut rx, |m| matches!(m, ServerMessage::RoundStart { .. })).await;
    match next_round {
        ServerMessage::RoundStart { round_number, .. } => assert_eq!(round_number, 2),
        other => panic!("unexpected message: {:?}", other),
    }

    let room = joined.handle.room.lock().await;
    assert_eq!(room.players[&joined.player_id].score, 100);
    assert!(room.players[&joined.player_id].can_buzz);
}

#[tokio::test(start_paused = true)]
async fn lone_wrong_answer_ends_the_round_immediately() {
    let registry = test_registry();
    let joined = registry.join("R1", Some("Alice".to_string())).await;
    let mut rx = joined.rx;

    handle_message(&joined.handle, &joined.player_id, ClientMessage::StartGame).await;
    next_matching(&mut rx, |m| matches!(m, ServerMessage::BuzzerActive { .. })).await;

    handle_message(&joined.handle, &joined.player_id, ClientMessage::BuzzIn).await;
    handle_message(
        &joined.handle,
        &joined.player_id,
        ClientMessage::SubmitAnswer {
            answer: "TOASTER OVEN".to_string(),
        },
    )
    .await;

    let incorrect =
        next_matching(&mut rx, |m| matches!(m, ServerMessage::IncorrectAnswer { .. })).await;
    match incorrect {
        ServerMessage::IncorrectAnswer {
            player_name, guess, ..
        } => {
            assert_eq!(player_name, "Alice");
            assert_eq!(guess, "TOASTER OVEN");
        }
        other => panic!("unexpected message: {:?}", other),
    }

    // Nobody left who can buzz: the answer is revealed right away.
    let timeout =
        next_matching(&mut rx, |m| matches!(m, ServerMessage::RoundTimeout { .. })).await;
    match timeout {
        ServerMessage::RoundTimeout { answer, .. } => assert_eq!(answer, "LAPTOP COMPUTER"),
        other => panic!("unexpected message: {:?}", other),
    }

    // No score awarded for the miss.
    let room = joined.handle.room.lock().await;
    assert_eq!(room.players[&joined.player_id].score, 0);
}

#[tokio::test(start_paused = true)]
async fn second_buzz_loses_the_race_and_spent_players_cannot_rebuzz() {
    let registry = test_registry();
    let alice = registry.join("R1", Some("Alice".to_string())).await;
    let bob = registry.join("R1", Some("Bob".to_string())).await;
    let mut rx = bob.rx;

    handle_message(&alice.handle, &alice.player_id, ClientMessage::StartGame).await;
    next_matching(&mut rx, |m| matches!(m, ServerMessage::BuzzerActive { .. })).await;

    handle_message(&alice.handle, &alice.player_id, ClientMessage::BuzzIn).await;
    handle_message(&bob.handle, &bob.player_id, ClientMessage::BuzzIn).await;

    // Only Alice's buzz lands.
    {
        let room = alice.handle.room.lock().await;
        assert_eq!(room.state, RoomState::WaitingAnswer);
        assert_eq!(room.buzzed_player.as_ref(), Some(&alice.player_id));
    }

    handle_message(
        &alice.handle,
        &alice.player_id,
        ClientMessage::SubmitAnswer {
            answer: "WRONG".to_string(),
        },
    )
    .await;
    next_matching(&mut rx, |m| matches!(m, ServerMessage::TimerResumed { .. })).await;

    // Alice spent her buzz; her next attempt changes nothing.
    handle_message(&alice.handle, &alice.player_id, ClientMessage::BuzzIn).await;
    {
        let room = alice.handle.room.lock().await;
        assert_eq!(room.state, RoomState::BuzzerActive);
        assert!(room.buzzed_player.is_none());
        assert!(!room.players[&alice.player_id].can_buzz);
        assert!(room.players[&bob.player_id].can_buzz);
    }

    // Bob still can.
    handle_message(&bob.handle, &bob.player_id, ClientMessage::BuzzIn).await;
    let room = bob.handle.room.lock().await;
    assert_eq!(room.buzzed_player.as_ref(), Some(&bob.player_id));
}

#[tokio::test(start_paused = true)]
async fn round_timer_freezes_while_an_answer_is_pending() {
    let registry = test_registry();
    let alice = registry.join("R1", Some("Alice".to_string())).await;
    let bob = registry.join("R1", Some("Bob".to_string())).await;
    let mut rx = alice.rx;

    handle_message(&alice.handle, &alice.player_id, ClientMessage::StartGame).await;
    next_matching(&mut rx, |m| matches!(m, ServerMessage::BuzzerActive { .. })).await;

    handle_message(&alice.handle, &alice.player_id, ClientMessage::BuzzIn).await;
    next_matching(&mut rx, |m| matches!(m, ServerMessage::PlayerBuzzed { .. })).await;

    // Two consecutive paused ticks carry the same frozen value.
    let first = next_matching(&mut rx, |m| {
        matches!(m, ServerMessage::TimerUpdate { is_paused: true, .. })
    })
    .await;
    let second = next_matching(&mut rx, |m| {
        matches!(m, ServerMessage::TimerUpdate { is_paused: true, .. })
    })
    .await;
    let frozen = match (first, second) {
        (
            ServerMessage::TimerUpdate {
                remaining_time: a, ..
            },
            ServerMessage::TimerUpdate {
                remaining_time: b, ..
            },
        ) => {
            assert_eq!(a, b, "paused round timer must not decrement");
            a
        }
        other => panic!("unexpected messages: {:?}", other),
    };

    // Alice lets the answer window run out; the round timer resumes from
    // exactly where it stopped.
    next_matching(&mut rx, |m| matches!(m, ServerMessage::AnswerTimeout { .. })).await;
    next_matching(&mut rx, |m| matches!(m, ServerMessage::TimerResumed { .. })).await;
    let resumed = next_matching(&mut rx, |m| {
        matches!(m, ServerMessage::TimerUpdate { is_paused: false, .. })
    })
    .await;
    match resumed {
        ServerMessage::TimerUpdate { remaining_time, .. } => assert_eq!(remaining_time, frozen),
        other => panic!("unexpected message: {:?}", other),
    }

    let room = alice.handle.room.lock().await;
    assert_eq!(room.state, RoomState::BuzzerActive);
    assert!(!room.players[&alice.player_id].can_buzz);
    assert!(room.players[&bob.player_id].can_buzz);
}

#[tokio::test(start_paused = true)]
async fn answer_timeout_with_no_buzzers_left_ends_the_round() {
    let registry = test_registry();
    let joined = registry.join("R1", Some("Alice".to_string())).await;
    let mut rx = joined.rx;

    handle_message(&joined.handle, &joined.player_id, ClientMessage::StartGame).await;
    next_matching(&mut rx, |m| matches!(m, ServerMessage::BuzzerActive { .. })).await;

    handle_message(&joined.handle, &joined.player_id, ClientMessage::BuzzIn).await;

    // Never answers: forfeit, and with nobody else eligible the round ends
    // and the next one starts on its own.
    next_matching(&mut rx, |m| matches!(m, ServerMessage::AnswerTimeout { .. })).await;
    next_matching(&mut rx, |m| matches!(m, ServerMessage::RoundTimeout { .. })).await;
    let next_round =
        next_matching(&mut rx, |m| matches!(m, ServerMessage::RoundStart { .. })).await;
    match next_round {
        ServerMessage::RoundStart { round_number, .. } => assert_eq!(round_number, 2),
        other => panic!("unexpected message: {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn letters_reveal_gradually_until_someone_buzzes() {
    let registry = test_registry();
    let joined = registry.join("R1", Some("Alice".to_string())).await;
    let mut rx = joined.rx;

    handle_message(&joined.handle, &joined.player_id, ClientMessage::StartGame).await;

    // Wait for a few letters to come out.
    let mut seen = 0usize;
    let mut last_display = String::new();
    while seen < 3 {
        let msg =
            next_matching(&mut rx, |m| matches!(m, ServerMessage::PuzzleUpdate { .. })).await;
        if let ServerMessage::PuzzleUpdate {
            puzzle_display,
            revealed_positions,
            category,
        } = msg
        {
            seen += 1;
            assert_eq!(category, "THING");
            assert_eq!(revealed_positions.len(), seen);
            assert_eq!(puzzle_display.chars().count(), "LAPTOP COMPUTER".chars().count());
            last_display = puzzle_display;
        }
    }
    // Space stays a space, and something is visible by now.
    assert_eq!(last_display.chars().nth(6), Some(' '));
    assert!(last_display.chars().any(|c| c.is_alphabetic()));

    // A buzz stops the reveal: no further puzzle updates while waiting.
    handle_message(&joined.handle, &joined.player_id, ClientMessage::BuzzIn).await;
    let revealed_at_buzz = {
        let room = joined.handle.room.lock().await;
        assert_eq!(room.state, RoomState::WaitingAnswer);
        room.revealed_positions.len()
    };
    next_matching(&mut rx, |m| matches!(m, ServerMessage::AnswerTimeout { .. })).await;
    let room = joined.handle.room.lock().await;
    assert_eq!(room.revealed_positions.len(), revealed_at_buzz);
}

#[tokio::test(start_paused = true)]
async fn last_leave_destroys_the_room_and_rejoin_starts_fresh() {
    let registry = test_registry();
    let joined = registry.join("R1", Some("Alice".to_string())).await;
    assert_eq!(registry.room_count().await, 1);

    handle_message(&joined.handle, &joined.player_id, ClientMessage::StartGame).await;
    {
        let room = joined.handle.room.lock().await;
        assert_eq!(room.state, RoomState::BuzzerActive);
    }

    registry.leave("R1", &joined.player_id).await;
    assert_eq!(registry.room_count().await, 0);
    assert!(registry.get("R1").await.is_none());

    // Same id, brand-new room.
    let rejoined = registry.join("R1", Some("Bob".to_string())).await;
    assert_eq!(registry.room_count().await, 1);
    let room = rejoined.handle.room.lock().await;
    assert_eq!(room.state, RoomState::Waiting);
    assert_eq!(room.round_number, 1);
    assert_eq!(room.players.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_commentary_does_not_block_joins_or_the_round() {
    let registry = slow_host_registry();
    let alice = registry.join("R1", Some("Alice".to_string())).await;

    let handle = alice.handle.clone();
    let starter_id = alice.player_id.clone();
    let starter = tokio::spawn(async move {
        handle_message(&handle, &starter_id, ClientMessage::StartGame).await;
    });
    // Let the starter task run up to its narration await.
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }

    // Round-start narration is now in flight. Joining the room must not
    // wait on it, and the round must not have committed yet.
    let bob = registry.join("R1", Some("Bob".to_string())).await;
    {
        let room = bob.handle.room.lock().await;
        assert_eq!(room.state, RoomState::Waiting);
        assert_eq!(room.players.len(), 2);
    }

    // A second start_game during the narration window is dropped.
    handle_message(&bob.handle, &bob.player_id, ClientMessage::StartGame).await;

    let mut rx = alice.rx;
    let round_start =
        next_matching(&mut rx, |m| matches!(m, ServerMessage::RoundStart { .. })).await;
    match round_start {
        ServerMessage::RoundStart {
            round_number,
            host_message,
            ..
        } => {
            assert_eq!(round_number, 1);
            assert_eq!(host_message, "What a game!");
        }
        other => panic!("unexpected message: {:?}", other),
    }
    starter.await.unwrap();

    // Exactly one round started, and the mid-narration joiner is in it.
    let mut saw_second_round_start = false;
    loop {
        match rx.recv().await.expect("broadcast channel closed") {
            ServerMessage::RoundStart { .. } => saw_second_round_start = true,
            ServerMessage::PuzzleUpdate { .. } => break,
            _ => {}
        }
    }
    assert!(!saw_second_round_start);

    let room = bob.handle.room.lock().await;
    assert_eq!(room.state, RoomState::BuzzerActive);
    assert!(room.players[&bob.player_id].can_buzz);
}

#[tokio::test(start_paused = true)]
async fn round_timer_keeps_ticking_while_a_verdict_is_narrated() {
    let registry = slow_host_registry();
    let alice = registry.join("R1", Some("Alice".to_string())).await;
    let bob = registry.join("R1", Some("Bob".to_string())).await;
    let mut rx = bob.rx;

    handle_message(&alice.handle, &alice.player_id, ClientMessage::StartGame).await;
    next_matching(&mut rx, |m| matches!(m, ServerMessage::BuzzerActive { .. })).await;

    handle_message(&alice.handle, &alice.player_id, ClientMessage::BuzzIn).await;
    handle_message(
        &alice.handle,
        &alice.player_id,
        ClientMessage::SubmitAnswer {
            answer: "WRONG".to_string(),
        },
    )
    .await;

    // During the ~5 s of incorrect-answer narration the paused round timer
    // must have kept broadcasting its ticks.
    let mut paused_ticks = 0;
    loop {
        match rx.recv().await.expect("broadcast channel closed") {
            ServerMessage::TimerUpdate { is_paused: true, .. } => paused_ticks += 1,
            ServerMessage::IncorrectAnswer { player_name, .. } => {
                assert_eq!(player_name, "Alice");
                break;
            }
            _ => {}
        }
    }
    assert!(
        paused_ticks >= 2,
        "round timer stalled during commentary ({} paused ticks)",
        paused_ticks
    );

    next_matching(&mut rx, |m| matches!(m, ServerMessage::TimerResumed { .. })).await;
    let room = alice.handle.room.lock().await;
    assert_eq!(room.state, RoomState::BuzzerActive);
    assert!(!room.players[&alice.player_id].can_buzz);
    assert!(room.players[&bob.player_id].can_buzz);
}

#[tokio::test(start_paused = true)]
async fn disconnect_of_a_bystander_keeps_the_game_running() {
    let registry = test_registry();
    let alice = registry.join("R1", Some("Alice".to_string())).await;
    let bob = registry.join("R1", Some("Bob".to_string())).await;
    let mut rx = alice.rx;

    handle_message(&alice.handle, &alice.player_id, ClientMessage::StartGame).await;
    next_matching(&mut rx, |m| matches!(m, ServerMessage::BuzzerActive { .. })).await;

    registry.leave("R1", &bob.player_id).await;
    let update =
        next_matching(&mut rx, |m| matches!(m, ServerMessage::PlayerUpdate { .. })).await;
    match update {
        ServerMessage::PlayerUpdate { players } => {
            assert_eq!(players.len(), 1);
            assert_eq!(players[0].name, "Alice");
        }
        other => panic!("unexpected message: {:?}", other),
    }
    assert_eq!(registry.room_count().await, 1);

    // Alice can still play the round out.
    handle_message(&alice.handle, &alice.player_id, ClientMessage::BuzzIn).await;
    let room = alice.handle.room.lock().await;
    assert_eq!(room.state, RoomState::WaitingAnswer);
}
