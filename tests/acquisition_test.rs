//! Tests for the oracle move acquisition state machine.

use std::time::Duration;

use nara_chess::{
    AcquisitionFailure, AcquisitionState, AttemptOutcome, ChatEntry, ChatLog, GameSession,
    HumanMove, MAX_RETRIES, MoveAcquisitionLoop, MoveSuggestion, OracleError, OracleErrorKind,
    ResponseOutcome, RetryPolicy, TRANSITION_LOG_LIMIT,
};

fn suggestion(san: &str) -> MoveSuggestion {
    MoveSuggestion {
        comment: format!("I play {}.", san),
        san: san.to_string(),
        arrows: None,
        title: None,
    }
}

fn network_error() -> OracleError {
    OracleError::new(OracleErrorKind::Unreachable, "connection refused")
}

/// A session where the oracle owns the turn after 1. e4.
fn after_e4() -> GameSession {
    let mut game = GameSession::new();
    game.apply_human_move(&"e2e4".parse::<HumanMove>().unwrap()).unwrap();
    game
}

fn policy() -> RetryPolicy {
    RetryPolicy::new(MAX_RETRIES, Duration::from_secs(1))
}

#[test]
fn test_no_turn_before_first_human_move() {
    let game = GameSession::new();
    let mut acquisition = MoveAcquisitionLoop::new(policy(), 10);
    assert!(acquisition.begin_turn(&game, &ChatLog::new()).is_none());
    assert_eq!(acquisition.state(), AcquisitionState::Idle);
}

#[test]
fn test_begin_turn_sends_position_and_history() {
    let game = after_e4();
    let mut acquisition = MoveAcquisitionLoop::new(policy(), 10);

    let attempt = acquisition.begin_turn(&game, &ChatLog::new()).unwrap();

    assert_eq!(acquisition.state(), AcquisitionState::AwaitingResponse);
    assert_eq!(*attempt.attempt_number(), 1);
    assert_eq!(attempt.request().move_history, ["e4"]);
    assert_eq!(attempt.request().fen, game.fen());
    assert_eq!(attempt.request().wrong_move, None);
}

#[test]
fn test_only_one_request_in_flight() {
    let game = after_e4();
    let mut acquisition = MoveAcquisitionLoop::new(policy(), 10);
    acquisition.begin_turn(&game, &ChatLog::new()).unwrap();
    assert!(acquisition.begin_turn(&game, &ChatLog::new()).is_none());
}

#[test]
fn test_legal_suggestion_is_applied() {
    let mut game = after_e4();
    let mut acquisition = MoveAcquisitionLoop::new(policy(), 10);
    let attempt = acquisition.begin_turn(&game, &ChatLog::new()).unwrap();

    let generation = *attempt.generation();
    let outcome = acquisition.handle_response(&mut game, generation, 1, Ok(suggestion("e5")));

    assert!(matches!(
        outcome,
        ResponseOutcome::Accepted { ref record, .. } if record.san() == "e5"
    ));
    assert_eq!(acquisition.state(), AcquisitionState::Idle);
    assert_eq!(acquisition.failed_attempts(), 0);
    assert_eq!(game.san_history(), ["e4", "e5"]);
    assert_eq!(
        acquisition.take_transitions(),
        [
            AcquisitionState::AwaitingResponse,
            AcquisitionState::ValidatingMove,
            AcquisitionState::Idle
        ]
    );
}

#[test]
fn test_illegal_suggestion_is_fed_back() {
    let mut game = after_e4();
    let mut acquisition = MoveAcquisitionLoop::new(policy(), 10);
    let attempt = acquisition.begin_turn(&game, &ChatLog::new()).unwrap();
    let generation = *attempt.generation();

    let outcome = acquisition.handle_response(&mut game, generation, 1, Ok(suggestion("Qh5")));
    match outcome {
        ResponseOutcome::RetryAfter { delay, failure } => {
            assert_eq!(delay, Duration::from_secs(1));
            assert_eq!(failure, AcquisitionFailure::IllegalMove { san: "Qh5".into() });
        }
        other => panic!("expected retry, got {:?}", other),
    }
    assert_eq!(acquisition.state(), AcquisitionState::Retrying);
    assert_eq!(game.history().len(), 1);
    assert!(acquisition.status_message().unwrap().contains("Qh5"));

    let retry = acquisition.resume(&game, &ChatLog::new(), generation).unwrap();
    assert_eq!(*retry.attempt_number(), 2);
    assert_eq!(retry.request().wrong_move.as_deref(), Some("Qh5"));
    assert_eq!(retry.request().rejected_moves, ["Qh5"]);
}

#[test]
fn test_rejected_moves_accumulate_within_a_turn() {
    let mut game = after_e4();
    let mut acquisition = MoveAcquisitionLoop::new(RetryPolicy::new(5, Duration::ZERO), 10);
    let chat = ChatLog::new();
    let generation = *acquisition.begin_turn(&game, &chat).unwrap().generation();

    acquisition.handle_response(&mut game, generation, 1, Ok(suggestion("Qh5")));
    acquisition.resume(&game, &chat, generation).unwrap();
    acquisition.handle_response(&mut game, generation, 2, Ok(suggestion("Ke6")));
    let third = acquisition.resume(&game, &chat, generation).unwrap();

    assert_eq!(third.request().wrong_move.as_deref(), Some("Ke6"));
    assert_eq!(third.request().rejected_moves, ["Qh5", "Ke6"]);
    assert_eq!(acquisition.rejected(), ["Qh5", "Ke6"]);
}

#[test]
fn test_repeated_rejection_becomes_the_wrong_move() {
    let mut game = after_e4();
    let mut acquisition = MoveAcquisitionLoop::new(RetryPolicy::new(5, Duration::ZERO), 10);
    let chat = ChatLog::new();
    let generation = *acquisition.begin_turn(&game, &chat).unwrap().generation();

    for (attempt, san) in [(1, "Qh5"), (2, "Ke2"), (3, "Qh5")] {
        acquisition.handle_response(&mut game, generation, attempt, Ok(suggestion(san)));
        acquisition.resume(&game, &chat, generation).unwrap();
    }
    let fourth = acquisition.attempts().last().unwrap().clone();

    assert_eq!(*fourth.attempt_number(), 4);
    assert_eq!(fourth.request().wrong_move.as_deref(), Some("Qh5"));
    assert_eq!(fourth.request().rejected_moves, ["Ke2", "Qh5"]);
    assert_eq!(fourth.request().all_rejected(), ["Ke2", "Qh5"]);
}

#[test]
fn test_attempts_record_their_outcomes() {
    let mut game = after_e4();
    let mut acquisition = MoveAcquisitionLoop::new(policy(), 10);
    let chat = ChatLog::new();
    let generation = *acquisition.begin_turn(&game, &chat).unwrap().generation();
    assert_eq!(*acquisition.attempts()[0].outcome(), AttemptOutcome::Pending);

    acquisition.handle_response(&mut game, generation, 1, Ok(suggestion("Qh5")));
    acquisition.resume(&game, &chat, generation).unwrap();
    acquisition.handle_response(&mut game, generation, 2, Ok(suggestion("Nf6")));

    let outcomes: Vec<AttemptOutcome> =
        acquisition.attempts().iter().map(|a| a.outcome().clone()).collect();
    assert_eq!(
        outcomes,
        [
            AttemptOutcome::Failed(AcquisitionFailure::IllegalMove { san: "Qh5".into() }),
            AttemptOutcome::Accepted("Nf6".into()),
        ]
    );

    game.apply_human_move(&"d2d4".parse::<HumanMove>().unwrap()).unwrap();
    acquisition.begin_turn(&game, &chat).unwrap();
    assert_eq!(acquisition.attempts().len(), 1);

    acquisition.reset();
    assert!(acquisition.attempts().is_empty());
}

#[test]
fn test_undrained_transitions_are_bounded() {
    let mut game = after_e4();
    let mut acquisition = MoveAcquisitionLoop::new(RetryPolicy::new(1, Duration::ZERO), 10);
    let chat = ChatLog::new();
    let generation = *acquisition.begin_turn(&game, &chat).unwrap().generation();
    acquisition.handle_response(&mut game, generation, 1, Err(network_error()));

    for _ in 0..100 {
        let attempt = acquisition.manual_retry(&game, &chat).unwrap();
        let number = *attempt.attempt_number();
        acquisition.handle_response(&mut game, generation, number, Err(network_error()));
    }

    let transitions = acquisition.take_transitions();
    assert_eq!(transitions.len(), TRANSITION_LOG_LIMIT);
    assert_eq!(transitions.last(), Some(&AcquisitionState::Failed));
    assert!(acquisition.take_transitions().is_empty());
}

#[test]
fn test_exactly_max_retries_failures_reach_failed() {
    let mut game = after_e4();
    let mut acquisition = MoveAcquisitionLoop::new(policy(), 10);
    let chat = ChatLog::new();
    let generation = *acquisition.begin_turn(&game, &chat).unwrap().generation();

    for attempt in 1..MAX_RETRIES {
        let outcome =
            acquisition.handle_response(&mut game, generation, attempt, Err(network_error()));
        assert!(matches!(outcome, ResponseOutcome::RetryAfter { .. }));
        assert_eq!(acquisition.failed_attempts(), attempt);
        acquisition.resume(&game, &chat, generation).unwrap();
    }

    let outcome =
        acquisition.handle_response(&mut game, generation, MAX_RETRIES, Err(network_error()));
    assert!(matches!(
        outcome,
        ResponseOutcome::Failed(AcquisitionFailure::Exhausted { attempts })
            if attempts == MAX_RETRIES
    ));
    assert_eq!(acquisition.state(), AcquisitionState::Failed);
    assert_eq!(game.history().len(), 1);
    assert!(acquisition.resume(&game, &chat, generation).is_none());
}

#[test]
fn test_manual_retry_resets_count() {
    let mut game = after_e4();
    let mut acquisition = MoveAcquisitionLoop::new(RetryPolicy::new(1, Duration::ZERO), 10);
    let chat = ChatLog::new();
    let generation = *acquisition.begin_turn(&game, &chat).unwrap().generation();
    acquisition.handle_response(&mut game, generation, 1, Err(network_error()));
    assert_eq!(acquisition.state(), AcquisitionState::Failed);

    let attempt = acquisition.manual_retry(&game, &chat).unwrap();

    assert_eq!(acquisition.failed_attempts(), 0);
    assert_eq!(acquisition.state(), AcquisitionState::AwaitingResponse);
    assert_eq!(*attempt.attempt_number(), 2);
    assert_eq!(acquisition.status_message(), None);
}

#[test]
fn test_manual_retry_ignored_unless_failed() {
    let game = after_e4();
    let mut acquisition = MoveAcquisitionLoop::new(policy(), 10);
    assert!(acquisition.manual_retry(&game, &ChatLog::new()).is_none());
    acquisition.begin_turn(&game, &ChatLog::new()).unwrap();
    assert!(acquisition.manual_retry(&game, &ChatLog::new()).is_none());
}

#[test]
fn test_unavailable_fails_without_retry() {
    let mut game = after_e4();
    let mut acquisition = MoveAcquisitionLoop::new(policy(), 10);
    let generation = *acquisition.begin_turn(&game, &ChatLog::new()).unwrap().generation();

    let outcome = acquisition.handle_response(
        &mut game,
        generation,
        1,
        Err(OracleError::new(OracleErrorKind::Unavailable, "Server configuration error")),
    );

    assert!(matches!(outcome, ResponseOutcome::Failed(AcquisitionFailure::Unavailable)));
    assert_eq!(acquisition.state(), AcquisitionState::Failed);
    assert_eq!(acquisition.failed_attempts(), 0);
}

#[test]
fn test_empty_move_counts_as_failure() {
    let mut game = after_e4();
    let mut acquisition = MoveAcquisitionLoop::new(policy(), 10);
    let generation = *acquisition.begin_turn(&game, &ChatLog::new()).unwrap().generation();

    let outcome = acquisition.handle_response(&mut game, generation, 1, Ok(suggestion("  ")));

    assert!(matches!(
        outcome,
        ResponseOutcome::RetryAfter { failure: AcquisitionFailure::EmptyMove, .. }
    ));
    assert_eq!(acquisition.failed_attempts(), 1);
}

#[test]
fn test_stale_responses_are_discarded() {
    let mut game = after_e4();
    let mut acquisition = MoveAcquisitionLoop::new(policy(), 10);
    let chat = ChatLog::new();
    let old_generation = *acquisition.begin_turn(&game, &chat).unwrap().generation();

    // Wrong attempt number.
    let outcome = acquisition.handle_response(&mut game, old_generation, 7, Ok(suggestion("e5")));
    assert!(matches!(outcome, ResponseOutcome::Stale));
    assert_eq!(acquisition.state(), AcquisitionState::AwaitingResponse);

    // Previous game.
    game.reset();
    acquisition.reset();
    let outcome = acquisition.handle_response(&mut game, old_generation, 1, Ok(suggestion("e5")));
    assert!(matches!(outcome, ResponseOutcome::Stale));
    assert!(game.history().is_empty());
    assert_eq!(acquisition.state(), AcquisitionState::Idle);
}

#[test]
fn test_chat_window_travels_with_request() {
    let game = after_e4();
    let mut chat = ChatLog::new();
    for i in 0..4 {
        chat.push(ChatEntry::user(format!("question {}", i)));
    }
    let mut acquisition = MoveAcquisitionLoop::new(policy(), 2);

    let attempt = acquisition.begin_turn(&game, &chat).unwrap();

    let contents: Vec<&str> = attempt
        .request()
        .chat_history
        .iter()
        .map(|e| e.content().as_str())
        .collect();
    assert_eq!(contents, ["question 2", "question 3"]);
}
