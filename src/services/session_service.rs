//! Host and player operations on quiz sessions.

use std::sync::Arc;

use rand::Rng;
use tracing::{info, warn};

use crate::{
    dto::{
        common::{PhaseSnapshot, PlayerSummary},
        player::{AnswerResult, JoinRequest, JoinResponse, SubmitAnswerRequest},
        session::{CreateSessionRequest, SessionCreatedResponse},
    },
    error::ServiceError,
    services::{
        persistence::{self, persist_session},
        public_service::{self, require_session},
        sse_events,
    },
    state::{
        SessionSlot, SharedState,
        game::{AnswerOption, GameSession, Question, Quiz},
        state_machine::{FinishReason, QuestionPhase, QuestionStage, SessionEvent, SessionPhase},
        transitions::apply_event,
    },
};

const PIN_RANGE: std::ops::RangeInclusive<u32> = 100_000..=999_999;
const MAX_PIN_ATTEMPTS: usize = 32;

/// Create a session from a validated quiz and register it under a fresh PIN.
pub async fn create_session(
    state: &SharedState,
    request: CreateSessionRequest,
) -> Result<SessionCreatedResponse, ServiceError> {
    let quiz = build_quiz(state, request)?;
    let question_count = quiz.questions.len();

    for _ in 0..MAX_PIN_ATTEMPTS {
        let pin = generate_pin();
        if state.has_session(&pin) || is_pin_stored(state, &pin).await {
            continue;
        }

        let slot = Arc::new(SessionSlot::new(
            GameSession::new(pin.clone(), quiz.clone()),
            state.transition_timeout(),
        ));
        if !state.insert_session(Arc::clone(&slot)) {
            continue;
        }

        info!(%pin, title = %quiz.title, question_count, "session created");
        persist_session(state, &slot).await;

        let degraded = state.is_degraded();
        let session = slot
            .read_with_phase(|phase, game| {
                public_service::session_snapshot(state.config(), phase, game, degraded)
            })
            .await;
        return Ok(SessionCreatedResponse { pin, session });
    }

    Err(ServiceError::Internal(
        "could not allocate a free session PIN".into(),
    ))
}

/// Join a session by name.
///
/// A name already on the roster (exact match once trimmed) returns the existing player
/// in any phase; new players are only accepted in the lobby.
pub async fn join_session(
    state: &SharedState,
    pin: &str,
    request: JoinRequest,
) -> Result<JoinResponse, ServiceError> {
    let slot = require_session(state, pin)?;
    let max_players = state.config().limits.max_players;

    let (player, rejoined, player_count) = slot
        .write_with_phase(|phase, game| {
            if let Some(existing) = game.find_player_by_name(&request.name) {
                return Ok((existing.clone(), true, game.players.len()));
            }
            if phase != SessionPhase::Lobby {
                return Err(ServiceError::InvalidState(format!(
                    "session {} is no longer accepting new players",
                    game.pin
                )));
            }
            let player = game.add_player(&request.name, max_players)?;
            Ok((player, false, game.players.len()))
        })
        .await?;

    if rejoined {
        info!(pin = %slot.pin(), player_id = %player.id, name = %player.name, "player rejoined");
    } else {
        info!(pin = %slot.pin(), player_id = %player.id, name = %player.name, player_count, "player joined");
        sse_events::broadcast_player_joined(&slot, &player, player_count);
        persist_session(state, &slot).await;
    }

    Ok(JoinResponse {
        player: PlayerSummary::from(&player),
        rejoined,
    })
}

/// Score an answer to the open question.
pub async fn submit_answer(
    state: &SharedState,
    pin: &str,
    request: SubmitAnswerRequest,
) -> Result<AnswerResult, ServiceError> {
    let slot = require_session(state, pin)?;
    let rules = state.config().scoring;

    let (answer, time_left_secs, score, answered_count, player_count) = slot
        .write_with_phase(|phase, game| {
            match phase {
                SessionPhase::Playing(QuestionPhase {
                    stage: QuestionStage::Answering,
                    ..
                }) => {}
                _ => {
                    return Err(ServiceError::InvalidState(format!(
                        "session {} is not accepting answers",
                        game.pin
                    )));
                }
            }

            let time_left_secs = game.time_left_secs();
            let answer = game.record_answer(
                &rules,
                request.player_id,
                request.question_index,
                request.answer_index,
                time_left_secs,
            )?;
            let score = game
                .players
                .get(&request.player_id)
                .map(|player| player.score)
                .unwrap_or_default();
            Ok((
                answer,
                time_left_secs,
                score,
                game.answered_count(request.question_index),
                game.players.len(),
            ))
        })
        .await?;

    info!(
        pin = %slot.pin(),
        player_id = %request.player_id,
        question_index = answer.question_index,
        correct = answer.correct,
        points = answer.points,
        "answer recorded"
    );
    sse_events::broadcast_answer_submitted(&slot, answer.question_index, answered_count, player_count);
    persist_session(state, &slot).await;

    Ok(AnswerResult {
        correct: answer.correct,
        points: answer.points,
        score,
        time_left_secs,
    })
}

/// Leave the lobby and open the first question.
pub async fn start_session(state: &SharedState, pin: &str) -> Result<PhaseSnapshot, ServiceError> {
    let slot = require_session(state, pin)?;
    let phase = apply_event(state, &slot, SessionEvent::StartGame, None).await?;
    Ok(current_phase_snapshot(state, &slot, phase).await)
}

/// Skip the leaderboard countdown: open the next question, or finish after the last one.
pub async fn next_question(state: &SharedState, pin: &str) -> Result<PhaseSnapshot, ServiceError> {
    let slot = require_session(state, pin)?;
    let event = slot
        .read_game(|game| {
            if game.has_next_question() {
                SessionEvent::NextQuestion
            } else {
                SessionEvent::Finish(FinishReason::QuizCompleted)
            }
        })
        .await;
    let phase = apply_event(state, &slot, event, None).await?;
    Ok(current_phase_snapshot(state, &slot, phase).await)
}

/// End the session early and publish the final ranking.
pub async fn end_session(state: &SharedState, pin: &str) -> Result<PhaseSnapshot, ServiceError> {
    let slot = require_session(state, pin)?;
    let phase = apply_event(state, &slot, SessionEvent::Finish(FinishReason::HostEnded), None).await?;
    Ok(current_phase_snapshot(state, &slot, phase).await)
}

async fn current_phase_snapshot(
    state: &SharedState,
    slot: &SessionSlot,
    phase: SessionPhase,
) -> PhaseSnapshot {
    let degraded = state.is_degraded();
    slot.read_game(|game| public_service::phase_snapshot(state.config(), phase, game, degraded))
        .await
}

/// Turn a validated request into a quiz, applying the default time limit.
fn build_quiz(state: &SharedState, request: CreateSessionRequest) -> Result<Quiz, ServiceError> {
    let config = state.config();
    let questions = request
        .questions
        .into_iter()
        .enumerate()
        .map(|(index, question)| {
            let time_limit_secs = question
                .time_limit_secs
                .unwrap_or(config.timing.default_time_limit_secs);
            if !config.accepts_time_limit(time_limit_secs) {
                return Err(ServiceError::InvalidInput(format!(
                    "question {index}: time limit must be between {} and {} seconds (got {time_limit_secs})",
                    config.timing.min_time_limit_secs, config.timing.max_time_limit_secs
                )));
            }

            Ok(Question {
                text: question.text.trim().to_string(),
                options: question
                    .answers
                    .into_iter()
                    .map(|answer| AnswerOption {
                        text: answer.text.trim().to_string(),
                        is_correct: answer.is_correct,
                    })
                    .collect(),
                time_limit_secs,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Quiz {
        title: request.title.trim().to_string(),
        questions,
    })
}

fn generate_pin() -> String {
    rand::rng().random_range(PIN_RANGE).to_string()
}

/// Whether a stored document already uses `pin`. Storage errors count as free.
async fn is_pin_stored(state: &SharedState, pin: &str) -> bool {
    match persistence::load_session(state, pin).await {
        Ok(found) => found.is_some(),
        Err(err) => {
            warn!(%pin, error = %err, "could not check PIN against storage");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::{GameStore, memory::MemoryGameStore},
        dto::{
            phase::{VisibleStage, VisibleStatus},
            session::{AnswerInput, QuestionInput},
        },
        services::persistence::tests::UnresponsiveStore,
        state::AppState,
    };

    fn request(time_limits: &[Option<u32>]) -> CreateSessionRequest {
        CreateSessionRequest {
            title: "  Capitals ".into(),
            questions: time_limits
                .iter()
                .enumerate()
                .map(|(index, time_limit_secs)| QuestionInput {
                    text: format!("question {index}"),
                    answers: (0..4)
                        .map(|i| AnswerInput {
                            text: format!("answer {i}"),
                            is_correct: i == 1,
                        })
                        .collect(),
                    time_limit_secs: *time_limit_secs,
                })
                .collect(),
        }
    }

    fn join(name: &str) -> JoinRequest {
        JoinRequest { name: name.into() }
    }

    async fn state_with_store() -> (SharedState, MemoryGameStore) {
        let state = AppState::new(AppConfig::default());
        let store = MemoryGameStore::new();
        state.install_game_store(Arc::new(store.clone())).await;
        (state, store)
    }

    #[tokio::test]
    async fn create_assigns_pin_and_defaults() {
        let (state, store) = state_with_store().await;
        let created = create_session(&state, request(&[None, Some(30)])).await.unwrap();

        let pin: u32 = created.pin.parse().unwrap();
        assert!(PIN_RANGE.contains(&pin));
        assert_eq!(created.session.title, "Capitals");
        assert_eq!(created.session.phase.status, VisibleStatus::Lobby);
        assert_eq!(created.session.phase.question_count, 2);
        assert!(state.has_session(&created.pin));
        assert_eq!(store.len(), 1);

        let slot = state.session(&created.pin).unwrap();
        let limits = slot
            .read_game(|game| {
                game.quiz
                    .questions
                    .iter()
                    .map(|q| q.time_limit_secs)
                    .collect::<Vec<_>>()
            })
            .await;
        assert_eq!(limits, [20, 30]);
    }

    #[tokio::test]
    async fn out_of_range_time_limit_is_rejected() {
        let state = AppState::new(AppConfig::default());
        let err = create_session(&state, request(&[Some(4)])).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(state.session_count(), 0);
    }

    #[tokio::test]
    async fn join_is_idempotent_by_name() {
        let (state, _) = state_with_store().await;
        let pin = create_session(&state, request(&[None])).await.unwrap().pin;

        let first = join_session(&state, &pin, join("Alice")).await.unwrap();
        let again = join_session(&state, &pin, join(" Alice ")).await.unwrap();
        assert!(!first.rejoined);
        assert!(again.rejoined);
        assert_eq!(first.player.id, again.player.id);

        let other = join_session(&state, &pin, join("alice")).await.unwrap();
        assert!(!other.rejoined);
        assert_ne!(other.player.id, first.player.id);

        let roster = public_service::get_roster(&state, &pin).await.unwrap();
        assert_eq!(roster.players.len(), 2);
    }

    #[tokio::test]
    async fn unknown_and_malformed_pins() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            join_session(&state, "123456", join("Alice")).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            join_session(&state, "12", join("Alice")).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn start_requires_a_player_and_closes_the_lobby() {
        let (state, _) = state_with_store().await;
        let pin = create_session(&state, request(&[None])).await.unwrap().pin;

        assert!(matches!(
            start_session(&state, &pin).await,
            Err(ServiceError::InvalidState(_))
        ));

        let alice = join_session(&state, &pin, join("Alice")).await.unwrap();
        let snapshot = start_session(&state, &pin).await.unwrap();
        assert_eq!(snapshot.stage, Some(VisibleStage::Answering));
        assert_eq!(snapshot.question_index, Some(0));

        assert!(matches!(
            join_session(&state, &pin, join("Bob")).await,
            Err(ServiceError::InvalidState(_))
        ));
        let again = join_session(&state, &pin, join("Alice")).await.unwrap();
        assert_eq!(again.player.id, alice.player.id);

        assert!(matches!(
            start_session(&state, &pin).await,
            Err(ServiceError::InvalidState(_))
        ));
        end_session(&state, &pin).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn answers_are_scored_once_while_answering() {
        let (state, store) = state_with_store().await;
        let pin = create_session(&state, request(&[Some(20)])).await.unwrap().pin;
        let alice = join_session(&state, &pin, join("Alice")).await.unwrap().player;

        let submit = |answer_index| SubmitAnswerRequest {
            player_id: alice.id,
            question_index: 0,
            answer_index,
        };
        assert!(matches!(
            submit_answer(&state, &pin, submit(1)).await,
            Err(ServiceError::InvalidState(_))
        ));

        start_session(&state, &pin).await.unwrap();
        tokio::time::advance(Duration::from_millis(5_500)).await;

        let result = submit_answer(&state, &pin, submit(1)).await.unwrap();
        assert!(result.correct);
        assert_eq!(result.time_left_secs, 15);
        assert_eq!(result.points, 1375);
        assert_eq!(result.score, 1375);

        assert!(matches!(
            submit_answer(&state, &pin, submit(2)).await,
            Err(ServiceError::InvalidState(_))
        ));

        let stored = store.find_session(pin.clone()).await.unwrap().unwrap();
        assert_eq!(stored.players[0].score, 1375);
        end_session(&state, &pin).await.unwrap();
    }

    #[tokio::test]
    async fn next_is_only_allowed_on_the_leaderboard() {
        let (state, _) = state_with_store().await;
        let pin = create_session(&state, request(&[None])).await.unwrap().pin;
        join_session(&state, &pin, join("Alice")).await.unwrap();
        start_session(&state, &pin).await.unwrap();

        assert!(matches!(
            next_question(&state, &pin).await,
            Err(ServiceError::InvalidState(_))
        ));

        let snapshot = end_session(&state, &pin).await.unwrap();
        assert_eq!(snapshot.status, VisibleStatus::Finished);
        assert_eq!(snapshot.leaderboard.map(|l| l.len()), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn unresponsive_storage_does_not_hold_requests() {
        let state = AppState::new(AppConfig::default());
        state.install_game_store(Arc::new(UnresponsiveStore)).await;
        let started = tokio::time::Instant::now();

        let pin = create_session(&state, request(&[None])).await.unwrap().pin;
        let joined = join_session(&state, &pin, join("Alice")).await.unwrap();
        assert!(!joined.rejoined);
        start_session(&state, &pin).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(60));
        assert!(state.has_session(&pin));
        end_session(&state, &pin).await.unwrap();
    }

    #[tokio::test]
    async fn storage_outage_does_not_block_gameplay() {
        let (state, store) = state_with_store().await;
        store.set_available(false);

        let pin = create_session(&state, request(&[None])).await.unwrap().pin;
        join_session(&state, &pin, join("Alice")).await.unwrap();
        start_session(&state, &pin).await.unwrap();
        assert!(store.is_empty());
        end_session(&state, &pin).await.unwrap();
    }
}
