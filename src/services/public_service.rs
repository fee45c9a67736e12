//! Service helpers that expose read-only public projections of sessions.

use std::sync::Arc;

use crate::{
    config::AppConfig,
    dao::models::SessionStatusEntity,
    dto::{
        common::{LeaderboardEntry, PhaseSnapshot, PlayerSummary, QuestionView},
        phase::{VisibleStage, VisibleStatus},
        player::{LeaderboardResponse, RosterResponse},
        session::SessionSnapshot,
        validation::validate_pin,
    },
    error::ServiceError,
    services::persistence::load_session,
    state::{
        SessionSlot, SharedState,
        game::GameSession,
        state_machine::{QuestionPhase, QuestionStage, SessionPhase},
    },
};

/// Phase of the session a projection is built for.
#[derive(Debug, Clone, Copy)]
enum ProjectedPhase {
    /// Session driven by this server.
    Live(SessionPhase),
    /// Session only known through its stored document.
    Stored(SessionStatusEntity),
}

/// Build the phase snapshot of a live session.
pub fn phase_snapshot(
    config: &AppConfig,
    phase: SessionPhase,
    game: &GameSession,
    degraded: bool,
) -> PhaseSnapshot {
    project_phase(config, ProjectedPhase::Live(phase), game, degraded)
}

/// Build the full snapshot of a live session.
pub fn session_snapshot(
    config: &AppConfig,
    phase: SessionPhase,
    game: &GameSession,
    degraded: bool,
) -> SessionSnapshot {
    project_session(config, ProjectedPhase::Live(phase), game, degraded)
}

fn project_session(
    config: &AppConfig,
    phase: ProjectedPhase,
    game: &GameSession,
    degraded: bool,
) -> SessionSnapshot {
    SessionSnapshot {
        pin: game.pin.clone(),
        title: game.quiz.title.clone(),
        created_at: crate::dto::format_system_time(game.created_at),
        updated_at: crate::dto::format_system_time(game.updated_at),
        phase: project_phase(config, phase, game, degraded),
        players: game.players.values().map(PlayerSummary::from).collect(),
    }
}

fn project_phase(
    config: &AppConfig,
    phase: ProjectedPhase,
    game: &GameSession,
    degraded: bool,
) -> PhaseSnapshot {
    let (status, playing, stage) = match phase {
        ProjectedPhase::Live(SessionPhase::Lobby) => (VisibleStatus::Lobby, None, None),
        ProjectedPhase::Live(SessionPhase::Finished) => (VisibleStatus::Finished, None, None),
        ProjectedPhase::Live(SessionPhase::Playing(QuestionPhase { index, stage })) => {
            (VisibleStatus::Playing, Some(index), Some(stage))
        }
        ProjectedPhase::Stored(status) => {
            let playing = matches!(status, SessionStatusEntity::Playing)
                .then_some(game.current_question_index);
            (status.into(), playing, None)
        }
    };

    let question = playing
        .and_then(|index| game.question(index))
        .map(QuestionView::from);
    let correct_answers = match stage {
        Some(QuestionStage::Results | QuestionStage::Leaderboard) => playing
            .and_then(|index| game.question(index))
            .map(|question| question.correct_indexes()),
        _ => None,
    };
    let time_left_secs =
        matches!(stage, Some(QuestionStage::Answering)).then(|| game.time_left_secs());
    let leaderboard = match (status, stage) {
        (VisibleStatus::Finished, _) => Some(ranking(game, None)),
        (_, Some(QuestionStage::Leaderboard)) => {
            Some(ranking(game, Some(config.limits.leaderboard_size)))
        }
        _ => None,
    };

    PhaseSnapshot {
        status,
        stage: stage.map(VisibleStage::from),
        question_index: playing,
        question_count: game.quiz.questions.len(),
        question,
        question_started_at_ms: playing
            .and(game.question_started_at)
            .map(crate::dto::epoch_millis),
        time_left_secs,
        correct_answers,
        answered_count: playing.map(|index| game.answered_count(index)),
        player_count: game.players.len(),
        leaderboard,
        degraded,
    }
}

/// Ranked players, optionally truncated to the first `limit` entries.
pub fn ranking(game: &GameSession, limit: Option<usize>) -> Vec<LeaderboardEntry> {
    let standings = game.standings();
    let limit = limit.unwrap_or(standings.len());
    standings
        .into_iter()
        .take(limit)
        .map(LeaderboardEntry::from)
        .collect()
}

/// Reject malformed PINs before any lookup.
pub fn parse_pin(pin: &str) -> Result<&str, ServiceError> {
    validate_pin(pin).map_err(|err| {
        ServiceError::InvalidInput(
            err.message
                .map(|message| message.to_string())
                .unwrap_or_else(|| "invalid PIN".into()),
        )
    })?;
    Ok(pin)
}

/// Live session registered under `pin`, or a not found error.
pub fn require_session(state: &SharedState, pin: &str) -> Result<Arc<SessionSlot>, ServiceError> {
    let pin = parse_pin(pin)?;
    state
        .session(pin)
        .ok_or_else(|| ServiceError::NotFound(format!("session {pin} not found")))
}

/// A session as currently known: live in memory or read back from storage.
enum SessionView {
    Live(Arc<SessionSlot>),
    Stored(Box<GameSession>, SessionStatusEntity),
}

async fn load_view(state: &SharedState, pin: &str) -> Result<SessionView, ServiceError> {
    let pin = parse_pin(pin)?;
    if let Some(slot) = state.session(pin) {
        return Ok(SessionView::Live(slot));
    }

    let entity = load_session(state, pin)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session {pin} not found")))?;
    let status = entity.status;
    Ok(SessionView::Stored(Box::new(entity.into()), status))
}

/// Return the snapshot of a session, falling back to the storage backend for
/// sessions that are no longer held in memory.
pub async fn get_session(state: &SharedState, pin: &str) -> Result<SessionSnapshot, ServiceError> {
    let degraded = state.is_degraded();
    match load_view(state, pin).await? {
        SessionView::Live(slot) => Ok(slot
            .read_with_phase(|phase, game| session_snapshot(state.config(), phase, game, degraded))
            .await),
        SessionView::Stored(game, status) => Ok(project_session(
            state.config(),
            ProjectedPhase::Stored(status),
            &game,
            degraded,
        )),
    }
}

/// Return the roster of a session in join order.
pub async fn get_roster(state: &SharedState, pin: &str) -> Result<RosterResponse, ServiceError> {
    let players = match load_view(state, pin).await? {
        SessionView::Live(slot) => {
            slot.read_game(|game| game.players.values().map(PlayerSummary::from).collect())
                .await
        }
        SessionView::Stored(game, _) => game.players.values().map(PlayerSummary::from).collect(),
    };
    Ok(RosterResponse { players })
}

/// Return the full ranking of a session.
pub async fn get_leaderboard(
    state: &SharedState,
    pin: &str,
) -> Result<LeaderboardResponse, ServiceError> {
    let (entries, player_count) = match load_view(state, pin).await? {
        SessionView::Live(slot) => {
            slot.read_game(|game| (ranking(game, None), game.players.len()))
                .await
        }
        SessionView::Stored(game, _) => (ranking(&game, None), game.players.len()),
    };
    Ok(LeaderboardResponse {
        entries,
        player_count,
    })
}
