use std::{future::Future, sync::Arc};

use tracing::info;

use crate::{
    error::ServiceError,
    services::{persistence::persist_session, phase_clock, sse_events::broadcast_phase_changed},
    state::{
        SessionSlot, SharedState,
        game::GameSession,
        state_machine::{SessionEvent, SessionPhase},
    },
};

/// Execute a planned state-machine transition, then re-arm the phase clock,
/// broadcast the resulting phase change and persist the session.
pub async fn run_transition_with_broadcast<F, Fut, T>(
    state: &SharedState,
    slot: &Arc<SessionSlot>,
    event: SessionEvent,
    expected_version: Option<usize>,
    work: F,
) -> Result<(T, SessionPhase), ServiceError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let (res, next, version) = slot.run_transition(event, expected_version, work).await?;
    info!(pin = %slot.pin(), ?event, phase = ?next, version, "session transition applied");

    phase_clock::schedule(state, slot, next, version).await;
    broadcast_phase_changed(state, slot, next).await;
    persist_session(state, slot).await;
    Ok((res, next))
}

/// Apply `event` to a session together with the model changes it implies.
pub async fn apply_event(
    state: &SharedState,
    slot: &Arc<SessionSlot>,
    event: SessionEvent,
    expected_version: Option<usize>,
) -> Result<SessionPhase, ServiceError> {
    let work_slot = Arc::clone(slot);
    let ((), next) = run_transition_with_broadcast(state, slot, event, expected_version, || async move {
        match event {
            SessionEvent::StartGame => work_slot.write_game(start_game).await,
            SessionEvent::NextQuestion => work_slot.write_game(open_next_question).await,
            SessionEvent::TimeUp | SessionEvent::ShowLeaderboard | SessionEvent::Finish(_) => {
                work_slot.write_game(GameSession::touch).await;
                Ok(())
            }
        }
    })
    .await?;
    Ok(next)
}

fn start_game(game: &mut GameSession) -> Result<(), ServiceError> {
    if game.players.is_empty() {
        return Err(ServiceError::InvalidState(
            "at least one player must join before the game starts".into(),
        ));
    }
    if game.quiz.questions.is_empty() {
        return Err(ServiceError::InvalidState("quiz has no question".into()));
    }
    game.open_question(0);
    Ok(())
}

fn open_next_question(game: &mut GameSession) -> Result<(), ServiceError> {
    if !game.has_next_question() {
        return Err(ServiceError::InvalidState("no question left".into()));
    }
    game.open_question(game.current_question_index + 1);
    Ok(())
}
