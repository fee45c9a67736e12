use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        common::PlayerSummary,
        sse::{AnswerSubmittedEvent, PhaseChangedEvent, PlayerJoinedEvent, ServerEvent},
    },
    services::public_service,
    state::{SessionSlot, SharedState, game::Player, state_machine::SessionPhase},
};

pub(crate) const EVENT_SESSION_SNAPSHOT: &str = "session.snapshot";
pub(crate) const EVENT_INFO: &str = "info";
const EVENT_PLAYER_JOINED: &str = "player.joined";
const EVENT_ANSWER_SUBMITTED: &str = "answer.submitted";
const EVENT_PHASE_CHANGED: &str = "phase_changed";

/// Broadcast that a new player joined the session.
pub fn broadcast_player_joined(slot: &SessionSlot, player: &Player, player_count: usize) {
    let payload = PlayerJoinedEvent {
        player: PlayerSummary::from(player),
        player_count,
    };
    send_session_event(slot, EVENT_PLAYER_JOINED, &payload);
}

/// Broadcast how many players answered the open question.
pub fn broadcast_answer_submitted(
    slot: &SessionSlot,
    question_index: usize,
    answered_count: usize,
    player_count: usize,
) {
    let payload = AnswerSubmittedEvent {
        question_index,
        answered_count,
        player_count,
    };
    send_session_event(slot, EVENT_ANSWER_SUBMITTED, &payload);
}

/// Broadcast a phase change notification with the context of the new phase.
pub async fn broadcast_phase_changed(state: &SharedState, slot: &SessionSlot, phase: SessionPhase) {
    let degraded = state.is_degraded();
    let snapshot = slot
        .read_game(|game| public_service::phase_snapshot(state.config(), phase, game, degraded))
        .await;
    send_session_event(slot, EVENT_PHASE_CHANGED, &PhaseChangedEvent(snapshot));
}

fn send_session_event(slot: &SessionSlot, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => slot.sse().broadcast(event),
        Err(err) => warn!(pin = %slot.pin(), event, error = %err, "failed to serialize SSE payload"),
    }
}
