//! Server-side clock driving the timed phases of every session.
//!
//! After each applied transition, [`schedule`] arms at most one timer task per
//! session, tagged with the state machine version it was armed for. When the
//! timer fires it applies the timed event only if the session is still at that
//! version, so manual transitions (start, next, end) implicitly disarm it.

use std::{sync::Arc, time::Duration};

use futures::future::{BoxFuture, FutureExt};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use crate::{
    error::ServiceError,
    state::{
        SessionSlot, SharedState,
        state_machine::{FinishReason, QuestionPhase, QuestionStage, SessionEvent, SessionPhase},
        transitions::apply_event,
    },
};

/// Arm the timer matching `phase`, or disarm the clock for untimed phases.
pub async fn schedule(state: &SharedState, slot: &Arc<SessionSlot>, phase: SessionPhase, version: usize) {
    let Some(deadline) = deadline_for(state, slot, phase).await else {
        slot.cancel_timer().await;
        return;
    };

    let handle = tokio::spawn(tick(state.clone(), Arc::clone(slot), deadline, version));
    slot.arm_timer(version, handle).await;
    debug!(
        pin = %slot.pin(),
        version,
        in_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
        "phase timer armed"
    );
}

/// Instant at which the timed event of `phase` must fire.
async fn deadline_for(
    state: &SharedState,
    slot: &SessionSlot,
    phase: SessionPhase,
) -> Option<Instant> {
    let timing = &state.config().timing;
    match phase {
        SessionPhase::Lobby | SessionPhase::Finished => None,
        SessionPhase::Playing(QuestionPhase {
            stage: QuestionStage::Answering,
            ..
        }) => {
            slot.read_game(|game| {
                let limit = Duration::from_secs(u64::from(game.current_question()?.time_limit_secs));
                let started = game.question_clock.unwrap_or_else(Instant::now);
                Some(started + limit)
            })
            .await
        }
        SessionPhase::Playing(QuestionPhase {
            stage: QuestionStage::Results,
            ..
        }) => Some(Instant::now() + timing.results_delay()),
        SessionPhase::Playing(QuestionPhase {
            stage: QuestionStage::Leaderboard,
            ..
        }) => Some(Instant::now() + timing.leaderboard_delay()),
    }
}

/// Timer task body. Boxed so the recursion through [`apply_event`] has a nameable type.
fn tick(
    state: SharedState,
    slot: Arc<SessionSlot>,
    deadline: Instant,
    version: usize,
) -> BoxFuture<'static, ()> {
    async move {
        sleep_until(deadline).await;
        slot.take_fired_timer(version).await;
        // Run detached: re-arming the clock aborts the previous timer handle.
        tokio::spawn(fire(state, slot, version));
    }
    .boxed()
}

fn fire(state: SharedState, slot: Arc<SessionSlot>, version: usize) -> BoxFuture<'static, ()> {
    async move {
        let Some(event) = slot.read_with_phase(timed_event).await else {
            return;
        };

        match apply_event(&state, &slot, event, Some(version)).await {
            Ok(phase) => debug!(pin = %slot.pin(), ?event, ?phase, "timed transition applied"),
            Err(ServiceError::StaleTransition { expected, actual }) => debug!(
                pin = %slot.pin(),
                ?event,
                expected,
                actual,
                "timer superseded by another transition"
            ),
            Err(err) => warn!(pin = %slot.pin(), ?event, error = %err, "timed transition failed"),
        }
    }
    .boxed()
}

/// Event the clock fires when the current phase runs out.
fn timed_event(phase: SessionPhase, game: &crate::state::game::GameSession) -> Option<SessionEvent> {
    match phase {
        SessionPhase::Playing(QuestionPhase { stage, .. }) => Some(match stage {
            QuestionStage::Answering => SessionEvent::TimeUp,
            QuestionStage::Results => SessionEvent::ShowLeaderboard,
            QuestionStage::Leaderboard if game.has_next_question() => SessionEvent::NextQuestion,
            QuestionStage::Leaderboard => SessionEvent::Finish(FinishReason::QuizCompleted),
        }),
        SessionPhase::Lobby | SessionPhase::Finished => None,
    }
}
