//! Periodic eviction of sessions nobody drives anymore.

use std::sync::Arc;

use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::{
    services::persistence::persist_session,
    state::{SessionSlot, SharedState, state_machine::SessionPhase},
};

/// Evict stale sessions every `reaper.sweep_interval_secs`.
pub async fn run(state: SharedState) {
    let mut ticker = interval(state.config().reaper.sweep_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let evicted = sweep(&state).await;
        if evicted > 0 {
            info!(evicted, live = state.session_count(), "evicted idle sessions");
        }
    }
}

/// Drop finished sessions idle past `finished_ttl` and any session idle past
/// `abandoned_ttl`, returning how many were evicted.
///
/// Each evicted session has its timer disarmed and its final state persisted.
pub async fn sweep(state: &SharedState) -> usize {
    let now = Instant::now();
    let mut evicted = 0;
    for slot in state.sessions() {
        if !is_stale(state, &slot, now).await {
            continue;
        }
        slot.cancel_timer().await;
        persist_session(state, &slot).await;
        if state.remove_session(slot.pin()).is_some() {
            debug!(pin = %slot.pin(), "session evicted");
            evicted += 1;
        }
    }
    evicted
}

async fn is_stale(state: &SharedState, slot: &Arc<SessionSlot>, now: Instant) -> bool {
    let reaper = &state.config().reaper;
    slot.read_with_phase(|phase, game| {
        let idle = now.saturating_duration_since(game.last_activity);
        idle >= reaper.abandoned_ttl()
            || (phase == SessionPhase::Finished && idle >= reaper.finished_ttl())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        state::{
            AppState,
            game::{GameSession, Quiz},
            state_machine::{FinishReason, SessionEvent, SessionStateMachine},
        },
    };
    use std::time::Duration;

    fn quiz() -> Quiz {
        Quiz {
            title: "Idle".into(),
            questions: Vec::new(),
        }
    }

    fn finished_machine() -> SessionStateMachine {
        let mut machine = SessionStateMachine::new();
        let plan = machine
            .plan(SessionEvent::Finish(FinishReason::HostEnded))
            .unwrap();
        machine.apply(plan.id).unwrap();
        machine
    }

    #[tokio::test(start_paused = true)]
    async fn finished_sessions_leave_before_abandoned_ones() {
        let state = AppState::new(AppConfig::default());
        let lobby = Arc::new(SessionSlot::new(GameSession::new("111111".into(), quiz()), None));
        let finished = Arc::new(SessionSlot::with_machine(
            GameSession::new("222222".into(), quiz()),
            finished_machine(),
            None,
        ));
        state.insert_session(Arc::clone(&lobby));
        state.insert_session(Arc::clone(&finished));

        assert_eq!(sweep(&state).await, 0);

        tokio::time::advance(state.config().reaper.finished_ttl() + Duration::from_secs(1)).await;
        assert_eq!(sweep(&state).await, 1);
        assert!(state.has_session("111111"));
        assert!(!state.has_session("222222"));

        tokio::time::advance(state.config().reaper.abandoned_ttl()).await;
        assert_eq!(sweep(&state).await, 1);
        assert_eq!(state.session_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn activity_keeps_a_session_alive() {
        let state = AppState::new(AppConfig::default());
        let slot = Arc::new(SessionSlot::new(GameSession::new("333333".into(), quiz()), None));
        state.insert_session(Arc::clone(&slot));

        let ttl = state.config().reaper.abandoned_ttl();
        tokio::time::advance(ttl - Duration::from_secs(10)).await;
        slot.write_game(GameSession::touch).await;
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(sweep(&state).await, 0);
        assert!(state.has_session("333333"));
    }
}
