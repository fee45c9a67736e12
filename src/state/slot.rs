use std::{future::Future, time::Duration};

use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
    time::timeout,
};
use tracing::warn;

use crate::{
    error::ServiceError,
    state::{
        SseHub,
        game::GameSession,
        state_machine::{
            AbortError, ApplyError, Plan, PlanError, PlanId, SessionEvent, SessionPhase,
            SessionStateMachine, Snapshot,
        },
    },
};

/// Timer task armed for a specific state machine version.
struct ArmedTimer {
    version: usize,
    handle: JoinHandle<()>,
}

/// Everything the server keeps in memory for one live session.
pub struct SessionSlot {
    pin: String,
    machine: RwLock<SessionStateMachine>,
    game: RwLock<GameSession>,
    sse: SseHub,
    transition_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
    timer: Mutex<Option<ArmedTimer>>,
}

impl SessionSlot {
    /// Wrap a freshly created session, starting in the lobby.
    pub fn new(game: GameSession, transition_timeout: Option<Duration>) -> Self {
        Self::with_machine(game, SessionStateMachine::new(), transition_timeout)
    }

    /// Wrap a session with an already advanced state machine.
    pub fn with_machine(
        game: GameSession,
        machine: SessionStateMachine,
        transition_timeout: Option<Duration>,
    ) -> Self {
        Self {
            pin: game.pin.clone(),
            machine: RwLock::new(machine),
            game: RwLock::new(game),
            sse: SseHub::default(),
            transition_gate: Mutex::new(()),
            transition_timeout,
            timer: Mutex::new(None),
        }
    }

    /// PIN of the session.
    pub fn pin(&self) -> &str {
        &self.pin
    }

    /// Broadcast hub for this session's SSE subscribers.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    /// Current phase of the session state machine.
    pub async fn phase(&self) -> SessionPhase {
        self.machine.read().await.phase()
    }

    /// Snapshot of the session state machine.
    pub async fn snapshot(&self) -> Snapshot {
        self.machine.read().await.snapshot()
    }

    /// Read the session model under its read lock.
    pub async fn read_game<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&GameSession) -> R,
    {
        let guard = self.game.read().await;
        f(&guard)
    }

    /// Mutate the session model under its write lock.
    pub async fn write_game<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut GameSession) -> R,
    {
        let mut guard = self.game.write().await;
        f(&mut guard)
    }

    /// Read the phase and the session model together, so both describe the same instant.
    pub async fn read_with_phase<F, R>(&self, f: F) -> R
    where
        F: FnOnce(SessionPhase, &GameSession) -> R,
    {
        let machine = self.machine.read().await;
        let game = self.game.read().await;
        f(machine.phase(), &game)
    }

    /// Mutate the session model while no transition can be applied.
    pub async fn write_with_phase<F, R>(&self, f: F) -> R
    where
        F: FnOnce(SessionPhase, &mut GameSession) -> R,
    {
        let machine = self.machine.read().await;
        let mut game = self.game.write().await;
        f(machine.phase(), &mut game)
    }

    async fn plan_transition(&self, event: SessionEvent) -> Result<Plan, PlanError> {
        let mut sm = self.machine.write().await;
        sm.plan(event)
    }

    async fn apply_planned_transition(&self, plan_id: PlanId) -> Result<SessionPhase, ApplyError> {
        let mut sm = self.machine.write().await;
        sm.apply(plan_id)
    }

    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut sm = self.machine.write().await;
        sm.abort(plan_id)
    }

    /// Run `work` between planning and applying `event`.
    ///
    /// Transitions of one session are serialized by the transition gate. When
    /// `expected_version` is set, the transition is refused with
    /// [`ServiceError::StaleTransition`] if another transition was applied in
    /// the meantime. Returns the work output, the new phase and the new version.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: SessionEvent,
        expected_version: Option<usize>,
        work: F,
    ) -> Result<(T, SessionPhase, usize), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.transition_gate.lock().await;

        if let Some(expected) = expected_version {
            let actual = self.machine.read().await.version();
            if actual != expected {
                return Err(ServiceError::StaleTransition { expected, actual });
            }
        }

        let Plan {
            id: plan_id,
            version_next,
            ..
        } = self.plan_transition(event).await?;

        let work_future = work();
        let outcome = if let Some(limit) = self.transition_timeout {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(plan_id).await {
                        warn!(
                            pin = %self.pin,
                            event = ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    drop(gate);
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let next = self.apply_planned_transition(plan_id).await?;
                drop(gate);
                Ok((value, next, version_next))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        pin = %self.pin,
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }

    /// Install the phase timer armed for `version`.
    ///
    /// The timer of the newest version wins: arming an older version than the
    /// installed one aborts the incoming handle instead.
    pub async fn arm_timer(&self, version: usize, handle: JoinHandle<()>) {
        let mut guard = self.timer.lock().await;
        if let Some(current) = guard.as_ref()
            && current.version > version
        {
            handle.abort();
            return;
        }
        if let Some(previous) = guard.replace(ArmedTimer { version, handle }) {
            previous.handle.abort();
        }
    }

    /// Detach the timer armed for `version` without aborting it.
    ///
    /// Called by the timer task itself once it fires. Returns `false` when a
    /// newer timer replaced it.
    pub async fn take_fired_timer(&self, version: usize) -> bool {
        let mut guard = self.timer.lock().await;
        match guard.as_ref() {
            Some(current) if current.version == version => {
                guard.take();
                true
            }
            _ => false,
        }
    }

    /// Abort the pending phase timer, if any.
    pub async fn cancel_timer(&self) {
        if let Some(previous) = self.timer.lock().await.take() {
            previous.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        game::{AnswerOption, Question, Quiz},
        state_machine::FinishReason,
    };

    fn slot() -> SessionSlot {
        let quiz = Quiz {
            title: "Quiz".into(),
            questions: vec![Question {
                text: "2 + 2?".into(),
                options: (0..4)
                    .map(|i| AnswerOption {
                        text: i.to_string(),
                        is_correct: i == 2,
                    })
                    .collect(),
                time_limit_secs: 20,
            }],
        };
        SessionSlot::new(GameSession::new("654321".into(), quiz), Some(Duration::from_millis(50)))
    }

    #[tokio::test]
    async fn successful_work_applies_transition() {
        let slot = slot();
        let (value, phase, version) = slot
            .run_transition(SessionEvent::StartGame, None, || async { Ok(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert!(matches!(phase, SessionPhase::Playing(_)));
        assert_eq!(version, 1);
        assert_eq!(slot.snapshot().await.pending, None);
    }

    #[tokio::test]
    async fn failing_work_aborts_plan() {
        let slot = slot();
        let err = slot
            .run_transition(SessionEvent::StartGame, None, || async {
                Err::<(), _>(ServiceError::InvalidInput("nope".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        let snapshot = slot.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Lobby);
        assert_eq!(snapshot.pending, None);
    }

    #[tokio::test]
    async fn slow_work_times_out() {
        let slot = slot();
        let err = slot
            .run_transition(SessionEvent::StartGame, None, || async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout));
        assert_eq!(slot.phase().await, SessionPhase::Lobby);
    }

    #[tokio::test]
    async fn stale_version_is_refused() {
        let slot = slot();
        slot.run_transition(SessionEvent::StartGame, Some(0), || async { Ok(()) })
            .await
            .unwrap();
        let err = slot
            .run_transition(
                SessionEvent::Finish(FinishReason::HostEnded),
                Some(0),
                || async { Ok(()) },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::StaleTransition {
                expected: 0,
                actual: 1
            }
        ));
    }

    /// Timer task that never ends; the receiver resolves once it is dropped.
    fn pending_timer() -> (JoinHandle<()>, tokio::sync::oneshot::Receiver<()>) {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _alive = tx;
            std::future::pending::<()>().await
        });
        (handle, rx)
    }

    #[tokio::test]
    async fn newest_timer_wins() {
        let slot = slot();
        let (newest, newest_alive) = pending_timer();
        let (older, older_alive) = pending_timer();
        slot.arm_timer(2, newest).await;
        slot.arm_timer(1, older).await;
        assert!(older_alive.await.is_err());

        assert!(!slot.take_fired_timer(1).await);
        assert!(slot.take_fired_timer(2).await);
        assert!(!slot.take_fired_timer(2).await);
        drop(newest_alive);

        let (cancelled, cancelled_alive) = pending_timer();
        slot.arm_timer(3, cancelled).await;
        slot.cancel_timer().await;
        assert!(cancelled_alive.await.is_err());
        assert!(!slot.take_fired_timer(3).await);
    }
}
