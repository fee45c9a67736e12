use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

/// High-level phases a quiz session can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting room: players join, nothing is scored yet.
    Lobby,
    /// Questions are being played.
    Playing(QuestionPhase),
    /// Final results are displayed; the session accepts no more answers.
    Finished,
}

/// Position inside the question sequence while the session is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionPhase {
    /// Index of the question being played.
    pub index: usize,
    /// Per-question stage.
    pub stage: QuestionStage,
}

/// Per-question stages, always visited in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionStage {
    /// Countdown running; players may submit one answer each.
    Answering,
    /// Countdown expired; the correct answer is revealed.
    Results,
    /// Ranked players are displayed before the next question.
    Leaderboard,
}

impl QuestionPhase {
    fn new(index: usize, stage: QuestionStage) -> Self {
        Self { index, stage }
    }
}

/// Indicates why the session reached its final results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The leaderboard of the last question elapsed.
    QuizCompleted,
    /// The host ended the session early.
    HostEnded,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Host leaves the lobby and opens the first question.
    StartGame,
    /// The answering countdown reached zero.
    TimeUp,
    /// The reveal delay elapsed.
    ShowLeaderboard,
    /// Open the following question.
    NextQuestion,
    /// Move to the final results.
    Finish(FinishReason),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: SessionPhase,
        /// Current phase.
        actual: SessionPhase,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: SessionPhase,
    /// Phase the state machine will transition to.
    pub to: SessionPhase,
    /// Event that triggered this transition.
    pub event: SessionEvent,
    /// Version number after applying this transition.
    pub version_next: usize,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: SessionPhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
    /// Pending transition phase, if a transition is planned but not yet applied.
    pub pending: Option<SessionPhase>,
}

/// State machine implementing the lobby / question loop / results flow of one session.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    phase: SessionPhase,
    version: usize,
    pending: Option<Plan>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Lobby,
            version: 0,
            pending: None,
        }
    }
}

impl SessionStateMachine {
    /// Create a new state machine initialised in the lobby.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: SessionEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the new phase after the transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<SessionPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;

        Ok(self.phase)
    }

    /// Abort a planned transition without applying it, returning the state machine to its previous state.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Compute a transition from an event if the transition is valid.
    ///
    /// Whether a following question exists is not known here: callers pick
    /// between [`SessionEvent::NextQuestion`] and [`SessionEvent::Finish`].
    fn compute_transition(&self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        use QuestionStage::*;

        let next = match (self.phase, event) {
            (SessionPhase::Lobby, SessionEvent::StartGame) => {
                SessionPhase::Playing(QuestionPhase::new(0, Answering))
            }
            (SessionPhase::Playing(QuestionPhase { index, stage: Answering }), SessionEvent::TimeUp) => {
                SessionPhase::Playing(QuestionPhase::new(index, Results))
            }
            (
                SessionPhase::Playing(QuestionPhase { index, stage: Results }),
                SessionEvent::ShowLeaderboard,
            ) => SessionPhase::Playing(QuestionPhase::new(index, Leaderboard)),
            (
                SessionPhase::Playing(QuestionPhase { index, stage: Leaderboard }),
                SessionEvent::NextQuestion,
            ) => SessionPhase::Playing(QuestionPhase::new(index + 1, Answering)),
            (
                SessionPhase::Playing(QuestionPhase { stage: Leaderboard, .. }),
                SessionEvent::Finish(FinishReason::QuizCompleted),
            ) => SessionPhase::Finished,
            (
                SessionPhase::Lobby | SessionPhase::Playing(_),
                SessionEvent::Finish(FinishReason::HostEnded),
            ) => SessionPhase::Finished,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut SessionStateMachine, event: SessionEvent) -> SessionPhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    fn playing(index: usize, stage: QuestionStage) -> SessionPhase {
        SessionPhase::Playing(QuestionPhase { index, stage })
    }

    #[test]
    fn initial_state_is_lobby() {
        let sm = SessionStateMachine::new();
        assert_eq!(sm.phase(), SessionPhase::Lobby);
        assert_eq!(sm.version(), 0);
    }

    #[test]
    fn full_happy_path_through_two_questions() {
        let mut sm = SessionStateMachine::new();

        assert_eq!(
            apply(&mut sm, SessionEvent::StartGame),
            playing(0, QuestionStage::Answering)
        );
        assert_eq!(
            apply(&mut sm, SessionEvent::TimeUp),
            playing(0, QuestionStage::Results)
        );
        assert_eq!(
            apply(&mut sm, SessionEvent::ShowLeaderboard),
            playing(0, QuestionStage::Leaderboard)
        );
        assert_eq!(
            apply(&mut sm, SessionEvent::NextQuestion),
            playing(1, QuestionStage::Answering)
        );
        apply(&mut sm, SessionEvent::TimeUp);
        apply(&mut sm, SessionEvent::ShowLeaderboard);
        assert_eq!(
            apply(&mut sm, SessionEvent::Finish(FinishReason::QuizCompleted)),
            SessionPhase::Finished
        );
        assert_eq!(sm.version(), 7);
    }

    #[test]
    fn stages_cannot_be_skipped() {
        let mut sm = SessionStateMachine::new();
        apply(&mut sm, SessionEvent::StartGame);

        for event in [
            SessionEvent::ShowLeaderboard,
            SessionEvent::NextQuestion,
            SessionEvent::Finish(FinishReason::QuizCompleted),
            SessionEvent::StartGame,
        ] {
            let err = sm.plan(event).unwrap_err();
            match err {
                PlanError::InvalidTransition(invalid) => {
                    assert_eq!(invalid.from, playing(0, QuestionStage::Answering));
                    assert_eq!(invalid.event, event);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn host_can_end_from_lobby_and_any_stage() {
        let mut sm = SessionStateMachine::new();
        assert_eq!(
            apply(&mut sm, SessionEvent::Finish(FinishReason::HostEnded)),
            SessionPhase::Finished
        );

        let mut sm = SessionStateMachine::new();
        apply(&mut sm, SessionEvent::StartGame);
        apply(&mut sm, SessionEvent::TimeUp);
        assert_eq!(
            apply(&mut sm, SessionEvent::Finish(FinishReason::HostEnded)),
            SessionPhase::Finished
        );
    }

    #[test]
    fn finished_is_terminal() {
        let mut sm = SessionStateMachine::new();
        apply(&mut sm, SessionEvent::Finish(FinishReason::HostEnded));

        assert!(matches!(
            sm.plan(SessionEvent::StartGame),
            Err(PlanError::InvalidTransition(_))
        ));
        assert!(matches!(
            sm.plan(SessionEvent::Finish(FinishReason::HostEnded)),
            Err(PlanError::InvalidTransition(_))
        ));
    }

    #[test]
    fn quiz_completion_requires_leaderboard() {
        let mut sm = SessionStateMachine::new();
        let err = sm
            .plan(SessionEvent::Finish(FinishReason::QuizCompleted))
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidTransition(_)));
    }

    #[test]
    fn second_plan_while_pending_is_rejected() {
        let mut sm = SessionStateMachine::new();
        let plan = sm.plan(SessionEvent::StartGame).unwrap();
        assert_eq!(
            sm.plan(SessionEvent::Finish(FinishReason::HostEnded))
                .unwrap_err(),
            PlanError::AlreadyPending
        );
        assert_eq!(sm.snapshot().pending, Some(playing(0, QuestionStage::Answering)));
        sm.apply(plan.id).unwrap();
        assert_eq!(sm.snapshot().pending, None);
    }

    #[test]
    fn apply_with_wrong_id_keeps_plan_pending() {
        let mut sm = SessionStateMachine::new();
        let plan = sm.plan(SessionEvent::StartGame).unwrap();
        let err = sm.apply(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApplyError::IdMismatch { .. }));
        assert_eq!(sm.phase(), SessionPhase::Lobby);
        assert_eq!(sm.apply(plan.id).unwrap(), playing(0, QuestionStage::Answering));
    }

    #[test]
    fn abort_clears_pending() {
        let mut sm = SessionStateMachine::new();
        let plan = sm.plan(SessionEvent::StartGame).unwrap();
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.phase(), SessionPhase::Lobby);
        assert_eq!(sm.version(), 0);
        assert_eq!(sm.abort(plan.id).unwrap_err(), AbortError::NoPending);
    }
}
