use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dao::models::SessionStatusEntity,
    state::state_machine::{QuestionStage, SessionPhase},
};

/// Session status exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleStatus {
    /// Waiting room, players are joining.
    Lobby,
    /// Questions are being played.
    Playing,
    /// Final results.
    Finished,
}

/// Per-question stage exposed to clients while playing.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleStage {
    /// Countdown running, answers accepted.
    Answering,
    /// Correct answer revealed.
    Results,
    /// Ranking displayed before the next question.
    Leaderboard,
}

impl From<SessionPhase> for VisibleStatus {
    fn from(value: SessionPhase) -> Self {
        match value {
            SessionPhase::Lobby => VisibleStatus::Lobby,
            SessionPhase::Playing(_) => VisibleStatus::Playing,
            SessionPhase::Finished => VisibleStatus::Finished,
        }
    }
}

impl From<SessionStatusEntity> for VisibleStatus {
    fn from(value: SessionStatusEntity) -> Self {
        match value {
            SessionStatusEntity::Lobby => VisibleStatus::Lobby,
            SessionStatusEntity::Playing => VisibleStatus::Playing,
            SessionStatusEntity::Finished => VisibleStatus::Finished,
        }
    }
}

impl From<QuestionStage> for VisibleStage {
    fn from(value: QuestionStage) -> Self {
        match value {
            QuestionStage::Answering => VisibleStage::Answering,
            QuestionStage::Results => VisibleStage::Results,
            QuestionStage::Leaderboard => VisibleStage::Leaderboard,
        }
    }
}
