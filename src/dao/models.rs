use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Lifecycle status persisted with a session document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatusEntity {
    /// Players are joining.
    Lobby,
    /// Questions are being played.
    Playing,
    /// Final results are available.
    Finished,
}

/// Quiz definition embedded in a session document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizEntity {
    /// Quiz title.
    pub title: String,
    /// Ordered questions.
    pub questions: Vec<QuestionEntity>,
}

/// Question stored inside a quiz.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Question text.
    pub text: String,
    /// The four answer options.
    pub answers: Vec<AnswerOptionEntity>,
    /// Countdown length in seconds.
    pub time_limit_secs: u32,
}

/// Answer option of a stored question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerOptionEntity {
    /// Displayed text.
    pub text: String,
    /// Whether the option scores.
    pub is_correct: bool,
}

/// Player entry persisted with its answers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Stable identifier of the player.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Cumulative score.
    pub score: u32,
    /// Submitted answers.
    pub answers: Vec<PlayerAnswerEntity>,
    /// Join timestamp.
    pub joined_at: SystemTime,
}

/// Answer submitted by a player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerAnswerEntity {
    /// Question the answer belongs to.
    pub question_index: usize,
    /// Picked option.
    pub answer_index: usize,
    /// Whether the option was correct.
    pub correct: bool,
    /// Points awarded.
    pub points: u32,
    /// Submission timestamp.
    pub answered_at: SystemTime,
}

/// Aggregate session document persisted by the storage layer, keyed by PIN.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    /// 6-digit PIN, primary key of the document.
    pub pin: String,
    /// Lifecycle status.
    pub status: SessionStatusEntity,
    /// Quiz being played.
    pub quiz: QuizEntity,
    /// Index of the current question.
    pub current_question_index: usize,
    /// Start of the current question countdown.
    pub question_started_at: Option<SystemTime>,
    /// Players in join order.
    pub players: Vec<PlayerEntity>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time the document was written.
    pub updated_at: SystemTime,
}
