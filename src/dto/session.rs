use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::{
    common::{PhaseSnapshot, PlayerSummary},
    validation::{validate_has_correct_answer, validate_not_blank},
};

/// Maximum number of questions a quiz may contain.
pub const MAX_QUESTIONS: u64 = 100;

/// Request body used to create a session from a quiz.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSessionRequest {
    /// Quiz title.
    #[validate(length(max = 200), custom(function = "validate_not_blank"))]
    pub title: String,
    /// Questions in play order.
    #[validate(length(min = 1, max = MAX_QUESTIONS), nested)]
    pub questions: Vec<QuestionInput>,
}

/// Question submitted with a new quiz.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_has_correct_answer"))]
pub struct QuestionInput {
    /// Question text.
    #[validate(length(max = 500), custom(function = "validate_not_blank"))]
    pub text: String,
    /// Exactly four answer options.
    #[validate(length(equal = 4), nested)]
    pub answers: Vec<AnswerInput>,
    /// Countdown length in seconds; the server default applies when omitted.
    #[serde(default)]
    pub time_limit_secs: Option<u32>,
}

/// Answer option submitted with a question.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AnswerInput {
    /// Option text.
    #[validate(length(max = 200), custom(function = "validate_not_blank"))]
    pub text: String,
    /// Whether this option scores.
    #[serde(default)]
    pub is_correct: bool,
}

/// Full view of a session, as returned by REST and sent on SSE connect.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct SessionSnapshot {
    /// Session PIN.
    pub pin: String,
    /// Quiz title.
    pub title: String,
    /// Creation time, RFC 3339.
    pub created_at: String,
    /// Last update, RFC 3339.
    pub updated_at: String,
    /// Current phase and its context.
    pub phase: PhaseSnapshot,
    /// Roster in join order.
    pub players: Vec<PlayerSummary>,
}

/// Response returned once a session is created.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionCreatedResponse {
    /// PIN to share with players.
    pub pin: String,
    /// Session state right after creation.
    pub session: SessionSnapshot,
}
