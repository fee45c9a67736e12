use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{
    common::{LeaderboardEntry, PlayerSummary},
    validation::validate_player_name,
};

/// Request body used to join a session.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct JoinRequest {
    /// Display name, 1 to 32 characters once trimmed.
    #[validate(custom(function = "validate_player_name"))]
    pub name: String,
}

/// Response returned when joining a session.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    /// The joined player.
    pub player: PlayerSummary,
    /// True when a player with the same name already existed and was returned.
    pub rejoined: bool,
}

/// Roster of a session.
#[derive(Debug, Serialize, ToSchema)]
pub struct RosterResponse {
    /// Players in join order.
    pub players: Vec<PlayerSummary>,
}

/// Request body used to submit an answer.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubmitAnswerRequest {
    /// Player submitting the answer.
    pub player_id: Uuid,
    /// Question the answer targets; must be the open question.
    pub question_index: usize,
    /// Picked option, 0 to 3.
    #[validate(range(max = 3))]
    pub answer_index: usize,
}

/// Outcome of a submitted answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnswerResult {
    /// Whether the picked option was correct.
    pub correct: bool,
    /// Points awarded for this answer.
    pub points: u32,
    /// Player score after this answer.
    pub score: u32,
    /// Seconds left on the countdown when the answer was scored.
    pub time_left_secs: u32,
}

/// Ranking of a session.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    /// Ranked players, highest score first.
    pub entries: Vec<LeaderboardEntry>,
    /// Number of players in the session.
    pub player_count: usize,
}
