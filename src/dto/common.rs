use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::phase::{VisibleStage, VisibleStatus},
    state::game::{Player, Question, Standing},
};

/// Question as shown to players: option texts without correctness flags.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct QuestionView {
    /// Question text.
    pub text: String,
    /// Option texts, in display order.
    pub answers: Vec<String>,
    /// Countdown length in seconds.
    pub time_limit_secs: u32,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            text: question.text.clone(),
            answers: question
                .options
                .iter()
                .map(|option| option.text.clone())
                .collect(),
            time_limit_secs: question.time_limit_secs,
        }
    }
}

/// Public view of a player.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct PlayerSummary {
    /// Player identifier, needed to submit answers.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Cumulative score.
    pub score: u32,
    /// Join time, RFC 3339.
    pub joined_at: String,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            score: player.score,
            joined_at: super::format_system_time(player.joined_at),
        }
    }
}

/// One row of a ranking.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    /// Player identifier.
    pub player_id: Uuid,
    /// Display name.
    pub name: String,
    /// Cumulative score.
    pub score: u32,
}

impl From<Standing> for LeaderboardEntry {
    fn from(standing: Standing) -> Self {
        Self {
            rank: standing.rank,
            player_id: standing.player_id,
            name: standing.name,
            score: standing.score,
        }
    }
}

/// Shared snapshot describing the current phase of a session and related context.
///
/// Fields are only present in the stages where they make sense: correctness
/// is never exposed while answers are accepted.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct PhaseSnapshot {
    /// Session status.
    pub status: VisibleStatus,
    /// Present while playing a question whose stage is known.
    pub stage: Option<VisibleStage>,
    /// Present while playing.
    pub question_index: Option<usize>,
    /// Number of questions in the quiz.
    pub question_count: usize,
    /// Present while playing.
    pub question: Option<QuestionView>,
    /// Start of the current question countdown, epoch milliseconds.
    pub question_started_at_ms: Option<u64>,
    /// Present during the answering stage.
    pub time_left_secs: Option<u32>,
    /// Present during the results and leaderboard stages.
    pub correct_answers: Option<Vec<usize>>,
    /// Present while playing: players who answered the current question.
    pub answered_count: Option<usize>,
    /// Number of players in the session.
    pub player_count: usize,
    /// Top players during the leaderboard stage, everybody once finished.
    pub leaderboard: Option<Vec<LeaderboardEntry>>,
    /// True when the backend operates in degraded mode (no storage backend).
    pub degraded: bool,
}
