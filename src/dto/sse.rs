use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::common::{PhaseSnapshot, PlayerSummary};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// Event name, if any.
    pub event: Option<String>,
    /// Raw data field.
    pub data: String,
}

impl ServerEvent {
    /// Build an event from an already rendered data field.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a new player joins the session.
pub struct PlayerJoinedEvent {
    /// The new player.
    pub player: PlayerSummary,
    /// Roster size after the join.
    pub player_count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast after each accepted answer, so hosts can show "x/y answered".
pub struct AnswerSubmittedEvent {
    /// Question the answer belongs to.
    pub question_index: usize,
    /// Players who answered this question so far.
    pub answered_count: usize,
    /// Roster size.
    pub player_count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast whenever the session phase changes.
pub struct PhaseChangedEvent(pub PhaseSnapshot);
