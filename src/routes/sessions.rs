use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{
        common::PhaseSnapshot,
        player::{
            AnswerResult, JoinRequest, JoinResponse, LeaderboardResponse, RosterResponse,
            SubmitAnswerRequest,
        },
        session::{CreateSessionRequest, SessionCreatedResponse, SessionSnapshot},
    },
    error::AppError,
    services::{public_service, session_service},
    state::SharedState,
};

/// Routes handling the session lifecycle, the roster and answers.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{pin}", get(get_session))
        .route("/sessions/{pin}/players", post(join_session).get(get_roster))
        .route("/sessions/{pin}/answers", post(submit_answer))
        .route("/sessions/{pin}/leaderboard", get(get_leaderboard))
        .route("/sessions/{pin}/start", post(start_session))
        .route("/sessions/{pin}/next", post(next_question))
        .route("/sessions/{pin}/end", post(end_session))
}

/// Create a session from a quiz and allocate its PIN.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionCreatedResponse),
        (status = 400, description = "Invalid quiz")
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionCreatedResponse>), AppError> {
    payload.validate()?;
    let created = session_service::create_session(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Fetch the current snapshot of a session.
#[utoipa::path(
    get,
    path = "/sessions/{pin}",
    tag = "sessions",
    params(("pin" = String, Path, description = "6-digit session PIN")),
    responses(
        (status = 200, description = "Session snapshot", body = SessionSnapshot),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = public_service::get_session(&state, &pin).await?;
    Ok(Json(snapshot))
}

/// Join a session as a player, or get the existing player back for a known name.
#[utoipa::path(
    post,
    path = "/sessions/{pin}/players",
    tag = "players",
    params(("pin" = String, Path, description = "6-digit session PIN")),
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Player joined", body = JoinResponse),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Session already started or full")
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
    Json(payload): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, AppError> {
    payload.validate()?;
    let joined = session_service::join_session(&state, &pin, payload).await?;
    Ok(Json(joined))
}

/// List the players of a session in join order.
#[utoipa::path(
    get,
    path = "/sessions/{pin}/players",
    tag = "players",
    params(("pin" = String, Path, description = "6-digit session PIN")),
    responses((status = 200, description = "Roster", body = RosterResponse))
)]
pub async fn get_roster(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
) -> Result<Json<RosterResponse>, AppError> {
    let roster = public_service::get_roster(&state, &pin).await?;
    Ok(Json(roster))
}

/// Submit an answer to the open question.
#[utoipa::path(
    post,
    path = "/sessions/{pin}/answers",
    tag = "players",
    params(("pin" = String, Path, description = "6-digit session PIN")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer scored", body = AnswerResult),
        (status = 404, description = "Unknown session or player"),
        (status = 409, description = "Answers closed or already answered")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<Json<AnswerResult>, AppError> {
    payload.validate()?;
    let result = session_service::submit_answer(&state, &pin, payload).await?;
    Ok(Json(result))
}

/// Rank the players of a session by score.
#[utoipa::path(
    get,
    path = "/sessions/{pin}/leaderboard",
    tag = "players",
    params(("pin" = String, Path, description = "6-digit session PIN")),
    responses((status = 200, description = "Ranking", body = LeaderboardResponse))
)]
pub async fn get_leaderboard(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let leaderboard = public_service::get_leaderboard(&state, &pin).await?;
    Ok(Json(leaderboard))
}

/// Close the lobby and open the first question.
#[utoipa::path(
    post,
    path = "/sessions/{pin}/start",
    tag = "host",
    params(("pin" = String, Path, description = "6-digit session PIN")),
    responses(
        (status = 200, description = "Game started", body = PhaseSnapshot),
        (status = 409, description = "Not in the lobby or no player joined")
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
) -> Result<Json<PhaseSnapshot>, AppError> {
    let phase = session_service::start_session(&state, &pin).await?;
    Ok(Json(phase))
}

/// Skip the leaderboard countdown.
#[utoipa::path(
    post,
    path = "/sessions/{pin}/next",
    tag = "host",
    params(("pin" = String, Path, description = "6-digit session PIN")),
    responses(
        (status = 200, description = "Next question opened, or final results", body = PhaseSnapshot),
        (status = 409, description = "Leaderboard not shown")
    )
)]
pub async fn next_question(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
) -> Result<Json<PhaseSnapshot>, AppError> {
    let phase = session_service::next_question(&state, &pin).await?;
    Ok(Json(phase))
}

/// End the session and show the final results.
#[utoipa::path(
    post,
    path = "/sessions/{pin}/end",
    tag = "host",
    params(("pin" = String, Path, description = "6-digit session PIN")),
    responses(
        (status = 200, description = "Session finished", body = PhaseSnapshot),
        (status = 409, description = "Session already finished")
    )
)]
pub async fn end_session(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
) -> Result<Json<PhaseSnapshot>, AppError> {
    let phase = session_service::end_session(&state, &pin).await?;
    Ok(Json(phase))
}
