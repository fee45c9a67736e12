use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quiz Blitz Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::session_stream,
        crate::routes::sessions::create_session,
        crate::routes::sessions::get_session,
        crate::routes::sessions::join_session,
        crate::routes::sessions::get_roster,
        crate::routes::sessions::submit_answer,
        crate::routes::sessions::get_leaderboard,
        crate::routes::sessions::start_session,
        crate::routes::sessions::next_question,
        crate::routes::sessions::end_session,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::PlayerJoinedEvent,
            crate::dto::sse::AnswerSubmittedEvent,
            crate::dto::sse::PhaseChangedEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "sessions", description = "Session creation and snapshots"),
        (name = "players", description = "Roster, answers and ranking"),
        (name = "host", description = "Host controls driving the session phases"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_session_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/sessions",
            "/sessions/{pin}",
            "/sessions/{pin}/players",
            "/sessions/{pin}/answers",
            "/sessions/{pin}/leaderboard",
            "/sessions/{pin}/start",
            "/sessions/{pin}/next",
            "/sessions/{pin}/end",
            "/sse/sessions/{pin}",
            "/healthcheck",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
