use tokio::time::timeout;
use tracing::warn;

use crate::{
    dto::health::HealthResponse,
    services::persistence::STORAGE_CALL_TIMEOUT,
    state::SharedState,
};

/// Report whether the storage backend answers, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let healthy = match state.game_store().await {
        Some(store) => match timeout(STORAGE_CALL_TIMEOUT, store.health_check()).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!(error = %err, "storage health check failed");
                false
            }
            Err(_) => {
                warn!("storage health check timed out");
                false
            }
        },
        None => {
            warn!("storage unavailable (degraded mode)");
            false
        }
    };

    let live_sessions = state.session_count();
    if healthy && !state.is_degraded() {
        HealthResponse::ok(live_sessions)
    } else {
        HealthResponse::degraded(live_sessions)
    }
}
