//! Best-effort access to the storage backend from the request path.
//!
//! Every call is bounded by [`STORAGE_CALL_TIMEOUT`]: a backend that accepts
//! connections but never answers must not hold host or player requests.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{
    dao::models::SessionEntity,
    error::ServiceError,
    state::{SessionSlot, SharedState},
};

/// Longest time a storage call may take before it is given up.
pub const STORAGE_CALL_TIMEOUT: Duration = Duration::from_secs(3);

/// Overwrite the stored document of `slot` with its in-memory state.
///
/// Failures and timeouts are logged and swallowed: gameplay never waits for
/// storage to recover, the next successful write carries the full document anyway.
pub async fn persist_session(state: &SharedState, slot: &SessionSlot) {
    let Some(store) = state.game_store().await else {
        debug!(pin = %slot.pin(), "no storage backend; session kept in memory only");
        return;
    };

    let entity = slot
        .read_with_phase(|phase, game| game.to_entity(phase))
        .await;
    match timeout(STORAGE_CALL_TIMEOUT, store.save_session(entity)).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(pin = %slot.pin(), error = %err, "failed to persist session"),
        Err(_) => warn!(
            pin = %slot.pin(),
            timeout_ms = STORAGE_CALL_TIMEOUT.as_millis() as u64,
            "storage did not answer; session kept in memory only"
        ),
    }
}

/// Read the stored document of `pin`, `None` when no backend is installed.
pub async fn load_session(
    state: &SharedState,
    pin: &str,
) -> Result<Option<SessionEntity>, ServiceError> {
    let Some(store) = state.game_store().await else {
        return Ok(None);
    };

    match timeout(STORAGE_CALL_TIMEOUT, store.find_session(pin.to_string())).await {
        Ok(found) => Ok(found?),
        Err(_) => {
            warn!(%pin, "storage did not answer a session lookup");
            Err(ServiceError::Timeout)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use futures::future::{BoxFuture, FutureExt, pending};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{game_store::GameStore, storage::StorageResult},
        state::{
            AppState,
            game::{GameSession, Quiz},
        },
    };

    /// Store whose calls never complete, like a backend that stopped answering.
    pub(crate) struct UnresponsiveStore;

    impl GameStore for UnresponsiveStore {
        fn save_session(&self, _session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
            pending().boxed()
        }

        fn find_session(&self, _pin: String) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
            pending().boxed()
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            pending().boxed()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            pending().boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unresponsive_storage_is_given_up() {
        let state = AppState::new(AppConfig::default());
        state.install_game_store(Arc::new(UnresponsiveStore)).await;
        let slot = SessionSlot::new(
            GameSession::new(
                "424242".into(),
                Quiz {
                    title: "Stalled".into(),
                    questions: Vec::new(),
                },
            ),
            None,
        );

        let started = tokio::time::Instant::now();
        persist_session(&state, &slot).await;
        let waited = started.elapsed();
        assert!(waited >= STORAGE_CALL_TIMEOUT);
        assert!(waited < STORAGE_CALL_TIMEOUT + Duration::from_secs(1));

        assert!(matches!(
            load_session(&state, "424242").await,
            Err(ServiceError::Timeout)
        ));
    }
}
