use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::{
    dao::{game_store::GameStore, storage::StorageError},
    services::persistence::STORAGE_CALL_TIMEOUT,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a storage backend installed, flipping degraded mode while it is unreachable.
///
/// Sessions keep running in memory the whole time; only persistence and the
/// stored-session lookups are affected by an outage.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn GameStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                continue;
            }
        };

        state.install_game_store(Arc::clone(&store)).await;
        info!("storage connection established; leaving degraded mode");
        delay = INITIAL_DELAY;

        watch_store(&state, store.as_ref()).await;

        warn!("exhausted storage reconnect attempts; dropping the store until a new connection succeeds");
        state.clear_game_store().await;
        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Poll the installed store until it fails and cannot be reconnected.
async fn watch_store(state: &SharedState, store: &dyn GameStore) {
    loop {
        if matches!(
            timeout(STORAGE_CALL_TIMEOUT, store.health_check()).await,
            Ok(Ok(()))
        ) {
            if state.is_degraded() {
                info!("storage healthy again; leaving degraded mode");
                state.update_degraded(false);
            }
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        if !reconnect(state, store).await {
            return;
        }
        state.update_degraded(false);
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

async fn reconnect(state: &SharedState, store: &dyn GameStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match timeout(STORAGE_CALL_TIMEOUT, store.try_reconnect()).await {
            Ok(Ok(())) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Ok(Err(err)) if attempt == 0 => {
                warn!(attempt, error = %err, "storage reconnect first attempt failed; entering degraded mode");
                state.update_degraded(true);
            }
            Ok(Err(err)) => warn!(attempt, error = %err, "storage reconnect attempt failed"),
            Err(_) => {
                warn!(attempt, "storage reconnect attempt timed out; entering degraded mode");
                state.update_degraded(true);
            }
        }
        sleep(reconnect_delay).await;
        reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::memory::MemoryGameStore,
        state::AppState,
    };
    use tokio::task::yield_now;

    async fn settle() {
        for _ in 0..8 {
            yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn degraded_mode_follows_store_health() {
        let state = AppState::new(AppConfig::default());
        let memory = Arc::new(MemoryGameStore::new());
        let store = Arc::clone(&memory);
        let supervisor = tokio::spawn(run(state.clone(), move || {
            let store: Arc<dyn GameStore> = store.clone();
            async move { Ok::<_, StorageError>(store) }
        }));

        settle().await;
        assert!(state.game_store().await.is_some());
        assert!(!state.is_degraded());

        memory.set_available(false);
        tokio::time::advance(HEALTH_POLL_INTERVAL).await;
        settle().await;
        assert!(state.is_degraded());

        memory.set_available(true);
        tokio::time::advance(INITIAL_DELAY).await;
        settle().await;
        assert!(!state.is_degraded());

        supervisor.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connections_keep_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        let supervisor = tokio::spawn(run(state.clone(), || async {
            Err::<Arc<dyn GameStore>, _>(StorageError::unavailable(
                "refused".into(),
                std::io::Error::other("refused"),
            ))
        }));

        settle().await;
        tokio::time::advance(INITIAL_DELAY).await;
        settle().await;
        assert!(state.is_degraded());
        assert!(state.game_store().await.is_none());

        supervisor.abort();
    }
}
