//! Process-local [`GameStore`] used when no document database is configured.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};

use crate::dao::{
    game_store::GameStore,
    models::SessionEntity,
    storage::{StorageError, StorageResult},
};

/// Keeps session documents in a concurrent map.
///
/// Cloning shares the underlying documents.
#[derive(Clone)]
pub struct MemoryGameStore {
    documents: Arc<DashMap<String, SessionEntity>>,
    available: Arc<AtomicBool>,
}

impl MemoryGameStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            documents: Arc::new(DashMap::new()),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulate an outage: while unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no document was stored yet.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn ensure_available(available: &AtomicBool) -> StorageResult<()> {
        if available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::unavailable(
                "in-memory store is offline".into(),
                io::Error::new(io::ErrorKind::NotConnected, "store offline"),
            ))
        }
    }
}

impl Default for MemoryGameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GameStore for MemoryGameStore {
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        async move {
            Self::ensure_available(&store.available)?;
            store.documents.insert(session.pin.clone(), session);
            Ok(())
        }
        .boxed()
    }

    fn find_session(&self, pin: String) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        async move {
            Self::ensure_available(&store.available)?;
            Ok(store.documents.get(&pin).map(|entry| entry.value().clone()))
        }
        .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let available = self.available.clone();
        async move { Self::ensure_available(&available) }.boxed()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.health_check()
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::models::{QuizEntity, SessionStatusEntity};

    fn entity(pin: &str, status: SessionStatusEntity) -> SessionEntity {
        SessionEntity {
            pin: pin.into(),
            status,
            quiz: QuizEntity {
                title: "Quiz".into(),
                questions: Vec::new(),
            },
            current_question_index: 0,
            question_started_at: None,
            players: Vec::new(),
            created_at: SystemTime::UNIX_EPOCH,
            updated_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[tokio::test]
    async fn last_write_wins() {
        let store = MemoryGameStore::new();
        store
            .save_session(entity("111111", SessionStatusEntity::Lobby))
            .await
            .unwrap();
        store
            .save_session(entity("111111", SessionStatusEntity::Finished))
            .await
            .unwrap();

        let found = store.find_session("111111".into()).await.unwrap().unwrap();
        assert_eq!(found.status, SessionStatusEntity::Finished);
        assert_eq!(store.len(), 1);
        assert!(store.find_session("222222".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = MemoryGameStore::new();
        store.set_available(false);
        assert!(store.health_check().await.is_err());
        assert!(
            store
                .save_session(entity("111111", SessionStatusEntity::Lobby))
                .await
                .is_err()
        );
        assert!(store.is_empty());

        store.set_available(true);
        assert!(store.try_reconnect().await.is_ok());
    }
}
