#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;

use crate::dao::models::SessionEntity;
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the persistence layer for quiz sessions.
///
/// Documents are keyed by PIN and overwritten wholesale: the last write wins.
pub trait GameStore: Send + Sync {
    /// Create or overwrite the document of `session.pin`.
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch the document stored under `pin`.
    fn find_session(&self, pin: String) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Check that the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
