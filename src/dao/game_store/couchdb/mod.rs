mod config;
mod error;
mod models;
mod store;

use crate::dao::storage::StorageError;

pub use config::CouchConfig;
pub use error::{CouchDaoError, CouchResult};
pub use store::CouchGameStore;

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
