mod memory;
mod sqlite;

pub use memory::InMemoryAdmissionStore;
pub use sqlite::SqliteAdmissionStore;

use super::domain::AdmissionRecord;
use super::predicate::Predicate;

/// Result ordering supported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    /// Best admission lines first.
    #[default]
    MinScoreDesc,
}

/// Narrow read/write interface to the backing admission store.
pub trait AdmissionStore: Send + Sync {
    fn count(&self, filter: &Predicate) -> Result<u64, StoreError>;
    fn query(
        &self,
        filter: &Predicate,
        order: OrderBy,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AdmissionRecord>, StoreError>;
    fn insert_batch(&self, records: Vec<AdmissionRecord>) -> Result<usize, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}
