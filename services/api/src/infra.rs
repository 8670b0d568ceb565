use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};
use zhiyuan::admissions::{
    read_admissions_file, AdmissionRecord, AdmissionStore, InMemoryAdmissionStore, OrderBy,
    Predicate, RankEstimator, ScoreRankTable, SqliteAdmissionStore, StoreError,
};
use zhiyuan::config::{DataConfig, StoreKind};
use zhiyuan::error::AppError;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Store selected at startup through `APP_STORE`.
pub(crate) enum ConfiguredStore {
    Memory(InMemoryAdmissionStore),
    Sqlite(SqliteAdmissionStore),
}

impl ConfiguredStore {
    pub(crate) fn open(config: &DataConfig) -> Result<Self, AppError> {
        let store = match config.store {
            StoreKind::Memory => Self::Memory(InMemoryAdmissionStore::default()),
            StoreKind::Sqlite => {
                info!(path = %config.sqlite_path.display(), "opening sqlite admission store");
                Self::Sqlite(SqliteAdmissionStore::open(&config.sqlite_path)?)
            }
        };
        Ok(store)
    }

    fn inner(&self) -> &dyn AdmissionStore {
        match self {
            Self::Memory(store) => store,
            Self::Sqlite(store) => store,
        }
    }
}

impl AdmissionStore for ConfiguredStore {
    fn count(&self, filter: &Predicate) -> Result<u64, StoreError> {
        self.inner().count(filter)
    }

    fn query(
        &self,
        filter: &Predicate,
        order: OrderBy,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AdmissionRecord>, StoreError> {
        self.inner().query(filter, order, limit, offset)
    }

    fn insert_batch(&self, records: Vec<AdmissionRecord>) -> Result<usize, StoreError> {
        self.inner().insert_batch(records)
    }
}

pub(crate) fn load_estimator(config: &DataConfig) -> RankEstimator {
    let table = ScoreRankTable::load(&config.physics_table, &config.history_table);
    if table.is_empty() {
        warn!("no score distribution loaded; estimates will use fallback values");
    }
    RankEstimator::new(table)
}

/// Load a CSV export into the store, returning the number of rows written.
pub(crate) fn seed_store<S: AdmissionStore>(store: &S, csv: &Path) -> Result<usize, AppError> {
    let records = read_admissions_file(csv)?;
    let inserted = store.insert_batch(records)?;
    info!(path = %csv.display(), inserted, "seeded admission store");
    Ok(inserted)
}
