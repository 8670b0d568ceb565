use super::{AdmissionStore, OrderBy, StoreError};
use crate::admissions::domain::AdmissionRecord;
use crate::admissions::predicate::Predicate;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Scan-based store for tests and small data sets.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAdmissionStore {
    records: Arc<RwLock<Vec<AdmissionRecord>>>,
}

impl InMemoryAdmissionStore {
    pub fn with_records(records: Vec<AdmissionRecord>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("admission store lock poisoned".to_string())
}

impl AdmissionStore for InMemoryAdmissionStore {
    fn count(&self, filter: &Predicate) -> Result<u64, StoreError> {
        let guard = self.records.read().map_err(poisoned)?;
        Ok(guard.iter().filter(|record| filter.matches(record)).count() as u64)
    }

    fn query(
        &self,
        filter: &Predicate,
        order: OrderBy,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AdmissionRecord>, StoreError> {
        let guard = self.records.read().map_err(poisoned)?;
        let mut matched: Vec<&AdmissionRecord> = guard
            .iter()
            .filter(|record| filter.matches(record))
            .collect();

        match order {
            OrderBy::MinScoreDesc => {
                matched.sort_by_key(|record| (Reverse(record.min_score), record.id))
            }
        }

        Ok(matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn insert_batch(&self, records: Vec<AdmissionRecord>) -> Result<usize, StoreError> {
        let mut guard = self.records.write().map_err(poisoned)?;
        let inserted = records.len();
        let mut positions: HashMap<u64, usize> = guard
            .iter()
            .enumerate()
            .map(|(position, record)| (record.id, position))
            .collect();

        // same id replaces the stored line
        for record in records {
            match positions.get(&record.id) {
                Some(&position) => guard[position] = record,
                None => {
                    positions.insert(record.id, guard.len());
                    guard.push(record);
                }
            }
        }
        Ok(inserted)
    }
}
