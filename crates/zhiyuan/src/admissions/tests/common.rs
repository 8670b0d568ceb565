use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::admissions::domain::{AdmissionRecord, Subject, SubjectRequirements, Track};
use crate::admissions::estimator::RankEstimator;
use crate::admissions::predicate::Predicate;
use crate::admissions::report::ReportService;
use crate::admissions::score_table::{DistributionEntry, ScoreRankTable};
use crate::admissions::store::{AdmissionStore, InMemoryAdmissionStore, OrderBy, StoreError};
use crate::config::ReportSettings;

fn entry(score: i32, cumulative: u32) -> DistributionEntry {
    DistributionEntry {
        score_label: score.to_string(),
        count: 0,
        cumulative_count: cumulative,
    }
}

pub(super) fn physics_entries() -> Vec<DistributionEntry> {
    vec![
        entry(700, 100),
        entry(650, 2_000),
        entry(600, 12_000),
        entry(550, 35_000),
        entry(500, 70_000),
        entry(450, 110_000),
    ]
}

pub(super) fn history_entries() -> Vec<DistributionEntry> {
    vec![
        entry(650, 50),
        entry(600, 3_000),
        entry(550, 12_000),
        entry(500, 30_000),
        entry(450, 60_000),
    ]
}

pub(super) fn estimator() -> Arc<RankEstimator> {
    let table = ScoreRankTable::builder()
        .track(Track::Physics, physics_entries())
        .track(Track::History, history_entries())
        .build();
    Arc::new(RankEstimator::new(table))
}

pub(super) fn record(
    id: u64,
    school: &str,
    major: &str,
    province: &str,
    track: Track,
    min_score: i32,
    requires: &[Subject],
) -> AdmissionRecord {
    let mut requirements = SubjectRequirements::default();
    for subject in requires {
        requirements.set(*subject, true);
    }
    AdmissionRecord {
        id,
        school_code: format!("{:05}", 10_000 + id),
        school_name: school.to_string(),
        major_code: format!("08{:04}", id),
        major_name: major.to_string(),
        major_group_code: "01".to_string(),
        school_province: province.to_string(),
        school_city: String::new(),
        school_ownership: "公办".to_string(),
        school_type: "综合".to_string(),
        school_authority: String::new(),
        school_level: "本科".to_string(),
        school_tags: String::new(),
        education_level: "本科".to_string(),
        major_description: String::new(),
        study_years: 4,
        tuition_fee: 5_850,
        is_new_major: false,
        track,
        requirements,
        subject_requirement_raw: requires
            .iter()
            .map(|subject| subject.label())
            .collect::<Vec<_>>()
            .join("+"),
        min_score,
        min_rank: 0,
        enrollment_plan: 2,
        major_min_score: None,
    }
}

/// Physics rank 50000 resolves to 528, so the match window is [518, 538].
pub(super) fn admission_lines() -> Vec<AdmissionRecord> {
    use Subject::*;
    let mut flagship = record(
        1,
        "华中科技大学",
        "计算机科学与技术",
        "湖北",
        Track::Physics,
        535,
        &[Physics, Chemistry],
    );
    flagship.major_min_score = Some(540);

    vec![
        flagship,
        record(2, "武汉理工大学", "材料科学与工程", "湖北", Track::Physics, 530, &[Chemistry]),
        record(3, "湖北大学", "临床医学", "湖北", Track::Physics, 525, &[Chemistry, Biology]),
        record(4, "三峡大学", "地理信息科学", "湖北", Track::Physics, 522, &[Geography]),
        record(5, "长江大学", "思想政治教育", "湖北", Track::Physics, 520, &[Politics]),
        record(6, "湖南大学", "软件工程", "湖南", Track::Physics, 536, &[]),
        record(7, "武汉大学", "数学与应用数学", "湖北", Track::Physics, 600, &[]),
        record(8, "中南财经政法大学", "法学", "湖北", Track::History, 530, &[History]),
        record(9, "湖北工业大学", "电气工程及其自动化", "湖北", Track::Physics, 518, &[]),
        record(10, "江汉大学", "英语", "湖北", Track::Physics, 538, &[]),
    ]
}

pub(super) fn memory_store() -> Arc<InMemoryAdmissionStore> {
    Arc::new(InMemoryAdmissionStore::with_records(admission_lines()))
}

pub(super) fn build_service<S>(store: Arc<S>) -> Arc<ReportService<S>>
where
    S: AdmissionStore + 'static,
{
    Arc::new(ReportService::new(
        estimator(),
        store,
        ReportSettings::default(),
    ))
}

/// Count fails, fetch delegates to the in-memory store.
pub(super) struct CountFailingStore(pub(super) InMemoryAdmissionStore);

impl AdmissionStore for CountFailingStore {
    fn count(&self, _filter: &Predicate) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("count timed out".to_string()))
    }

    fn query(
        &self,
        filter: &Predicate,
        order: OrderBy,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AdmissionRecord>, StoreError> {
        self.0.query(filter, order, limit, offset)
    }

    fn insert_batch(&self, records: Vec<AdmissionRecord>) -> Result<usize, StoreError> {
        self.0.insert_batch(records)
    }
}

pub(super) struct UnavailableStore;

impl AdmissionStore for UnavailableStore {
    fn count(&self, _filter: &Predicate) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    fn query(
        &self,
        _filter: &Predicate,
        _order: OrderBy,
        _limit: usize,
        _offset: usize,
    ) -> Result<Vec<AdmissionRecord>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    fn insert_batch(&self, _records: Vec<AdmissionRecord>) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// Wraps the in-memory store and counts read calls.
#[derive(Default)]
pub(super) struct CountingStore {
    inner: InMemoryAdmissionStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub(super) fn with_records(records: Vec<AdmissionRecord>) -> Self {
        Self {
            inner: InMemoryAdmissionStore::with_records(records),
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AdmissionStore for CountingStore {
    fn count(&self, filter: &Predicate) -> Result<u64, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.count(filter)
    }

    fn query(
        &self,
        filter: &Predicate,
        order: OrderBy,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AdmissionRecord>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.query(filter, order, limit, offset)
    }

    fn insert_batch(&self, records: Vec<AdmissionRecord>) -> Result<usize, StoreError> {
        self.inner.insert_batch(records)
    }
}

/// Percent-encode a query value so Chinese text survives URI parsing.
pub(super) fn encode(value: &str) -> String {
    value
        .bytes()
        .map(|byte| match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (byte as char).to_string()
            }
            other => format!("%{other:02X}"),
        })
        .collect()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
