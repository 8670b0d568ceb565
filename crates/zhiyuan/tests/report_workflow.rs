//! End-to-end report scenarios driven through the public router, starting from
//! a distribution document and a CSV export the way the service loads them.

mod common {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use axum::response::Response;
    use serde_json::Value;

    use zhiyuan::admissions::{
        read_admissions, read_distribution, AdmissionRecord, AdmissionStore,
        InMemoryAdmissionStore, OrderBy, Predicate, RankEstimator, ReportService, ScoreRankTable,
        SqliteAdmissionStore, StoreError, Track,
    };
    use zhiyuan::config::ReportSettings;

    const PHYSICS: &str = r#"{"data": [
        {"score": "695-750", "num": 100, "accumulate": 100},
        {"score": "650", "num": 40, "accumulate": 2000},
        {"score": "600", "num": 210, "accumulate": 12000},
        {"score": "550", "num": 480, "accumulate": 35000},
        {"score": "500", "num": 700, "accumulate": 70000},
        {"score": "450", "num": 810, "accumulate": 110000}
    ]}"#;

    const ADMISSIONS: &str = "\
id,school_code,school_name,major_code,major_name,school_province,track,subject_requirement,min_score,min_rank,major_min_score
1,10487,华中科技大学,080901,计算机科学与技术,湖北,物理,物理+化学,535,47000,540
2,10497,武汉理工大学,080401,材料科学与工程,湖北,物理,化学,530,49500,
3,10512,湖北大学,100201,临床医学,湖北,物理,化学+生物,525,52000,
4,11075,三峡大学,070504,地理信息科学,湖北,物理,地理,522,53500,
5,10489,长江大学,030503,思想政治教育,湖北,物理,政治,520,54600,
6,10532,湖南大学,080902,软件工程,湖南,物理,不限,536,46500,
7,10486,武汉大学,070101,数学与应用数学,湖北,物理,不限,600,12000,
8,10520,中南财经政法大学,030101,法学,湖北,历史,历史,530,9000,
9,10500,湖北工业大学,080601,电气工程及其自动化,湖北,物理,不限,518,57000,
10,11072,江汉大学,050201,英语,湖北,物理,不限,538,45500,
11,10488,武汉科技大学,100701,药学,湖北,物理,化学+生物,519,56000,
12,10490,武汉工程大学,081301,化学工程与工艺,湖北,物理,化学,533,48000,
";

    pub(super) fn admission_lines() -> Vec<AdmissionRecord> {
        read_admissions(ADMISSIONS.as_bytes()).expect("fixture csv parses")
    }

    pub(super) fn estimator() -> Arc<RankEstimator> {
        let physics = read_distribution(PHYSICS.as_bytes()).expect("fixture json parses");
        let table = ScoreRankTable::builder()
            .track(Track::Physics, physics)
            .build();
        Arc::new(RankEstimator::new(table))
    }

    pub(super) fn sqlite_service() -> Arc<ReportService<SqliteAdmissionStore>> {
        let store = SqliteAdmissionStore::open_in_memory().expect("sqlite opens");
        store
            .insert_batch(admission_lines())
            .expect("fixture rows insert");
        Arc::new(ReportService::new(
            estimator(),
            Arc::new(store),
            ReportSettings::default(),
        ))
    }

    /// Records every read so a test can prove the store was never touched.
    #[derive(Default)]
    pub(super) struct TrackingStore {
        pub(super) inner: InMemoryAdmissionStore,
        pub(super) reads: AtomicUsize,
    }

    impl TrackingStore {
        pub(super) fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl AdmissionStore for TrackingStore {
        fn count(&self, filter: &Predicate) -> Result<u64, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.count(filter)
        }

        fn query(
            &self,
            filter: &Predicate,
            order: OrderBy,
            limit: usize,
            offset: usize,
        ) -> Result<Vec<AdmissionRecord>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.query(filter, order, limit, offset)
        }

        fn insert_batch(&self, records: Vec<AdmissionRecord>) -> Result<usize, StoreError> {
            self.inner.insert_batch(records)
        }
    }

    pub(super) fn get(path: &str, params: &[(&str, &str)]) -> Request<Body> {
        let query: Vec<String> = params
            .iter()
            .map(|(key, value)| format!("{key}={}", encode(value)))
            .collect();
        Request::get(format!("{path}?{}", query.join("&")))
            .body(Body::empty())
            .expect("request")
    }

    fn encode(value: &str) -> String {
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
}

use std::sync::Arc;

use axum::http::StatusCode;
use tower::ServiceExt;
use zhiyuan::admissions::{report_router, ReportService};
use zhiyuan::config::ReportSettings;

use common::*;

#[tokio::test]
async fn physics_match_report_only_returns_covered_lines_in_band() {
    let router = report_router(sqlite_service());
    let request = get(
        "/api/report/get",
        &[
            ("rank", "50000"),
            ("class_first_choice", "physics"),
            ("class_optional_choice", r#"["chemistry","biology"]"#),
            ("strategy", "match"),
            ("page", "1"),
            ("page_size", "10"),
        ],
    );

    let response = router.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["code"], 0);

    let records = body["data"]["records"].as_array().expect("records");
    assert!(records.len() <= 10);
    assert_eq!(body["data"]["pageInfo"]["totalCount"], 8);

    let lower = body["data"]["basis"]["window"]["lowerScore"].as_i64().expect("lower");
    let upper = body["data"]["basis"]["window"]["upperScore"].as_i64().expect("upper");
    assert_eq!((lower, upper), (518, 538));

    let mut previous = i64::MAX;
    for record in records {
        let score = record["minScore"].as_i64().expect("score");
        assert!(lower <= score && score <= upper);
        assert!(score <= previous, "records ordered by min score descending");
        previous = score;

        for subject in record["requiredSubjects"].as_array().expect("subjects") {
            let subject = subject.as_str().expect("label");
            assert!(
                ["物理", "化学", "生物"].contains(&subject),
                "{subject} is not covered by the selection"
            );
        }
        assert_eq!(record["track"], "物理");
    }
}

#[tokio::test]
async fn unrecognized_track_degrades_to_default_and_succeeds() {
    let router = report_router(sqlite_service());
    let request = get(
        "/api/report/get",
        &[("rank", "50000"), ("class_first_choice", "美术"), ("strategy", "2")],
    );

    let response = router.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["basis"]["track"], "physics");
    assert_eq!(body["data"]["basis"]["fallback"], "default_track");
}

#[tokio::test]
async fn hostile_fragment_never_reaches_the_store() {
    let store = Arc::new(TrackingStore::default());
    let service = Arc::new(ReportService::new(
        estimator(),
        store.clone(),
        ReportSettings::default(),
    ));
    let router = report_router(service);

    for fragment in ["临床\"医学", "x; DROP TABLE admission_lines", "医学 union all"] {
        let request = get(
            "/api/report/get",
            &[("rank", "50000"), ("major_keyword", fragment)],
        );
        let response = router.clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{fragment}");
        let body = read_json_body(response).await;
        assert_eq!(body["code"], 1);
    }

    assert_eq!(store.reads(), 0);
}

#[tokio::test]
async fn rank_endpoint_reads_the_loaded_distribution() {
    let router = report_router(sqlite_service());
    let response = router
        .oneshot(get("/api/rank/get", &[("score", "700"), ("subject_category", "物理")]))
        .await
        .expect("response");

    let body = read_json_body(response).await;
    assert_eq!(body["code"], 0);
    // 695-750 collapses to 695 -> 100; 700 is above the best point
    assert_eq!(body["data"]["rank"], 100);
}
