//! Report pipeline: rank → reference score → band → predicate → paginated fetch.

use super::band::{ScoreWindow, Strategy};
use super::domain::{AdmissionRecord, InterestCategory, Subject, Track};
use super::estimator::{EstimateFallback, RankEstimate, RankEstimator};
use super::predicate::{PredicateComposer, QueryFilterSpec};
use super::store::{AdmissionStore, OrderBy, StoreError};
use super::validation::{LocationName, MajorNameFragment};
use crate::config::ReportSettings;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            code: 1,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("query failed")]
    Fetch(#[source] StoreError),
}

/// Where the student stands: an explicit rank, or a score to convert first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    Rank(u32),
    Score(i32),
}

/// Normalized 1-based pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    /// `page < 1` becomes 1; a non-positive size becomes the default and an
    /// oversized one is capped.
    pub fn new(page: Option<i64>, page_size: Option<i64>, max_page_size: u32) -> Self {
        let page = page
            .filter(|page| *page >= 1)
            .map(|page| u32::try_from(page).unwrap_or(u32::MAX))
            .unwrap_or(1);
        let page_size = match page_size {
            Some(size) if size >= 1 => u32::try_from(size)
                .unwrap_or(u32::MAX)
                .min(max_page_size),
            _ => DEFAULT_PAGE_SIZE.min(max_page_size),
        };
        Self { page, page_size }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.page_size as usize)
    }
}

/// Validated report inputs. Built by the HTTP boundary or the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    pub standing: Standing,
    pub track: String,
    pub optional_subjects: BTreeSet<Subject>,
    pub locations: Vec<LocationName>,
    pub interests: BTreeSet<InterestCategory>,
    pub major_fragment: Option<MajorNameFragment>,
    pub strategy: Strategy,
    pub page: PageRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u64,
}

impl PageInfo {
    pub fn new(page: PageRequest, total_count: u64) -> Self {
        let size = u64::from(page.page_size().max(1));
        Self {
            page: page.page(),
            page_size: page.page_size(),
            total_count,
            total_pages: total_count.div_ceil(size),
        }
    }
}

/// How the band was derived, echoed back so clients can explain a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportBasis {
    pub track: Track,
    pub rank: u32,
    pub reference_score: i32,
    pub strategy: Strategy,
    pub window: ScoreWindow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<EstimateFallback>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub id: u64,
    pub school_code: String,
    pub school_name: String,
    pub major_code: String,
    pub major_name: String,
    pub major_group_code: String,
    pub school_province: String,
    pub school_city: String,
    pub school_ownership: String,
    pub school_type: String,
    pub school_level: String,
    pub school_tags: String,
    pub education_level: String,
    pub study_years: u8,
    pub tuition_fee: u32,
    pub is_new_major: bool,
    pub track: &'static str,
    pub subject_requirement: String,
    pub required_subjects: Vec<&'static str>,
    pub min_score: i32,
    pub min_rank: u32,
    pub enrollment_plan: u32,
    pub major_min_score: Option<i32>,
    pub major_rank: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPage {
    pub page_info: PageInfo,
    pub basis: ReportBasis,
    pub records: Vec<ReportRecord>,
}

/// Result of a plain score→rank lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankLookup {
    pub rank: u32,
    pub score: i32,
    pub track: Track,
    pub year: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<EstimateFallback>,
}

/// Sequences the report pipeline over an [`AdmissionStore`].
pub struct ReportService<S> {
    estimator: Arc<RankEstimator>,
    store: Arc<S>,
    settings: ReportSettings,
    composer: PredicateComposer,
}

impl<S> ReportService<S>
where
    S: AdmissionStore + 'static,
{
    pub fn new(estimator: Arc<RankEstimator>, store: Arc<S>, settings: ReportSettings) -> Self {
        Self {
            estimator,
            store,
            settings,
            composer: PredicateComposer,
        }
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    pub fn lookup_rank(&self, score: i32, track: &str) -> RankLookup {
        let RankEstimate {
            rank,
            track,
            fallback,
        } = self.estimator.estimate_rank(score, track);
        RankLookup {
            rank,
            score,
            track,
            year: self.settings.reference_year,
            fallback,
        }
    }

    /// Run the pipeline. Only the page fetch can fail; missing distribution
    /// data and count failures degrade to fallback values.
    pub fn generate(&self, request: &ReportRequest) -> Result<ReportPage, ReportError> {
        let track = Track::from_label(&request.track).unwrap_or_else(|| {
            warn!(track = %request.track, fallback = %Track::FALLBACK, "unrecognized track; using default");
            Track::FALLBACK
        });

        let (rank, score_fallback) = match request.standing {
            Standing::Rank(rank) => (rank, None),
            Standing::Score(score) => {
                let estimate = self.estimator.estimate_rank(score, &request.track);
                (estimate.rank, estimate.fallback)
            }
        };

        let (reference_score, rank_fallback) = self.reference_score(rank, &request.track);
        let window = self.settings.bands.band_for(reference_score, request.strategy);
        debug!(rank, reference_score, ?window, strategy = ?request.strategy, "resolved score band");

        let spec = QueryFilterSpec {
            track,
            optional_subjects: request.optional_subjects.clone(),
            locations: request.locations.clone(),
            interests: request.interests.clone(),
            major_fragment: request.major_fragment.clone(),
            window,
        };
        let predicate = self.composer.compose(&spec);

        let total_count = self.store.count(&predicate).unwrap_or_else(|err| {
            warn!(error = %err, "count query failed; reporting zero total");
            0
        });

        let rows = self
            .store
            .query(
                &predicate,
                OrderBy::MinScoreDesc,
                request.page.page_size() as usize,
                request.page.offset(),
            )
            .map_err(|err| {
                error!(error = %err, "report fetch failed");
                ReportError::Fetch(err)
            })?;

        let records: Vec<ReportRecord> = rows.into_iter().map(|row| self.record_view(row)).collect();
        info!(
            %track,
            rank,
            reference_score,
            total_count,
            returned = records.len(),
            "report generated"
        );

        Ok(ReportPage {
            page_info: PageInfo::new(request.page, total_count),
            basis: ReportBasis {
                track,
                rank,
                reference_score,
                strategy: request.strategy,
                window,
                fallback: rank_fallback.or(score_fallback),
            },
            records,
        })
    }

    /// Score equivalent of `rank`: the requested track, then the default
    /// track, then the configured fallback score.
    fn reference_score(&self, rank: u32, track: &str) -> (i32, Option<EstimateFallback>) {
        let err = match self.estimator.score_for_rank(rank, track) {
            Ok(score) => return (score, None),
            Err(err) => err,
        };
        warn!(error = %err, fallback = %Track::FALLBACK, "reference score falling back to default track");

        match self.estimator.score_for_rank(rank, Track::FALLBACK.label()) {
            Ok(score) => (score, Some(EstimateFallback::DefaultTrack)),
            Err(err) => {
                warn!(
                    error = %err,
                    score = self.settings.fallback_score,
                    "no distribution data; using fallback reference score"
                );
                (
                    self.settings.fallback_score,
                    Some(EstimateFallback::FixedDefault),
                )
            }
        }
    }

    fn record_view(&self, record: AdmissionRecord) -> ReportRecord {
        let major_rank = record
            .major_min_score
            .filter(|score| *score > 0)
            .and_then(|score| {
                self.estimator
                    .rank_for_score(score, record.track.label())
                    .ok()
            });
        let required_subjects = record
            .requirements
            .required_subjects()
            .map(Subject::label)
            .collect();

        ReportRecord {
            id: record.id,
            school_code: record.school_code,
            school_name: record.school_name,
            major_code: record.major_code,
            major_name: record.major_name,
            major_group_code: record.major_group_code,
            school_province: record.school_province,
            school_city: record.school_city,
            school_ownership: record.school_ownership,
            school_type: record.school_type,
            school_level: record.school_level,
            school_tags: record.school_tags,
            education_level: record.education_level,
            study_years: record.study_years,
            tuition_fee: record.tuition_fee,
            is_new_major: record.is_new_major,
            track: record.track.label(),
            subject_requirement: record.subject_requirement_raw,
            required_subjects,
            min_score: record.min_score,
            min_rank: record.min_rank,
            enrollment_plan: record.enrollment_plan,
            major_min_score: record.major_min_score,
            major_rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_normalizes_inputs() {
        let page = PageRequest::new(Some(0), Some(0), 100);
        assert_eq!((page.page(), page.page_size()), (1, DEFAULT_PAGE_SIZE));

        let page = PageRequest::new(Some(3), Some(500), 100);
        assert_eq!((page.page(), page.page_size()), (3, 100));
        assert_eq!(page.offset(), 200);

        let page = PageRequest::new(None, None, 100);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn total_pages_is_ceiling_and_zero_for_empty() {
        let page = PageRequest::new(Some(1), Some(10), 100);
        assert_eq!(PageInfo::new(page, 0).total_pages, 0);
        assert_eq!(PageInfo::new(page, 10).total_pages, 1);
        assert_eq!(PageInfo::new(page, 11).total_pages, 2);
    }

    #[test]
    fn failure_envelope_serializes_null_data() {
        let body = serde_json::to_value(Envelope::<()>::failure("bad")).expect("serializes");
        assert_eq!(body, serde_json::json!({"code": 1, "message": "bad", "data": null}));
    }
}
