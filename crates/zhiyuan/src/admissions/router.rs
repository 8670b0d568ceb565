use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::warn;

use super::band::Strategy;
use super::domain::{InterestCategory, Subject};
use super::report::{
    Envelope, PageRequest, RankLookup, ReportPage, ReportRequest, ReportService, Standing,
};
use super::store::AdmissionStore;
use super::validation::{
    parse_list, parse_number, LocationName, MajorNameFragment, ValidationError,
};
use crate::error::AppError;

/// Router exposing the report and rank lookup endpoints.
pub fn report_router<S>(service: Arc<ReportService<S>>) -> Router
where
    S: AdmissionStore + 'static,
{
    Router::new()
        .route("/api/report/get", get(report_handler::<S>))
        .route("/api/rank/get", get(rank_handler::<S>))
        .with_state(service)
}

/// Raw report query string. Accepts the legacy misspelled parameter names.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ReportQuery {
    pub rank: Option<String>,
    pub score: Option<String>,
    #[serde(alias = "class_first_choise")]
    pub class_first_choice: Option<String>,
    #[serde(alias = "class_optional_choise")]
    pub class_optional_choice: Option<String>,
    pub college_location: Option<String>,
    pub interest: Option<String>,
    pub strategy: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    #[serde(alias = "fuzzy_subject_category")]
    pub major_keyword: Option<String>,
}

impl ReportQuery {
    /// Turn raw parameters into a [`ReportRequest`]. Runs before any store access.
    pub fn validate(self, max_page_size: u32) -> Result<ReportRequest, ValidationError> {
        let standing = match (non_blank(&self.rank), non_blank(&self.score)) {
            (Some(rank), _) => Standing::Rank(parse_number("rank", rank)?),
            (None, Some(score)) => Standing::Score(parse_score(score)?),
            (None, None) => return Err(ValidationError::Missing("rank")),
        };

        let optional_subjects = parse_list("class_optional_choice", self.class_optional_choice.as_deref())?
            .into_iter()
            .map(|label| Subject::from_label(&label).ok_or(ValidationError::UnknownSubject(label)))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let locations = parse_list("college_location", self.college_location.as_deref())?
            .iter()
            .map(|raw| LocationName::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;

        let interests = parse_list("interest", self.interest.as_deref())?
            .into_iter()
            .filter_map(|label| {
                let category = InterestCategory::from_label(&label);
                if category.is_none() {
                    warn!(interest = %label, "ignoring unknown interest category");
                }
                category
            })
            .collect();

        let major_fragment = non_blank(&self.major_keyword)
            .map(MajorNameFragment::parse)
            .transpose()?;

        let page = non_blank(&self.page)
            .map(|raw| parse_number::<i64>("page", raw))
            .transpose()?;
        let page_size = non_blank(&self.page_size)
            .map(|raw| parse_number::<i64>("page_size", raw))
            .transpose()?;

        Ok(ReportRequest {
            standing,
            track: self.class_first_choice.unwrap_or_default().trim().to_string(),
            optional_subjects,
            locations,
            interests,
            major_fragment,
            strategy: non_blank(&self.strategy)
                .map(Strategy::from_selector)
                .unwrap_or_default(),
            page: PageRequest::new(page, page_size, max_page_size),
        })
    }
}

/// Raw rank lookup query string.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RankQuery {
    pub score: Option<String>,
    #[serde(alias = "track")]
    pub subject_category: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

/// Scores may carry a fractional part (`555.5`); it is floored.
fn parse_score(raw: &str) -> Result<i32, ValidationError> {
    let invalid = || ValidationError::InvalidScore(raw.to_string());
    let score = raw.trim().parse::<f64>().map_err(|_| invalid())?;
    if !score.is_finite() || score < 0.0 || score > f64::from(u16::MAX) {
        return Err(invalid());
    }
    Ok(score.floor() as i32)
}

fn malformed(rejection: QueryRejection) -> ValidationError {
    ValidationError::MalformedQuery(rejection.body_text())
}

pub(crate) async fn report_handler<S>(
    State(service): State<Arc<ReportService<S>>>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<Json<Envelope<ReportPage>>, AppError>
where
    S: AdmissionStore + 'static,
{
    let Query(query) = query.map_err(malformed)?;
    let request = query.validate(service.settings().max_page_size)?;
    let page = tokio::task::spawn_blocking(move || service.generate(&request)).await??;
    Ok(Json(Envelope::ok(page)))
}

pub(crate) async fn rank_handler<S>(
    State(service): State<Arc<ReportService<S>>>,
    query: Result<Query<RankQuery>, QueryRejection>,
) -> Result<Json<Envelope<RankLookup>>, AppError>
where
    S: AdmissionStore + 'static,
{
    let Query(query) = query.map_err(malformed)?;
    let score = non_blank(&query.score)
        .ok_or(ValidationError::Missing("score"))
        .and_then(parse_score)?;
    let track = non_blank(&query.subject_category).unwrap_or_default();
    Ok(Json(Envelope::ok(service.lookup_rank(score, track))))
}
