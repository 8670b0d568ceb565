//! Admission advisory core.
//!
//! A [`ScoreRankTable`] backs the [`RankEstimator`]; the [`BandTable`] turns a
//! reference score into a window; the [`PredicateComposer`] builds the filter
//! tree that an [`AdmissionStore`] evaluates; [`ReportService`] runs the whole
//! pipeline and [`report_router`] exposes it over HTTP.

pub mod band;
pub mod domain;
pub mod estimator;
pub mod import;
pub mod predicate;
pub mod report;
pub mod router;
pub mod score_table;
pub mod store;
pub mod validation;

#[cfg(test)]
mod tests;

pub use band::{BandOffsets, BandTable, ScoreWindow, Strategy};
pub use domain::{AdmissionRecord, InterestCategory, Subject, SubjectRequirements, Track};
pub use estimator::{EstimateError, EstimateFallback, RankEstimate, RankEstimator, NEUTRAL_RANK};
pub use import::{read_admissions, read_admissions_file, ImportError};
pub use predicate::{Field, Literal, Predicate, PredicateComposer, QueryFilterSpec};
pub use report::{
    Envelope, PageInfo, PageRequest, RankLookup, ReportBasis, ReportError, ReportPage,
    ReportRecord, ReportRequest, ReportService, Standing,
};
pub use router::{report_router, RankQuery, ReportQuery};
pub use score_table::{
    read_distribution, read_distribution_file, DistributionEntry, DistributionError,
    ScoreRankPoint, ScoreRankTable,
};
pub use store::{
    AdmissionStore, InMemoryAdmissionStore, OrderBy, SqliteAdmissionStore, StoreError,
};
pub use validation::{LocationName, MajorNameFragment, ValidationError};
