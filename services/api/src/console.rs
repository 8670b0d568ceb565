use crate::infra::{load_estimator, seed_store, ConfiguredStore};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use zhiyuan::admissions::{
    InMemoryAdmissionStore, RankLookup, ReportPage, ReportQuery, ReportService,
};
use zhiyuan::config::AppConfig;
use zhiyuan::error::AppError;

#[derive(Args, Debug)]
pub(crate) struct RankArgs {
    /// Examination score to convert
    #[arg(long)]
    pub(crate) score: u16,
    /// Subject track: 物理 / 历史 (physics / history)
    #[arg(long, default_value = "物理")]
    pub(crate) track: String,
    /// Print the JSON payload instead of a summary line
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ReportArgs {
    /// Target provincial rank (takes precedence over --score)
    #[arg(long)]
    pub(crate) rank: Option<u32>,
    /// Examination score, converted to a rank first
    #[arg(long)]
    pub(crate) score: Option<u16>,
    /// First-choice subject track
    #[arg(long, default_value = "物理")]
    pub(crate) track: String,
    /// Optional subjects, comma separated (e.g. 化学,生物)
    #[arg(long)]
    pub(crate) optional: Option<String>,
    /// School provinces to keep, comma separated
    #[arg(long)]
    pub(crate) location: Option<String>,
    /// Interest categories, comma separated (e.g. 理科,工科)
    #[arg(long)]
    pub(crate) interest: Option<String>,
    /// Major name fragment
    #[arg(long)]
    pub(crate) keyword: Option<String>,
    /// 0 blended, 1 reach, 2 match, 3 safe
    #[arg(long)]
    pub(crate) strategy: Option<String>,
    #[arg(long)]
    pub(crate) page: Option<u32>,
    #[arg(long)]
    pub(crate) page_size: Option<u32>,
    /// CSV export with the admission lines to search
    #[arg(long)]
    pub(crate) admissions_csv: Option<PathBuf>,
    /// Print the JSON payload instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

impl ReportArgs {
    fn to_query(&self) -> ReportQuery {
        ReportQuery {
            rank: self.rank.map(|rank| rank.to_string()),
            score: self.score.map(|score| score.to_string()),
            class_first_choice: Some(self.track.clone()),
            class_optional_choice: self.optional.clone(),
            college_location: self.location.clone(),
            interest: self.interest.clone(),
            strategy: self.strategy.clone(),
            page: self.page.map(|page| page.to_string()),
            page_size: self.page_size.map(|size| size.to_string()),
            major_keyword: self.keyword.clone(),
        }
    }
}

pub(crate) fn run_rank(args: RankArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = ReportService::new(
        Arc::new(load_estimator(&config.data)),
        Arc::new(InMemoryAdmissionStore::default()),
        config.report.clone(),
    );

    let lookup = service.lookup_rank(i32::from(args.score), &args.track);
    if args.json {
        print_json(&lookup);
    } else {
        render_rank(&lookup);
    }
    Ok(())
}

pub(crate) fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(csv) = args.admissions_csv.clone() {
        config.data.admissions_csv = Some(csv);
    }

    let request = args.to_query().validate(config.report.max_page_size)?;

    let store = Arc::new(ConfiguredStore::open(&config.data)?);
    if let Some(csv) = &config.data.admissions_csv {
        seed_store(store.as_ref(), csv)?;
    }
    let service = ReportService::new(
        Arc::new(load_estimator(&config.data)),
        store,
        config.report.clone(),
    );

    let page = service.generate(&request)?;
    if args.json {
        print_json(&page);
    } else {
        render_report(&page);
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(err) => println!("JSON payload unavailable: {}", err),
    }
}

pub(crate) fn render_rank(lookup: &RankLookup) {
    println!(
        "{} score {} -> rank {} ({})",
        lookup.track, lookup.score, lookup.rank, lookup.year
    );
    if let Some(fallback) = lookup.fallback {
        println!("  estimate used fallback: {:?}", fallback);
    }
}

pub(crate) fn render_report(page: &ReportPage) {
    let basis = &page.basis;
    println!("Admission report");
    println!(
        "Track {} | rank {} -> reference score {} | {:?} window {}-{}",
        basis.track,
        basis.rank,
        basis.reference_score,
        basis.strategy,
        basis.window.lower_score,
        basis.window.upper_score
    );
    if let Some(fallback) = basis.fallback {
        println!("  reference score used fallback: {:?}", fallback);
    }
    println!(
        "Page {}/{} ({} per page, {} matching lines)",
        page.page_info.page,
        page.page_info.total_pages,
        page.page_info.page_size,
        page.page_info.total_count
    );

    if page.records.is_empty() {
        println!("  no admission lines in this band");
        return;
    }

    for record in &page.records {
        let requirement = if record.required_subjects.is_empty() {
            "不限".to_string()
        } else {
            record.required_subjects.join("+")
        };
        let major_rank = record
            .major_rank
            .map(|rank| format!(" | major rank {}", rank))
            .unwrap_or_default();
        println!(
            "  - {} {} [{}] {} | min {} (rank {}) | {}{}",
            record.school_code,
            record.school_name,
            record.school_province,
            record.major_name,
            record.min_score,
            record.min_rank,
            requirement,
            major_rank
        );
    }
}
