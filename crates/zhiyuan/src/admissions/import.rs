//! CSV import of admission lines, used to seed a store.

use super::domain::{AdmissionRecord, Subject, SubjectRequirements, Track};
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Row { line: u64, reason: String },
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read admissions export: {}", err),
            ImportError::Csv(err) => write!(f, "invalid admissions CSV data: {}", err),
            ImportError::Row { line, reason } => {
                write!(f, "invalid admission line at row {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
            ImportError::Row { .. } => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub fn read_admissions_file(path: &Path) -> Result<Vec<AdmissionRecord>, ImportError> {
    let file = File::open(path)?;
    let records = read_admissions(file)?;
    info!(path = %path.display(), records = records.len(), "imported admission lines");
    Ok(records)
}

/// Parse admission lines from CSV with a header row.
///
/// Missing `id` values are numbered by row. An empty `track` is inferred from
/// the raw subject requirement, and when none of the `require_*` columns is
/// filled the flags are derived from that same text.
pub fn read_admissions<R: Read>(reader: R) -> Result<Vec<AdmissionRecord>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for (index, row) in csv_reader.deserialize::<AdmissionRow>().enumerate() {
        let row = row?;
        let line = index as u64 + 1;
        records.push(row.into_record(line)?);
    }

    Ok(records)
}

#[derive(Debug, Deserialize)]
struct AdmissionRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    id: Option<String>,
    school_code: String,
    school_name: String,
    #[serde(default)]
    major_code: String,
    major_name: String,
    #[serde(default)]
    major_group_code: String,
    school_province: String,
    #[serde(default)]
    school_city: String,
    #[serde(default)]
    school_ownership: String,
    #[serde(default)]
    school_type: String,
    #[serde(default)]
    school_authority: String,
    #[serde(default)]
    school_level: String,
    #[serde(default)]
    school_tags: String,
    #[serde(default)]
    education_level: String,
    #[serde(default)]
    major_description: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    study_years: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    tuition_fee: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    is_new_major: Option<bool>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    track: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    require_physics: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    require_chemistry: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    require_biology: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    require_politics: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    require_history: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    require_geography: Option<bool>,
    #[serde(default)]
    subject_requirement: String,
    min_score: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    min_rank: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    enrollment_plan: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    major_min_score: Option<String>,
}

impl AdmissionRow {
    fn into_record(self, line: u64) -> Result<AdmissionRecord, ImportError> {
        let track = match self.track.as_deref() {
            Some(label) => Track::from_label(label).ok_or_else(|| ImportError::Row {
                line,
                reason: format!("unknown track '{label}'"),
            })?,
            None => Track::infer_from_requirement(&self.subject_requirement),
        };

        let explicit = [
            (Subject::Physics, self.require_physics),
            (Subject::Chemistry, self.require_chemistry),
            (Subject::Biology, self.require_biology),
            (Subject::Politics, self.require_politics),
            (Subject::History, self.require_history),
            (Subject::Geography, self.require_geography),
        ];
        let requirements = if explicit.iter().any(|(_, flag)| flag.is_some()) {
            let mut requirements = SubjectRequirements::default();
            for (subject, flag) in explicit {
                requirements.set(subject, flag.unwrap_or(false));
            }
            requirements
        } else {
            requirements_from_text(&self.subject_requirement)
        };

        let id = match self.id.as_deref() {
            Some(raw) => number(line, "id", raw)?,
            None => line,
        };
        let major_min_score = match self.major_min_score.as_deref() {
            Some(raw) => Some(score(line, "major_min_score", raw)?),
            None => None,
        };

        Ok(AdmissionRecord {
            id,
            school_code: self.school_code,
            school_name: self.school_name,
            major_code: self.major_code,
            major_name: self.major_name,
            major_group_code: self.major_group_code,
            school_province: self.school_province,
            school_city: self.school_city,
            school_ownership: self.school_ownership,
            school_type: self.school_type,
            school_authority: self.school_authority,
            school_level: self.school_level,
            school_tags: self.school_tags,
            education_level: self.education_level,
            major_description: self.major_description,
            study_years: optional_number(line, "study_years", self.study_years.as_deref())?,
            tuition_fee: optional_number(line, "tuition_fee", self.tuition_fee.as_deref())?,
            is_new_major: self.is_new_major.unwrap_or(false),
            track,
            requirements,
            subject_requirement_raw: self.subject_requirement,
            min_score: score(line, "min_score", &self.min_score)?,
            min_rank: optional_number(line, "min_rank", self.min_rank.as_deref())?,
            enrollment_plan: optional_number(
                line,
                "enrollment_plan",
                self.enrollment_plan.as_deref(),
            )?,
            major_min_score,
        })
    }
}

/// Flags named in a requirement such as "物理+化学" or "化/生(2科必选)".
pub fn requirements_from_text(raw: &str) -> SubjectRequirements {
    let mut requirements = SubjectRequirements::default();
    if raw.contains("不限") {
        return requirements;
    }

    // Full labels first, then single-character forms in what is left, so the
    // 物 of 生物 is not read as physics.
    let mut rest = raw.to_string();
    for subject in Subject::ALL {
        if rest.contains(subject.label()) {
            requirements.set(subject, true);
            rest = rest.replace(subject.label(), "+");
        }
    }
    for subject in Subject::ALL {
        let abbreviation = match subject {
            Subject::Physics => '物',
            Subject::Chemistry => '化',
            Subject::Biology => '生',
            Subject::Politics => '政',
            Subject::History => '史',
            Subject::Geography => '地',
        };
        if rest.contains(abbreviation) {
            requirements.set(subject, true);
        }
    }
    requirements
}

// Scores are sometimes exported as "563.0".
fn score(line: u64, column: &str, raw: &str) -> Result<i32, ImportError> {
    let trimmed = raw.trim();
    trimmed
        .parse::<i32>()
        .ok()
        .or_else(|| {
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(|value| value.round() as i32)
        })
        .ok_or_else(|| ImportError::Row {
            line,
            reason: format!("{column} is not a score: '{raw}'"),
        })
}

fn number<T: std::str::FromStr>(line: u64, column: &str, raw: &str) -> Result<T, ImportError> {
    raw.trim().parse::<T>().map_err(|_| ImportError::Row {
        line,
        reason: format!("{column} is not a number: '{raw}'"),
    })
}

fn optional_number<T>(line: u64, column: &str, raw: Option<&str>) -> Result<T, ImportError>
where
    T: std::str::FromStr + Default,
{
    match raw {
        Some(raw) => number(line, column, raw),
        None => Ok(T::default()),
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = empty_string_as_none(deserializer)? else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "是" => Ok(Some(true)),
        "0" | "false" | "no" | "n" | "否" => Ok(Some(false)),
        other => {
            warn!(value = other, "unrecognized flag value treated as false");
            Ok(Some(false))
        }
    }
}
