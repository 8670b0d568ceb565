//! Allow-list validation for user-authored text that ends up inside filters.
//!
//! [`MajorNameFragment`] and [`LocationName`] can only be built through these
//! checks, so nothing unvalidated reaches the predicate composer.

use serde::Serialize;
use std::fmt;

pub const MAX_TEXT_CHARS: usize = 50;

const SQL_KEYWORDS: &[&str] = &[
    "select", "insert", "update", "delete", "drop", "union", "alter", "create", "exec",
    "truncate",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required parameter: {0}")]
    Missing(&'static str),
    #[error("parameter {field} must be a non-negative integer, got '{value}'")]
    InvalidNumber { field: &'static str, value: String },
    #[error("parameter score must be a non-negative number, got '{0}'")]
    InvalidScore(String),
    #[error("parameter {field} is empty")]
    Empty { field: &'static str },
    #[error("parameter {field} must not exceed 50 characters")]
    TooLong { field: &'static str },
    #[error("parameter {field} contains illegal character '{found}'")]
    IllegalCharacter { field: &'static str, found: char },
    #[error("parameter {field} contains forbidden token '{token}'")]
    ForbiddenToken { field: &'static str, token: String },
    #[error("unknown subject '{0}'")]
    UnknownSubject(String),
    #[error("parameter {field} is not a JSON array or comma separated list")]
    MalformedList { field: &'static str },
    #[error("malformed query string: {0}")]
    MalformedQuery(String),
}

/// Substring of a major name, validated against the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MajorNameFragment(String);

impl MajorNameFragment {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        check_text("major_keyword", raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MajorNameFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Province or region name used in location filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationName(String);

impl LocationName {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        check_text("college_location", raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn check_text(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if trimmed.chars().count() > MAX_TEXT_CHARS {
        return Err(ValidationError::TooLong { field });
    }
    if let Some(found) = trimmed.chars().find(|c| !is_allowed(*c)) {
        return Err(ValidationError::IllegalCharacter { field, found });
    }
    if trimmed.contains("--") {
        return Err(ValidationError::ForbiddenToken {
            field,
            token: "--".to_string(),
        });
    }

    let lowered = trimmed.to_ascii_lowercase();
    let keyword = lowered
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .find(|word| SQL_KEYWORDS.contains(word));
    if let Some(keyword) = keyword {
        return Err(ValidationError::ForbiddenToken {
            field,
            token: keyword.to_string(),
        });
    }

    Ok(trimmed.to_string())
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_whitespace()
        || matches!(c, '-' | '_' | '(' | ')' | '（' | '）')
        || is_han(c)
}

fn is_han(c: char) -> bool {
    matches!(
        c as u32,
        0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xF900..=0xFAFF
            | 0x20000..=0x2A6DF
            | 0x2A700..=0x2EBEF
            | 0x30000..=0x3134F
    )
}

/// Parse a non-negative integer parameter.
pub fn parse_number<T: std::str::FromStr>(
    field: &'static str,
    raw: &str,
) -> Result<T, ValidationError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ValidationError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}

/// Accept `["a","b"]` or `a,b`; blank input is an empty list.
pub fn parse_list(field: &'static str, raw: Option<&str>) -> Result<Vec<String>, ValidationError> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(Vec::new());
    };

    if raw.starts_with('[') {
        let values: Vec<String> =
            serde_json::from_str(raw).map_err(|_| ValidationError::MalformedList { field })?;
        return Ok(values
            .into_iter()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect());
    }

    Ok(raw
        .split([',', '，'])
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect())
}
