use super::band::ScoreWindow;
use super::domain::{AdmissionRecord, InterestCategory, Subject, Track};
use super::validation::{LocationName, MajorNameFragment};
use serde::Serialize;
use std::collections::BTreeSet;

/// Admission record attribute a predicate can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Track,
    SchoolProvince,
    MajorName,
    MinScore,
    Requires(Subject),
}

/// Opaque literal bound at execution time, never spliced into query text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Text(String),
    Int(i64),
    Bool(bool),
}

/// Condition tree consumed by an [`AdmissionStore`](super::store::AdmissionStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Always,
    Eq { field: Field, value: Literal },
    Contains { field: Field, needle: String },
    Between { field: Field, low: i64, high: i64 },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(field: Field, value: Literal) -> Self {
        Predicate::Eq { field, value }
    }

    /// Conjunction that drops `Always` members and flattens a single child.
    pub fn all(predicates: Vec<Predicate>) -> Self {
        let mut predicates: Vec<_> = predicates
            .into_iter()
            .filter(|predicate| *predicate != Predicate::Always)
            .collect();
        match predicates.len() {
            0 => Predicate::Always,
            1 => predicates.remove(0),
            _ => Predicate::And(predicates),
        }
    }

    /// Disjunction; an empty list means "no constraint".
    pub fn any(mut predicates: Vec<Predicate>) -> Self {
        match predicates.len() {
            0 => Predicate::Always,
            1 => predicates.remove(0),
            _ => Predicate::Or(predicates),
        }
    }

    /// In-process evaluation used by the memory store and by tests.
    pub fn matches(&self, record: &AdmissionRecord) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Eq { field, value } => field_value(record, *field) == *value,
            Predicate::Contains { field, needle } => match field_value(record, *field) {
                Literal::Text(text) => text.contains(needle.as_str()),
                _ => false,
            },
            Predicate::Between { field, low, high } => match field_value(record, *field) {
                Literal::Int(value) => *low <= value && value <= *high,
                _ => false,
            },
            Predicate::And(children) => children.iter().all(|child| child.matches(record)),
            Predicate::Or(children) => children.iter().any(|child| child.matches(record)),
        }
    }
}

fn field_value(record: &AdmissionRecord, field: Field) -> Literal {
    match field {
        Field::Track => Literal::Text(record.track.label().to_string()),
        Field::SchoolProvince => Literal::Text(record.school_province.clone()),
        Field::MajorName => Literal::Text(record.major_name.clone()),
        Field::MinScore => Literal::Int(i64::from(record.min_score)),
        Field::Requires(subject) => Literal::Bool(record.requirements.requires(subject)),
    }
}

/// Request-scoped filter, built once and consumed by the fetch step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilterSpec {
    pub track: Track,
    pub optional_subjects: BTreeSet<Subject>,
    pub locations: Vec<LocationName>,
    pub interests: BTreeSet<InterestCategory>,
    pub major_fragment: Option<MajorNameFragment>,
    pub window: ScoreWindow,
}

/// Translates selection semantics into a [`Predicate`] tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredicateComposer;

impl PredicateComposer {
    pub fn compose(&self, spec: &QueryFilterSpec) -> Predicate {
        let mut clauses = vec![self.subject_predicate(spec.track, &spec.optional_subjects)];
        clauses.push(self.location_predicate(&spec.locations));
        clauses.push(self.interest_predicate(&spec.interests));
        if let Some(fragment) = &spec.major_fragment {
            clauses.push(self.major_name_predicate(fragment));
        }
        clauses.push(self.score_predicate(spec.window));
        Predicate::all(clauses)
    }

    /// Track equality, plus "does not require" for every subject the student
    /// does not take. Subjects the student takes impose nothing.
    pub fn subject_predicate(&self, track: Track, optional: &BTreeSet<Subject>) -> Predicate {
        let mut clauses = vec![Predicate::eq(
            Field::Track,
            Literal::Text(track.label().to_string()),
        )];
        clauses.extend(
            Subject::ALL
                .into_iter()
                .filter(|subject| *subject != track.subject() && !optional.contains(subject))
                .map(|subject| Predicate::eq(Field::Requires(subject), Literal::Bool(false))),
        );
        Predicate::all(clauses)
    }

    pub fn location_predicate(&self, locations: &[LocationName]) -> Predicate {
        Predicate::any(
            locations
                .iter()
                .map(|location| {
                    Predicate::eq(
                        Field::SchoolProvince,
                        Literal::Text(location.as_str().to_string()),
                    )
                })
                .collect(),
        )
    }

    pub fn interest_predicate(&self, interests: &BTreeSet<InterestCategory>) -> Predicate {
        Predicate::any(
            interests
                .iter()
                .map(|category| {
                    Predicate::any(
                        category
                            .keywords()
                            .iter()
                            .map(|keyword| Predicate::Contains {
                                field: Field::MajorName,
                                needle: (*keyword).to_string(),
                            })
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    pub fn major_name_predicate(&self, fragment: &MajorNameFragment) -> Predicate {
        Predicate::Contains {
            field: Field::MajorName,
            needle: fragment.as_str().to_string(),
        }
    }

    pub fn score_predicate(&self, window: ScoreWindow) -> Predicate {
        Predicate::Between {
            field: Field::MinScore,
            low: i64::from(window.lower_score),
            high: i64::from(window.upper_score),
        }
    }
}
