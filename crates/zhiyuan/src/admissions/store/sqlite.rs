use super::{AdmissionStore, OrderBy, StoreError};
use crate::admissions::domain::{AdmissionRecord, Subject, SubjectRequirements, Track};
use crate::admissions::predicate::{Field, Literal, Predicate};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const TABLE: &str = "admission_lines";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS admission_lines (
    id                      INTEGER PRIMARY KEY,
    school_code             TEXT NOT NULL,
    school_name             TEXT NOT NULL,
    major_code              TEXT NOT NULL,
    major_name              TEXT NOT NULL,
    major_group_code        TEXT NOT NULL,
    school_province         TEXT NOT NULL,
    school_city             TEXT NOT NULL,
    school_ownership        TEXT NOT NULL,
    school_type             TEXT NOT NULL,
    school_authority        TEXT NOT NULL,
    school_level            TEXT NOT NULL,
    school_tags             TEXT NOT NULL,
    education_level         TEXT NOT NULL,
    major_description       TEXT NOT NULL,
    study_years             INTEGER NOT NULL,
    tuition_fee             INTEGER NOT NULL,
    is_new_major            INTEGER NOT NULL,
    track                   TEXT NOT NULL,
    require_physics         INTEGER NOT NULL,
    require_chemistry       INTEGER NOT NULL,
    require_biology         INTEGER NOT NULL,
    require_politics        INTEGER NOT NULL,
    require_history         INTEGER NOT NULL,
    require_geography       INTEGER NOT NULL,
    subject_requirement_raw TEXT NOT NULL,
    min_score               INTEGER NOT NULL,
    min_rank                INTEGER NOT NULL,
    enrollment_plan         INTEGER NOT NULL,
    major_min_score         INTEGER
);
CREATE INDEX IF NOT EXISTS admission_lines_score ON admission_lines (track, min_score);
";

const COLUMNS: &str = "id, school_code, school_name, major_code, major_name, major_group_code, \
    school_province, school_city, school_ownership, school_type, school_authority, school_level, \
    school_tags, education_level, major_description, study_years, tuition_fee, is_new_major, \
    track, require_physics, require_chemistry, require_biology, require_politics, \
    require_history, require_geography, subject_requirement_raw, min_score, min_rank, \
    enrollment_plan, major_min_score";

const POOL_SIZE: u32 = 8;

/// SQLite-backed store over a connection pool. Every predicate literal is
/// bound as a parameter.
pub struct SqliteAdmissionStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdmissionStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path).with_init(configure);
        Self::with_pool(Pool::builder().max_size(POOL_SIZE).build(manager)?)
    }

    /// Each in-memory connection is a separate database, so the pool holds a
    /// single connection that is never reaped.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(SqliteConnectionManager::memory())?;
        Self::with_pool(pool)
    }

    fn with_pool(pool: Pool<SqliteConnectionManager>) -> Result<Self, StoreError> {
        pool.get()?.execute_batch(SCHEMA)?;
        Ok(Self { pool })
    }
}

/// Pooled connections share the file in WAL mode and wait out busy locks.
fn configure(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))
}

impl AdmissionStore for SqliteAdmissionStore {
    fn count(&self, filter: &Predicate) -> Result<u64, StoreError> {
        let (where_sql, params) = where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM {TABLE} WHERE {where_sql}");
        debug!(%sql, params = params.len(), "count admission lines");

        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(&sql, params_from_iter(params), |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn query(
        &self,
        filter: &Predicate,
        order: OrderBy,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AdmissionRecord>, StoreError> {
        let (where_sql, mut params) = where_clause(filter);
        let order_sql = match order {
            OrderBy::MinScoreDesc => "min_score DESC, id ASC",
        };
        let sql = format!(
            "SELECT {COLUMNS} FROM {TABLE} WHERE {where_sql} ORDER BY {order_sql} LIMIT ? OFFSET ?"
        );
        params.push(SqlValue::from(limit as i64));
        params.push(SqlValue::from(offset as i64));
        debug!(%sql, params = params.len(), "query admission lines");

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), read_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    fn insert_batch(&self, records: Vec<AdmissionRecord>) -> Result<usize, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let placeholders = vec!["?"; 30].join(", ");
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO {TABLE} ({COLUMNS}) VALUES ({placeholders})"
            ))?;
            for record in &records {
                let id = i64::try_from(record.id)
                    .map_err(|_| StoreError::CorruptRow(format!("id {} out of range", record.id)))?;
                let flags = &record.requirements;
                stmt.execute(params![
                    id,
                    record.school_code,
                    record.school_name,
                    record.major_code,
                    record.major_name,
                    record.major_group_code,
                    record.school_province,
                    record.school_city,
                    record.school_ownership,
                    record.school_type,
                    record.school_authority,
                    record.school_level,
                    record.school_tags,
                    record.education_level,
                    record.major_description,
                    record.study_years,
                    record.tuition_fee,
                    record.is_new_major,
                    record.track.label(),
                    flags.physics,
                    flags.chemistry,
                    flags.biology,
                    flags.politics,
                    flags.history,
                    flags.geography,
                    record.subject_requirement_raw,
                    record.min_score,
                    record.min_rank,
                    record.enrollment_plan,
                    record.major_min_score,
                ])?;
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }
}

fn column(field: Field) -> &'static str {
    match field {
        Field::Track => "track",
        Field::SchoolProvince => "school_province",
        Field::MajorName => "major_name",
        Field::MinScore => "min_score",
        Field::Requires(subject) => match subject {
            Subject::Physics => "require_physics",
            Subject::Chemistry => "require_chemistry",
            Subject::Biology => "require_biology",
            Subject::Politics => "require_politics",
            Subject::History => "require_history",
            Subject::Geography => "require_geography",
        },
    }
}

fn bind(value: &Literal) -> SqlValue {
    match value {
        Literal::Text(text) => SqlValue::from(text.clone()),
        Literal::Int(value) => SqlValue::from(*value),
        Literal::Bool(flag) => SqlValue::from(i64::from(*flag)),
    }
}

/// Render a predicate as a WHERE body with positional placeholders.
pub(crate) fn where_clause(predicate: &Predicate) -> (String, Vec<SqlValue>) {
    let mut params = Vec::new();
    let sql = render(predicate, &mut params);
    (sql, params)
}

fn render(predicate: &Predicate, params: &mut Vec<SqlValue>) -> String {
    match predicate {
        Predicate::Always => "1 = 1".to_string(),
        Predicate::Eq { field, value } => {
            params.push(bind(value));
            format!("{} = ?", column(*field))
        }
        Predicate::Contains { field, needle } => {
            params.push(SqlValue::from(needle.clone()));
            format!("instr({}, ?) > 0", column(*field))
        }
        Predicate::Between { field, low, high } => {
            params.push(SqlValue::from(*low));
            params.push(SqlValue::from(*high));
            format!("{} BETWEEN ? AND ?", column(*field))
        }
        Predicate::And(children) => join(children, " AND ", "1 = 1", params),
        Predicate::Or(children) => join(children, " OR ", "0 = 1", params),
    }
}

/// An empty conjunction holds and an empty disjunction does not.
fn join(
    children: &[Predicate],
    separator: &str,
    empty: &str,
    params: &mut Vec<SqlValue>,
) -> String {
    if children.is_empty() {
        return empty.to_string();
    }
    children
        .iter()
        .map(|child| format!("({})", render(child, params)))
        .collect::<Vec<_>>()
        .join(separator)
}

struct StoredRow {
    record: AdmissionRecord,
    id: i64,
    track: String,
}

impl StoredRow {
    fn into_record(self) -> Result<AdmissionRecord, StoreError> {
        let StoredRow {
            mut record,
            id,
            track,
        } = self;
        record.id = u64::try_from(id)
            .map_err(|_| StoreError::CorruptRow(format!("negative id {id}")))?;
        record.track = Track::from_label(&track)
            .ok_or_else(|| StoreError::CorruptRow(format!("unknown track '{track}'")))?;
        Ok(record)
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<StoredRow> {
    let requirements = SubjectRequirements {
        physics: row.get(19)?,
        chemistry: row.get(20)?,
        biology: row.get(21)?,
        politics: row.get(22)?,
        history: row.get(23)?,
        geography: row.get(24)?,
    };

    let record = AdmissionRecord {
        id: 0,
        school_code: row.get(1)?,
        school_name: row.get(2)?,
        major_code: row.get(3)?,
        major_name: row.get(4)?,
        major_group_code: row.get(5)?,
        school_province: row.get(6)?,
        school_city: row.get(7)?,
        school_ownership: row.get(8)?,
        school_type: row.get(9)?,
        school_authority: row.get(10)?,
        school_level: row.get(11)?,
        school_tags: row.get(12)?,
        education_level: row.get(13)?,
        major_description: row.get(14)?,
        study_years: row.get(15)?,
        tuition_fee: row.get(16)?,
        is_new_major: row.get(17)?,
        track: Track::FALLBACK,
        requirements,
        subject_requirement_raw: row.get(25)?,
        min_score: row.get(26)?,
        min_rank: row.get(27)?,
        enrollment_plan: row.get(28)?,
        major_min_score: row.get(29)?,
    };

    Ok(StoredRow {
        record,
        id: row.get(0)?,
        track: row.get(18)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_never_appear_in_rendered_sql() {
        let predicate = Predicate::all(vec![
            Predicate::eq(
                Field::SchoolProvince,
                Literal::Text("湖北'; DROP TABLE admission_lines; --".to_string()),
            ),
            Predicate::any(vec![
                Predicate::Contains {
                    field: Field::MajorName,
                    needle: "计算机".to_string(),
                },
                Predicate::eq(Field::Requires(Subject::Biology), Literal::Bool(false)),
            ]),
            Predicate::Between {
                field: Field::MinScore,
                low: 540,
                high: 580,
            },
        ]);

        let (sql, params) = where_clause(&predicate);
        assert_eq!(
            sql,
            "(school_province = ?) AND ((instr(major_name, ?) > 0) OR (require_biology = ?)) AND (min_score BETWEEN ? AND ?)"
        );
        assert!(!sql.contains("DROP"));
        assert_eq!(params.len(), 5);
        assert_eq!(params[2], SqlValue::Integer(0));
    }

    #[test]
    fn always_renders_as_tautology() {
        let (sql, params) = where_clause(&Predicate::Always);
        assert_eq!(sql, "1 = 1");
        assert!(params.is_empty());
    }

    #[test]
    fn empty_groups_render_their_identity() {
        assert_eq!(where_clause(&Predicate::And(Vec::new())).0, "1 = 1");
        assert_eq!(where_clause(&Predicate::Or(Vec::new())).0, "0 = 1");

        let nested = Predicate::And(vec![
            Predicate::Or(Vec::new()),
            Predicate::Between {
                field: Field::MinScore,
                low: 500,
                high: 520,
            },
        ]);
        assert_eq!(where_clause(&nested).0, "(0 = 1) AND (min_score BETWEEN ? AND ?)");
    }
}
