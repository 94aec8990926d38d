//! Job repository: CRUD and guarded transitions for the `worksheet_jobs` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};
use crate::model::JobTransition;

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub owner: Option<String>,
    pub request_json: String,
    pub status: String,
    pub progress_step: Option<String>,
    pub progress_percent: u8,
    pub document_locator: Option<String>,
    pub interactive_locator: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            owner: row.get("owner")?,
            request_json: row.get("request_json")?,
            status: row.get("status")?,
            progress_step: row.get("progress_step")?,
            progress_percent: row.get("progress_percent")?,
            document_locator: row.get("document_locator")?,
            interactive_locator: row.get("interactive_locator")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO worksheet_jobs (id, owner, request_json, status, progress_step,
             progress_percent, document_locator, interactive_locator, error_message,
             created_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                job.id,
                job.owner,
                job.request_json,
                job.status,
                job.progress_step,
                job.progress_percent,
                job.document_locator,
                job.interactive_locator,
                job.error_message,
                job.created_at,
                job.updated_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM worksheet_jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists jobs newest first, optionally restricted to one owner.
pub fn list(
    db: &Database,
    owner: Option<&str>,
    limit: u64,
) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let limit = limit as i64;
        let rows = match owner {
            Some(owner) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM worksheet_jobs WHERE owner = ?1
                     ORDER BY created_at DESC LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(params![owner, limit], JobRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn
                    .prepare("SELECT * FROM worksheet_jobs ORDER BY created_at DESC LIMIT ?1")?;
                let rows = stmt
                    .query_map(params![limit], JobRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(rows)
    })
}

/// Builds `status IN ('a', 'b')` from a transition's allowed source states.
fn status_guard(transition: &JobTransition) -> String {
    let states: Vec<String> = transition
        .allowed_from()
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect();
    format!("status IN ({})", states.join(", "))
}

/// Applies a transition in a single UPDATE guarded on the current status.
///
/// Returns `true` when the row changed, `false` when the row is missing or
/// not in a state the transition may leave.
pub fn apply_transition(
    db: &Database,
    id: &str,
    transition: &JobTransition,
    now: &str,
) -> Result<bool, DatabaseError> {
    let guard = status_guard(transition);
    db.with_conn(|conn| {
        let changed = match transition {
            JobTransition::Start { step, percent } => conn.execute(
                &format!(
                    "UPDATE worksheet_jobs SET status = 'in_progress', progress_step = ?2,
                     progress_percent = ?3, updated_at = ?4 WHERE id = ?1 AND {}",
                    guard
                ),
                params![id, step, percent, now],
            )?,
            JobTransition::Progress { step, percent } => conn.execute(
                &format!(
                    "UPDATE worksheet_jobs SET progress_step = ?2,
                     progress_percent = MAX(progress_percent, ?3), updated_at = ?4
                     WHERE id = ?1 AND {}",
                    guard
                ),
                params![id, step, percent, now],
            )?,
            JobTransition::Complete {
                document_locator,
                interactive_locator,
            } => conn.execute(
                &format!(
                    "UPDATE worksheet_jobs SET status = 'done', progress_percent = 100,
                     document_locator = ?2, interactive_locator = ?3, updated_at = ?4,
                     completed_at = ?4 WHERE id = ?1 AND {}",
                    guard
                ),
                params![id, document_locator, interactive_locator, now],
            )?,
            JobTransition::Fail { message } => conn.execute(
                &format!(
                    "UPDATE worksheet_jobs SET status = 'error', error_message = ?2,
                     updated_at = ?3, completed_at = ?3 WHERE id = ?1 AND {}",
                    guard
                ),
                params![id, message, now],
            )?,
            JobTransition::Cancel => conn.execute(
                &format!(
                    "UPDATE worksheet_jobs SET status = 'cancelled', updated_at = ?2,
                     completed_at = ?2 WHERE id = ?1 AND {}",
                    guard
                ),
                params![id, now],
            )?,
        };
        Ok(changed > 0)
    })
}
