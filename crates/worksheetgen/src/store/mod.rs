//! Job Record Store: the single shared resource between job runs.

use chrono::{DateTime, Utc};

use crate::db::job_repo::{self, JobRow};
use crate::db::{Database, DatabaseError};
use crate::model::{JobRecord, JobStatus, JobTransition, NewJob, WorksheetRequest};

/// Default number of rows returned by [`JobRecordStore::list`].
pub const DEFAULT_LIST_LIMIT: u64 = 100;

/// Persistent storage for job records.
///
/// Every call is atomic on its own. [`JobRecordStore::apply`] only changes
/// the record when it is in one of the transition's allowed states and
/// reports whether it did.
pub trait JobRecordStore: Send + Sync {
    /// Creates the record in `pending`.
    fn insert(&self, job: &NewJob) -> Result<(), DatabaseError>;

    fn get(&self, id: &str) -> Result<Option<JobRecord>, DatabaseError>;

    /// Applies a guarded transition. Returns `false` when not applied.
    fn apply(&self, id: &str, transition: &JobTransition) -> Result<bool, DatabaseError>;

    /// Jobs newest first, optionally restricted to one owner.
    fn list(&self, owner: Option<&str>) -> Result<Vec<JobRecord>, DatabaseError>;
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_timestamp(s: &str, job_id: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::CorruptRow {
            id: job_id.to_string(),
            reason: format!("invalid timestamp '{}': {}", s, e),
        })
}

impl TryFrom<JobRow> for JobRecord {
    type Error = DatabaseError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = JobStatus::parse(&row.status).ok_or_else(|| DatabaseError::CorruptRow {
            id: row.id.clone(),
            reason: format!("unknown status '{}'", row.status),
        })?;
        let request: WorksheetRequest =
            serde_json::from_str(&row.request_json).map_err(|e| DatabaseError::CorruptRow {
                id: row.id.clone(),
                reason: format!("invalid request payload: {}", e),
            })?;
        let created_at = parse_timestamp(&row.created_at, &row.id)?;
        let updated_at = parse_timestamp(&row.updated_at, &row.id)?;
        let completed_at = row
            .completed_at
            .as_deref()
            .map(|s| parse_timestamp(s, &row.id))
            .transpose()?;

        Ok(JobRecord {
            id: row.id,
            owner: row.owner,
            request,
            status,
            progress_step: row.progress_step,
            progress_percent: row.progress_percent.min(100),
            document_locator: row.document_locator,
            interactive_locator: row.interactive_locator,
            error_message: row.error_message,
            created_at,
            updated_at,
            completed_at,
        })
    }
}

/// [`JobRecordStore`] backed by the SQLite `worksheet_jobs` table.
#[derive(Clone)]
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl JobRecordStore for SqliteJobStore {
    fn insert(&self, job: &NewJob) -> Result<(), DatabaseError> {
        let request_json =
            serde_json::to_string(&job.request).map_err(|e| DatabaseError::CorruptRow {
                id: job.id.clone(),
                reason: format!("cannot serialize request: {}", e),
            })?;
        let created_at = format_timestamp(job.created_at);
        let row = JobRow {
            id: job.id.clone(),
            owner: job.owner.clone(),
            request_json,
            status: JobStatus::Pending.as_str().to_string(),
            progress_step: None,
            progress_percent: 0,
            document_locator: None,
            interactive_locator: None,
            error_message: None,
            created_at: created_at.clone(),
            updated_at: created_at,
            completed_at: None,
        };
        job_repo::insert(&self.db, &row)?;
        log::debug!("Created job {}", job.id);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<JobRecord>, DatabaseError> {
        job_repo::find_by_id(&self.db, id)?
            .map(JobRecord::try_from)
            .transpose()
    }

    fn apply(&self, id: &str, transition: &JobTransition) -> Result<bool, DatabaseError> {
        let now = format_timestamp(Utc::now());
        let applied = job_repo::apply_transition(&self.db, id, transition, &now)?;
        if !applied {
            log::debug!(
                "Transition '{}' not applied to job {}",
                transition.name(),
                id
            );
        }
        Ok(applied)
    }

    fn list(&self, owner: Option<&str>) -> Result<Vec<JobRecord>, DatabaseError> {
        let rows = job_repo::list(&self.db, owner, DEFAULT_LIST_LIMIT)?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match JobRecord::try_from(row) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("Skipping unreadable job {}: {}", id, e),
            }
        }
        Ok(records)
    }
}
