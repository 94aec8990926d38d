//! Job record, lifecycle states and the projections exposed to requesters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::request::WorksheetRequest;

/// Lifecycle state of a generation job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Done,
    Error,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "in_progress" => Some(JobStatus::InProgress),
            "done" => Some(JobStatus::Done),
            "error" => Some(JobStatus::Error),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Done | JobStatus::Error | JobStatus::Cancelled
        )
    }

    /// Whether a cancellation request may still change this job.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::InProgress)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data needed to create a job in the `pending` state.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: String,
    pub owner: Option<String>,
    pub request: WorksheetRequest,
    pub created_at: DateTime<Utc>,
}

impl NewJob {
    pub fn new(request: WorksheetRequest, owner: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner,
            request,
            created_at: Utc::now(),
        }
    }
}

/// One persisted job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: String,
    pub owner: Option<String>,
    pub request: WorksheetRequest,
    pub status: JobStatus,
    pub progress_step: Option<String>,
    pub progress_percent: u8,
    pub document_locator: Option<String>,
    pub interactive_locator: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A guarded state change applied by the store in one atomic write.
///
/// Each transition only applies when the record is in one of
/// [`JobTransition::allowed_from`]; otherwise the store reports it as not
/// applied and leaves the row untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobTransition {
    /// `pending` -> `in_progress` with the initial progress values.
    Start { step: String, percent: u8 },
    /// Progress inside `in_progress`. Percent never decreases.
    Progress { step: String, percent: u8 },
    /// `in_progress` -> `done` with both locators.
    Complete {
        document_locator: String,
        interactive_locator: String,
    },
    /// `pending` | `in_progress` -> `error` with a message.
    Fail { message: String },
    /// `pending` | `in_progress` -> `cancelled`.
    Cancel,
}

impl JobTransition {
    pub fn allowed_from(&self) -> &'static [JobStatus] {
        match self {
            JobTransition::Start { .. } => &[JobStatus::Pending],
            JobTransition::Progress { .. } | JobTransition::Complete { .. } => {
                &[JobStatus::InProgress]
            }
            JobTransition::Fail { .. } | JobTransition::Cancel => {
                &[JobStatus::Pending, JobStatus::InProgress]
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobTransition::Start { .. } => "start",
            JobTransition::Progress { .. } => "progress",
            JobTransition::Complete { .. } => "complete",
            JobTransition::Fail { .. } => "fail",
            JobTransition::Cancel => "cancel",
        }
    }
}

/// External JSON projection of a job's status.
///
/// Locators appear only for `done` jobs and the error message only for
/// `error` jobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStatusView {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_step: Option<String>,
    pub progress_percent: u8,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_locator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactive_locator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&JobRecord> for JobStatusView {
    fn from(record: &JobRecord) -> Self {
        let done = record.status == JobStatus::Done;
        let failed = record.status == JobStatus::Error;
        Self {
            status: record.status,
            progress_step: record.progress_step.clone(),
            progress_percent: record.progress_percent,
            created_at: record.created_at,
            document_locator: record.document_locator.clone().filter(|_| done),
            interactive_locator: record.interactive_locator.clone().filter(|_| done),
            error_message: record.error_message.clone().filter(|_| failed),
        }
    }
}

/// Entry of an owner's job listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub status: JobStatus,
    pub topic: String,
    pub grade_level: String,
    pub document_locator: Option<String>,
    pub interactive_locator: Option<String>,
}

impl From<&JobRecord> for JobSummary {
    fn from(record: &JobRecord) -> Self {
        let done = record.status == JobStatus::Done;
        Self {
            id: record.id.clone(),
            created_at: record.created_at,
            status: record.status,
            topic: record.request.topic.clone(),
            grade_level: record.request.grade_level.clone(),
            document_locator: record.document_locator.clone().filter(|_| done),
            interactive_locator: record.interactive_locator.clone().filter(|_| done),
        }
    }
}
