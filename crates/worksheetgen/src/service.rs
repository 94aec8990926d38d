//! Submission and status surface over the job store and the scheduler.
//!
//! Status, cancellation and listing only need a [`JobRecordStore`], so they
//! are also available as free functions for callers that never run jobs.

use std::sync::Arc;

use log::{error, info};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::broadcast::{JobProgressBroadcaster, JobProgressEvent};
use crate::config::Config;
use crate::db::Database;
use crate::error::{JobError, WorksheetError};
use crate::model::{
    JobRecord, JobStatus, JobStatusView, JobSummary, JobTransition, NewJob, WorksheetRequest,
};
use crate::pipeline::{Orchestrator, RunOutcome};
use crate::store::{JobRecordStore, SqliteJobStore};
use crate::worker::JobScheduler;

/// Answer to a cancellation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CancelResponse {
    pub success: bool,
    pub message: String,
}

impl CancelResponse {
    fn accepted(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }

    fn rejected(job_id: &str, status: JobStatus) -> Self {
        let conflict = JobError::StateConflict {
            job_id: job_id.to_string(),
            status: status.to_string(),
        };
        Self {
            success: false,
            message: conflict.to_string(),
        }
    }
}

pub fn get_job(jobs: &dyn JobRecordStore, job_id: &str) -> Result<JobRecord, JobError> {
    jobs.get(job_id)?
        .ok_or_else(|| JobError::NotFound(job_id.to_string()))
}

/// Current status projection of a job, read verbatim from the record.
pub fn job_status(jobs: &dyn JobRecordStore, job_id: &str) -> Result<JobStatusView, JobError> {
    Ok(JobStatusView::from(&get_job(jobs, job_id)?))
}

/// Requests cancellation.
///
/// `pending`/`in_progress` jobs are cancelled; an already cancelled job is
/// accepted without change; `done`/`error` jobs are rejected unchanged.
pub fn cancel_job(jobs: &dyn JobRecordStore, job_id: &str) -> Result<CancelResponse, JobError> {
    let record = get_job(jobs, job_id)?;
    match record.status {
        JobStatus::Cancelled => return Ok(CancelResponse::accepted("Job is already cancelled")),
        status if !status.is_cancellable() => {
            return Ok(CancelResponse::rejected(job_id, status));
        }
        _ => {}
    }

    if jobs.apply(job_id, &JobTransition::Cancel)? {
        info!("Cancellation requested for job {}", job_id);
        return Ok(CancelResponse::accepted("Cancellation requested"));
    }

    // The job reached another state between the read and the write.
    let current = get_job(jobs, job_id)?;
    Ok(match current.status {
        JobStatus::Cancelled => CancelResponse::accepted("Job is already cancelled"),
        status => CancelResponse::rejected(job_id, status),
    })
}

/// Jobs newest first, optionally restricted to one owner.
pub fn list_jobs(
    jobs: &dyn JobRecordStore,
    owner: Option<&str>,
) -> Result<Vec<JobSummary>, JobError> {
    Ok(jobs.list(owner)?.iter().map(JobSummary::from).collect())
}

pub struct JobService {
    jobs: Arc<dyn JobRecordStore>,
    scheduler: Arc<JobScheduler>,
    progress: JobProgressBroadcaster,
}

impl JobService {
    pub fn new(scheduler: Arc<JobScheduler>) -> Self {
        let orchestrator = scheduler.orchestrator();
        Self {
            jobs: Arc::clone(orchestrator.jobs()),
            progress: orchestrator.progress().clone(),
            scheduler,
        }
    }

    /// Opens the configured database and builds the production service.
    pub fn from_config(config: &Config) -> Result<Self, WorksheetError> {
        let db = match config.resolved_database_path() {
            Some(path) => Database::open(&path)?,
            None => {
                return Err(crate::db::DatabaseError::Unavailable(
                    "no database path configured and no home directory".to_string(),
                )
                .into())
            }
        };
        let jobs: Arc<dyn JobRecordStore> = Arc::new(SqliteJobStore::new(db));
        let progress = JobProgressBroadcaster::new(config.progress_channel_capacity);
        let orchestrator = Orchestrator::from_config(config, jobs, progress)?;
        Ok(Self::new(Arc::new(JobScheduler::new(Arc::new(orchestrator)))))
    }

    /// Validates the request, creates the `pending` record and schedules
    /// exactly one run for it. Returns the new job id.
    pub fn submit(
        &self,
        request: WorksheetRequest,
        owner: Option<String>,
    ) -> Result<String, JobError> {
        request.validate()?;

        let job = NewJob::new(request, owner);
        self.jobs.insert(&job)?;
        info!(
            "Job {} submitted (topic '{}', grade {})",
            job.id,
            crate::sanitize::truncate_for_log(&job.request.topic),
            job.request.grade_level
        );

        if let Err(e) = self.scheduler.schedule(&job.id) {
            let fail = JobTransition::Fail {
                message: format!("Job could not be scheduled: {}", e),
            };
            if let Err(store_err) = self.jobs.apply(&job.id, &fail) {
                error!(
                    "Job {} could not be scheduled and its error state was not written: {}",
                    job.id, store_err
                );
            }
            return Err(e.into());
        }

        Ok(job.id)
    }

    pub fn status(&self, job_id: &str) -> Result<JobStatusView, JobError> {
        job_status(self.jobs.as_ref(), job_id)
    }

    pub fn record(&self, job_id: &str) -> Result<JobRecord, JobError> {
        get_job(self.jobs.as_ref(), job_id)
    }

    pub fn cancel(&self, job_id: &str) -> Result<CancelResponse, JobError> {
        cancel_job(self.jobs.as_ref(), job_id)
    }

    pub fn list(&self, owner: Option<&str>) -> Result<Vec<JobSummary>, JobError> {
        list_jobs(self.jobs.as_ref(), owner)
    }

    /// Subscribes to progress events of all jobs.
    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.progress.subscribe()
    }

    /// Waits for the job's run to finish.
    ///
    /// A task that already ended is no longer tracked, so its outcome is read
    /// back from the record. `None` for unknown jobs and for jobs that are
    /// not terminal and not running here.
    pub async fn wait(&self, job_id: &str) -> Option<RunOutcome> {
        if let Some(outcome) = self.scheduler.join(job_id).await {
            return Some(outcome);
        }
        match self.jobs.get(job_id) {
            Ok(Some(record)) => RunOutcome::from_record(&record),
            Ok(None) => None,
            Err(e) => {
                error!("Failed to read job {} after its run: {}", job_id, e);
                None
            }
        }
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    pub fn jobs(&self) -> &Arc<dyn JobRecordStore> {
        &self.jobs
    }
}
