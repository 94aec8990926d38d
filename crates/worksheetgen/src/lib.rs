pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod providers;
pub mod render;
pub mod sanitize;
pub mod secrets;
pub mod service;
pub mod storage;
pub mod store;
pub mod worker;

pub use broadcast::{JobPhase, JobProgressBroadcaster, JobProgressEvent};
pub use config::{load_config, Config};
pub use error::{
    ConfigError, JobError, ProviderError, RenderError, Result, StorageError, UploadError,
    WorkerError, WorksheetError,
};
pub use model::{
    Element, JobRecord, JobStatus, JobStatusView, JobSummary, JobTransition, NewJob,
    WorksheetRequest, WorksheetSpec,
};
pub use pipeline::{Collaborators, Orchestrator, PipelineConfig, RunOutcome};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use service::{cancel_job, job_status, list_jobs, CancelResponse, JobService};
pub use store::{JobRecordStore, SqliteJobStore};
pub use worker::JobScheduler;
