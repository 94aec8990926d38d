use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorksheetError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Errors from the status / submission surface.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {job_id} is already {status} and cannot be cancelled")]
    StateConflict { job_id: String, status: String },

    #[error("Invalid worksheet request: {0}")]
    InvalidRequest(String),

    #[error("Job store error: {0}")]
    Store(#[from] crate::db::DatabaseError),

    #[error("Scheduling failed: {0}")]
    Worker(#[from] WorkerError),
}

/// Failures of the content or image generation services.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Provider quota exhausted: {0}")]
    Quota(String),

    #[error("Provider response could not be parsed: {0}")]
    Parse(String),

    #[error("Worksheet specification is invalid: {0}")]
    InvalidSpec(String),

    #[error("Provider is not configured: {0}")]
    NotConfigured(String),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to build PDF: {0}")]
    Pdf(String),

    #[error("Failed to render interactive page: {0}")]
    Template(#[from] askama::Error),

    #[error("Failed to read image '{path}': {source}")]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Artifact store rejected '{key}' with HTTP {status}: {body}")]
    Rejected {
        key: String,
        status: u16,
        body: String,
    },

    #[error("Invalid artifact key '{0}'")]
    InvalidKey(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove '{path}': {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid job workspace name: {0}")]
    InvalidName(String),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Job {0} is already scheduled")]
    AlreadyScheduled(String),

    #[error("Scheduler state lock poisoned")]
    LockPoisoned,

    #[error("No async runtime available to run job {0}")]
    NoRuntime(String),
}

pub type Result<T> = std::result::Result<T, WorksheetError>;
