use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Content generation failed: {0}")]
    Content(#[from] crate::error::ProviderError),

    #[error("Rendering failed: {0}")]
    Render(#[from] crate::error::RenderError),

    #[error("Upload failed: {0}")]
    Upload(#[from] crate::error::UploadError),

    #[error("Writing job workspace failed: {0}")]
    Storage(#[from] crate::error::StorageError),

    #[error("Job store failed: {0}")]
    Store(#[from] crate::db::DatabaseError),

    #[error("Step '{0}' ran before its inputs were produced")]
    MissingInput(&'static str),

    #[error("Unexpected internal failure: {0}")]
    Panicked(String),

    /// Cancellation observed at a checkpoint. Never written as an error.
    #[error("Job was cancelled")]
    Cancelled,

    #[error("Job was moved to '{status}' outside this run")]
    Interrupted { status: crate::model::JobStatus },

    #[error("Job record no longer exists")]
    JobVanished,
}

#[derive(Debug, Clone)]
pub enum PipelineWarning {
    ImageFailed { description: String, error: String },
    CleanupFailed { error: String },
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineWarning::ImageFailed { description, error } => {
                write!(f, "image '{}' unavailable: {}", description, error)
            }
            PipelineWarning::CleanupFailed { error } => {
                write!(f, "workspace cleanup failed: {}", error)
            }
        }
    }
}
