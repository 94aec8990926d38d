//! Broadcasting of job progress for real-time streaming to any frontend.

pub mod job_progress;

pub use job_progress::{JobPhase, JobProgressBroadcaster, JobProgressEvent, JobProgressTracker};
