//! The job orchestrator: drives one job from `pending` to a terminal state.

pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod runner;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::{PipelineError, PipelineWarning};
pub use progress::{BroadcastProgress, ProgressEvent, ProgressReporter};
pub use runner::{Collaborators, Orchestrator, RunOutcome};
