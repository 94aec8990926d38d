//! Job progress broadcaster for real-time job status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::JobStatus;

/// Phase of a generation run. The string form is the record's `progress_step`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Starting,
    GeneratingContent,
    GeneratingImages,
    RenderingDocument,
    RenderingInteractive,
    Uploading,
    Done,
    Failed,
    Cancelled,
}

impl JobPhase {
    /// Label stored in `progress_step`.
    pub fn step(&self) -> &'static str {
        match self {
            JobPhase::Starting => "starting",
            JobPhase::GeneratingContent => "generating_content",
            JobPhase::GeneratingImages => "generating_images",
            JobPhase::RenderingDocument => "rendering_document",
            JobPhase::RenderingInteractive => "rendering_interactive",
            JobPhase::Uploading => "uploading",
            JobPhase::Done => "done",
            JobPhase::Failed => "error",
            JobPhase::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::Starting => write!(f, "Starting"),
            JobPhase::GeneratingContent => write!(f, "Generating content"),
            JobPhase::GeneratingImages => write!(f, "Generating images"),
            JobPhase::RenderingDocument => write!(f, "Rendering document"),
            JobPhase::RenderingInteractive => write!(f, "Rendering interactive page"),
            JobPhase::Uploading => write!(f, "Uploading"),
            JobPhase::Done => write!(f, "Done"),
            JobPhase::Failed => write!(f, "Failed"),
            JobPhase::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Progress event for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    /// Unique job identifier.
    pub job_id: String,
    /// Current phase of the run.
    pub phase: JobPhase,
    /// Job status implied by the phase.
    pub status: JobStatus,
    pub percent: u8,
    /// Human-readable message describing current activity.
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Document locator (set on completion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_locator: Option<String>,
    /// Interactive page locator (set on completion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactive_locator: Option<String>,
    /// Error message (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobProgressEvent {
    /// Creates a new progress event.
    pub fn new(job_id: &str, phase: JobPhase, percent: u8, message: &str) -> Self {
        let status = match phase {
            JobPhase::Done => JobStatus::Done,
            JobPhase::Failed => JobStatus::Error,
            JobPhase::Cancelled => JobStatus::Cancelled,
            _ => JobStatus::InProgress,
        };

        Self {
            job_id: job_id.to_string(),
            phase,
            status,
            percent,
            message: message.to_string(),
            timestamp: Utc::now(),
            document_locator: None,
            interactive_locator: None,
            error: None,
        }
    }

    /// Creates a completion event.
    pub fn completed(job_id: &str, document_locator: &str, interactive_locator: &str) -> Self {
        let mut event = Self::new(job_id, JobPhase::Done, 100, "Worksheet generated");
        event.document_locator = Some(document_locator.to_string());
        event.interactive_locator = Some(interactive_locator.to_string());
        event
    }

    /// Creates a failure event. `percent` is the last recorded progress.
    pub fn failed(job_id: &str, percent: u8, error: &str) -> Self {
        let mut event = Self::new(job_id, JobPhase::Failed, percent, "Generation failed");
        event.error = Some(error.to_string());
        event
    }

    pub fn cancelled(job_id: &str, percent: u8) -> Self {
        Self::new(job_id, JobPhase::Cancelled, percent, "Generation cancelled")
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Broadcasts job progress events for streaming.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    /// Creates a new job progress broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends a progress event to all subscribers.
    pub fn send(&self, event: JobProgressEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber for progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    /// Creates a tracker that tags every event with `job_id`.
    pub fn tracker(&self, job_id: &str) -> JobProgressTracker {
        JobProgressTracker::new(job_id, Arc::clone(&self.sender))
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Tracks progress for a single job.
pub struct JobProgressTracker {
    job_id: String,
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressTracker {
    pub fn new(job_id: &str, sender: Arc<broadcast::Sender<JobProgressEvent>>) -> Self {
        Self {
            job_id: job_id.to_string(),
            sender,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Updates the current phase with a message.
    pub fn update_phase(&self, phase: JobPhase, percent: u8, message: &str) {
        let _ = self
            .sender
            .send(JobProgressEvent::new(&self.job_id, phase, percent, message));
    }

    /// Marks the job as done with both locators.
    pub fn completed(&self, document_locator: &str, interactive_locator: &str) {
        let _ = self.sender.send(JobProgressEvent::completed(
            &self.job_id,
            document_locator,
            interactive_locator,
        ));
    }

    /// Marks the job as failed with an error message.
    pub fn failed(&self, percent: u8, error: &str) {
        let _ = self
            .sender
            .send(JobProgressEvent::failed(&self.job_id, percent, error));
    }

    pub fn cancelled(&self, percent: u8) {
        let _ = self
            .sender
            .send(JobProgressEvent::cancelled(&self.job_id, percent));
    }
}
