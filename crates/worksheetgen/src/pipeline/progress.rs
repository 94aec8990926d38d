use crate::broadcast::job_progress::{JobPhase, JobProgressTracker};

/// Events emitted by the orchestrator during one run.
pub enum ProgressEvent {
    Phase {
        phase: JobPhase,
        percent: u8,
        message: String,
    },
    Completed {
        document_locator: String,
        interactive_locator: String,
    },
    Failed {
        percent: u8,
        error: String,
    },
    Cancelled {
        percent: u8,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Bridges orchestrator events to the broadcast channel.
pub struct BroadcastProgress {
    tracker: JobProgressTracker,
}

impl BroadcastProgress {
    pub fn new(tracker: JobProgressTracker) -> Self {
        Self { tracker }
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase {
                phase,
                percent,
                message,
            } => self.tracker.update_phase(phase, percent, &message),
            ProgressEvent::Completed {
                document_locator,
                interactive_locator,
            } => self.tracker.completed(&document_locator, &interactive_locator),
            ProgressEvent::Failed { percent, error } => self.tracker.failed(percent, &error),
            ProgressEvent::Cancelled { percent } => self.tracker.cancelled(percent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::JobProgressBroadcaster;
    use crate::model::JobStatus;

    #[test]
    fn test_broadcast_progress_forwards_events() {
        let broadcaster = JobProgressBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();
        let progress = BroadcastProgress::new(broadcaster.tracker("job-1"));

        progress.report(ProgressEvent::Phase {
            phase: JobPhase::RenderingDocument,
            percent: 70,
            message: "Rendering".to_string(),
        });
        progress.report(ProgressEvent::Cancelled { percent: 70 });

        let first = rx.try_recv().unwrap();
        assert_eq!(first.phase, JobPhase::RenderingDocument);
        assert_eq!(first.percent, 70);
        assert_eq!(rx.try_recv().unwrap().status, JobStatus::Cancelled);
    }
}
