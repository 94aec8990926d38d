use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::error::WorkerError;
use crate::pipeline::{Orchestrator, RunOutcome};

type RunningJobs = Arc<Mutex<HashMap<String, watch::Receiver<Option<RunOutcome>>>>>;

/// Runs each job on its own detached tokio task, at most one task per job id.
///
/// The task owns the job's state transitions until the run returns, then
/// removes its own entry. Only jobs whose task is still alive are tracked.
pub struct JobScheduler {
    orchestrator: Arc<Orchestrator>,
    running: RunningJobs,
}

/// Removes a job's entry when its task ends, including by panic.
struct Registration {
    running: RunningJobs,
    job_id: String,
}

impl Drop for Registration {
    fn drop(&mut self) {
        match self.running.lock() {
            Ok(mut running) => {
                running.remove(&self.job_id);
            }
            Err(_) => warn!("Scheduler state poisoned, job {} stays tracked", self.job_id),
        }
    }
}

impl JobScheduler {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Spawns the run for `job_id` on the current runtime.
    ///
    /// Fails with [`WorkerError::AlreadyScheduled`] while a previous task for
    /// the same id is still running.
    pub fn schedule(&self, job_id: &str) -> Result<(), WorkerError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| WorkerError::NoRuntime(job_id.to_string()))?;
        let mut running = self.running.lock().map_err(|_| WorkerError::LockPoisoned)?;

        if running.contains_key(job_id) {
            return Err(WorkerError::AlreadyScheduled(job_id.to_string()));
        }

        let (outcome_tx, outcome_rx) = watch::channel(None);
        running.insert(job_id.to_string(), outcome_rx);
        drop(running);

        let registration = Registration {
            running: Arc::clone(&self.running),
            job_id: job_id.to_string(),
        };
        let orchestrator = Arc::clone(&self.orchestrator);
        runtime.spawn(async move {
            let outcome = orchestrator.run(&registration.job_id).await;
            // Deregister before publishing so a woken waiter sees no entry.
            drop(registration);
            outcome_tx.send_replace(Some(outcome));
        });

        debug!("Scheduled job {}", job_id);
        Ok(())
    }

    /// Whether a task for `job_id` is still alive.
    pub fn is_running(&self, job_id: &str) -> bool {
        self.running
            .lock()
            .map(|running| running.contains_key(job_id))
            .unwrap_or(false)
    }

    pub fn running_count(&self) -> usize {
        self.running.lock().map(|running| running.len()).unwrap_or(0)
    }

    /// Waits for the job's task and returns its outcome.
    ///
    /// `None` when no task for the id is alive, or when the task ended
    /// without an outcome.
    pub async fn join(&self, job_id: &str) -> Option<RunOutcome> {
        let outcome_rx = self.running.lock().ok()?.get(job_id)?.clone();
        wait_for_outcome(job_id, outcome_rx).await
    }

    /// Waits for every task alive at the time of the call.
    pub async fn join_all(&self) -> Vec<(String, RunOutcome)> {
        let pending: Vec<_> = match self.running.lock() {
            Ok(running) => running
                .iter()
                .map(|(id, rx)| (id.clone(), rx.clone()))
                .collect(),
            Err(_) => return Vec::new(),
        };

        let mut outcomes = Vec::with_capacity(pending.len());
        for (id, outcome_rx) in pending {
            if let Some(outcome) = wait_for_outcome(&id, outcome_rx).await {
                outcomes.push((id, outcome));
            }
        }
        info!("All {} scheduled job(s) finished", outcomes.len());
        outcomes
    }
}

async fn wait_for_outcome(
    job_id: &str,
    mut outcome_rx: watch::Receiver<Option<RunOutcome>>,
) -> Option<RunOutcome> {
    let outcome = match outcome_rx.wait_for(Option::is_some).await {
        Ok(outcome) => outcome.clone(),
        Err(_) => {
            warn!("Task for job {} ended without an outcome", job_id);
            None
        }
    };
    outcome
}
