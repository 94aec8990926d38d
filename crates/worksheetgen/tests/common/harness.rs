//! Test harness wiring fakes to an in-memory job store.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use worksheetgen::broadcast::JobProgressBroadcaster;
use worksheetgen::db::Database;
use worksheetgen::model::{JobRecord, NewJob, WorksheetRequest, WorksheetSpec};
use worksheetgen::pipeline::{Collaborators, Orchestrator, PipelineConfig};
use worksheetgen::store::{JobRecordStore, SqliteJobStore};
use worksheetgen::worker::JobScheduler;
use worksheetgen::JobService;

use super::fakes::*;

pub struct TestHarness {
    temp_dir: TempDir,
    pub store: Arc<FlakyJobStore>,
    pub content: Arc<FakeContentProvider>,
    pub images: Arc<FakeImageProvider>,
    pub document: Arc<CountingDocumentRenderer>,
    pub interactive: Arc<CountingInteractiveRenderer>,
    pub artifacts: Arc<FakeArtifactStore>,
    pub broadcaster: JobProgressBroadcaster,
}

impl TestHarness {
    /// Harness whose content provider returns `spec`.
    pub fn new(spec: WorksheetSpec) -> Self {
        let db = Database::open_in_memory().expect("Failed to open in-memory database");
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            store: Arc::new(FlakyJobStore::new(SqliteJobStore::new(db))),
            content: Arc::new(FakeContentProvider::returning(spec)),
            images: Arc::new(FakeImageProvider::new()),
            document: Arc::new(CountingDocumentRenderer::default()),
            interactive: Arc::new(CountingInteractiveRenderer::default()),
            artifacts: Arc::new(FakeArtifactStore::default()),
            broadcaster: JobProgressBroadcaster::new(256),
        }
    }

    pub fn work_dir(&self) -> PathBuf {
        self.temp_dir.path().join("work")
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators {
            content: self.content.clone(),
            images: self.images.clone(),
            document: self.document.clone(),
            interactive: self.interactive.clone(),
            artifacts: self.artifacts.clone(),
            jobs: self.store.clone(),
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        self.build_orchestrator(false)
    }

    pub fn orchestrator_keeping_images(&self) -> Orchestrator {
        self.build_orchestrator(true)
    }

    fn build_orchestrator(&self, keep_intermediate_images: bool) -> Orchestrator {
        let config = PipelineConfig {
            work_directory: self.work_dir(),
            keep_intermediate_images,
        };
        Orchestrator::new(
            self.collaborators(),
            Arc::new(config),
            self.broadcaster.clone(),
        )
    }

    pub fn service(&self) -> JobService {
        JobService::new(Arc::new(JobScheduler::new(Arc::new(self.orchestrator()))))
    }

    /// Creates a `pending` job record directly in the store.
    pub fn insert_job(&self, request: WorksheetRequest) -> String {
        let job = NewJob::new(request, Some("grade3@school.test".to_string()));
        self.store.insert(&job).expect("Failed to insert job");
        job.id
    }

    pub fn record(&self, job_id: &str) -> JobRecord {
        self.store
            .get(job_id)
            .expect("Failed to read job")
            .expect("Job should exist")
    }
}
