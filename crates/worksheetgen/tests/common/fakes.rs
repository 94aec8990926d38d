//! Fakes for the orchestrator's collaborators.
//!
//! Each fake records its calls so tests can assert which steps ran.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageBuffer, Rgb};
use tokio::sync::Notify;

use worksheetgen::db::DatabaseError;
use worksheetgen::error::{ProviderError, RenderError, UploadError};
use worksheetgen::model::{JobRecord, JobTransition, NewJob, WorksheetRequest, WorksheetSpec};
use worksheetgen::pipeline::{ProgressEvent, ProgressReporter};
use worksheetgen::providers::{ContentProvider, ImageProvider};
use worksheetgen::render::{
    Artifact, DocumentRenderer, HtmlInteractiveRenderer, ImageMap, InteractiveRenderer,
    PdfDocumentRenderer,
};
use worksheetgen::storage::{ArtifactStore, StoredArtifact};
use worksheetgen::store::{JobRecordStore, SqliteJobStore};

/// Encodes a small solid PNG.
pub fn png_bytes() -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(4, 4, Rgb([0, 0, 0]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

// ── Content ──

pub enum ContentBehavior {
    Return(WorksheetSpec),
    Fail(String),
    Panic(String),
}

pub struct FakeContentProvider {
    behavior: Mutex<ContentBehavior>,
    gate: Mutex<Option<Arc<Notify>>>,
    calls: AtomicUsize,
}

impl FakeContentProvider {
    pub fn returning(spec: WorksheetSpec) -> Self {
        Self {
            behavior: Mutex::new(ContentBehavior::Return(spec)),
            gate: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_behavior(&self, behavior: ContentBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// Makes every call wait until the returned gate is notified.
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentProvider for FakeContentProvider {
    async fn generate_spec(
        &self,
        _request: &WorksheetRequest,
    ) -> Result<WorksheetSpec, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match &*self.behavior.lock().unwrap() {
            ContentBehavior::Return(spec) => Ok(spec.clone()),
            ContentBehavior::Fail(message) => Err(ProviderError::Parse(message.clone())),
            ContentBehavior::Panic(message) => panic!("{}", message),
        }
    }
}

// ── Images ──

#[derive(Default)]
pub struct FakeImageProvider {
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeImageProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, description: &str) {
        self.failing.lock().unwrap().insert(description.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageProvider for FakeImageProvider {
    async fn generate_image(&self, description: &str) -> Result<Vec<u8>, ProviderError> {
        self.calls.lock().unwrap().push(description.to_string());
        if self.failing.lock().unwrap().contains(description) {
            return Err(ProviderError::Status {
                status: 500,
                body: "image backend unavailable".to_string(),
            });
        }
        Ok(png_bytes())
    }
}

// ── Renderers ──

/// Real document renderer with a call counter and injectable failures.
#[derive(Default)]
pub struct CountingDocumentRenderer {
    inner: PdfDocumentRenderer,
    fail: AtomicBool,
    panic: AtomicBool,
    first_call_delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl CountingDocumentRenderer {
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn panic(&self) {
        self.panic.store(true, Ordering::SeqCst);
    }

    /// Blocks the calling thread for `delay` on the next render only.
    pub fn block_next_call(&self, delay: Duration) {
        *self.first_call_delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DocumentRenderer for CountingDocumentRenderer {
    fn render(&self, spec: &WorksheetSpec, images: &ImageMap) -> Result<Artifact, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.first_call_delay.lock().unwrap().take();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if self.panic.load(Ordering::SeqCst) {
            panic!("glyph cache corrupted");
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(RenderError::Pdf("font table missing".to_string()));
        }
        self.inner.render(spec, images)
    }
}

#[derive(Default)]
pub struct CountingInteractiveRenderer {
    inner: HtmlInteractiveRenderer,
    calls: AtomicUsize,
}

impl CountingInteractiveRenderer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InteractiveRenderer for CountingInteractiveRenderer {
    fn render(&self, spec: &WorksheetSpec, images: &ImageMap) -> Result<Artifact, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.render(spec, images)
    }
}

// ── Artifact store ──

pub struct Upload {
    pub key: String,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
pub struct FakeArtifactStore {
    uploads: Mutex<Vec<Upload>>,
    fail: AtomicBool,
}

impl FakeArtifactStore {
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn keys(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.key.clone())
            .collect()
    }

    /// Uploaded bytes for the key ending in `suffix`.
    pub fn bytes_for(&self, suffix: &str) -> Option<Vec<u8>> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.key.ends_with(suffix))
            .map(|u| u.bytes.clone())
    }
}

#[async_trait]
impl ArtifactStore for FakeArtifactStore {
    async fn upload(&self, artifact: &StoredArtifact, key: &str) -> Result<String, UploadError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(UploadError::Rejected {
                key: key.to_string(),
                status: 503,
                body: "bucket unavailable".to_string(),
            });
        }
        self.uploads.lock().unwrap().push(Upload {
            key: key.to_string(),
            bytes: artifact.artifact.bytes.clone(),
        });
        Ok(format!("https://storage.test/{}", key))
    }
}

// ── Job store ──

/// SQLite store that can be told to fail specific transitions.
pub struct FlakyJobStore {
    inner: SqliteJobStore,
    failing_transitions: Mutex<HashSet<&'static str>>,
}

impl FlakyJobStore {
    pub fn new(inner: SqliteJobStore) -> Self {
        Self {
            inner,
            failing_transitions: Mutex::new(HashSet::new()),
        }
    }

    /// Makes `apply` fail for transitions with this name (see `JobTransition::name`).
    pub fn fail_transition(&self, name: &'static str) {
        self.failing_transitions.lock().unwrap().insert(name);
    }
}

impl JobRecordStore for FlakyJobStore {
    fn insert(&self, job: &NewJob) -> Result<(), DatabaseError> {
        self.inner.insert(job)
    }

    fn get(&self, id: &str) -> Result<Option<JobRecord>, DatabaseError> {
        self.inner.get(id)
    }

    fn apply(&self, id: &str, transition: &JobTransition) -> Result<bool, DatabaseError> {
        if self
            .failing_transitions
            .lock()
            .unwrap()
            .contains(transition.name())
        {
            return Err(DatabaseError::Unavailable("injected failure".to_string()));
        }
        self.inner.apply(id, transition)
    }

    fn list(&self, owner: Option<&str>) -> Result<Vec<JobRecord>, DatabaseError> {
        self.inner.list(owner)
    }
}

// ── Progress ──

type Hook = Box<dyn Fn(&str, u8) + Send + Sync>;

/// Records `(step, percent)` for every event and can run a hook on each.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<(String, u8)>>,
    hook: Option<Hook>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(hook: impl Fn(&str, u8) + Send + Sync + 'static) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            hook: Some(Box::new(hook)),
        }
    }

    pub fn events(&self) -> Vec<(String, u8)> {
        self.events.lock().unwrap().clone()
    }

    pub fn percents(&self) -> Vec<u8> {
        self.events().into_iter().map(|(_, p)| p).collect()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        let (step, percent) = match event {
            ProgressEvent::Phase { phase, percent, .. } => (phase.step().to_string(), percent),
            ProgressEvent::Completed { .. } => ("done".to_string(), 100),
            ProgressEvent::Failed { percent, .. } => ("error".to_string(), percent),
            ProgressEvent::Cancelled { percent } => ("cancelled".to_string(), percent),
        };
        self.events.lock().unwrap().push((step.clone(), percent));
        if let Some(hook) = &self.hook {
            hook(&step, percent);
        }
    }
}
