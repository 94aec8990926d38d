use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::broadcast::job_progress::JobPhase;
use crate::broadcast::JobProgressBroadcaster;
use crate::config::Config;
use crate::error::{RenderError, StorageError, WorksheetError};
use crate::model::{JobRecord, JobStatus, JobTransition};
use crate::providers::{ContentProvider, ImageProvider, OpenAiContentProvider, OpenAiImageProvider};
use crate::render::{
    Artifact, DocumentRenderer, HtmlInteractiveRenderer, ImageMap, InteractiveRenderer,
    MaterializedImage, PdfDocumentRenderer,
};
use crate::sanitize;
use crate::storage::{artifact_store_from_config, ArtifactStore, FileStorage, StoredArtifact};
use crate::store::JobRecordStore;

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::{PipelineError, PipelineWarning};
use super::progress::{BroadcastProgress, ProgressEvent, ProgressReporter};

const STARTING_PERCENT: u8 = 5;
const CONTENT_REQUESTED_PERCENT: u8 = 20;
const CONTENT_DONE_PERCENT: u8 = 40;
const IMAGES_DONE_PERCENT: u8 = 60;
const DOCUMENT_PERCENT: u8 = 70;
const INTERACTIVE_PERCENT: u8 = 80;
const UPLOAD_PERCENT: u8 = 90;

/// External services one run talks to. Shared by all runs.
#[derive(Clone)]
pub struct Collaborators {
    pub content: Arc<dyn ContentProvider>,
    pub images: Arc<dyn ImageProvider>,
    pub document: Arc<dyn DocumentRenderer>,
    pub interactive: Arc<dyn InteractiveRenderer>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub jobs: Arc<dyn JobRecordStore>,
}

impl Collaborators {
    /// Production collaborators built from configuration.
    pub fn from_config(
        config: &Config,
        jobs: Arc<dyn JobRecordStore>,
    ) -> Result<Self, WorksheetError> {
        let content = OpenAiContentProvider::from_config(&config.content)?;
        let images = OpenAiImageProvider::from_config(&config.images)?;
        let artifacts = artifact_store_from_config(config.storage.as_ref())?;

        Ok(Self {
            content: Arc::new(content),
            images: Arc::new(images),
            document: Arc::new(PdfDocumentRenderer::new()),
            interactive: Arc::new(HtmlInteractiveRenderer::new()),
            artifacts,
            jobs,
        })
    }
}

/// How one call to [`Orchestrator::run`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Done {
        document_locator: String,
        interactive_locator: String,
    },
    /// `error_recorded` is false when writing the `error` state itself failed.
    Failed {
        message: String,
        error_recorded: bool,
    },
    Cancelled,
    /// No record exists for the job id.
    NotFound,
    /// The record was in a state this run may not advance.
    Skipped { status: JobStatus },
}

impl RunOutcome {
    /// Outcome a finished run left in the record. `None` while the job is
    /// not in a terminal state.
    pub fn from_record(record: &JobRecord) -> Option<Self> {
        match record.status {
            JobStatus::Done => Some(RunOutcome::Done {
                document_locator: record.document_locator.clone()?,
                interactive_locator: record.interactive_locator.clone()?,
            }),
            JobStatus::Error => Some(RunOutcome::Failed {
                message: record.error_message.clone().unwrap_or_default(),
                error_recorded: true,
            }),
            JobStatus::Cancelled => Some(RunOutcome::Cancelled),
            JobStatus::Pending | JobStatus::InProgress => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Done { .. } => "done",
            RunOutcome::Failed { .. } => "error",
            RunOutcome::Cancelled => "cancelled",
            RunOutcome::NotFound => "not_found",
            RunOutcome::Skipped { .. } => "skipped",
        }
    }
}

pub struct Orchestrator {
    collaborators: Collaborators,
    config: Arc<PipelineConfig>,
    storage: FileStorage,
    progress: JobProgressBroadcaster,
}

impl Orchestrator {
    pub fn new(
        collaborators: Collaborators,
        config: Arc<PipelineConfig>,
        progress: JobProgressBroadcaster,
    ) -> Self {
        let storage = FileStorage::new(&config.work_directory);
        Self {
            collaborators,
            config,
            storage,
            progress,
        }
    }

    /// Production constructor: builds all collaborators from config.
    pub fn from_config(
        config: &Config,
        jobs: Arc<dyn JobRecordStore>,
        progress: JobProgressBroadcaster,
    ) -> Result<Self, WorksheetError> {
        let collaborators = Collaborators::from_config(config, jobs)?;
        Ok(Self::new(
            collaborators,
            Arc::new(PipelineConfig::from_config(config)),
            progress,
        ))
    }

    pub fn jobs(&self) -> &Arc<dyn JobRecordStore> {
        &self.collaborators.jobs
    }

    pub fn progress(&self) -> &JobProgressBroadcaster {
        &self.progress
    }

    /// Runs a job to a terminal state, publishing progress on the broadcaster.
    pub async fn run(&self, job_id: &str) -> RunOutcome {
        let progress = BroadcastProgress::new(self.progress.tracker(job_id));
        self.run_with_progress(job_id, &progress).await
    }

    /// Runs a job to a terminal state. Never panics and never leaves the
    /// record `in_progress` unless the failure write itself fails.
    pub async fn run_with_progress(
        &self,
        job_id: &str,
        progress: &dyn ProgressReporter,
    ) -> RunOutcome {
        let span = info_span!("worksheet_job", job_id = %job_id);
        async {
            let outcome = self.run_guarded(job_id, progress).await;
            info!(outcome = outcome.label(), "Job run finished");
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run_guarded(&self, job_id: &str, progress: &dyn ProgressReporter) -> RunOutcome {
        let job = match self.begin(job_id, progress) {
            Ok(job) => job,
            Err(outcome) => return outcome,
        };

        let mut ctx = PipelineContext::new(job);
        let result = AssertUnwindSafe(self.execute(&mut ctx, progress))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(PipelineError::Panicked(panic_message(payload.as_ref()))));

        self.cleanup(&mut ctx);
        for warning in &ctx.warnings {
            debug!(warning = %warning, "Run warning");
        }

        match result {
            Ok((document_locator, interactive_locator)) => {
                progress.report(ProgressEvent::Completed {
                    document_locator: document_locator.clone(),
                    interactive_locator: interactive_locator.clone(),
                });
                RunOutcome::Done {
                    document_locator,
                    interactive_locator,
                }
            }
            Err(PipelineError::Cancelled) => {
                info!(percent = ctx.percent, "Cancellation observed, job stopped");
                progress.report(ProgressEvent::Cancelled {
                    percent: ctx.percent,
                });
                RunOutcome::Cancelled
            }
            Err(PipelineError::Interrupted { status }) => {
                warn!(status = %status, "Job left in_progress outside this run, stopping");
                RunOutcome::Skipped { status }
            }
            Err(PipelineError::JobVanished) => {
                error!("Job record disappeared during the run");
                RunOutcome::NotFound
            }
            Err(e) => self.record_failure(job_id, ctx.percent, e, progress),
        }
    }

    /// Moves the record from `pending` to `in_progress`.
    fn begin(
        &self,
        job_id: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<JobRecord, RunOutcome> {
        let jobs = &self.collaborators.jobs;
        let mut record = match jobs.get(job_id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                error!("Job not found, nothing to run");
                return Err(RunOutcome::NotFound);
            }
            Err(e) => return Err(self.record_failure(job_id, 0, e.into(), progress)),
        };

        match record.status {
            JobStatus::Pending => {}
            JobStatus::Cancelled => {
                info!("Job was cancelled before it started");
                progress.report(ProgressEvent::Cancelled {
                    percent: record.progress_percent,
                });
                return Err(RunOutcome::Cancelled);
            }
            status => {
                warn!(status = %status, "Job is not pending, refusing to run it");
                return Err(RunOutcome::Skipped { status });
            }
        }

        let start = JobTransition::Start {
            step: JobPhase::Starting.step().to_string(),
            percent: STARTING_PERCENT,
        };
        match jobs.apply(job_id, &start) {
            Ok(true) => {}
            Ok(false) => {
                return Err(match self.ensure_in_progress(job_id) {
                    Err(PipelineError::Cancelled) => {
                        progress.report(ProgressEvent::Cancelled {
                            percent: record.progress_percent,
                        });
                        RunOutcome::Cancelled
                    }
                    Err(PipelineError::JobVanished) => RunOutcome::NotFound,
                    Err(PipelineError::Interrupted { status }) => RunOutcome::Skipped { status },
                    _ => RunOutcome::Skipped {
                        status: JobStatus::InProgress,
                    },
                });
            }
            Err(e) => {
                return Err(self.record_failure(job_id, record.progress_percent, e.into(), progress))
            }
        }

        record.status = JobStatus::InProgress;
        record.progress_step = Some(JobPhase::Starting.step().to_string());
        record.progress_percent = STARTING_PERCENT;
        progress.report(ProgressEvent::Phase {
            phase: JobPhase::Starting,
            percent: STARTING_PERCENT,
            message: "Starting generation".to_string(),
        });
        info!(
            topic = %sanitize::truncate_for_log(&record.request.topic),
            grade_level = %record.request.grade_level,
            images_allowed = record.request.images_allowed,
            "Job started"
        );
        Ok(record)
    }

    async fn execute(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(String, String), PipelineError> {
        // Step 1: Content
        self.checkpoint(ctx)?;
        self.step_generate_content(ctx, progress)
            .instrument(info_span!("generate_content"))
            .await?;

        // Step 2: Images
        self.checkpoint(ctx)?;
        self.step_generate_images(ctx, progress)
            .instrument(info_span!("generate_images"))
            .await?;

        // Step 3: Document
        self.checkpoint(ctx)?;
        self.step_render_document(ctx, progress)
            .instrument(info_span!("render_document"))
            .await?;

        // Step 4: Interactive page
        self.checkpoint(ctx)?;
        self.step_render_interactive(ctx, progress)
            .instrument(info_span!("render_interactive"))
            .await?;

        // Step 5: Upload
        self.checkpoint(ctx)?;
        self.step_upload(ctx, progress)
            .instrument(info_span!("upload"))
            .await?;

        // Step 6: Finalize
        self.step_finalize(ctx)
    }

    async fn step_generate_content(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        self.advance(
            ctx,
            JobPhase::GeneratingContent,
            CONTENT_REQUESTED_PERCENT,
            "Generating worksheet content",
            progress,
        )?;

        let spec = self
            .collaborators
            .content
            .generate_spec(&ctx.job.request)
            .await?;
        debug!(
            title = %sanitize::truncate_for_log(&spec.title),
            elements = spec.elements.len(),
            image_elements = spec.image_element_count(),
            "Content generated"
        );
        ctx.spec = Some(spec);

        self.advance(
            ctx,
            JobPhase::GeneratingContent,
            CONTENT_DONE_PERCENT,
            "Worksheet content ready",
            progress,
        )
    }

    async fn step_generate_images(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        let spec = ctx
            .spec
            .as_ref()
            .ok_or(PipelineError::MissingInput("generate_images"))?;

        if !ctx.job.request.images_allowed {
            debug!(
                image_elements = spec.image_element_count(),
                "Images not allowed for this request, skipping image generation"
            );
            return Ok(());
        }

        let descriptions: Vec<String> = spec
            .image_descriptions()
            .into_iter()
            .map(str::to_string)
            .collect();
        if descriptions.is_empty() {
            debug!("Worksheet has no image elements");
            return Ok(());
        }

        let total = descriptions.len();
        self.advance(
            ctx,
            JobPhase::GeneratingImages,
            CONTENT_DONE_PERCENT,
            &format!("Generating {} image(s)", total),
            progress,
        )?;

        for (index, description) in descriptions.iter().enumerate() {
            match self.generate_image(ctx.job_id(), index + 1, description).await {
                Ok(image) => ctx.images.insert(description.clone(), image),
                Err(e) => {
                    warn!(
                        description = %sanitize::truncate_for_log(description),
                        error = %e,
                        "Image generation failed, element renders without image"
                    );
                    ctx.warnings.push(PipelineWarning::ImageFailed {
                        description: description.clone(),
                        error: e.to_string(),
                    });
                }
            }

            self.advance(
                ctx,
                JobPhase::GeneratingImages,
                image_percent(index + 1, total),
                &format!("Generated image {} of {}", index + 1, total),
                progress,
            )?;
        }

        info!(
            generated = ctx.images.len(),
            failed = total - ctx.images.len(),
            "Image generation finished"
        );
        Ok(())
    }

    async fn generate_image(
        &self,
        job_id: &str,
        index: usize,
        description: &str,
    ) -> Result<MaterializedImage, WorksheetError> {
        let bytes = self.collaborators.images.generate_image(description).await?;
        Ok(self.storage.write_image(job_id, index, &bytes)?)
    }

    async fn step_render_document(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        self.advance(
            ctx,
            JobPhase::RenderingDocument,
            DOCUMENT_PERCENT,
            "Rendering printable document",
            progress,
        )?;

        let spec = ctx
            .spec
            .clone()
            .ok_or(PipelineError::MissingInput("render_document"))?;
        let renderer = Arc::clone(&self.collaborators.document);
        let stored = self
            .render_off_runtime(ctx, move |images| renderer.render(&spec, images))
            .await?;
        ctx.document = Some(stored);
        Ok(())
    }

    async fn step_render_interactive(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        self.advance(
            ctx,
            JobPhase::RenderingInteractive,
            INTERACTIVE_PERCENT,
            "Rendering interactive page",
            progress,
        )?;

        let spec = ctx
            .spec
            .clone()
            .ok_or(PipelineError::MissingInput("render_interactive"))?;
        let renderer = Arc::clone(&self.collaborators.interactive);
        let stored = self
            .render_off_runtime(ctx, move |images| renderer.render(&spec, images))
            .await?;
        ctx.interactive = Some(stored);
        Ok(())
    }

    /// Renders and writes one artifact on the blocking pool. A renderer
    /// panic resumes on the calling task.
    async fn render_off_runtime<F>(
        &self,
        ctx: &PipelineContext,
        render: F,
    ) -> Result<StoredArtifact, PipelineError>
    where
        F: FnOnce(&ImageMap) -> Result<Artifact, RenderError> + Send + 'static,
    {
        let images = ctx.images.clone();
        let storage = self.storage.clone();
        let job_id = ctx.job_id().to_string();
        let span = Span::current();

        let task = tokio::task::spawn_blocking(move || {
            span.in_scope(|| -> Result<StoredArtifact, PipelineError> {
                let artifact = render(&images)?;
                Ok(store_locally(&storage, &job_id, artifact)?)
            })
        });
        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(PipelineError::Panicked(e.to_string())),
        }
    }

    async fn step_upload(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        self.advance(
            ctx,
            JobPhase::Uploading,
            UPLOAD_PERCENT,
            "Uploading artifacts",
            progress,
        )?;

        let (document, interactive) = match (&ctx.document, &ctx.interactive) {
            (Some(document), Some(interactive)) => (document, interactive),
            _ => return Err(PipelineError::MissingInput("upload")),
        };

        let document_locator = self.upload(ctx.job_id(), document).await?;
        let interactive_locator = self.upload(ctx.job_id(), interactive).await?;

        ctx.document_locator = Some(document_locator);
        ctx.interactive_locator = Some(interactive_locator);
        Ok(())
    }

    async fn upload(&self, job_id: &str, stored: &StoredArtifact) -> Result<String, PipelineError> {
        let key = stored.artifact.kind.remote_key(job_id);
        let locator = self.collaborators.artifacts.upload(stored, &key).await?;
        debug!(key = %key, locator = %sanitize::redact_url_query(&locator), "Artifact uploaded");
        Ok(locator)
    }

    /// Writes `done` together with both locators in one transition.
    fn step_finalize(&self, ctx: &mut PipelineContext) -> Result<(String, String), PipelineError> {
        let (document_locator, interactive_locator) =
            match (&ctx.document_locator, &ctx.interactive_locator) {
                (Some(document), Some(interactive)) => (document.clone(), interactive.clone()),
                _ => return Err(PipelineError::MissingInput("finalize")),
            };

        let complete = JobTransition::Complete {
            document_locator: document_locator.clone(),
            interactive_locator: interactive_locator.clone(),
        };
        if !self.collaborators.jobs.apply(ctx.job_id(), &complete)? {
            self.ensure_in_progress(ctx.job_id())?;
            return Err(PipelineError::Cancelled);
        }

        ctx.percent = 100;
        info!("Job completed");
        Ok((document_locator, interactive_locator))
    }

    fn checkpoint(&self, ctx: &PipelineContext) -> Result<(), PipelineError> {
        self.ensure_in_progress(ctx.job_id())
    }

    /// Classifies the current record state. Only `in_progress` may advance.
    fn ensure_in_progress(&self, job_id: &str) -> Result<(), PipelineError> {
        match self.collaborators.jobs.get(job_id)? {
            Some(record) => match record.status {
                JobStatus::InProgress => Ok(()),
                JobStatus::Cancelled => Err(PipelineError::Cancelled),
                status => Err(PipelineError::Interrupted { status }),
            },
            None => Err(PipelineError::JobVanished),
        }
    }

    /// Records progress. A write that is not applied means the job left
    /// `in_progress`, which stops the run.
    fn advance(
        &self,
        ctx: &mut PipelineContext,
        phase: JobPhase,
        percent: u8,
        message: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        let percent = percent.max(ctx.percent);
        let transition = JobTransition::Progress {
            step: phase.step().to_string(),
            percent,
        };
        if !self.collaborators.jobs.apply(ctx.job_id(), &transition)? {
            self.ensure_in_progress(ctx.job_id())?;
            return Err(PipelineError::Cancelled);
        }

        ctx.percent = percent;
        progress.report(ProgressEvent::Phase {
            phase,
            percent,
            message: message.to_string(),
        });
        Ok(())
    }

    /// Writes the `error` state. Never fails; a failed write is logged and
    /// reported through `error_recorded`.
    fn record_failure(
        &self,
        job_id: &str,
        percent: u8,
        failure: PipelineError,
        progress: &dyn ProgressReporter,
    ) -> RunOutcome {
        let message = failure.to_string();
        error!(error = %message, percent, "Job failed");

        let fail = JobTransition::Fail {
            message: message.clone(),
        };
        let error_recorded = match self.collaborators.jobs.apply(job_id, &fail) {
            Ok(true) => true,
            Ok(false) => {
                if let Err(PipelineError::Cancelled) = self.ensure_in_progress(job_id) {
                    info!("Job was cancelled while failing, keeping cancelled state");
                    progress.report(ProgressEvent::Cancelled { percent });
                    return RunOutcome::Cancelled;
                }
                error!("Job record no longer accepts the error state, leaving it as is");
                false
            }
            Err(e) => {
                error!(
                    error = %message,
                    secondary_error = %e,
                    "Failed to record job failure, record keeps its last state"
                );
                false
            }
        };

        progress.report(ProgressEvent::Failed {
            percent,
            error: message.clone(),
        });
        RunOutcome::Failed {
            message,
            error_recorded,
        }
    }

    fn cleanup(&self, ctx: &mut PipelineContext) {
        if self.config.keep_intermediate_images {
            return;
        }
        if let Err(e) = self.storage.remove_images(ctx.job_id()) {
            warn!(error = %e, "Failed to remove intermediate images");
            ctx.warnings.push(PipelineWarning::CleanupFailed {
                error: e.to_string(),
            });
        }
    }
}

fn store_locally(
    storage: &FileStorage,
    job_id: &str,
    artifact: Artifact,
) -> Result<StoredArtifact, StorageError> {
    let local_path = storage.write_artifact(job_id, &artifact)?;
    debug!(
        artifact = artifact.kind.file_name(),
        bytes = artifact.bytes.len(),
        path = %sanitize::redact_path(&local_path),
        "Artifact written"
    );
    Ok(StoredArtifact {
        artifact,
        local_path,
    })
}

/// Progress after `done` of `total` images, spread over 40..=60.
fn image_percent(done: usize, total: usize) -> u8 {
    let span = usize::from(IMAGES_DONE_PERCENT - CONTENT_DONE_PERCENT);
    let step = span * done.min(total) / total.max(1);
    CONTENT_DONE_PERCENT + step as u8
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
