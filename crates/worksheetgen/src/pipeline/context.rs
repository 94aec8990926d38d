use crate::model::{JobRecord, WorksheetSpec};
use crate::render::ImageMap;
use crate::storage::StoredArtifact;

use super::error::PipelineWarning;

/// Working state of one run. Dropped when the run ends.
pub struct PipelineContext {
    // Input
    pub job: JobRecord,

    // Last progress written to the record
    pub percent: u8,

    // Content step result
    pub spec: Option<WorksheetSpec>,

    // Image step result, keyed by description
    pub images: ImageMap,

    // Render step results
    pub document: Option<StoredArtifact>,
    pub interactive: Option<StoredArtifact>,

    // Upload step results
    pub document_locator: Option<String>,
    pub interactive_locator: Option<String>,

    // Non-fatal warnings
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    pub fn new(job: JobRecord) -> Self {
        let percent = job.progress_percent;
        Self {
            job,
            percent,
            spec: None,
            images: ImageMap::new(),
            document: None,
            interactive: None,
            document_locator: None,
            interactive_locator: None,
            warnings: Vec::new(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job.id
    }
}
