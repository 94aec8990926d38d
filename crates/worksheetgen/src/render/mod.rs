//! Rendering a worksheet specification into its two artifacts.

pub mod document;
pub mod images;
pub mod interactive;

use crate::error::RenderError;
use crate::model::WorksheetSpec;

pub use document::PdfDocumentRenderer;
pub use images::{ImageMap, LoadedImage, MaterializedImage};
pub use interactive::HtmlInteractiveRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Printable PDF.
    Document,
    /// Self-contained HTML page with live inputs.
    Interactive,
}

impl ArtifactKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::Document => "worksheet.pdf",
            ArtifactKind::Interactive => "interactive.html",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Document => "application/pdf",
            ArtifactKind::Interactive => "text/html; charset=utf-8",
        }
    }

    /// Remote key of this artifact, namespaced by job id.
    pub fn remote_key(&self, job_id: &str) -> String {
        format!("{}/{}", job_id, self.file_name())
    }
}

/// Rendered artifact bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, bytes: Vec<u8>) -> Self {
        Self { kind, bytes }
    }
}

/// Renders the printable document. Deterministic for identical inputs.
///
/// Image elements whose description is missing from `images` (or whose image
/// cannot be decoded) render as an outlined placeholder.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, spec: &WorksheetSpec, images: &ImageMap) -> Result<Artifact, RenderError>;
}

/// Renders the interactive page. Deterministic for identical inputs.
pub trait InteractiveRenderer: Send + Sync {
    fn render(&self, spec: &WorksheetSpec, images: &ImageMap) -> Result<Artifact, RenderError>;
}
