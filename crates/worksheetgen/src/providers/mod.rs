//! Content and image generation services.
//!
//! The orchestrator only sees the two traits; the OpenAI-compatible HTTP
//! clients live in [`openai`].

pub mod openai;
pub mod prompt;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::model::{WorksheetRequest, WorksheetSpec};

pub use openai::{OpenAiContentProvider, OpenAiImageProvider};

/// Produces a validated worksheet specification for a request.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn generate_spec(&self, request: &WorksheetRequest)
        -> Result<WorksheetSpec, ProviderError>;
}

/// Produces raw image bytes (PNG or JPEG) for a description.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate_image(&self, description: &str) -> Result<Vec<u8>, ProviderError>;
}
