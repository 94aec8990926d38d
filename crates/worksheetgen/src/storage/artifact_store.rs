//! Durable artifact storage: Supabase-compatible object storage, or the
//! local workspace when remote storage is not configured.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use crate::config::StorageConfig;
use crate::error::UploadError;
use crate::render::Artifact;
use crate::sanitize::truncate_error_body;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// An artifact that has been written to the local job workspace.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub artifact: Artifact,
    pub local_path: PathBuf,
}

/// Uploads an artifact under a key and returns its locator.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn upload(&self, artifact: &StoredArtifact, key: &str) -> Result<String, UploadError>;
}

/// Rejects empty keys, absolute keys and `.`/`..` segments.
pub fn validate_key(key: &str) -> Result<(), UploadError> {
    let valid = !key.is_empty()
        && !key.starts_with('/')
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if valid {
        Ok(())
    } else {
        Err(UploadError::InvalidKey(key.to_string()))
    }
}

/// Fallback store: the locator is the artifact's local path.
#[derive(Debug, Clone, Default)]
pub struct LocalArtifactStore;

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn upload(&self, artifact: &StoredArtifact, key: &str) -> Result<String, UploadError> {
        validate_key(key)?;
        log::debug!(
            "Remote storage not configured, keeping {} locally",
            artifact.local_path.display()
        );
        Ok(artifact.local_path.to_string_lossy().into_owned())
    }
}

/// Supabase storage API client.
pub struct SupabaseArtifactStore {
    client: Client,
    base_url: String,
    bucket: String,
    service_key: SecretString,
}

impl SupabaseArtifactStore {
    pub fn new(
        base_url: &str,
        bucket: &str,
        service_key: SecretString,
        timeout_secs: u64,
    ) -> Result<Self, UploadError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            service_key,
        })
    }

    pub fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key)
    }

    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, key
        )
    }
}

#[async_trait]
impl ArtifactStore for SupabaseArtifactStore {
    async fn upload(&self, artifact: &StoredArtifact, key: &str) -> Result<String, UploadError> {
        validate_key(key)?;

        let response = self
            .client
            .post(self.object_url(key))
            .bearer_auth(self.service_key.expose_secret())
            .header("apikey", self.service_key.expose_secret())
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, artifact.artifact.kind.content_type())
            .body(artifact.artifact.bytes.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(UploadError::Rejected {
                key: key.to_string(),
                status,
                body: truncate_error_body(&body),
            });
        }

        log::info!(
            "Uploaded {} ({} bytes) to bucket {}",
            key,
            artifact.artifact.bytes.len(),
            self.bucket
        );
        Ok(self.public_url(key))
    }
}

/// Builds the artifact store for a configuration.
///
/// Missing configuration or credentials select [`LocalArtifactStore`].
pub fn artifact_store_from_config(
    config: Option<&StorageConfig>,
) -> Result<Arc<dyn ArtifactStore>, UploadError> {
    let Some(config) = config else {
        log::info!("No remote storage configured, artifacts stay in the work directory");
        return Ok(Arc::new(LocalArtifactStore));
    };

    let url = config.url_source().resolve_optional();
    let key = config.service_key_source().resolve_optional();
    match (url, key) {
        (Ok(Some(url)), Ok(Some(key))) => {
            let store = SupabaseArtifactStore::new(
                url.expose_secret(),
                &config.bucket,
                key,
                config.timeout_secs,
            )?;
            log::info!("Artifacts will be uploaded to bucket '{}'", config.bucket);
            Ok(Arc::new(store))
        }
        (Err(e), _) | (_, Err(e)) => {
            log::warn!(
                "Storage credentials unreadable ({}), falling back to local artifacts",
                e
            );
            Ok(Arc::new(LocalArtifactStore))
        }
        _ => {
            log::warn!("Storage URL or service key missing, falling back to local artifacts");
            Ok(Arc::new(LocalArtifactStore))
        }
    }
}
