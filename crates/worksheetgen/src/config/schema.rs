use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::secrets::SecretSource;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_work_directory")]
    pub work_directory: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub images: ImageConfig,
    /// Remote artifact storage. Absent means artifacts stay local.
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub keep_intermediate_images: bool,
    #[serde(default = "default_progress_channel_capacity")]
    pub progress_channel_capacity: usize,
}

fn default_work_directory() -> String {
    std::env::temp_dir()
        .join("worksheetgen")
        .to_string_lossy()
        .into_owned()
}

fn default_progress_channel_capacity() -> usize {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            work_directory: default_work_directory(),
            database_path: None,
            content: ContentConfig::default(),
            images: ImageConfig::default(),
            storage: None,
            keep_intermediate_images: false,
            progress_channel_capacity: default_progress_channel_capacity(),
        }
    }
}

impl Config {
    /// The configured database path with `~` expanded, or the default location.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) if !path.is_empty() => {
                Some(PathBuf::from(crate::secrets::expand_home(path)))
            }
            _ => crate::db::default_database_path(),
        }
    }

    pub fn resolved_work_directory(&self) -> PathBuf {
        PathBuf::from(crate::secrets::expand_home(&self.work_directory))
    }
}

/// Content generation service (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_content_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: Option<String>,
    #[serde(default = "default_content_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Upper bound on elements requested from the model.
    #[serde(default = "default_max_elements")]
    pub max_elements: usize,
}

fn default_api_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_content_model() -> String {
    "gpt-4.1".to_string()
}

fn default_api_key_env_var() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}

fn default_content_timeout() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_elements() -> usize {
    10
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            model: default_content_model(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
            timeout_secs: default_content_timeout(),
            temperature: default_temperature(),
            max_elements: default_max_elements(),
        }
    }
}

impl ContentConfig {
    pub fn api_key_source(&self) -> SecretSource<'_> {
        SecretSource {
            direct: self.api_key.as_deref(),
            file_path: self.api_key_file.as_deref(),
            env_var: self.api_key_env_var.as_deref(),
        }
    }
}

/// Image generation service (OpenAI-compatible images API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_image_model")]
    pub model: String,
    #[serde(default = "default_image_size")]
    pub size: String,
    #[serde(default = "default_image_style")]
    pub style: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: Option<String>,
    #[serde(default = "default_image_timeout")]
    pub timeout_secs: u64,
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

fn default_image_size() -> String {
    "1024x1024".to_string()
}

fn default_image_style() -> String {
    "natural".to_string()
}

fn default_image_timeout() -> u64 {
    120
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            model: default_image_model(),
            size: default_image_size(),
            style: default_image_style(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
            timeout_secs: default_image_timeout(),
        }
    }
}

impl ImageConfig {
    pub fn api_key_source(&self) -> SecretSource<'_> {
        SecretSource {
            direct: self.api_key.as_deref(),
            file_path: self.api_key_file.as_deref(),
            env_var: self.api_key_env_var.as_deref(),
        }
    }
}

/// Supabase-compatible object storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_storage_url_env_var")]
    pub url_env_var: Option<String>,
    #[serde(default)]
    pub service_key: Option<String>,
    #[serde(default)]
    pub service_key_file: Option<String>,
    #[serde(default = "default_service_key_env_var")]
    pub service_key_env_var: Option<String>,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_upload_timeout")]
    pub timeout_secs: u64,
}

fn default_storage_url_env_var() -> Option<String> {
    Some("SUPABASE_URL".to_string())
}

fn default_service_key_env_var() -> Option<String> {
    Some("SUPABASE_SERVICE_KEY".to_string())
}

fn default_bucket() -> String {
    "worksheets".to_string()
}

fn default_upload_timeout() -> u64 {
    60
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: None,
            url_env_var: default_storage_url_env_var(),
            service_key: None,
            service_key_file: None,
            service_key_env_var: default_service_key_env_var(),
            bucket: default_bucket(),
            timeout_secs: default_upload_timeout(),
        }
    }
}

impl StorageConfig {
    pub fn url_source(&self) -> SecretSource<'_> {
        SecretSource {
            direct: self.url.as_deref(),
            file_path: None,
            env_var: self.url_env_var.as_deref(),
        }
    }

    pub fn service_key_source(&self) -> SecretSource<'_> {
        SecretSource {
            direct: self.service_key.as_deref(),
            file_path: self.service_key_file.as_deref(),
            env_var: self.service_key_env_var.as_deref(),
        }
    }
}
