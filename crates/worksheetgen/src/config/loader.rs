use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

/// Semantic checks that the schema cannot express.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.work_directory.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "work_directory must not be empty".to_string(),
        });
    }

    if config.progress_channel_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "progress_channel_capacity must be greater than zero".to_string(),
        });
    }

    for (section, timeout) in [
        ("content", config.content.timeout_secs),
        ("images", config.images.timeout_secs),
    ] {
        if timeout == 0 {
            return Err(ConfigError::Validation {
                message: format!("{}.timeout_secs must be greater than zero", section),
            });
        }
    }

    if config.content.max_elements == 0 {
        return Err(ConfigError::Validation {
            message: "content.max_elements must be greater than zero".to_string(),
        });
    }

    if let Some(storage) = &config.storage {
        if storage.bucket.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "storage.bucket must not be empty".to_string(),
            });
        }
        if storage.timeout_secs == 0 {
            return Err(ConfigError::Validation {
                message: "storage.timeout_secs must be greater than zero".to_string(),
            });
        }
    }

    Ok(())
}
