//! Secret resolution for provider API keys and storage credentials.
//!
//! Sources are checked in priority order:
//!
//! 1. **Direct value** - for quick local testing (e.g., `"api_key": "sk-..."`)
//! 2. **File reference** - Docker secrets pattern (e.g., `"api_key_file": "/run/secrets/openai"`)
//! 3. **Env var reference** - e.g., `"api_key_env_var": "OPENAI_API_KEY"`

use secrecy::SecretString;
use std::fs;

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },

    #[error("Secret from {source_name} is empty")]
    Empty { source_name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// The three places a secret may come from, as written in the config file.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSource<'a> {
    pub direct: Option<&'a str>,
    pub file_path: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl SecretSource<'_> {
    pub fn resolve(&self) -> Result<SecretString> {
        resolve_secret(self.direct, self.file_path, self.env_var)
    }

    pub fn resolve_optional(&self) -> Result<Option<SecretString>> {
        resolve_secret_optional(self.direct, self.file_path, self.env_var)
    }
}

/// Resolves a secret from a direct value, a file, or an environment variable,
/// in that order. Empty sources are skipped; file and env values are trimmed.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct {
        if !value.is_empty() {
            return Ok(SecretString::from(value.to_string()));
        }
    }

    if let Some(path) = file_path {
        if !path.is_empty() {
            let expanded = expand_home(path);
            let content = fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
                path: expanded.clone(),
                source: e,
            })?;
            let trimmed = content.trim();
            if trimmed.is_empty() {
                return Err(SecretError::Empty {
                    source_name: format!("file '{}'", expanded),
                });
            }
            return Ok(SecretString::from(trimmed.to_string()));
        }
    }

    if let Some(var_name) = env_var {
        if !var_name.is_empty() {
            return match std::env::var(var_name) {
                Ok(value) if value.trim().is_empty() => Err(SecretError::Empty {
                    source_name: format!("env var '{}'", var_name),
                }),
                Ok(value) => Ok(SecretString::from(value.trim())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: var_name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: var_name.to_string(),
                }),
            };
        }
    }

    Err(SecretError::NoSourceProvided)
}

/// Like [`resolve_secret`], but a missing source or unset env var is `None`.
///
/// Used for optional integrations such as remote artifact storage, where an
/// absent credential selects the local fallback instead of failing.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) | Err(SecretError::EnvVarNotSet { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Checks if at least one secret source is configured (non-empty).
pub fn has_secret_source(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> bool {
    direct.is_some_and(|s| !s.is_empty())
        || file_path.is_some_and(|s| !s.is_empty())
        || env_var.is_some_and(|s| !s.is_empty())
}

/// Expands a leading `~` to the user's home directory.
///
/// `~user/path` is not supported.
pub fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            if path == "~" {
                return home.to_string_lossy().into_owned();
            }
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // Tests that modify environment variables must run serially
    #[test]
    #[serial]
    fn test_direct_value_takes_priority() {
        std::env::set_var("WSG_TEST_SECRET_1", "env_value");
        let result = resolve_secret(Some("direct_value"), None, Some("WSG_TEST_SECRET_1")).unwrap();
        assert_eq!(result.expose_secret(), "direct_value");
        std::env::remove_var("WSG_TEST_SECRET_1");
    }

    #[test]
    #[serial]
    fn test_file_takes_priority_over_env() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "file_value").unwrap();

        std::env::set_var("WSG_TEST_SECRET_2", "env_value");
        let result = resolve_secret(
            None,
            Some(temp_file.path().to_str().unwrap()),
            Some("WSG_TEST_SECRET_2"),
        )
        .unwrap();
        assert_eq!(result.expose_secret(), "file_value");
        std::env::remove_var("WSG_TEST_SECRET_2");
    }

    #[test]
    #[serial]
    fn test_env_var_fallback_is_trimmed() {
        std::env::set_var("WSG_TEST_SECRET_3", "  env_value\n");
        let result = resolve_secret(None, None, Some("WSG_TEST_SECRET_3")).unwrap();
        assert_eq!(result.expose_secret(), "env_value");
        std::env::remove_var("WSG_TEST_SECRET_3");
    }

    #[test]
    fn test_no_source_error() {
        let result = resolve_secret(None, None, None);
        assert!(matches!(result, Err(SecretError::NoSourceProvided)));
    }

    #[test]
    #[serial]
    fn test_empty_strings_ignored() {
        std::env::set_var("WSG_TEST_SECRET_4", "env_value");
        let result = resolve_secret(Some(""), Some(""), Some("WSG_TEST_SECRET_4")).unwrap();
        assert_eq!(result.expose_secret(), "env_value");
        std::env::remove_var("WSG_TEST_SECRET_4");
    }

    #[test]
    fn test_file_not_found_error() {
        let result = resolve_secret(None, Some("/nonexistent/path/to/secret"), None);
        assert!(matches!(result, Err(SecretError::FileReadError { .. })));
    }

    #[test]
    fn test_empty_file_rejected() {
        let temp_file = NamedTempFile::new().unwrap();
        let result = resolve_secret(None, Some(temp_file.path().to_str().unwrap()), None);
        assert!(matches!(result, Err(SecretError::Empty { .. })));
    }

    #[test]
    #[serial]
    fn test_env_var_not_set_error() {
        std::env::remove_var("WSG_TEST_SECRET_MISSING");
        let result = resolve_secret(None, None, Some("WSG_TEST_SECRET_MISSING"));
        assert!(matches!(result, Err(SecretError::EnvVarNotSet { .. })));
    }

    #[test]
    #[serial]
    fn test_resolve_secret_optional() {
        assert!(resolve_secret_optional(None, None, None).unwrap().is_none());

        std::env::remove_var("WSG_TEST_SECRET_5");
        assert!(resolve_secret_optional(None, None, Some("WSG_TEST_SECRET_5"))
            .unwrap()
            .is_none());

        std::env::set_var("WSG_TEST_SECRET_5", "value");
        let secret = SecretSource {
            env_var: Some("WSG_TEST_SECRET_5"),
            ..Default::default()
        }
        .resolve_optional()
        .unwrap()
        .unwrap();
        assert_eq!(secret.expose_secret(), "value");
        std::env::remove_var("WSG_TEST_SECRET_5");
    }

    #[test]
    fn test_optional_still_reports_unreadable_file() {
        let result = resolve_secret_optional(None, Some("/nonexistent/secret"), None);
        assert!(matches!(result, Err(SecretError::FileReadError { .. })));
    }

    #[test]
    fn test_has_secret_source() {
        assert!(has_secret_source(Some("x"), None, None));
        assert!(has_secret_source(None, None, Some("OPENAI_API_KEY")));
        assert!(!has_secret_source(Some(""), Some(""), None));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/path"), "/abs/path");
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy().into_owned();
            assert_eq!(expand_home("~"), home);
            assert_eq!(expand_home("~/key"), format!("{}/key", home));
        }
    }
}
