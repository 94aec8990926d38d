use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Structured input describing the worksheet to generate.
///
/// Immutable once the job record is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorksheetRequest {
    pub grade_level: String,
    pub topic: String,
    pub activities: Vec<String>,
    pub style: String,
    pub images_allowed: bool,
}

impl WorksheetRequest {
    /// Rejects requests that deserialize but cannot produce a sensible prompt.
    pub fn validate(&self) -> Result<(), JobError> {
        if self.grade_level.trim().is_empty() {
            return Err(JobError::InvalidRequest("gradeLevel is empty".to_string()));
        }
        if self.topic.trim().is_empty() {
            return Err(JobError::InvalidRequest("topic is empty".to_string()));
        }
        if self.style.trim().is_empty() {
            return Err(JobError::InvalidRequest("style is empty".to_string()));
        }
        if self.activities.is_empty() {
            return Err(JobError::InvalidRequest(
                "at least one activity is required".to_string(),
            ));
        }
        if self.activities.iter().any(|a| a.trim().is_empty()) {
            return Err(JobError::InvalidRequest(
                "activities must not contain blank entries".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WorksheetRequest {
        WorksheetRequest {
            grade_level: "3".to_string(),
            topic: "fractions".to_string(),
            activities: vec!["fill-in".to_string()],
            style: "fun".to_string(),
            images_allowed: false,
        }
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{"gradeLevel":"3","topic":"fractions","activities":["fill-in"],"style":"fun","imagesAllowed":false}"#;
        let request: WorksheetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request, sample());
    }

    #[test]
    fn test_missing_field_fails() {
        let json = r#"{"gradeLevel":"3","topic":"fractions","activities":["fill-in"],"style":"fun"}"#;
        assert!(serde_json::from_str::<WorksheetRequest>(json).is_err());
    }

    #[test]
    fn test_validate_accepts_sample() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_topic() {
        let mut request = sample();
        request.topic = "   ".to_string();
        let err = request.validate().unwrap_err();
        assert!(err.to_string().contains("topic"));
    }

    #[test]
    fn test_validate_rejects_empty_activities() {
        let mut request = sample();
        request.activities.clear();
        assert!(matches!(
            request.validate(),
            Err(JobError::InvalidRequest(_))
        ));
    }
}
