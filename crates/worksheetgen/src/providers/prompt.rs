//! Prompt construction and reply parsing for the content and image services.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ProviderError;
use crate::model::{WorksheetRequest, WorksheetSpec, PAGE_HEIGHT, PAGE_WIDTH};

static RE_JSON_OBJECT: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}"));

/// Builds the worksheet prompt sent to the content service.
pub fn worksheet_prompt(request: &WorksheetRequest, max_elements: usize) -> String {
    let min_elements = max_elements.clamp(1, 5);
    format!(
        r#"Create a detailed educational worksheet specification in JSON format for:
- Grade Level: {grade}
- Topic: {topic}
- Activities: {activities}
- Style: {style}
- Images Allowed: {images}

Return a JSON object with this exact structure:
{{
    "title": "Worksheet Title",
    "instructions": "General instructions for the worksheet",
    "elements": [
        {{
            "type": "text",
            "content": "Text content or question",
            "position": {{"x": 50, "y": 100}},
            "style": {{"fontSize": 12, "bold": false}}
        }},
        {{
            "type": "input_field",
            "placeholder": "Answer space",
            "position": {{"x": 50, "y": 200}},
            "size": {{"width": 300, "height": 30}}
        }}{image_example}
    ]
}}

Keep layout within {width}x{height} points (letter size). Include {min}-{max} educational elements."#,
        grade = request.grade_level,
        topic = request.topic,
        activities = request.activities.join(", "),
        style = request.style,
        images = if request.images_allowed { "yes" } else { "no" },
        image_example = if request.images_allowed {
            r#",
        {
            "type": "image",
            "description": "Short description of a simple line drawing",
            "position": {"x": 350, "y": 100},
            "size": {"width": 200, "height": 150}
        }"#
        } else {
            ""
        },
        width = PAGE_WIDTH as u32,
        height = PAGE_HEIGHT as u32,
        min = min_elements,
        max = max_elements,
    )
}

/// Builds the line-art prompt sent to the image service.
pub fn line_art_prompt(description: &str) -> String {
    format!(
        "Black and white line art drawing, simple coloring book style: {}. \
         Clean lines, no shading, suitable for educational worksheets.",
        description.trim()
    )
}

/// Extracts the outermost `{ ... }` block from a model reply.
pub fn extract_json_object(reply: &str) -> Result<&str, ProviderError> {
    let re = RE_JSON_OBJECT
        .as_ref()
        .map_err(|e| ProviderError::Parse(format!("invalid JSON extraction pattern: {}", e)))?;
    re.find(reply)
        .map(|m| m.as_str())
        .ok_or_else(|| ProviderError::Parse("no JSON object found in response".to_string()))
}

/// Parses a model reply into a validated specification capped at
/// `max_elements` elements.
pub fn parse_spec_reply(reply: &str, max_elements: usize) -> Result<WorksheetSpec, ProviderError> {
    let json = extract_json_object(reply)?;
    let mut spec = WorksheetSpec::from_json(json)?;
    spec.elements.truncate(max_elements);
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(images_allowed: bool) -> WorksheetRequest {
        WorksheetRequest {
            grade_level: "3".to_string(),
            topic: "fractions".to_string(),
            activities: vec!["fill-in".to_string(), "matching".to_string()],
            style: "fun".to_string(),
            images_allowed,
        }
    }

    #[test]
    fn test_prompt_mentions_request_fields() {
        let prompt = worksheet_prompt(&request(false), 10);
        assert!(prompt.contains("Grade Level: 3"));
        assert!(prompt.contains("Topic: fractions"));
        assert!(prompt.contains("Activities: fill-in, matching"));
        assert!(prompt.contains("Images Allowed: no"));
        assert!(prompt.contains("612x792"));
        assert!(prompt.contains("5-10"));
        assert!(!prompt.contains("\"type\": \"image\""));
    }

    #[test]
    fn test_prompt_shows_image_element_when_allowed() {
        let prompt = worksheet_prompt(&request(true), 8);
        assert!(prompt.contains("Images Allowed: yes"));
        assert!(prompt.contains("\"type\": \"image\""));
        assert!(prompt.contains("5-8"));
    }

    #[test]
    fn test_line_art_prompt() {
        let prompt = line_art_prompt(" a smiling sun ");
        assert!(prompt.starts_with("Black and white line art drawing"));
        assert!(prompt.contains(": a smiling sun."));
    }

    #[test]
    fn test_extract_json_from_fenced_reply() {
        let reply = "Here you go:\n```json\n{\"title\": \"T\", \"elements\": []}\n```\nEnjoy!";
        assert_eq!(
            extract_json_object(reply).unwrap(),
            "{\"title\": \"T\", \"elements\": []}"
        );
    }

    #[test]
    fn test_reply_without_json_is_parse_error() {
        let err = extract_json_object("I cannot help with that.").unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[test]
    fn test_parse_reply_keeps_image_elements() {
        let reply = r#"{"title": "Shapes", "elements": [
            {"type": "text", "content": "Name the shape"},
            {"type": "image", "description": "a triangle"}
        ]}"#;

        let spec = parse_spec_reply(reply, 10).unwrap();
        assert_eq!(spec.elements.len(), 2);
        assert_eq!(spec.image_descriptions(), vec!["a triangle"]);
    }

    #[test]
    fn test_parse_reply_rejects_unknown_element() {
        let reply = r#"{"title": "T", "elements": [{"type": "video"}]}"#;
        let err = parse_spec_reply(reply, 10).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidSpec(_)));
    }

    #[test]
    fn test_parse_reply_caps_elements() {
        let reply = r#"{"title": "Many", "elements": [
            {"type": "text", "content": "1"},
            {"type": "text", "content": "2"},
            {"type": "text", "content": "3"}
        ]}"#;
        let spec = parse_spec_reply(reply, 2).unwrap();
        assert_eq!(spec.elements.len(), 2);
    }
}
