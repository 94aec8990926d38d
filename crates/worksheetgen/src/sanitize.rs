//! Helpers for sanitizing data before it enters log lines and span attributes.
//!
//! Prompts and provider responses can be long and may echo user input; keys
//! never appear here at all (they stay inside `SecretString`).

use std::path::Path;

/// Maximum characters of a prompt or description placed in a log attribute.
pub const MAX_LOG_TEXT_LENGTH: usize = 80;

/// Maximum characters of an HTTP error body kept in an error message.
pub const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Truncates `text` to `max_chars` characters on a char boundary, appending
/// `...` when something was cut. Newlines are flattened to spaces.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let flattened: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let mut chars = flattened.char_indices();
    match chars.nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &flattened[..byte_index]),
        None => flattened,
    }
}

/// Shortens free text (prompts, image descriptions) for log attributes.
pub fn truncate_for_log(text: &str) -> String {
    truncate_chars(text, MAX_LOG_TEXT_LENGTH)
}

/// Shortens an HTTP error body before it is stored in an error message.
pub fn truncate_error_body(body: &str) -> String {
    truncate_chars(body.trim(), MAX_ERROR_BODY_LENGTH)
}

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Strips a query string from a URL (signed download links carry tokens there).
pub fn redact_url_query(url: &str) -> &str {
    url.split_once('?').map(|(base, _)| base).unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_unchanged() {
        assert_eq!(truncate_for_log("a red apple"), "a red apple");
    }

    #[test]
    fn test_long_text_truncated_with_ellipsis() {
        let text = "x".repeat(200);
        let out = truncate_for_log(&text);
        assert_eq!(out.chars().count(), MAX_LOG_TEXT_LENGTH + 3);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let text = "é".repeat(10);
        assert_eq!(truncate_chars(&text, 3), "ééé...");
    }

    #[test]
    fn test_newlines_flattened() {
        assert_eq!(truncate_for_log("line one\nline two"), "line one line two");
    }

    #[test]
    fn test_error_body_trimmed() {
        assert_eq!(truncate_error_body("  {\"error\": \"quota\"}\n"), "{\"error\": \"quota\"}");
        assert!(truncate_error_body(&"b".repeat(2000)).len() <= MAX_ERROR_BODY_LENGTH + 3);
    }

    #[test]
    fn test_redact_path_returns_filename() {
        assert_eq!(
            redact_path(Path::new("/tmp/work/job-1/worksheet.pdf")),
            "worksheet.pdf"
        );
        assert_eq!(redact_path(Path::new("/")), "<unknown>");
    }

    #[test]
    fn test_redact_url_query() {
        assert_eq!(
            redact_url_query("https://img.example/a.png?sig=secret"),
            "https://img.example/a.png"
        );
        assert_eq!(redact_url_query("https://img.example/a.png"), "https://img.example/a.png");
    }
}
