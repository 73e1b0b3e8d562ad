//! Report JSON extraction from generative-AI output.
//!
//! The upstream text may be a bare report object, a `generateContent` envelope
//! whose first part carries the model's text, a markdown fenced block, or free
//! text with a JSON object somewhere inside it. [`ResponseExtractor::extract`]
//! tries each shape in a fixed order and returns the best JSON candidate. It
//! does not validate the report itself; that happens downstream.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Extraction errors.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Empty or incomplete API response")]
    Empty,

    #[error("API error: {0}")]
    Upstream(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Responses shorter than this are rejected without further parsing.
pub const MIN_RESPONSE_LEN: usize = 10;

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(.+?)\s*```").expect("fenced block pattern"));

/// `generateContent` response envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// One generated candidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

/// Content block, shared by requests and responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// A single content part: either text or inline binary data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

/// Base64 payload with its MIME type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl GenerateContentResponse {
    /// Text of `candidates[0].content.parts[0]`, if present.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

/// Extracts the report JSON from raw upstream text.
#[derive(Debug, Clone)]
pub struct ResponseExtractor {
    min_response_len: usize,
}

impl Default for ResponseExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseExtractor {
    /// Create an extractor with the default length threshold.
    pub fn new() -> Self {
        Self {
            min_response_len: MIN_RESPONSE_LEN,
        }
    }

    /// Create an extractor with a custom length threshold.
    pub fn with_min_response_len(min_response_len: usize) -> Self {
        Self { min_response_len }
    }

    pub fn min_response_len(&self) -> usize {
        self.min_response_len
    }

    /// Return the JSON text believed to hold the report.
    ///
    /// Only fails for an empty response or an explicit upstream error object.
    /// Every other input yields a best-effort string, falling back to the raw
    /// input unchanged.
    pub fn extract(&self, raw: &str) -> ExtractionResult<String> {
        if raw.trim().is_empty() || raw.chars().count() < self.min_response_len {
            warn!(len = raw.len(), "response is too short or empty");
            return Err(ExtractionError::Empty);
        }

        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            if let Some(object) = value.as_object() {
                if object.contains_key("tests") && object.contains_key("metadata") {
                    debug!("response is a bare report object");
                    return Ok(raw.to_string());
                }

                if let Some(error) = object.get("error") {
                    let message = upstream_error_message(error);
                    warn!(%message, "upstream returned an error");
                    return Err(ExtractionError::Upstream(message));
                }

                if object.contains_key("candidates") {
                    if let Some(text) = wrapped_text(&value) {
                        debug!("unwrapping candidate text");
                        return Ok(
                            extract_from_text(&text).unwrap_or_else(|| text.trim().to_string())
                        );
                    }
                    debug!("candidates envelope without text, trying other methods");
                }
            }
        }

        if let Some(json) = extract_from_text(raw) {
            return Ok(json);
        }

        if raw.contains("\"tests\"") && raw.contains("\"metadata\"") {
            debug!("found tests and metadata keys, taking outermost braces");
            if let Some(json) = outermost_object(raw) {
                return Ok(json.to_string());
            }
        }

        debug!("could not extract JSON, returning raw response");
        Ok(raw.to_string())
    }
}

/// Extract the report JSON using the default extractor.
pub fn extract_report_json(raw: &str) -> ExtractionResult<String> {
    ResponseExtractor::new().extract(raw)
}

/// Fenced block, then first parseable object, then an already-braced body.
fn extract_from_text(text: &str) -> Option<String> {
    if let Some(fenced) = fenced_json(text) {
        debug!("found JSON in markdown code block");
        return Some(fenced.to_string());
    }

    if let Some(object) = first_json_object(text) {
        debug!("found JSON object in response text");
        return Some(object.to_string());
    }

    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        debug!("response is already brace-delimited");
        return Some(trimmed.to_string());
    }

    None
}

/// Trimmed body of the first ```` ```json ```` block, if non-blank.
pub fn fenced_json(text: &str) -> Option<&str> {
    let body = FENCED_JSON.captures(text)?.get(1)?.as_str().trim();
    (!body.is_empty()).then_some(body)
}

/// First `{...}` span that parses as JSON.
pub fn first_json_object(text: &str) -> Option<&str> {
    let mut spans = balanced_spans(text);
    spans.sort_unstable_by_key(|&(start, _)| start);

    spans
        .into_iter()
        .map(|(start, end)| &text[start..=end])
        .find(|candidate| serde_json::from_str::<Value>(candidate).is_ok())
}

/// Byte offsets of every balanced `{`/`}` pair, found in a single pass.
///
/// Braces inside string literals are ignored. Quotes only open a string once
/// a brace is open, so stray quotes in surrounding prose do not count.
fn balanced_spans(text: &str) -> Vec<(usize, usize)> {
    let mut open = Vec::new();
    let mut spans = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in text.as_bytes().iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match b {
            b'"' if !open.is_empty() => in_string = true,
            b'{' => open.push(i),
            b'}' => {
                if let Some(start) = open.pop() {
                    spans.push((start, i));
                }
            }
            _ => {}
        }
    }

    spans
}

/// Span from the first `{` to the last `}`, if it parses.
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }

    let candidate = &text[start..=end];
    match serde_json::from_str::<Value>(candidate) {
        Ok(_) => Some(candidate),
        Err(e) => {
            debug!(error = %e, "outermost braces are not valid JSON");
            None
        }
    }
}

fn wrapped_text(value: &Value) -> Option<String> {
    let response: GenerateContentResponse = serde_json::from_value(value.clone()).ok()?;
    response.first_text().map(str::to_owned)
}

fn upstream_error_message(error: &Value) -> String {
    match error {
        Value::Object(object) => object
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown API error")
            .to_string(),
        Value::String(message) => message.clone(),
        _ => "Unknown API error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const REPORT: &str = r#"{"metadata":{"patient_name":"Jane Doe","age":"45","gender":"F","date":"2024-03-01","physician":"Dr. Lee"},"tests":[{"test_name":"Glucose","result_value":110,"unit":"mg/dL","normal_range":"70-100"}]}"#;

    fn wrap(text: &str) -> String {
        serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]
        })
        .to_string()
    }

    #[test]
    fn test_bare_report_returned_unchanged() {
        let raw = format!("  {}\n", REPORT);
        assert_eq!(extract_report_json(&raw).unwrap(), raw);
    }

    #[test]
    fn test_wrapped_fenced_block() {
        let raw = wrap(&format!("```json\n{}\n```", REPORT));
        assert_eq!(extract_report_json(&raw).unwrap(), REPORT);
    }

    #[test]
    fn test_wrapped_plain_text() {
        let raw = wrap(&format!("Here is the report:\n{}\nThanks", REPORT));
        assert_eq!(extract_report_json(&raw).unwrap(), REPORT);
    }

    #[test]
    fn test_upstream_error_fails_fast() {
        let raw = r#"{"error":{"code":429,"message":"quota exceeded"}}"#;
        let err = extract_report_json(raw).unwrap_err();
        assert!(matches!(err, ExtractionError::Upstream(_)));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_upstream_error_without_message() {
        let err = extract_report_json(r#"{"error": 503, "status": "x"}"#).unwrap_err();
        assert_eq!(err.to_string(), "API error: Unknown API error");
    }

    #[test]
    fn test_empty_response() {
        assert!(matches!(extract_report_json(""), Err(ExtractionError::Empty)));
        assert!(matches!(extract_report_json("   \n  "), Err(ExtractionError::Empty)));
        assert!(matches!(extract_report_json("{\"a\":1}"), Err(ExtractionError::Empty)));
    }

    #[test]
    fn test_custom_min_length() {
        let extractor = ResponseExtractor::with_min_response_len(3);
        assert_eq!(extractor.extract("{\"a\":1}").unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_fenced_block_in_plain_text() {
        let raw = format!("Sure!\n```json\n  {}  \n```\nAnything else?", REPORT);
        assert_eq!(extract_report_json(&raw).unwrap(), REPORT);
    }

    #[test]
    fn test_blank_fenced_block_falls_through() {
        let raw = format!("```json\n   \n``` then {}", REPORT);
        assert_eq!(extract_report_json(&raw).unwrap(), REPORT);
    }

    #[test]
    fn test_nested_object_in_prose() {
        let raw = r#"Result: {"a": {"b": 1}, "c": "}"} trailing"#;
        assert_eq!(
            extract_report_json(raw).unwrap(),
            r#"{"a": {"b": 1}, "c": "}"}"#
        );
    }

    #[test]
    fn test_skips_unparseable_leading_braces() {
        let raw = r#"note {not json} then {"ok": true}"#;
        assert_eq!(extract_report_json(raw).unwrap(), r#"{"ok": true}"#);
    }

    #[test]
    fn test_brace_delimited_but_invalid() {
        let raw = "  {tests: [1, 2], metadata: none}  ";
        assert_eq!(
            extract_report_json(raw).unwrap(),
            "{tests: [1, 2], metadata: none}"
        );
    }

    #[test]
    fn test_unrecognised_text_returned_raw() {
        let raw = "The document could not be read.";
        assert_eq!(extract_report_json(raw).unwrap(), raw);
    }

    #[test]
    fn test_empty_candidates_falls_back() {
        let raw = r#"{"candidates": [], "usageMetadata": {}}"#;
        assert_eq!(extract_report_json(raw).unwrap(), raw);
    }

    #[test]
    fn test_balanced_spans_handle_escapes() {
        let text = r#"{"a": "quote \" and brace }"}"#;
        assert_eq!(balanced_spans(text), vec![(0, text.len() - 1)]);
        assert!(balanced_spans("{ unclosed").is_empty());
        assert_eq!(balanced_spans("x{{}} }"), vec![(2, 3), (1, 4)]);
    }

    #[test]
    fn test_long_unbalanced_prefix() {
        let raw = format!("{}{}", "{".repeat(100_000), REPORT);
        assert_eq!(extract_report_json(&raw).unwrap(), REPORT);

        let raw = "{".repeat(100_000);
        assert_eq!(extract_report_json(&raw).unwrap(), raw);
    }

    #[test]
    fn test_first_text() {
        let response: GenerateContentResponse =
            serde_json::from_str(&wrap("hello")).unwrap();
        assert_eq!(response.first_text(), Some("hello"));

        let empty = GenerateContentResponse::default();
        assert_eq!(empty.first_text(), None);
    }

    fn report_with(names: &[String]) -> String {
        let tests: Vec<Value> = names
            .iter()
            .map(|name| serde_json::json!({"test_name": name, "result_value": 5, "normal_range": "1-10"}))
            .collect();
        serde_json::json!({
            "metadata": {"patient_name": "Test Patient", "age": "30", "gender": "F", "date": "2024-01-01"},
            "tests": tests
        })
        .to_string()
    }

    proptest! {
        #[test]
        fn prop_bare_report_extracts_unchanged(
            names in proptest::collection::vec("[A-Za-z {}]{1,20}", 1..8)
        ) {
            let report = report_with(&names);
            prop_assert_eq!(extract_report_json(&report).unwrap(), report);
        }

        #[test]
        fn prop_wrapped_fence_extracts_inner_report(
            names in proptest::collection::vec("[A-Za-z {}]{1,20}", 1..8)
        ) {
            let report = report_with(&names);
            let raw = wrap(&format!("```json\n{}\n```", report));
            prop_assert_eq!(extract_report_json(&raw).unwrap(), report);
        }

        #[test]
        fn prop_report_found_in_prose(
            prefix in "[A-Za-z .,:]{0,40}",
            names in proptest::collection::vec("[A-Za-z {}]{1,20}", 1..8)
        ) {
            let report = report_with(&names);
            let raw = format!("{}\n{}\nDone.", prefix, report);
            prop_assert_eq!(extract_report_json(&raw).unwrap(), report);
        }
    }
}
