//! Required-shape check for extracted report JSON.

use serde_json::Value;
use thiserror::Error;

/// Metadata keys every report must carry.
pub const REQUIRED_METADATA_FIELDS: [&str; 4] = ["patient_name", "age", "gender", "date"];

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid JSON format: report is not a JSON object")]
    NotAnObject,

    #[error("Invalid JSON format: 'tests' field is missing")]
    MissingTests,

    #[error("Invalid JSON format: 'tests' field is empty or not an array")]
    EmptyTests,

    #[error("Invalid JSON format: test entry {index} is not an object")]
    InvalidTestEntry { index: usize },

    #[error("Invalid JSON format: 'metadata' field is missing")]
    MissingMetadata,

    #[error("Invalid JSON format: metadata is missing required fields: {}", .0.join(", "))]
    MissingMetadataFields(Vec<&'static str>),
}

/// Reject a report lacking `tests` or the required `metadata` keys.
pub fn validate_report(report: &Value) -> Result<(), ValidationError> {
    let object = report.as_object().ok_or(ValidationError::NotAnObject)?;

    let tests = object.get("tests").ok_or(ValidationError::MissingTests)?;
    let tests = tests
        .as_array()
        .filter(|tests| !tests.is_empty())
        .ok_or(ValidationError::EmptyTests)?;

    if let Some(index) = tests.iter().position(|t| !t.is_object()) {
        return Err(ValidationError::InvalidTestEntry { index });
    }

    let metadata = object.get("metadata").ok_or(ValidationError::MissingMetadata)?;
    let missing: Vec<&'static str> = match metadata.as_object() {
        Some(fields) => REQUIRED_METADATA_FIELDS
            .into_iter()
            .filter(|key| !fields.contains_key(*key))
            .collect(),
        None => REQUIRED_METADATA_FIELDS.to_vec(),
    };

    if !missing.is_empty() {
        return Err(ValidationError::MissingMetadataFields(missing));
    }

    Ok(())
}
