//! Report parsing pipeline.
//!
//! Pipeline: Extraction → Validation → Typed model → Flagging
//!
//! Every failure comes back as a labelled [`ReportError`] so the client can show
//! a retry prompt; per-test flag problems are absorbed by the annotator.

use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use pulmocare_llm::{ExtractionError, ResponseExtractor};

use crate::config::ParserConfig;
use crate::flagging::annotate_tests;
use crate::models::{MedicalTest, ParsedReport, ReportMetadata};
use crate::validation::{validate_report, ValidationError};

/// Report parsing errors.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Empty or incomplete API response")]
    EmptyResponse,

    #[error("API error: {0}")]
    UpstreamError(String),

    #[error("Could not extract report JSON: {0}")]
    ExtractionFailure(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ReportError {
    /// Stable label for clients and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ReportError::EmptyResponse => "empty_response",
            ReportError::UpstreamError(_) => "upstream_error",
            ReportError::ExtractionFailure(_) => "extraction_failure",
            ReportError::Validation(_) => "validation_error",
        }
    }
}

impl From<ExtractionError> for ReportError {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::Empty => ReportError::EmptyResponse,
            ExtractionError::Upstream(message) => ReportError::UpstreamError(message),
            ExtractionError::InvalidInput(message) => ReportError::ExtractionFailure(message),
            ExtractionError::Json(e) => ReportError::ExtractionFailure(e.to_string()),
        }
    }
}

pub type ReportResult<T> = Result<T, ReportError>;

/// Shape of the report JSON once it has passed validation.
#[derive(Deserialize)]
struct ReportBody {
    metadata: ReportMetadata,
    tests: Vec<MedicalTest>,
}

/// Turns raw upstream text into a flagged report.
#[derive(Debug, Clone, Default)]
pub struct ReportParser {
    extractor: ResponseExtractor,
}

impl ReportParser {
    /// Create a parser with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &ParserConfig) -> Self {
        Self {
            extractor: ResponseExtractor::with_min_response_len(config.min_response_len),
        }
    }

    /// Extract, validate and flag one upstream response.
    pub fn parse(&self, raw: &str) -> ReportResult<ParsedReport> {
        let json = self.extractor.extract(raw)?;

        let value: Value = serde_json::from_str(&json).map_err(|e| {
            warn!(error = %e, "extracted text is not valid JSON");
            ReportError::ExtractionFailure(e.to_string())
        })?;

        if let Err(e) = validate_report(&value) {
            warn!(error = %e, "report failed validation");
            return Err(e.into());
        }

        let body: ReportBody = serde_json::from_value(value).map_err(|e| {
            warn!(error = %e, "report does not match the expected model");
            ReportError::ExtractionFailure(e.to_string())
        })?;

        let mut tests = body.tests;
        let summary = annotate_tests(&mut tests);
        let source_digest = digest(&json);

        info!(
            digest = %source_digest,
            tests = tests.len(),
            abnormal = summary.abnormal,
            defaulted = summary.defaulted,
            "parsed report"
        );

        Ok(ParsedReport {
            report_id: uuid::Uuid::new_v4().to_string(),
            parsed_at: chrono::Utc::now().to_rfc3339(),
            source_digest,
            metadata: body.metadata,
            tests,
        })
    }
}

/// Parse a response with default settings.
pub fn parse_report(raw: &str) -> ReportResult<ParsedReport> {
    ReportParser::new().parse(raw)
}

fn digest(json: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    hex::encode(hasher.finalize())
}
