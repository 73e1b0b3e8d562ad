//! PulmoCare Core Library
//!
//! Turns the raw text a generative-AI API returns for an uploaded lab report
//! into a validated report with every result flagged Normal or Abnormal.
//!
//! # Architecture
//!
//! ```text
//! PDF upload → generateContent (upstream) → raw response text
//!                                                 │
//!                                     ┌───────────▼───────────┐
//!                                     │      Extraction       │
//!                                     │  envelope / fenced /  │
//!                                     │  embedded JSON        │
//!                                     └───────────┬───────────┘
//!                                                 │
//!                                            Validation
//!                                      (tests + metadata keys)
//!                                                 │
//!                                             Flagging
//!                                   (ranges, WBC/RBC scaling, TG)
//!                                                 │
//!                                    ParsedReport (memory only)
//! ```
//!
//! # Core Principle
//!
//! **Ambiguity defaults to Normal.** A result is only flagged Abnormal when both
//! the value and its reference range were read unambiguously.
//!
//! # Modules
//!
//! - [`models`]: Domain types (MedicalTest, ReportMetadata, ParsedReport)
//! - [`validation`]: Required-field check on the extracted JSON
//! - [`flagging`]: Normal/abnormal rules
//! - [`report`]: The end-to-end parsing pipeline
//! - [`config`]: Parser configuration
//! - [`retry`]: Backoff schedule for the upstream request

pub mod config;
pub mod flagging;
pub mod models;
pub mod report;
pub mod retry;
pub mod validation;

// Re-export commonly used types
pub use config::{ConfigError, ParserConfig};
pub use flagging::{annotate_tests, determine_flag, evaluate_flag, AnnotationSummary, FlagError};
pub use models::{Flag, MedicalTest, ParsedReport, ReportMetadata, ResultValue, TestFilter};
pub use report::{parse_report, ReportError, ReportParser, ReportResult};
pub use retry::RetryPolicy;
pub use validation::{validate_report, ValidationError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use pulmocare_llm::{build_pdf_request, ExtractionError, GenerationSettings};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum PulmoCareError {
    #[error("Empty response: {0}")]
    EmptyResponse(String),

    #[error("Upstream error: {0}")]
    UpstreamError(String),

    #[error("Extraction failure: {0}")]
    ExtractionFailure(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Session error: {0}")]
    SessionError(String),
}

impl From<ReportError> for PulmoCareError {
    fn from(e: ReportError) -> Self {
        let message = e.to_string();
        match e {
            ReportError::EmptyResponse => PulmoCareError::EmptyResponse(message),
            ReportError::UpstreamError(_) => PulmoCareError::UpstreamError(message),
            ReportError::ExtractionFailure(_) => PulmoCareError::ExtractionFailure(message),
            ReportError::Validation(_) => PulmoCareError::ValidationError(message),
        }
    }
}

impl From<ExtractionError> for PulmoCareError {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::InvalidInput(message) => PulmoCareError::InvalidInput(message),
            other => ReportError::from(other).into(),
        }
    }
}

impl From<ConfigError> for PulmoCareError {
    fn from(e: ConfigError) -> Self {
        PulmoCareError::ConfigError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for PulmoCareError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        PulmoCareError::SessionError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Functions (exported to FFI)
// =========================================================================

/// Parse one upstream response into a flagged report.
#[uniffi::export]
pub fn parse_report_response(raw: String) -> Result<FfiParsedReport, PulmoCareError> {
    Ok(parse_report(&raw)?.into())
}

/// Flag a single result ("Normal" or "Abnormal").
#[uniffi::export]
pub fn determine_test_flag(
    test_name: String,
    result_value: Option<String>,
    normal_range: Option<String>,
) -> String {
    determine_flag(&test_name, result_value.as_deref(), normal_range.as_deref()).to_string()
}

/// Build the JSON body asking the model to parse a PDF report.
#[uniffi::export]
pub fn build_report_request_json(pdf_bytes: Vec<u8>) -> Result<String, PulmoCareError> {
    let request = build_pdf_request(&pdf_bytes, &GenerationSettings::default())?;
    Ok(request.to_json()?)
}

/// Create a session, optionally configured from a JSON string.
#[uniffi::export]
pub fn new_report_session(
    config_json: Option<String>,
) -> Result<Arc<ReportSession>, PulmoCareError> {
    let config = match config_json {
        Some(json) => ParserConfig::from_json_str(&json)?,
        None => ParserConfig::default(),
    };
    Ok(Arc::new(ReportSession::new(config)))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Holds the report for the current screen. Nothing is written to disk.
#[derive(uniffi::Object)]
pub struct ReportSession {
    parser: ReportParser,
    retry: RetryPolicy,
    current: Mutex<Option<ParsedReport>>,
}

impl ReportSession {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            parser: ReportParser::with_config(&config),
            retry: config.retry,
            current: Mutex::new(None),
        }
    }
}

#[uniffi::export]
impl ReportSession {
    /// Parse a response and make it the current report.
    ///
    /// On failure the previous report is discarded.
    pub fn load(&self, raw: String) -> Result<FfiParsedReport, PulmoCareError> {
        let mut current = self.current.lock()?;
        match self.parser.parse(&raw) {
            Ok(report) => {
                let ffi = FfiParsedReport::from(report.clone());
                *current = Some(report);
                Ok(ffi)
            }
            Err(e) => {
                *current = None;
                Err(e.into())
            }
        }
    }

    /// The current report, if one is loaded.
    pub fn current(&self) -> Result<Option<FfiParsedReport>, PulmoCareError> {
        let current = self.current.lock()?;
        Ok(current.clone().map(Into::into))
    }

    /// Tests of the current report matching a search query and flag filter.
    pub fn filtered_tests(
        &self,
        query: String,
        filter: FfiTestFilter,
    ) -> Result<Vec<FfiMedicalTest>, PulmoCareError> {
        let current = self.current.lock()?;
        let report = current
            .as_ref()
            .ok_or_else(|| PulmoCareError::SessionError("No report loaded".into()))?;
        Ok(report
            .filter_tests(&query, filter.into())
            .into_iter()
            .cloned()
            .map(Into::into)
            .collect())
    }

    pub fn abnormal_count(&self) -> Result<u32, PulmoCareError> {
        let current = self.current.lock()?;
        Ok(current.as_ref().map_or(0, |r| r.abnormal_count() as u32))
    }

    /// Drop the current report (e.g. when leaving the screen).
    pub fn clear(&self) -> Result<(), PulmoCareError> {
        *self.current.lock()? = None;
        Ok(())
    }

    /// Backoff before each retry of the upstream request, in milliseconds.
    pub fn retry_delays_ms(&self) -> Vec<u64> {
        self.retry
            .delays()
            .into_iter()
            .map(|d| d.as_millis() as u64)
            .collect()
    }

    /// Whether to retry after `attempt` (1-based) failed with `error_message`.
    pub fn should_retry(&self, attempt: u32, error_message: String) -> bool {
        self.retry.should_retry(attempt, &error_message)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe flag filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiTestFilter {
    All,
    Normal,
    Abnormal,
}

impl From<FfiTestFilter> for TestFilter {
    fn from(filter: FfiTestFilter) -> Self {
        match filter {
            FfiTestFilter::All => TestFilter::All,
            FfiTestFilter::Normal => TestFilter::Normal,
            FfiTestFilter::Abnormal => TestFilter::Abnormal,
        }
    }
}

/// FFI-safe test result.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiMedicalTest {
    pub test_name: String,
    pub result_value: Option<String>,
    pub unit: Option<String>,
    pub normal_range: Option<String>,
    pub flag: String,
}

impl From<MedicalTest> for FfiMedicalTest {
    fn from(test: MedicalTest) -> Self {
        Self {
            result_value: test.result_text(),
            flag: test.flag.to_string(),
            test_name: test.test_name,
            unit: test.unit,
            normal_range: test.normal_range,
        }
    }
}

/// FFI-safe report metadata.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiReportMetadata {
    pub patient_name: String,
    pub age: String,
    pub gender: String,
    pub date: String,
    pub physician: String,
}

impl From<ReportMetadata> for FfiReportMetadata {
    fn from(metadata: ReportMetadata) -> Self {
        Self {
            patient_name: metadata.patient_name,
            age: metadata.age,
            gender: metadata.gender,
            date: metadata.date,
            physician: metadata.physician,
        }
    }
}

/// FFI-safe parsed report.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiParsedReport {
    pub report_id: String,
    pub parsed_at: String,
    pub source_digest: String,
    pub metadata: FfiReportMetadata,
    pub tests: Vec<FfiMedicalTest>,
    pub abnormal_count: u32,
}

impl From<ParsedReport> for FfiParsedReport {
    fn from(report: ParsedReport) -> Self {
        Self {
            abnormal_count: report.abnormal_count() as u32,
            report_id: report.report_id,
            parsed_at: report.parsed_at,
            source_digest: report.source_digest,
            metadata: report.metadata.into(),
            tests: report.tests.into_iter().map(Into::into).collect(),
        }
    }
}
