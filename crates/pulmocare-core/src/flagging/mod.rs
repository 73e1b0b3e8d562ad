//! Normal/abnormal flagging of lab results.
//!
//! Flags are a best-effort reading of heterogeneous report formats. Whenever a
//! value or range cannot be interpreted the result is flagged `Normal`; an
//! abnormal flag is only raised when a value is clearly outside a range that
//! parsed cleanly.
//!
//! Precedence per test:
//! 1. Missing value or range → Normal
//! 2. Non-numeric value → Normal
//! 3. Name-based rules: WBC, RBC (rescaled counts), triglycerides
//! 4. Generic `min-max`, `< max`, `> min`

mod analyte;
mod range;

pub use analyte::*;
pub use range::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::{Flag, MedicalTest};

/// Reasons a flag could not be computed. Never surfaced to callers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlagError {
    #[error("result value is missing")]
    MissingValue,

    #[error("normal range is missing")]
    MissingRange,

    #[error("result value is not numeric: {0}")]
    NonNumericValue(String),

    #[error("range bound is not numeric: {0}")]
    UnparsableBound(String),

    #[error("range format not recognised: {0}")]
    UnrecognisedRange(String),
}

/// Counts from one annotation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationSummary {
    pub normal: usize,
    pub abnormal: usize,
    /// Tests flagged Normal because their flag could not be computed
    pub defaulted: usize,
}

/// Compute a flag, reporting why it could not be determined.
pub fn evaluate_flag(
    test_name: &str,
    result_value: Option<&str>,
    normal_range: Option<&str>,
) -> Result<Flag, FlagError> {
    let raw_value = result_value
        .filter(|v| !v.trim().is_empty())
        .ok_or(FlagError::MissingValue)?;
    let range = normal_range
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or(FlagError::MissingRange)?;
    let value =
        parse_result(raw_value).ok_or_else(|| FlagError::NonNumericValue(raw_value.to_string()))?;

    let analyte = Analyte::from_test_name(test_name);
    if analyte.is_cell_count() {
        let (min, max) = min_max(range)?;
        let scaled = analyte.normalize_count(value);
        return Ok(ReferenceRange::Between { min, max }.classify(scaled));
    }

    match analyte {
        Analyte::Triglycerides => triglycerides_flag(value, range),
        _ => Ok(ReferenceRange::parse(range)?.classify(value)),
    }
}

/// Compute a flag, defaulting to `Normal` when it cannot be determined.
pub fn determine_flag(
    test_name: &str,
    result_value: Option<&str>,
    normal_range: Option<&str>,
) -> Flag {
    evaluate_flag(test_name, result_value, normal_range).unwrap_or_else(|reason| {
        debug!(test = test_name, %reason, "defaulting flag to Normal");
        Flag::Normal
    })
}

/// Set the flag on every test, overwriting any existing flag.
pub fn annotate_tests(tests: &mut [MedicalTest]) -> AnnotationSummary {
    let mut summary = AnnotationSummary::default();

    for test in tests.iter_mut() {
        let value = test.result_text();
        let flag = match evaluate_flag(&test.test_name, value.as_deref(), test.normal_range.as_deref())
        {
            Ok(flag) => flag,
            Err(reason) => {
                debug!(test = %test.test_name, %reason, "defaulting flag to Normal");
                summary.defaulted += 1;
                Flag::Normal
            }
        };

        match flag {
            Flag::Normal => summary.normal += 1,
            Flag::Abnormal => summary.abnormal += 1,
        }
        test.flag = flag;
    }

    summary
}

/// Triglycerides accept `min-max` or `< max`, with fallback bounds.
fn triglycerides_flag(value: f64, range: &str) -> Result<Flag, FlagError> {
    let parts: Vec<&str> = range.split('-').collect();
    if let [low, high] = parts.as_slice() {
        let min = leading_number(low).unwrap_or(TRIGLYCERIDES_DEFAULT_MIN);
        let max = leading_number(high).unwrap_or(TRIGLYCERIDES_DEFAULT_MAX);
        return Ok(ReferenceRange::Between { min, max }.classify(value));
    }

    if range.contains('<') {
        let max = leading_number(range).unwrap_or(TRIGLYCERIDES_DEFAULT_CEILING);
        return Ok(ReferenceRange::Below(max).classify(value));
    }

    Err(FlagError::UnrecognisedRange(range.to_string()))
}
