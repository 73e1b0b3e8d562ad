//! Lab report models.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Normal/abnormal classification of a single result.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Flag {
    #[default]
    Normal,
    Abnormal,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Normal => "Normal",
            Flag::Abnormal => "Abnormal",
        }
    }

    pub fn is_abnormal(&self) -> bool {
        matches!(self, Flag::Abnormal)
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A result value as reported: numeric or free text.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ResultValue {
    /// Kept as a JSON number so integers print without a decimal point
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultValue::Number(n) => write!(f, "{}", n),
            ResultValue::Text(s) => f.write_str(s),
        }
    }
}

/// A single lab test from a parsed report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicalTest {
    /// Test name as printed on the report (e.g., "WBC", "Fasting Glucose")
    #[serde(default, deserialize_with = "lenient_string")]
    pub test_name: String,
    /// Measured value; None for qualitative or missing results
    #[serde(default, deserialize_with = "result_value")]
    pub result_value: Option<ResultValue>,
    /// Unit of measurement (e.g., "mg/dL")
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub unit: Option<String>,
    /// Reference range text (e.g., "70-100", "<150", "> 60")
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub normal_range: Option<String>,
    /// Derived by the annotator; any incoming value is overwritten
    #[serde(default)]
    pub flag: Flag,
}

impl MedicalTest {
    /// Create a test with no flag computed yet.
    pub fn new(
        test_name: impl Into<String>,
        result_value: Option<ResultValue>,
        unit: Option<String>,
        normal_range: Option<String>,
    ) -> Self {
        Self {
            test_name: test_name.into(),
            result_value,
            unit,
            normal_range,
            flag: Flag::Normal,
        }
    }

    /// Result value rendered as text, if any.
    ///
    /// Very large or small numbers render in exponent form ("1e21"), which the
    /// flagger reads digit by digit. Lab values never reach that magnitude.
    pub fn result_text(&self) -> Option<String> {
        self.result_value.as_ref().map(ToString::to_string)
    }

    /// Case-insensitive match against the test name or printed result.
    pub fn matches_query(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        self.test_name.to_lowercase().contains(&query)
            || self
                .result_text()
                .is_some_and(|v| v.to_lowercase().contains(&query))
    }
}

/// Report header fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportMetadata {
    #[serde(default, deserialize_with = "lenient_string")]
    pub patient_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub age: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub gender: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub physician: String,
}

/// Which tests to show.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum TestFilter {
    #[default]
    All,
    Normal,
    Abnormal,
}

impl TestFilter {
    pub fn accepts(&self, flag: Flag) -> bool {
        match self {
            TestFilter::All => true,
            TestFilter::Normal => flag == Flag::Normal,
            TestFilter::Abnormal => flag == Flag::Abnormal,
        }
    }
}

/// A validated, flagged report. Lives only for the viewing session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedReport {
    /// Unique per parse (UUID v4)
    pub report_id: String,
    /// RFC 3339 timestamp of when the report was parsed
    pub parsed_at: String,
    /// SHA-256 of the extracted JSON (hex)
    pub source_digest: String,
    pub metadata: ReportMetadata,
    pub tests: Vec<MedicalTest>,
}

impl ParsedReport {
    pub fn abnormal_tests(&self) -> impl Iterator<Item = &MedicalTest> {
        self.tests.iter().filter(|t| t.flag.is_abnormal())
    }

    pub fn abnormal_count(&self) -> usize {
        self.abnormal_tests().count()
    }

    /// Tests matching both the search query and the flag filter.
    pub fn filter_tests(&self, query: &str, filter: TestFilter) -> Vec<&MedicalTest> {
        self.tests
            .iter()
            .filter(|t| filter.accepts(t.flag) && t.matches_query(query))
            .collect()
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Render a JSON value as text; null has no text.
fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_string(value).unwrap_or_default())
}

fn lenient_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_string(value))
}

fn result_value<'de, D>(deserializer: D) -> Result<Option<ResultValue>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => Some(ResultValue::Number(n)),
        other => value_to_string(other).map(ResultValue::Text),
    })
}
