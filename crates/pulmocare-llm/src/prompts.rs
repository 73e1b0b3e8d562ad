//! Lab report parsing prompt and `generateContent` request construction.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::extraction::{Content, ExtractionError, ExtractionResult, InlineData, Part};

/// MIME type of uploaded reports.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Instruction sent alongside the PDF.
pub const REPORT_PROMPT: &str = r#"Here is a medical test PDF report (could be blood test, urinalysis, or other lab test). Please parse it and return the following:

A valid JSON with:
- "metadata": includes:
  - patient_name
  - age
  - gender
  - date
  - physician
- "tests": a list of tests, each with:
  - test_name (the name of the test)
  - result_value (just the numeric value if available, or null if it's qualitative like 'Negative')
  - unit (the unit of measurement, or null if not applicable)
  - normal_range (format as 'min-max' e.g. '0.6-1.2', or null if not available)

For non-numeric results like 'Negative', 'Positive', 'Clear', etc., set result_value to null and keep the qualitative result in the test_name.
If a value is not available, use null instead of empty string.
"#;

/// Sampling settings for report parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        // Low temperature keeps the output close to the document
        Self {
            temperature: 0.1,
            top_k: 32,
            top_p: 0.95,
            max_output_tokens: 2048,
        }
    }
}

/// `generateContent` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationSettings,
}

impl GenerateContentRequest {
    /// Serialize to the JSON body sent upstream.
    pub fn to_json(&self) -> ExtractionResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Build the request that asks the model to parse a PDF report.
pub fn build_pdf_request(
    pdf: &[u8],
    settings: &GenerationSettings,
) -> ExtractionResult<GenerateContentRequest> {
    if pdf.is_empty() {
        return Err(ExtractionError::InvalidInput("PDF document is empty".into()));
    }

    let parts = vec![
        Part {
            text: Some(REPORT_PROMPT.to_string()),
            inline_data: None,
        },
        Part {
            text: None,
            inline_data: Some(InlineData {
                mime_type: PDF_MIME_TYPE.to_string(),
                data: general_purpose::STANDARD.encode(pdf),
            }),
        },
    ];

    Ok(GenerateContentRequest {
        contents: vec![Content { parts, role: None }],
        generation_config: settings.clone(),
    })
}
