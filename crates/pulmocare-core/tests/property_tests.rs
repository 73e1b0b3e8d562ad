//! Property tests for extraction and flagging.
//!
//! - Flagging never panics and is deterministic for any input text
//! - Integer results are Normal exactly when they fall inside `min-max`
//! - A report, bare or wrapped, parses to the same tests

use proptest::prelude::*;
use serde_json::json;

use pulmocare_core::{determine_flag, parse_report, Flag};

fn report_json(names: &[String], values: &[u32]) -> String {
    let tests: Vec<_> = names
        .iter()
        .zip(values)
        .map(|(name, value)| {
            json!({
                "test_name": name,
                "result_value": value,
                "unit": "mg/dL",
                "normal_range": "10-100"
            })
        })
        .collect();

    json!({
        "metadata": {"patient_name": "Test Patient", "age": "30", "gender": "F", "date": "2024-01-01"},
        "tests": tests
    })
    .to_string()
}

fn wrap_fenced(report: &str) -> String {
    json!({
        "candidates": [{"content": {"parts": [{"text": format!("```json\n{}\n```", report)}]}}]
    })
    .to_string()
}

proptest! {
    #[test]
    fn prop_flagging_total(
        name in ".{0,30}",
        value in proptest::option::of(".{0,20}"),
        range in proptest::option::of(".{0,20}"),
    ) {
        let first = determine_flag(&name, value.as_deref(), range.as_deref());
        let second = determine_flag(&name, value.as_deref(), range.as_deref());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_integer_range(min in 0u32..500, width in 0u32..500, value in 0u32..1500) {
        let max = min + width;
        let range = format!("{}-{}", min, max);
        let expected = if value >= min && value <= max { Flag::Normal } else { Flag::Abnormal };

        prop_assert_eq!(
            determine_flag("Glucose", Some(value.to_string().as_str()), Some(range.as_str())),
            expected
        );
    }

    #[test]
    fn prop_missing_range_is_normal(name in "[A-Za-z ]{1,20}", value in 0u32..100_000) {
        prop_assert_eq!(determine_flag(&name, Some(value.to_string().as_str()), None), Flag::Normal);
    }

    #[test]
    fn prop_wrapping_preserves_tests(
        entries in proptest::collection::vec(("[A-Za-z ]{1,20}", 0u32..10_000), 1..8)
    ) {
        let (names, values): (Vec<String>, Vec<u32>) = entries.into_iter().unzip();
        let report = report_json(&names, &values);

        let bare = parse_report(&report).unwrap();
        let wrapped = parse_report(&wrap_fenced(&report)).unwrap();

        prop_assert_eq!(bare.tests.len(), names.len());
        prop_assert_eq!(bare.tests, wrapped.tests);
        prop_assert_eq!(bare.source_digest, wrapped.source_digest);
    }

    #[test]
    fn prop_parse_never_panics(raw in ".{0,200}") {
        let _ = parse_report(&raw);
    }
}
