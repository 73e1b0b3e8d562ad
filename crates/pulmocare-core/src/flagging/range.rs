//! Numeric parsing for result values and reference ranges.

use super::FlagError;
use crate::models::Flag;

/// Keep only digits, `.` and `-` (e.g. "7,500 /uL" → "7500").
pub fn clean_numeric(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect()
}

/// Parse a result value after stripping everything non-numeric.
pub fn parse_result(text: &str) -> Option<f64> {
    let cleaned = clean_numeric(text);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// First run of digits and dots in `text`, as a number.
///
/// Unit suffixes after the number are ignored ("11.0 x10^3/uL" → 11.0).
pub fn leading_number(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit() || c == '.')?;
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// Split a `min-max` range into inclusive bounds.
///
/// Anything other than exactly two parts is rejected.
pub fn min_max(range: &str) -> Result<(f64, f64), FlagError> {
    let parts: Vec<&str> = range.split('-').collect();
    let [low, high] = parts.as_slice() else {
        return Err(FlagError::UnrecognisedRange(range.to_string()));
    };

    let min = leading_number(low).ok_or_else(|| FlagError::UnparsableBound(low.to_string()))?;
    let max = leading_number(high).ok_or_else(|| FlagError::UnparsableBound(high.to_string()))?;
    Ok((min, max))
}

/// A reference range in one of the notations reports use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReferenceRange {
    /// "min-max", inclusive
    Between { min: f64, max: f64 },
    /// "< max"
    Below(f64),
    /// "> min"
    Above(f64),
}

impl ReferenceRange {
    /// Parse a range, trying `min-max`, then `<`, then `>`.
    ///
    /// A range containing `-` is only ever read as `min-max`.
    pub fn parse(range: &str) -> Result<Self, FlagError> {
        if range.contains('-') {
            let (min, max) = min_max(range)?;
            return Ok(ReferenceRange::Between { min, max });
        }

        if range.contains('<') {
            let max =
                leading_number(range).ok_or_else(|| FlagError::UnparsableBound(range.to_string()))?;
            return Ok(ReferenceRange::Below(max));
        }

        if range.contains('>') {
            let min =
                leading_number(range).ok_or_else(|| FlagError::UnparsableBound(range.to_string()))?;
            return Ok(ReferenceRange::Above(min));
        }

        Err(FlagError::UnrecognisedRange(range.to_string()))
    }

    pub fn is_normal(&self, value: f64) -> bool {
        match *self {
            ReferenceRange::Between { min, max } => value >= min && value <= max,
            ReferenceRange::Below(max) => value < max,
            ReferenceRange::Above(min) => value > min,
        }
    }

    pub fn classify(&self, value: f64) -> Flag {
        if self.is_normal(value) {
            Flag::Normal
        } else {
            Flag::Abnormal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_numeric() {
        assert_eq!(clean_numeric("7,500 /uL"), "7500");
        assert_eq!(clean_numeric("-1.5 mEq"), "-1.5");
        assert_eq!(clean_numeric("Negative"), "");
    }

    #[test]
    fn test_parse_result() {
        assert_eq!(parse_result("110"), Some(110.0));
        assert_eq!(parse_result("1.2.3"), None);
        assert_eq!(parse_result("Positive"), None);
        assert_eq!(parse_result(" 98.6 F"), Some(98.6));
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("11.0 x10^3/uL"), Some(11.0));
        assert_eq!(leading_number("< 150 mg/dL"), Some(150.0));
        assert_eq!(leading_number(".5"), Some(0.5));
        assert_eq!(leading_number("none"), None);
    }

    #[test]
    fn test_parse_ranges() {
        assert_eq!(
            ReferenceRange::parse("70-100").unwrap(),
            ReferenceRange::Between { min: 70.0, max: 100.0 }
        );
        assert_eq!(
            ReferenceRange::parse("0.6 - 1.2 mg/dL").unwrap(),
            ReferenceRange::Between { min: 0.6, max: 1.2 }
        );
        assert_eq!(ReferenceRange::parse("<200").unwrap(), ReferenceRange::Below(200.0));
        assert_eq!(ReferenceRange::parse("> 60").unwrap(), ReferenceRange::Above(60.0));
    }

    #[test]
    fn test_parse_range_failures() {
        assert!(matches!(
            ReferenceRange::parse("-2-2"),
            Err(FlagError::UnrecognisedRange(_))
        ));
        assert!(matches!(
            ReferenceRange::parse("low-high"),
            Err(FlagError::UnparsableBound(_))
        ));
        assert!(matches!(
            ReferenceRange::parse("Negative"),
            Err(FlagError::UnrecognisedRange(_))
        ));
    }

    #[test]
    fn test_classify() {
        let between = ReferenceRange::Between { min: 70.0, max: 100.0 };
        assert_eq!(between.classify(70.0), Flag::Normal);
        assert_eq!(between.classify(100.0), Flag::Normal);
        assert_eq!(between.classify(100.1), Flag::Abnormal);

        assert_eq!(ReferenceRange::Below(150.0).classify(150.0), Flag::Abnormal);
        assert_eq!(ReferenceRange::Below(150.0).classify(149.0), Flag::Normal);
        assert_eq!(ReferenceRange::Above(60.0).classify(60.0), Flag::Abnormal);
        assert_eq!(ReferenceRange::Above(60.0).classify(61.0), Flag::Normal);
    }
}
