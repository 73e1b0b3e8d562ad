//! Analytes that need special handling before range comparison.
//!
//! Cell counts arrive in whatever unit the lab printed (cells/µL, thousands/µL,
//! millions/µL) while ranges are almost always in thousands (WBC) or millions
//! (RBC). Triglyceride ranges are often written as an upper limit only.

/// Analyte family, detected from the test name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analyte {
    WhiteBloodCells,
    RedBloodCells,
    Triglycerides,
    Other,
}

/// (family, name fragments), checked in order.
const NAME_PATTERNS: &[(Analyte, &[&str])] = &[
    (Analyte::WhiteBloodCells, &["wbc", "white blood cell"]),
    (Analyte::RedBloodCells, &["rbc", "red blood cell"]),
    (Analyte::Triglycerides, &["triglycerides", "tg"]),
];

/// Triglyceride bounds used when a range bound cannot be read.
pub const TRIGLYCERIDES_DEFAULT_MIN: f64 = 35.0;
pub const TRIGLYCERIDES_DEFAULT_MAX: f64 = 135.0;
pub const TRIGLYCERIDES_DEFAULT_CEILING: f64 = 150.0;

impl Analyte {
    /// Classify a test by case-insensitive substring match on its name.
    pub fn from_test_name(test_name: &str) -> Self {
        let lower = test_name.to_lowercase();
        NAME_PATTERNS
            .iter()
            .find(|(_, fragments)| fragments.iter().any(|f| lower.contains(f)))
            .map(|(analyte, _)| *analyte)
            .unwrap_or(Analyte::Other)
    }

    /// Whether the value must be rescaled before comparison.
    pub fn is_cell_count(&self) -> bool {
        matches!(self, Analyte::WhiteBloodCells | Analyte::RedBloodCells)
    }

    /// Rescale a count to the unit ranges are written in.
    ///
    /// WBC → thousands/µL, RBC → millions/µL. Other analytes are unchanged.
    pub fn normalize_count(&self, value: f64) -> f64 {
        match self {
            Analyte::WhiteBloodCells if value >= 1_000.0 => value / 1_000.0,
            Analyte::RedBloodCells if value >= 1_000_000.0 => value / 1_000_000.0,
            Analyte::RedBloodCells if value >= 1_000.0 => value / 1_000.0,
            _ => value,
        }
    }
}
