//! Domain models for lab report parsing.

mod report;

pub use report::*;
