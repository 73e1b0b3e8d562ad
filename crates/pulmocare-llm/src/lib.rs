//! Generative-AI side of lab report parsing.
//!
//! This crate builds the `generateContent` request that asks the model to read
//! a PDF lab report, and pulls the report JSON back out of whatever text the
//! model returns.

pub mod prompts;
pub mod extraction;

pub use extraction::*;
pub use prompts::*;
