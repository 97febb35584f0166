//! maskgate masking
//!
//! Content classification and redaction for conversational payloads.
//!
//! This crate provides:
//! - A declarative catalog of sensitive-content categories and matchers
//! - A content classifier (code / business document / technical document)
//! - The redaction engine that masks sensitive spans and extracts context
//!   clues for the upstream model
//!
//! Everything here is a pure function of its input text: no shared state,
//! safe to call concurrently from any number of request handlers.

pub mod catalog;
pub mod clues;
pub mod engine;
pub mod profile;
pub mod sink;

pub use catalog::{Category, PatternCatalog, PatternRule};
pub use engine::{advisory_preamble, personal_mode_notice, Masker, MaskingOutcome};
pub use profile::{ContentProfile, ContentProfiler};
pub use sink::{report_outcome, LogSink, MaskingSink};
