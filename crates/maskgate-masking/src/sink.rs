//! Masking-event sink
//!
//! The persistent event store (admin dashboard, audit database) is an
//! external collaborator; the engine only needs somewhere to report
//! "category X was masked N times in content of type Y".

use crate::catalog::Category;
use crate::engine::MaskingOutcome;

/// Receiver for per-category masking counts
pub trait MaskingSink: Send + Sync {
    /// Record that `count` spans of `category` were masked in content whose
    /// subcategory (typically a file-extension hint) is `subcategory`.
    fn record(&self, category: Category, subcategory: &str, count: usize);
}

/// Default sink that emits structured log events
#[derive(Debug, Default)]
pub struct LogSink;

impl MaskingSink for LogSink {
    fn record(&self, category: Category, subcategory: &str, count: usize) {
        tracing::info!(
            category = category.as_str(),
            subcategory,
            count,
            "masking event"
        );
    }
}

/// Report every category in an outcome to the sink
pub fn report_outcome(sink: &dyn MaskingSink, outcome: &MaskingOutcome, subcategory: &str) {
    for (category, count) in &outcome.category_counts {
        sink.record(*category, subcategory, *count);
    }
}
