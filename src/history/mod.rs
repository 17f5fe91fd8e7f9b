//! # Stage: Historical Match Engine
//!
//! ## Responsibility
//! Find a prior shipment in the rate group's historical dataset that used
//! the predicted service, went to the same postal prefix and weighed the
//! same rounded-up weight, and hand it back as a cheap cost/transit estimate.
//!
//! ## Guarantees
//! - Deterministic: the first matching row in file order always wins
//! - Tolerant: blank and malformed rows are skipped, never fatal
//! - Read-only: dataset files are never written
//!
//! ## NOT Responsible For
//! - Deciding whether an estimate is wanted (see: `routing`)
//! - Maintaining the datasets (external collaborator)

pub mod engine;
pub mod record;

use thiserror::Error;

pub use engine::HistoryMatcher;
pub use record::HistoricalRecord;

/// Errors raised while reading a historical dataset.
///
/// Both are degraded outcomes for the caller: the request continues with
/// zeroed estimate fields.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// No dataset file exists for the rate group.
    #[error("no historical dataset for rate group '{rate_group}' in {dir}")]
    DatasetMissing {
        /// Rate group looked up.
        rate_group: String,
        /// Directory searched.
        dir: String,
    },

    /// The dataset directory or file could not be read.
    #[error("failed to read historical data '{path}': {source}")]
    Io {
        /// Path being read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
