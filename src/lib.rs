//! # parcel-predict-engine
//!
//! Resolves which carrier service an inbound shipment should use, and what it
//! will cost, by combining a fast statistical classifier with an authoritative
//! (but expensive) rating call and a historical-data estimator.
//!
//! ## Architecture
//!
//! ```text
//! ShipmentRequest → FeatureBuilder(+LocaleClassifier) → ClassifierAdapter
//!     → Confidence → FallbackOrchestrator ─┬─ AuthoritativeRate (NATS request/reply)
//!                                          ├─ EstimateFromHistory (dataset scan)
//!                                          └─ AcceptClassifier
//!     → Finalize → ResultBuilder → PredictionResult
//! ```

// ── Lint policy ───────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![warn(missing_docs)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod audit;
pub mod config;
pub mod consumer;
pub mod cost;
pub mod engine;
pub mod features;
pub mod history;
pub mod locale;
pub mod metrics;
pub mod model;
pub mod rating;
pub mod request;
pub mod result;
pub mod routing;
pub mod web_api;

// Re-exports for convenience
pub use engine::PredictEngine;
pub use features::{FeatureBuilder, FeatureVector};
pub use request::{ShipmentRequest, ValidationError};
pub use result::PredictionResult;
pub use routing::FallbackOrchestrator;

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"`: structured JSON output for log aggregators
/// - anything else (including unset): human-readable pretty output
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).
///
/// # Errors
///
/// Returns [`PredictError::Other`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
pub fn init_tracing() -> Result<(), PredictError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    init_tracing_with_format(&format)
}

/// Initialise tracing with an explicit format (`"json"` or `"pretty"`).
///
/// The binary uses this so that `[observability] log_format` in the config
/// file applies when `LOG_FORMAT` is unset.
///
/// # Errors
///
/// Returns [`PredictError::Other`] if a global subscriber is already installed.
pub fn init_tracing_with_format(format: &str) -> Result<(), PredictError> {
    let result = match format {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| PredictError::Other(format!("tracing init failed: {e}")))
}

/// Top-level prediction errors.
///
/// Every subsystem error is wrapped here so handlers can map a single type
/// onto the HTTP error body.
#[derive(Error, Debug)]
pub enum PredictError {
    /// The request failed shape or content validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The prediction artifact could not be located, loaded, or executed.
    #[error(transparent)]
    Model(#[from] model::ModelError),

    /// The authoritative rating subsystem could not produce a result.
    #[error(transparent)]
    Rating(#[from] rating::RatingError),

    /// A reference table could not be read.
    #[error(transparent)]
    Store(#[from] locale::StoreError),

    /// A configuration value is missing or invalid.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Catch-all for errors that do not fit a specific variant.
    #[error("{0}")]
    Other(String),
}

impl PredictError {
    /// Short machine-readable label used for metrics and audit entries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Model(e) => e.kind(),
            Self::Rating(_) => "rating_unavailable",
            Self::Store(_) => "store",
            Self::ConfigError(_) => "config",
            Self::Other(_) => "other",
        }
    }
}
