//! # Stage: Classifier Adapter
//!
//! ## Responsibility
//! Locate the prediction artifact for a rate group, load it through a
//! [`PredictionBackend`], and run inference on a [`FeatureVector`].
//! Also derives the entropy-based [`Confidence`] from the score vector.
//!
//! ## Guarantees
//! - Distinct errors for a missing model directory, a missing artifact and
//!   an artifact that cannot be loaded or executed
//! - Inference failure is an error value, never a panic
//! - Baseline backend reloads the artifact on every call; caching is opt-in
//!
//! ## NOT Responsible For
//! - Training or producing artifacts
//! - Deciding what to do with a low confidence (see: `routing`)
//!
//! [`FeatureVector`]: crate::features::FeatureVector

pub mod adapter;
pub mod artifact;
pub mod backend;
pub mod confidence;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use adapter::{ClassifierAdapter, ModelKind, ModelPaths};
pub use artifact::Artifact;
pub use backend::{CachingBackend, JsonModelBackend, LoadedModel, PredictionBackend};
pub use confidence::Confidence;

/// Errors raised while locating, loading or executing a model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The configured model directory does not exist.
    #[error("Model file path could not be found: {0}")]
    PathNotFound(String),

    /// The artifact for this rate group does not exist.
    #[error("Model file could not be found: {0}")]
    ArtifactNotFound(String),

    /// The artifact could not be loaded or failed during inference.
    #[error("Model Error: Invalid service prediction model. {0}")]
    Invalid(String),
}

impl ModelError {
    /// Short machine-readable label used for metrics and audit entries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PathNotFound(_) => "model_path_not_found",
            Self::ArtifactNotFound(_) => "model_artifact_not_found",
            Self::Invalid(_) => "model_invalid",
        }
    }
}

/// Result of running a classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierOutput {
    /// Label with the highest score.
    pub label: String,
    /// Probability per label, in artifact label order; sums to ≈1.
    pub scores: Vec<f64>,
}
