//! Prediction backends: load an artifact once, predict many times.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::artifact::Artifact;
use super::{ClassifierOutput, ModelError};
use crate::features::FeatureVector;

/// A model ready for inference.
pub trait LoadedModel: Send + Sync {
    /// Run the model as a classifier.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Invalid`] if the model is not a classifier or
    /// inference fails.
    fn classify(&self, features: &FeatureVector) -> Result<ClassifierOutput, ModelError>;

    /// Run the model as a scalar regression.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Invalid`] if the model is not a regression or
    /// inference fails.
    fn regress(&self, features: &FeatureVector) -> Result<f64, ModelError>;
}

/// Loads artifacts from disk.
#[async_trait]
pub trait PredictionBackend: Send + Sync {
    /// Load the artifact at `path`.
    ///
    /// The caller has already checked that `path` exists.
    async fn load(&self, path: &Path) -> Result<Arc<dyn LoadedModel>, ModelError>;
}

/// Reads and parses the JSON artifact on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonModelBackend;

#[async_trait]
impl PredictionBackend for JsonModelBackend {
    async fn load(&self, path: &Path) -> Result<Arc<dyn LoadedModel>, ModelError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ModelError::Invalid(format!("failed to read {}: {e}", path.display()))
        })?;
        let artifact = Artifact::from_slice(&bytes)?;
        debug!(path = %path.display(), "model artifact loaded");
        Ok(Arc::new(artifact))
    }
}

/// Wraps a backend with a per-path cache of loaded models.
pub struct CachingBackend {
    inner: Arc<dyn PredictionBackend>,
    cache: DashMap<PathBuf, Arc<dyn LoadedModel>>,
}

impl CachingBackend {
    /// Cache models loaded through `inner`.
    pub fn new(inner: Arc<dyn PredictionBackend>) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }
}

#[async_trait]
impl PredictionBackend for CachingBackend {
    async fn load(&self, path: &Path) -> Result<Arc<dyn LoadedModel>, ModelError> {
        if let Some(model) = self.cache.get(path) {
            return Ok(Arc::clone(model.value()));
        }
        let model = self.inner.load(path).await?;
        self.cache.insert(path.to_path_buf(), Arc::clone(&model));
        Ok(model)
    }
}

impl std::fmt::Debug for CachingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingBackend")
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}
