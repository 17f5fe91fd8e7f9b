//! Resolves artifact paths and runs inference through a backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error};

use super::backend::PredictionBackend;
use super::{ClassifierOutput, ModelError};
use crate::features::FeatureVector;
use crate::metrics;

/// Which model family to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Base service classifier, `{base}/{rateGroup}.zip`.
    Base,
    /// Dedicated service classifier, `{service}/{rateGroup}.zip`.
    Service,
    /// Cost regression, `{cost}/{rateGroup}_COST.zip`.
    Cost,
}

/// Directories holding each model family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    /// Base model directory.
    pub base_dir: PathBuf,
    /// Service model directory.
    pub service_dir: PathBuf,
    /// Cost model directory.
    pub cost_dir: PathBuf,
}

impl ModelPaths {
    /// Directory for `kind`.
    pub fn dir(&self, kind: ModelKind) -> &Path {
        match kind {
            ModelKind::Base => &self.base_dir,
            ModelKind::Service => &self.service_dir,
            ModelKind::Cost => &self.cost_dir,
        }
    }

    /// Artifact path for `kind` and `rate_group`.
    pub fn artifact(&self, kind: ModelKind, rate_group: &str) -> PathBuf {
        let file = match kind {
            ModelKind::Cost => format!("{rate_group}_COST.zip"),
            ModelKind::Base | ModelKind::Service => format!("{rate_group}.zip"),
        };
        self.dir(kind).join(file)
    }
}

/// Locates and executes prediction artifacts.
#[derive(Clone)]
pub struct ClassifierAdapter {
    paths: ModelPaths,
    backend: Arc<dyn PredictionBackend>,
}

impl ClassifierAdapter {
    /// Create an adapter over `paths` loading through `backend`.
    pub fn new(paths: ModelPaths, backend: Arc<dyn PredictionBackend>) -> Self {
        Self { paths, backend }
    }

    /// Configured model directories.
    pub fn paths(&self) -> &ModelPaths {
        &self.paths
    }

    /// Predict a service label for `features`.
    ///
    /// # Errors
    ///
    /// - [`ModelError::PathNotFound`] if the model directory does not exist
    /// - [`ModelError::ArtifactNotFound`] if the artifact file does not exist
    /// - [`ModelError::Invalid`] if loading or inference fails
    pub async fn classify(
        &self,
        kind: ModelKind,
        features: &FeatureVector,
    ) -> Result<ClassifierOutput, ModelError> {
        let start = Instant::now();
        let path = self.locate(kind, &features.rate_group).await?;
        let model = self.backend.load(&path).await?;
        let output = model.classify(features).map_err(|e| {
            error!(path = %path.display(), error = %e, "classifier inference failed");
            e
        })?;
        metrics::record_stage_duration("classify", start.elapsed());
        debug!(
            rate_group = %features.rate_group,
            label = %output.label,
            "classifier produced label"
        );
        Ok(output)
    }

    /// Predict a scalar cost for `features` with the cost model.
    ///
    /// # Errors
    ///
    /// Same as [`classify`](Self::classify).
    pub async fn regress(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        let start = Instant::now();
        let path = self.locate(ModelKind::Cost, &features.rate_group).await?;
        let model = self.backend.load(&path).await?;
        let value = model.regress(features)?;
        metrics::record_stage_duration("regress", start.elapsed());
        Ok(value)
    }

    async fn locate(&self, kind: ModelKind, rate_group: &str) -> Result<PathBuf, ModelError> {
        let dir = self.paths.dir(kind);
        if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
            return Err(ModelError::PathNotFound(dir.display().to_string()));
        }
        let path = self.paths.artifact(kind, rate_group);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ModelError::ArtifactNotFound(path.display().to_string()));
        }
        Ok(path)
    }
}

impl std::fmt::Debug for ClassifierAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierAdapter")
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::flag;
    use crate::locale::{SurchargeClass, SurchargeCode};
    use crate::model::artifact::fixtures::{cost_regression, ground_classifier};
    use crate::model::JsonModelBackend;

    fn features() -> FeatureVector {
        FeatureVector {
            rate_group: "GROUND".into(),
            postal_code: "90210".into(),
            postal_prefix: "902".into(),
            rated_weight: 2.0,
            ship_day: "MON".into(),
            residential: flag(false),
            signature_required: flag(false),
            adult_signature_required: flag(false),
            surcharge: SurchargeClass::from(SurchargeCode::None),
            carrier_service_name: None,
        }
    }

    fn adapter(root: &Path) -> ClassifierAdapter {
        ClassifierAdapter::new(
            ModelPaths {
                base_dir: root.join("base"),
                service_dir: root.join("service"),
                cost_dir: root.join("cost"),
            },
            Arc::new(JsonModelBackend),
        )
    }

    #[test]
    fn test_artifact_paths_follow_convention() {
        let a = adapter(Path::new("/m"));
        assert_eq!(
            a.paths().artifact(ModelKind::Base, "GROUND"),
            PathBuf::from("/m/base/GROUND.zip")
        );
        assert_eq!(
            a.paths().artifact(ModelKind::Service, "GROUND"),
            PathBuf::from("/m/service/GROUND.zip")
        );
        assert_eq!(
            a.paths().artifact(ModelKind::Cost, "GROUND"),
            PathBuf::from("/m/cost/GROUND_COST.zip")
        );
    }

    #[tokio::test]
    async fn test_missing_directory_is_path_not_found() {
        let dir = tempfile::tempdir().expect("test: tempdir");
        let err = adapter(dir.path())
            .classify(ModelKind::Base, &features())
            .await
            .expect_err("test: must fail");
        assert!(matches!(err, ModelError::PathNotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_artifact_is_artifact_not_found() {
        let dir = tempfile::tempdir().expect("test: tempdir");
        std::fs::create_dir(dir.path().join("base")).expect("test: mkdir");
        let err = adapter(dir.path())
            .classify(ModelKind::Base, &features())
            .await
            .expect_err("test: must fail");
        assert!(matches!(err, ModelError::ArtifactNotFound(ref p) if p.ends_with("GROUND.zip")));
    }

    #[tokio::test]
    async fn test_corrupt_artifact_is_invalid() {
        let dir = tempfile::tempdir().expect("test: tempdir");
        std::fs::create_dir(dir.path().join("base")).expect("test: mkdir");
        std::fs::write(dir.path().join("base/GROUND.zip"), "{}").expect("test: write");
        let err = adapter(dir.path())
            .classify(ModelKind::Base, &features())
            .await
            .expect_err("test: must fail");
        assert!(matches!(err, ModelError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_classify_and_regress_succeed() {
        let dir = tempfile::tempdir().expect("test: tempdir");
        for sub in ["base", "cost"] {
            std::fs::create_dir(dir.path().join(sub)).expect("test: mkdir");
        }
        std::fs::write(dir.path().join("base/GROUND.zip"), ground_classifier().to_string())
            .expect("test: write");
        std::fs::write(
            dir.path().join("cost/GROUND_COST.zip"),
            cost_regression().to_string(),
        )
        .expect("test: write");

        let a = adapter(dir.path());
        let out = a
            .classify(ModelKind::Base, &features())
            .await
            .expect("test: classify");
        assert_eq!(out.label, "Ground");
        let cost = a
            .regress(&features().with_service("Ground"))
            .await
            .expect("test: regress");
        assert!((cost - 10.0).abs() < 1e-9);
    }
}
