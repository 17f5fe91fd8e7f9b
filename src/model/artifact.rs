//! On-disk prediction artifact.
//!
//! An artifact is a JSON document tagged by `kind`. Classifiers hold one
//! weight per label for every categorical token and numeric feature; the
//! logits are softmaxed and the argmax label wins. Regressions hold a single
//! weight per token and feature and output the linear sum.
//!
//! ```json
//! { "kind": "classifier",
//!   "labels": ["Ground", "Express"],
//!   "bias": [0.0, 0.0],
//!   "tokens": { "postalPrefix=902": [2.0, 0.0] },
//!   "numeric": { "ratedWeight": [0.1, -0.1] } }
//! ```
//!
//! Tokens the artifact has never seen contribute nothing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::backend::LoadedModel;
use super::{ClassifierOutput, ModelError};
use crate::features::FeatureVector;

/// A parsed prediction artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    /// Multi-class service classifier.
    Classifier(ClassifierArtifact),
    /// Scalar regression (cost model).
    Regression(RegressionArtifact),
}

/// Weights of a linear softmax classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    /// Label space, in score order.
    pub labels: Vec<String>,
    /// Per-label bias.
    pub bias: Vec<f64>,
    /// Per-token weight vectors (one weight per label).
    #[serde(default)]
    pub tokens: HashMap<String, Vec<f64>>,
    /// Per-numeric-feature weight vectors (one weight per label).
    #[serde(default)]
    pub numeric: HashMap<String, Vec<f64>>,
}

/// Weights of a linear regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionArtifact {
    /// Intercept.
    pub bias: f64,
    /// Per-token weight.
    #[serde(default)]
    pub tokens: HashMap<String, f64>,
    /// Per-numeric-feature weight.
    #[serde(default)]
    pub numeric: HashMap<String, f64>,
}

impl Artifact {
    /// Parse and schema-check an artifact document.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Invalid`] if the JSON does not parse or the
    /// weight vectors do not match the label space.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        let artifact: Artifact = serde_json::from_slice(bytes)
            .map_err(|e| ModelError::Invalid(format!("artifact does not parse: {e}")))?;
        artifact.check()?;
        Ok(artifact)
    }

    fn check(&self) -> Result<(), ModelError> {
        let Self::Classifier(c) = self else {
            return Ok(());
        };
        let n = c.labels.len();
        if n == 0 {
            return Err(ModelError::Invalid("classifier has no labels".into()));
        }
        if c.bias.len() != n {
            return Err(ModelError::Invalid(format!(
                "bias has {} entries for {n} labels",
                c.bias.len()
            )));
        }
        for (name, weights) in c.tokens.iter().chain(c.numeric.iter()) {
            if weights.len() != n {
                return Err(ModelError::Invalid(format!(
                    "weights for '{name}' have {} entries for {n} labels",
                    weights.len()
                )));
            }
        }
        Ok(())
    }
}

impl ClassifierArtifact {
    fn logits(&self, features: &FeatureVector) -> Vec<f64> {
        let mut logits = self.bias.clone();
        for token in features.tokens() {
            if let Some(weights) = self.tokens.get(&token) {
                for (l, w) in logits.iter_mut().zip(weights) {
                    *l += w;
                }
            }
        }
        for (name, value) in features.numeric() {
            if let Some(weights) = self.numeric.get(name) {
                for (l, w) in logits.iter_mut().zip(weights) {
                    *l += w * value;
                }
            }
        }
        logits
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

impl LoadedModel for Artifact {
    fn classify(&self, features: &FeatureVector) -> Result<ClassifierOutput, ModelError> {
        let Self::Classifier(c) = self else {
            return Err(ModelError::Invalid(
                "regression artifact used as a classifier".into(),
            ));
        };
        let scores = softmax(&c.logits(features));
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(ModelError::Invalid("classifier produced non-finite scores".into()));
        }
        let best = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let label = c
            .labels
            .get(best)
            .cloned()
            .ok_or_else(|| ModelError::Invalid("classifier has no labels".into()))?;
        Ok(ClassifierOutput { label, scores })
    }

    fn regress(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        let Self::Regression(r) = self else {
            return Err(ModelError::Invalid(
                "classifier artifact used as a regression".into(),
            ));
        };
        let mut out = r.bias;
        for token in features.tokens() {
            out += r.tokens.get(&token).copied().unwrap_or(0.0);
        }
        for (name, value) in features.numeric() {
            out += r.numeric.get(name).copied().unwrap_or(0.0) * value;
        }
        if !out.is_finite() {
            return Err(ModelError::Invalid("regression produced a non-finite value".into()));
        }
        Ok(out)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::flag;
    use crate::locale::{SurchargeClass, SurchargeCode};

    fn features() -> FeatureVector {
        FeatureVector {
            rate_group: "GROUND".into(),
            postal_code: "90210".into(),
            postal_prefix: "902".into(),
            rated_weight: 2.0,
            ship_day: "MON".into(),
            residential: flag(true),
            signature_required: flag(false),
            adult_signature_required: flag(false),
            surcharge: SurchargeClass::from(SurchargeCode::None),
            carrier_service_name: None,
        }
    }

    fn parse(v: serde_json::Value) -> Artifact {
        Artifact::from_slice(v.to_string().as_bytes()).expect("test: parse artifact")
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let p = softmax(&[1.0, 2.0, 3.0]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(p[2] > p[1] && p[1] > p[0]);
    }

    #[test]
    fn test_softmax_handles_large_logits() {
        let p = softmax(&[1000.0, 0.0]);
        assert!(p.iter().all(|x| x.is_finite()));
        assert!(p[0] > 0.999);
    }

    #[test]
    fn test_classifier_picks_argmax_label() {
        let out = parse(fixtures::ground_classifier())
            .classify(&features())
            .expect("test: classify");
        assert_eq!(out.label, "Ground");
        assert_eq!(out.scores.len(), 3);
    }

    #[test]
    fn test_unseen_token_falls_back_to_bias() {
        let mut fv = features();
        fv.postal_prefix = "100".into();
        let out = parse(fixtures::ground_classifier())
            .classify(&fv)
            .expect("test: classify");
        // All logits equal: uniform scores.
        assert!(out.scores.iter().all(|s| (s - 1.0 / 3.0).abs() < 1e-12));
    }

    #[test]
    fn test_regression_is_linear() {
        let fv = features().with_service("Ground");
        let out = parse(fixtures::cost_regression())
            .regress(&fv)
            .expect("test: regress");
        assert!((out - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_weight_length_mismatch_is_invalid() {
        let mut v = fixtures::ground_classifier();
        v["tokens"]["shipDay=MON"] = serde_json::json!([1.0]);
        let err = Artifact::from_slice(v.to_string().as_bytes()).expect_err("test: must fail");
        assert_eq!(err.kind(), "model_invalid");
    }

    #[test]
    fn test_wrong_kind_is_invalid() {
        let err = parse(fixtures::cost_regression())
            .classify(&features())
            .expect_err("test: must fail");
        assert!(matches!(err, ModelError::Invalid(_)));
    }

    #[test]
    fn test_garbage_bytes_are_invalid() {
        let err = Artifact::from_slice(b"PK\x03\x04").expect_err("test: must fail");
        assert!(matches!(err, ModelError::Invalid(_)));
    }
}
