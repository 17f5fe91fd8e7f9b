//! Entropy-derived confidence.
//!
//! `confidence = 100 − 100·H` with `H = −Σ pᵢ·ln(pᵢ)`. Zero probabilities
//! contribute nothing. The value is not clamped below zero, so a near-uniform
//! distribution over three or more labels scores negative.

use std::fmt;

use super::ClassifierOutput;

/// Confidence of a classifier output on a 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Confidence(f64);

impl Confidence {
    /// Confidence from a score vector.
    pub fn from_scores(scores: &[f64]) -> Self {
        Self(100.0 - 100.0 * entropy(scores))
    }

    /// Confidence of an optional output; absent output scores 0.
    pub fn from_output(output: Option<&ClassifierOutput>) -> Self {
        output.map_or(Self(0.0), |o| Self::from_scores(&o.scores))
    }

    /// Raw value.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.0)
    }
}

/// Shannon entropy in nats, with `0·ln 0 = 0`.
pub fn entropy(scores: &[f64]) -> f64 {
    -scores
        .iter()
        .filter(|p| **p > 0.0)
        .map(|p| p * p.ln())
        .sum::<f64>()
}
