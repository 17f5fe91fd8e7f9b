//! Cost prediction for a known carrier service.
//!
//! Runs the rate group's `_COST` regression on the shipment features plus
//! the carrier service, clamps negative output to zero and rounds to cents.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::features::FeatureBuilder;
use crate::model::ClassifierAdapter;
use crate::request::{ShipmentRequest, ValidationError};
use crate::result::{CostPredictionResult, Status};
use crate::PredictError;

/// Body of `POST /predict/cost`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostRequest {
    /// The shipment.
    #[serde(flatten)]
    pub shipment: ShipmentRequest,
    /// Carrier service to price.
    #[serde(default)]
    pub carrier_service_name: String,
}

/// Predicts shipment cost with the cost sub-model.
#[derive(Debug, Clone)]
pub struct CostPredictor {
    features: FeatureBuilder,
    models: ClassifierAdapter,
}

impl CostPredictor {
    /// Create a predictor.
    pub fn new(features: FeatureBuilder, models: ClassifierAdapter) -> Self {
        Self { features, models }
    }

    /// Predict the cost of `request`.
    ///
    /// # Errors
    ///
    /// - [`PredictError::Validation`] for an invalid shipment or a missing
    ///   carrier service
    /// - [`PredictError::Model`] when the cost model cannot run
    /// - [`PredictError::Store`] when the surcharge table cannot be read
    pub async fn predict(&self, request: &CostRequest) -> Result<CostPredictionResult, PredictError> {
        request.shipment.validate()?;
        let service = request.carrier_service_name.trim();
        if service.is_empty() {
            return Err(
                ValidationError::single("Please provide a carrier service name in your request.")
                    .into(),
            );
        }

        let features = self
            .features
            .build(&request.shipment, &request.shipment.rate_group)
            .await?
            .with_service(service);
        let raw = self.models.regress(&features).await?;
        let predicted_cost = round_cents(raw.max(0.0));
        debug!(
            rate_group = %features.rate_group,
            service,
            raw,
            predicted_cost,
            "cost predicted"
        );

        Ok(CostPredictionResult {
            status: Status::Success.into(),
            predicted_cost,
        })
    }
}

/// Round to two decimal places.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
