//! # Stage: Feature Builder
//!
//! ## Responsibility
//! Turn a validated [`ShipmentRequest`] into the [`FeatureVector`] the
//! classifier consumes: rate group, postal prefix, aggregate rated weight,
//! ship weekday, categorical flags and the one-hot surcharge class.
//!
//! ## Guarantees
//! - Rejects an empty rate group or malformed postal code before any lookup
//! - Rated weight is the sum of all package weights
//! - Signature flags come from the last package only
//! - Flags are encoded as `"True"` / `"False"` categorical strings
//!
//! ## NOT Responsible For
//! - Running the classifier (see: `model`)
//! - Deciding how to route (see: `routing`)

use std::sync::Arc;

use serde::Serialize;

use crate::locale::{LocaleClassifier, LocaleStore, SurchargeClass};
use crate::request::{
    is_valid_postal_code, ShipmentRequest, ValidationError, POSTAL_CODE_MESSAGE,
    RATE_GROUP_MESSAGE,
};
use crate::PredictError;

/// Classifier input derived from one shipment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    /// Rate group the shipment belongs to.
    pub rate_group: String,
    /// Full receiver postal code.
    pub postal_code: String,
    /// First three characters of the postal code.
    pub postal_prefix: String,
    /// Sum of package weights.
    pub rated_weight: f64,
    /// Three-letter uppercase weekday of the ship date.
    pub ship_day: String,
    /// `"True"` or `"False"`.
    pub residential: String,
    /// `"True"` or `"False"`, from the last package.
    pub signature_required: String,
    /// `"True"` or `"False"`, from the last package.
    pub adult_signature_required: String,
    /// Area-surcharge classification.
    pub surcharge: SurchargeClass,
    /// Carrier service, set only for cost-model input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier_service_name: Option<String>,
}

impl FeatureVector {
    /// Categorical features as `field=value` tokens.
    pub fn tokens(&self) -> Vec<String> {
        let mut tokens = vec![
            format!("rateGroup={}", self.rate_group),
            format!("postalPrefix={}", self.postal_prefix),
            format!("shipDay={}", self.ship_day),
            format!("residential={}", self.residential),
            format!("signatureRequired={}", self.signature_required),
            format!("adultSignatureRequired={}", self.adult_signature_required),
            format!("areaSurcharges={}", self.surcharge.code()),
        ];
        if let Some(service) = &self.carrier_service_name {
            tokens.push(format!("carrierServiceName={service}"));
        }
        tokens
    }

    /// Numeric features by name.
    pub fn numeric(&self) -> Vec<(&'static str, f64)> {
        vec![("ratedWeight", self.rated_weight)]
    }

    /// Copy of this vector tagged with a carrier service, for cost models.
    pub fn with_service(&self, service: &str) -> Self {
        Self {
            carrier_service_name: Some(service.to_string()),
            ..self.clone()
        }
    }
}

/// Encode a flag the way the model was trained on it.
pub fn flag(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}

/// Builds feature vectors, consulting the locale tables for surcharges.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    locales: LocaleClassifier,
}

impl FeatureBuilder {
    /// Create a builder over `store`.
    pub fn new(store: Arc<dyn LocaleStore>) -> Self {
        Self {
            locales: LocaleClassifier::new(store),
        }
    }

    /// Build the feature vector for `request` under `rate_group`.
    ///
    /// # Errors
    ///
    /// - [`PredictError::Validation`] for an empty rate group or a postal
    ///   code that is not five digits.
    /// - [`PredictError::Store`] when the surcharge table cannot be read.
    pub async fn build(
        &self,
        request: &ShipmentRequest,
        rate_group: &str,
    ) -> Result<FeatureVector, PredictError> {
        let rate_group = rate_group.trim();
        if rate_group.is_empty() {
            return Err(ValidationError::single(RATE_GROUP_MESSAGE).into());
        }
        let postal_code = request.postal_code().trim();
        if !is_valid_postal_code(postal_code) {
            return Err(ValidationError::single(POSTAL_CODE_MESSAGE).into());
        }

        let mut rated_weight = 0.0;
        let mut signature_required = false;
        let mut adult_signature_required = false;
        for package in &request.packages {
            rated_weight += package.weight.value;
            signature_required = package.signature_required;
            adult_signature_required = package.adult_signature_required;
        }

        let surcharge = self.locales.classify(postal_code).await?;

        Ok(FeatureVector {
            rate_group: rate_group.to_string(),
            postal_code: postal_code.to_string(),
            postal_prefix: postal_code.get(..3).unwrap_or(postal_code).to_string(),
            rated_weight,
            ship_day: request.ship_date.format("%a").to_string().to_uppercase(),
            residential: flag(request.receiver.address.residential),
            signature_required: flag(signature_required),
            adult_signature_required: flag(adult_signature_required),
            surcharge,
            carrier_service_name: None,
        })
    }

    /// Locale classifier used by this builder.
    pub fn locales(&self) -> &LocaleClassifier {
        &self.locales
    }
}
