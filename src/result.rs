//! Result Builder: response DTOs and the pure mapping into them.
//!
//! The orchestrator works on a [`Draft`]; once finalized it is converted
//! into a [`PredictionResult`] with no further decisions.

use serde::{Deserialize, Serialize};

use crate::model::Confidence;

/// Label the classifier uses for "no service qualifies".
pub const NO_SERVICE: &str = "NoService";
/// Service name reported to callers when nothing can be predicted.
pub const NONE_SERVICE: &str = "None";

/// Final status of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// Not yet finalized.
    #[default]
    Pending,
    /// A service was predicted.
    Success,
    /// No carrier service qualifies.
    NoService,
    /// The receiver postal code is not a recognised US locale.
    InvalidPostalCode,
}

impl Status {
    /// Numeric status code.
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 1,
            Self::Pending | Self::NoService | Self::InvalidPostalCode => 0,
        }
    }

    /// Human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Self::Pending => "",
            Self::Success => "Success",
            Self::NoService => "No qualifying carrier service is available for this shipment.",
            Self::InvalidPostalCode => {
                "The receiver postal code is not a valid United States postal code."
            }
        }
    }
}

/// How the confidence string is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ConfidenceLabel {
    /// No classifier output.
    #[default]
    Absent,
    /// Entropy-derived classifier confidence, `"{:.2}%"`.
    Measured(Confidence),
    /// Carrier-rated answer, `"100%"`.
    Rated,
    /// Invalid locale override, `"100"`.
    InvalidLocale,
}

impl ConfidenceLabel {
    fn render(self) -> String {
        match self {
            Self::Absent => String::new(),
            Self::Measured(c) => c.to_string(),
            Self::Rated => "100%".to_string(),
            Self::InvalidLocale => "100".to_string(),
        }
    }
}

/// Working state of a prediction before it is rendered.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Draft {
    /// Current service label.
    pub predicted_service: String,
    /// Confidence to report.
    pub confidence: ConfidenceLabel,
    /// Whether the answer came from the rating subsystem.
    pub carrier_rated: bool,
    /// Estimated or rated total cost.
    pub estimated_cost: f64,
    /// Estimated or rated transit days.
    pub estimated_transit_days: u32,
    /// Final status.
    pub status: Status,
}

/// Status block of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDto {
    /// `1` for success, `0` otherwise.
    pub code: i32,
    /// Human-readable description.
    pub description: String,
}

impl From<Status> for StatusDto {
    fn from(s: Status) -> Self {
        Self {
            code: s.code(),
            description: s.description().to_string(),
        }
    }
}

/// Estimate block of a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detail {
    /// Estimated or rated cost; zero when not requested or unknown.
    pub estimated_cost: f64,
    /// Estimated or rated transit days; zero when not requested or unknown.
    pub estimated_transit_days: u32,
}

/// Response of the service prediction endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    /// Outcome status.
    pub status: StatusDto,
    /// Predicted carrier service, or `"None"`.
    pub predicted_service: String,
    /// Confidence string.
    pub confidence: String,
    /// Whether the answer came from the rating subsystem.
    pub carrier_rated: bool,
    /// Cost and transit estimates.
    pub detail: Detail,
}

impl From<Draft> for PredictionResult {
    fn from(d: Draft) -> Self {
        Self {
            status: d.status.into(),
            predicted_service: d.predicted_service,
            confidence: d.confidence.render(),
            carrier_rated: d.carrier_rated,
            detail: Detail {
                estimated_cost: d.estimated_cost,
                estimated_transit_days: d.estimated_transit_days,
            },
        }
    }
}

/// Response of the cost prediction endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostPredictionResult {
    /// Outcome status.
    pub status: StatusDto,
    /// Predicted cost, non-negative, two decimals.
    pub predicted_cost: f64,
}
