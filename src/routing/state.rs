//! Routing states, the transition table and the finalize rules.
//!
//! Everything here is pure: the orchestrator gathers the facts into
//! [`RouteInputs`] and this module decides.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::result::{ConfidenceLabel, Draft, Status, NONE_SERVICE, NO_SERVICE};

/// The three prediction tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Ask the rating subsystem.
    AuthoritativeRate,
    /// Use the classifier label and fill estimates from history.
    EstimateFromHistory,
    /// Use the classifier label as-is.
    AcceptClassifier,
}

impl Route {
    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthoritativeRate => "authoritative_rate",
            Self::EstimateFromHistory => "estimate_from_history",
            Self::AcceptClassifier => "accept_classifier",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facts a routing decision is made from.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteInputs {
    /// Classifier confidence, 0–100 scale.
    pub confidence: f64,
    /// Configured confidence threshold.
    pub threshold: f64,
    /// Receiver postal code is a recognised US locale.
    pub is_locale: bool,
    /// Receiver postal code is a special locale.
    pub is_special: bool,
    /// Special locales must always be rated.
    pub rate_special_locale: bool,
    /// Caller asked for a cost estimate.
    pub estimate_cost: bool,
    /// Caller asked for a transit-day estimate.
    pub estimate_transit_days: bool,
    /// Current predicted service label.
    pub predicted_service: String,
    /// Whether the rating subsystem may still be tried.
    pub rating_available: bool,
}

impl RouteInputs {
    /// Caller wants at least one estimate.
    pub fn wants_estimate(&self) -> bool {
        self.estimate_cost || self.estimate_transit_days
    }
}

/// A routing rule.
pub type Predicate = fn(&RouteInputs) -> bool;

fn needs_authoritative_rate(i: &RouteInputs) -> bool {
    i.rating_available
        && ((i.confidence < i.threshold && i.is_locale)
            || (i.is_locale && i.is_special && i.rate_special_locale))
}

fn wants_history_estimate(i: &RouteInputs) -> bool {
    i.wants_estimate() && i.is_locale && i.predicted_service != NO_SERVICE
}

fn always(_: &RouteInputs) -> bool {
    true
}

/// Ordered transition table out of `ConfidenceCheck`; first match wins.
pub const ROUTING_TABLE: &[(Predicate, Route)] = &[
    (needs_authoritative_rate as Predicate, Route::AuthoritativeRate),
    (wants_history_estimate as Predicate, Route::EstimateFromHistory),
    (always as Predicate, Route::AcceptClassifier),
];

/// Walk [`ROUTING_TABLE`] and return the first route whose rule holds.
pub fn select_route(inputs: &RouteInputs) -> Route {
    ROUTING_TABLE
        .iter()
        .find(|(rule, _)| rule(inputs))
        .map_or(Route::AcceptClassifier, |(_, route)| *route)
}

/// Apply the finalize rules to `draft`.
///
/// `NoService` wins over an invalid locale; anything else is a success.
pub fn finalize(mut draft: Draft, is_locale: bool) -> Draft {
    if draft.predicted_service == NO_SERVICE {
        draft.predicted_service = NONE_SERVICE.to_string();
        draft.status = Status::NoService;
    } else if !is_locale {
        draft.predicted_service = NONE_SERVICE.to_string();
        draft.confidence = ConfidenceLabel::InvalidLocale;
        draft.estimated_cost = 0.0;
        draft.estimated_transit_days = 0;
        draft.status = Status::InvalidPostalCode;
    } else {
        draft.status = Status::Success;
    }
    draft
}
