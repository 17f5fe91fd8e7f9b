//! The fallback state machine.
//!
//! ```text
//! Classify → ConfidenceCheck → Route(AuthoritativeRate | EstimateFromHistory | AcceptClassifier)
//!          → Finalize → Done
//! ```
//!
//! Each state owns the data it needs, and [`FallbackOrchestrator::step`]
//! performs exactly one transition.

use std::sync::Arc;
use std::time::Instant;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::state::{finalize, select_route, Route, RouteInputs};
use super::tracker::RouteTracker;
use crate::features::{FeatureBuilder, FeatureVector};
use crate::history::HistoryMatcher;
use crate::metrics;
use crate::model::{ClassifierAdapter, ClassifierOutput, Confidence, ModelKind};
use crate::rating::retrain::RetrainFeed;
use crate::rating::{AuthoritativeRateClient, RateRequestCreated, RetrainUnitCreated};
use crate::request::ShipmentRequest;
use crate::result::{ConfidenceLabel, Draft, PredictionResult, NO_SERVICE};
use crate::PredictError;

/// What to do when the rating subsystem stays unavailable after retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log, count, and continue as if rating had not been required.
    #[default]
    Degrade,
    /// Fail the request.
    Propagate,
}

/// Routing knobs fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingSettings {
    /// Confidence below which a recognised locale is rated.
    pub confidence_threshold: f64,
    /// Always rate special locales.
    pub rate_special_locale: bool,
    /// Behaviour when rating fails after retries.
    pub failure_policy: FailurePolicy,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 85.0,
            rate_special_locale: false,
            failure_policy: FailurePolicy::Degrade,
        }
    }
}

/// Data carried from `ConfidenceCheck` onward.
#[derive(Debug, Clone)]
pub struct RouteContext {
    /// Classifier input.
    pub features: FeatureVector,
    /// Routing facts.
    pub inputs: RouteInputs,
    /// Answer under construction.
    pub draft: Draft,
}

/// A state of the prediction flow.
#[derive(Debug, Clone)]
pub enum PredictState {
    /// Build features and run the classifier.
    Classify,
    /// Score the output and look up the locale.
    ConfidenceCheck {
        /// Classifier input.
        features: FeatureVector,
        /// Classifier output.
        output: ClassifierOutput,
    },
    /// Execute one prediction tier.
    Route {
        /// Tier to run.
        route: Route,
        /// Flow data.
        ctx: Box<RouteContext>,
    },
    /// Apply the finalize rules.
    Finalize {
        /// Tier that produced the answer.
        route: Route,
        /// Flow data.
        ctx: Box<RouteContext>,
    },
    /// Terminal state.
    Done(PredictionResult),
}

impl PredictState {
    /// Short state name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Classify => "classify",
            Self::ConfidenceCheck { .. } => "confidence_check",
            Self::Route { .. } => "route",
            Self::Finalize { .. } => "finalize",
            Self::Done(_) => "done",
        }
    }
}

/// Decides per request whether to trust the classifier, rate, or estimate.
#[derive(Clone)]
pub struct FallbackOrchestrator {
    features: FeatureBuilder,
    classifier: ClassifierAdapter,
    history: HistoryMatcher,
    rater: AuthoritativeRateClient,
    retrain: Option<RetrainFeed>,
    settings: RoutingSettings,
    tracker: Arc<RouteTracker>,
}

impl FallbackOrchestrator {
    /// Wire an orchestrator from its collaborators.
    pub fn new(
        features: FeatureBuilder,
        classifier: ClassifierAdapter,
        history: HistoryMatcher,
        rater: AuthoritativeRateClient,
        settings: RoutingSettings,
    ) -> Self {
        Self {
            features,
            classifier,
            history,
            rater,
            retrain: None,
            settings,
            tracker: Arc::new(RouteTracker::new()),
        }
    }

    /// Publish successful ratings on `feed`.
    pub fn with_retrain_feed(mut self, feed: RetrainFeed) -> Self {
        self.retrain = Some(feed);
        self
    }

    /// Share `tracker` instead of a private one.
    pub fn with_tracker(mut self, tracker: Arc<RouteTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    /// Route outcome counters.
    pub fn tracker(&self) -> &Arc<RouteTracker> {
        &self.tracker
    }

    /// Routing settings.
    pub fn settings(&self) -> &RoutingSettings {
        &self.settings
    }

    /// Classifier adapter, shared with the cost predictor.
    pub fn classifier(&self) -> &ClassifierAdapter {
        &self.classifier
    }

    /// Feature builder, shared with the cost predictor.
    pub fn feature_builder(&self) -> &FeatureBuilder {
        &self.features
    }

    /// Run the full flow for `request` using the `kind` model family.
    ///
    /// # Errors
    ///
    /// - [`PredictError::Validation`] for an invalid request
    /// - [`PredictError::Model`] when the classifier cannot run
    /// - [`PredictError::Store`] when a reference table cannot be read
    /// - [`PredictError::Rating`] when rating fails and the failure policy
    ///   is [`FailurePolicy::Propagate`]
    pub async fn predict(
        &self,
        request: &ShipmentRequest,
        kind: ModelKind,
    ) -> Result<PredictionResult, PredictError> {
        request.validate()?;
        let start = Instant::now();
        let mut state = PredictState::Classify;
        loop {
            state = match state {
                PredictState::Done(result) => {
                    metrics::record_stage_duration("predict", start.elapsed());
                    return Ok(result);
                }
                other => self.step(other, request, kind).await?,
            };
        }
    }

    /// Perform one transition.
    ///
    /// # Errors
    ///
    /// See [`predict`](Self::predict).
    pub async fn step(
        &self,
        state: PredictState,
        request: &ShipmentRequest,
        kind: ModelKind,
    ) -> Result<PredictState, PredictError> {
        debug!(state = state.name(), rate_group = %request.rate_group, "predict step");
        match state {
            PredictState::Classify => {
                let features = self.features.build(request, &request.rate_group).await?;
                let output = self.classifier.classify(kind, &features).await?;
                Ok(PredictState::ConfidenceCheck { features, output })
            }
            PredictState::ConfidenceCheck { features, output } => {
                self.confidence_check(request, features, output).await
            }
            PredictState::Route { route, ctx } => self.run_route(route, *ctx, request).await,
            PredictState::Finalize { route, ctx } => {
                let ctx = *ctx;
                let draft = finalize(ctx.draft, ctx.inputs.is_locale);
                self.tracker.record(route);
                metrics::inc_route(route.as_str());
                info!(
                    rate_group = %ctx.features.rate_group,
                    postal_code = %ctx.features.postal_code,
                    route = %route,
                    service = %draft.predicted_service,
                    carrier_rated = draft.carrier_rated,
                    "prediction finalized"
                );
                Ok(PredictState::Done(draft.into()))
            }
            PredictState::Done(result) => Ok(PredictState::Done(result)),
        }
    }

    async fn confidence_check(
        &self,
        request: &ShipmentRequest,
        features: FeatureVector,
        output: ClassifierOutput,
    ) -> Result<PredictState, PredictError> {
        let confidence = Confidence::from_output(Some(&output));
        let locales = self.features.locales();
        let is_locale = locales.is_recognized(&features.postal_code).await?;
        let is_special = locales.is_special(&features.postal_code).await?;

        let inputs = RouteInputs {
            confidence: confidence.value(),
            threshold: self.settings.confidence_threshold,
            is_locale,
            is_special,
            rate_special_locale: self.settings.rate_special_locale,
            estimate_cost: request.wants_cost(),
            estimate_transit_days: request.wants_transit_days(),
            predicted_service: output.label.clone(),
            rating_available: true,
        };
        let route = select_route(&inputs);
        debug!(
            confidence = %confidence,
            threshold = inputs.threshold,
            is_locale,
            is_special,
            route = %route,
            "route selected"
        );

        let draft = Draft {
            predicted_service: output.label,
            confidence: ConfidenceLabel::Measured(confidence),
            ..Default::default()
        };
        Ok(PredictState::Route {
            route,
            ctx: Box::new(RouteContext {
                features,
                inputs,
                draft,
            }),
        })
    }

    async fn run_route(
        &self,
        route: Route,
        mut ctx: RouteContext,
        request: &ShipmentRequest,
    ) -> Result<PredictState, PredictError> {
        match route {
            Route::AuthoritativeRate => {
                let rate_request = RateRequestCreated::from_request(request);
                match self.rater.rate(&rate_request).await {
                    Ok(result) => {
                        ctx.draft.predicted_service = result
                            .carrier_service_name
                            .clone()
                            .unwrap_or_else(|| NO_SERVICE.to_string());
                        ctx.draft.confidence = ConfidenceLabel::Rated;
                        ctx.draft.carrier_rated = true;
                        ctx.draft.estimated_cost = result.total_cost;
                        ctx.draft.estimated_transit_days = result.commit.transit_days;
                        if ctx.inputs.is_locale {
                            if let Some(feed) = &self.retrain {
                                feed.enqueue(RetrainUnitCreated::from(&result));
                            }
                        }
                    }
                    Err(e) => {
                        self.tracker.record_rate_failure();
                        if self.settings.failure_policy == FailurePolicy::Propagate {
                            error!(
                                rate_group = %ctx.features.rate_group,
                                error = %e,
                                "authoritative rating unavailable"
                            );
                            return Err(e.into());
                        }
                        error!(
                            rate_group = %ctx.features.rate_group,
                            error = %e,
                            "authoritative rating unavailable, degrading"
                        );
                        ctx.inputs.rating_available = false;
                        let route = select_route(&ctx.inputs);
                        return Ok(PredictState::Route {
                            route,
                            ctx: Box::new(ctx),
                        });
                    }
                }
            }
            Route::EstimateFromHistory => self.estimate_from_history(&mut ctx).await,
            Route::AcceptClassifier => {}
        }
        Ok(PredictState::Finalize {
            route,
            ctx: Box::new(ctx),
        })
    }

    async fn estimate_from_history(&self, ctx: &mut RouteContext) {
        let f = &ctx.features;
        let found = self
            .history
            .find_match(
                &f.rate_group,
                &ctx.draft.predicted_service,
                &f.postal_prefix,
                f.rated_weight,
            )
            .await;
        match found {
            Ok(Some(record)) => {
                if ctx.inputs.estimate_cost {
                    ctx.draft.estimated_cost = record.total_cost;
                }
                if ctx.inputs.estimate_transit_days {
                    ctx.draft.estimated_transit_days = record.commit_transit_days;
                }
            }
            Ok(None) => warn!(
                rate_group = %f.rate_group,
                service = %ctx.draft.predicted_service,
                postal_prefix = %f.postal_prefix,
                weight = f.rated_weight.ceil(),
                "no historical match, estimates left at zero"
            ),
            Err(e) => warn!(
                rate_group = %f.rate_group,
                error = %e,
                "historical data unavailable, estimates left at zero"
            ),
        }
    }
}

impl std::fmt::Debug for FallbackOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackOrchestrator")
            .field("settings", &self.settings)
            .field("classifier", &self.classifier)
            .field("history", &self.history)
            .field("rater", &self.rater)
            .finish_non_exhaustive()
    }
}
