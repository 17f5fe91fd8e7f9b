//! # Prediction Engine
//!
//! ## Responsibility
//! Wire every collaborator from a [`ServiceConfig`] into one cloneable
//! handle that the HTTP API and the NATS consumer share, and apply the
//! per-request ambient concerns: request and error counters, error logs,
//! and audit entries for rejected requests.
//!
//! ## Guarantees
//! - Construction never touches the network; an unconnected bus is valid
//! - Every failed request produces exactly one audit entry
//! - Cloning is cheap: all state sits behind `Arc`
//!
//! ## NOT Responsible For
//! - Routing decisions (see: `routing`)
//! - Transport bindings (see: `web_api`, `consumer`)

use std::sync::Arc;

use tracing::{error, info};

use crate::audit::{self, AuditEntry, AuditLevel, AuditLog, JsonlAuditLog, MemoryAuditLog};
use crate::config::ServiceConfig;
use crate::cost::{CostPredictor, CostRequest};
use crate::features::FeatureBuilder;
use crate::history::HistoryMatcher;
use crate::locale::{FileLocaleStore, LocaleStore};
use crate::metrics;
use crate::model::{
    CachingBackend, ClassifierAdapter, JsonModelBackend, ModelKind, ModelPaths, PredictionBackend,
};
use crate::rating::{
    AuthoritativeRateClient, NatsBus, RateTransport, RetrainFeed, RetrainPublisher, RetryPolicy,
};
use crate::request::ShipmentRequest;
use crate::result::{CostPredictionResult, PredictionResult};
use crate::routing::{FallbackOrchestrator, RouteSnapshot, RouteTracker, RoutingSettings};
use crate::PredictError;

/// Audit and metrics label for a model family's endpoint.
pub fn endpoint_name(kind: ModelKind) -> &'static str {
    match kind {
        ModelKind::Base => "predict",
        ModelKind::Service => "predict/service",
        ModelKind::Cost => "predict/cost",
    }
}

/// Swappable collaborators.
///
/// [`PredictEngine::from_config`] fills these from the config file and a
/// NATS bus; tests substitute in-memory fakes.
#[derive(Clone)]
pub struct EngineParts {
    /// Locale, surcharge and special-locale tables.
    pub store: Arc<dyn LocaleStore>,
    /// Artifact loader.
    pub backend: Arc<dyn PredictionBackend>,
    /// Request/reply transport to the rating subsystem.
    pub transport: Arc<dyn RateTransport>,
    /// Outbound retrain publisher.
    pub publisher: Arc<dyn RetrainPublisher>,
    /// Audit sink.
    pub audit: Arc<dyn AuditLog>,
}

impl EngineParts {
    /// Collaborators backed by the files named in `config` and by `bus`.
    pub fn from_config(config: &ServiceConfig, bus: NatsBus) -> Self {
        let json: Arc<dyn PredictionBackend> = Arc::new(JsonModelBackend);
        let backend: Arc<dyn PredictionBackend> = if config.models.cache {
            Arc::new(CachingBackend::new(json))
        } else {
            json
        };
        let audit: Arc<dyn AuditLog> = match &config.audit.path {
            Some(path) => Arc::new(JsonlAuditLog::new(path.clone())),
            None => Arc::new(MemoryAuditLog::new()),
        };
        let bus = Arc::new(bus);
        Self {
            store: Arc::new(FileLocaleStore::new(config.reference.dir.clone())),
            backend,
            transport: bus.clone(),
            publisher: bus,
            audit,
        }
    }
}

/// Shared handle to the prediction pipeline.
#[derive(Clone)]
pub struct PredictEngine {
    orchestrator: FallbackOrchestrator,
    cost: CostPredictor,
    audit: Arc<dyn AuditLog>,
    tracker: Arc<RouteTracker>,
}

impl PredictEngine {
    /// Build an engine from `config`, reaching the rating subsystem via `bus`.
    ///
    /// Must be called inside a Tokio runtime: the retrain publisher task is
    /// spawned here.
    pub fn from_config(config: &ServiceConfig, bus: NatsBus) -> Self {
        let parts = EngineParts::from_config(config, bus);
        Self::with_parts(config, parts)
    }

    /// Build an engine from `config` with explicit collaborators.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn with_parts(config: &ServiceConfig, parts: EngineParts) -> Self {
        let features = FeatureBuilder::new(parts.store);
        let classifier = ClassifierAdapter::new(
            ModelPaths {
                base_dir: config.models.path.clone(),
                service_dir: config.models.service_path.clone(),
                cost_dir: config.models.cost_path.clone(),
            },
            parts.backend,
        );
        let rating = &config.rating;
        let rater = AuthoritativeRateClient::new(
            parts.transport,
            rating.rate_subject.clone(),
            RetryPolicy::fixed(rating.retry_attempts as usize, rating.retry_interval()),
            rating.request_timeout(),
        );
        let (feed, _task) = RetrainFeed::spawn(
            parts.publisher,
            rating.retrain_subject.clone(),
            rating.retrain_queue_capacity,
        );
        let tracker = Arc::new(RouteTracker::new());

        let orchestrator = FallbackOrchestrator::new(
            features.clone(),
            classifier.clone(),
            HistoryMatcher::new(config.history.path.clone()),
            rater,
            RoutingSettings::from(&config.routing),
        )
        .with_retrain_feed(feed)
        .with_tracker(tracker.clone());

        info!(
            models = %config.models.path.display(),
            history = %config.history.path.display(),
            threshold = config.routing.confidence_threshold,
            failure_policy = ?config.routing.failure_policy,
            cache = config.models.cache,
            "prediction engine ready"
        );

        Self {
            orchestrator,
            cost: CostPredictor::new(features, classifier),
            audit: parts.audit,
            tracker,
        }
    }

    /// Predict the carrier service for `request` with the `kind` model family.
    ///
    /// # Errors
    ///
    /// See [`FallbackOrchestrator::predict`].
    pub async fn predict(
        &self,
        request: &ShipmentRequest,
        kind: ModelKind,
    ) -> Result<PredictionResult, PredictError> {
        let endpoint = endpoint_name(kind);
        metrics::inc_request(endpoint);
        match self.orchestrator.predict(request, kind).await {
            Ok(result) => Ok(result),
            Err(e) => {
                self.reject(endpoint, &e).await;
                Err(e)
            }
        }
    }

    /// Predict the cost of shipping `request` with its carrier service.
    ///
    /// # Errors
    ///
    /// See [`CostPredictor::predict`].
    pub async fn predict_cost(
        &self,
        request: &CostRequest,
    ) -> Result<CostPredictionResult, PredictError> {
        let endpoint = endpoint_name(ModelKind::Cost);
        metrics::inc_request(endpoint);
        match self.cost.predict(request).await {
            Ok(result) => Ok(result),
            Err(e) => {
                self.reject(endpoint, &e).await;
                Err(e)
            }
        }
    }

    async fn reject(&self, endpoint: &str, e: &PredictError) {
        metrics::inc_error(endpoint, e.kind());
        error!(endpoint, kind = e.kind(), error = %e, "prediction rejected");
        audit::record(
            self.audit.as_ref(),
            AuditEntry::new(endpoint, AuditLevel::Error, e.to_string()),
        )
        .await;
    }

    /// Current route counters.
    pub fn routes(&self) -> RouteSnapshot {
        self.tracker.snapshot()
    }

    /// The orchestrator behind [`predict`](Self::predict).
    pub fn orchestrator(&self) -> &FallbackOrchestrator {
        &self.orchestrator
    }
}

impl std::fmt::Debug for PredictEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictEngine")
            .field("orchestrator", &self.orchestrator)
            .field("routes", &self.tracker.snapshot())
            .finish_non_exhaustive()
    }
}
