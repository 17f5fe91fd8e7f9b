//! Integration tests for the fallback orchestrator.
//!
//! Each test wires a real [`FallbackOrchestrator`] over tempfile-backed
//! model artifacts and historical datasets, an in-memory locale store, and
//! an in-process fake rating transport, then checks which tier answered and
//! what the caller sees.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use parcel_predict_engine::features::FeatureBuilder;
use parcel_predict_engine::history::HistoryMatcher;
use parcel_predict_engine::locale::MemoryLocaleStore;
use parcel_predict_engine::model::{ClassifierAdapter, JsonModelBackend, ModelKind, ModelPaths};
use parcel_predict_engine::rating::{
    AuthoritativeRateClient, RateTransport, RatingError, RetrainFeed, RetrainPublisher,
    RetrainUnitCreated, RetryPolicy,
};
use parcel_predict_engine::routing::{
    FailurePolicy, FallbackOrchestrator, PredictState, RoutingSettings,
};
use parcel_predict_engine::ShipmentRequest;

// ============================================================================
// Test Infrastructure
// ============================================================================

/// Prefix 902 is confidently `Ground`; any other prefix is a low-confidence
/// `Ground`. Prefix 331 is confidently `NoService`.
fn classifier_artifact() -> serde_json::Value {
    json!({
        "kind": "classifier",
        "labels": ["Ground", "Express", "NoService"],
        "bias": [0.5, 0.0, 0.0],
        "tokens": {
            "postalPrefix=902": [6.0, 1.0, 0.0],
            "postalPrefix=331": [0.0, 0.0, 9.0]
        },
        "numeric": {}
    })
}

const DATASET: &str = "\
id,rateGroup,carrierServiceName,postalPrefix,totalCost,ratedWeight,ratedWeightUOM,shipDay,commitDeliveryDay,commitDeliveryDate,commitTransitDays,residential,signatureRequired,adultSignatureRequired
1,GROUND,Express,902,30.00,3,LB,MON,TUE,2024-05-07,1,True,False,False
2,GROUND,Ground,902,12.50,3,LB,MON,THU,2024-05-09,3,True,False,False
3,GROUND,Ground,100,8.25,3,LB,MON,WED,2024-05-08,2,True,False,False
";

/// Lay out `base/GROUND.zip` and `history/GROUND.csv` under `root`.
fn write_fixtures(root: &Path) {
    std::fs::create_dir_all(root.join("base")).expect("test: mkdir base");
    std::fs::create_dir_all(root.join("history")).expect("test: mkdir history");
    std::fs::write(
        root.join("base").join("GROUND.zip"),
        classifier_artifact().to_string(),
    )
    .expect("test: write model");
    std::fs::write(root.join("history").join("GROUND.csv"), DATASET).expect("test: write csv");
}

fn request(postal_code: &str, estimate_cost: bool, estimate_transit_days: bool) -> ShipmentRequest {
    serde_json::from_value(json!({
        "rateGroup": "GROUND",
        "shipDate": "2024-05-06T09:00:00",
        "shipper": "ACME-01",
        "receiver": {
            "address": {
                "city": "Somewhere",
                "state": "CA",
                "postalCode": postal_code,
                "countryCode": "US",
                "residential": true
            },
            "contact": {
                "name": "Jane Doe",
                "email": "jane@example.com",
                "company": "Example Co",
                "phone": "555-0100"
            }
        },
        "rateType": ["LIST"],
        "packages": [
            {
                "dimensions": { "uom": "IN", "length": 10, "width": 8, "height": 4 },
                "weight": { "uom": "LB", "value": 2.3 }
            }
        ],
        "estimateCost": estimate_cost,
        "estimateTransitDays": estimate_transit_days
    }))
    .expect("test: request fixture")
}

/// Rating subsystem that answers every request with a fixed reply.
struct Rater {
    reply: serde_json::Value,
    calls: AtomicUsize,
}

impl Rater {
    fn answering(service: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            reply: json!({
                "rateGroup": "GROUND",
                "carrierServiceName": service,
                "postalCode": "10001",
                "totalCost": 21.75,
                "ratedWeight": 3.0,
                "ratedWeightUOM": "LB",
                "commit": { "deliveryDay": "WED", "deliveryDate": "2024-05-08", "transitDays": 2 },
                "residential": true
            }),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl RateTransport for Rater {
    async fn request(
        &self,
        _subject: &str,
        _payload: Vec<u8>,
        _timeout: Duration,
    ) -> Result<Vec<u8>, RatingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        serde_json::to_vec(&self.reply).map_err(|e| RatingError::Serialization(e.to_string()))
    }
}

/// Rating subsystem that never answers.
struct Unreachable {
    calls: AtomicUsize,
}

#[async_trait]
impl RateTransport for Unreachable {
    async fn request(
        &self,
        subject: &str,
        _payload: Vec<u8>,
        _timeout: Duration,
    ) -> Result<Vec<u8>, RatingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RatingError::Timeout(format!("no reply on {subject}")))
    }
}

/// Captures retrain events.
#[derive(Default)]
struct Capture {
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

#[async_trait]
impl RetrainPublisher for Capture {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), RatingError> {
        self.published
            .lock()
            .await
            .push((subject.to_string(), payload));
        Ok(())
    }
}

impl Capture {
    async fn wait_for(&self, n: usize) -> Vec<(String, Vec<u8>)> {
        for _ in 0..50 {
            {
                let published = self.published.lock().await;
                if published.len() >= n {
                    return published.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.published.lock().await.clone()
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    orchestrator: FallbackOrchestrator,
}

fn harness(
    store: MemoryLocaleStore,
    transport: Arc<dyn RateTransport>,
    settings: RoutingSettings,
    retrain: Option<RetrainFeed>,
) -> Harness {
    let dir = tempfile::tempdir().expect("test: tempdir");
    write_fixtures(dir.path());
    let classifier = ClassifierAdapter::new(
        ModelPaths {
            base_dir: dir.path().join("base"),
            service_dir: dir.path().join("service"),
            cost_dir: dir.path().join("cost"),
        },
        Arc::new(JsonModelBackend),
    );
    let rater = AuthoritativeRateClient::new(
        transport,
        "rating.rate.request",
        RetryPolicy::fixed(3, Duration::from_millis(5)),
        Duration::from_millis(200),
    );
    let mut orchestrator = FallbackOrchestrator::new(
        FeatureBuilder::new(Arc::new(store)),
        classifier,
        HistoryMatcher::new(dir.path().join("history")),
        rater,
        settings,
    );
    if let Some(feed) = retrain {
        orchestrator = orchestrator.with_retrain_feed(feed);
    }
    Harness {
        _dir: dir,
        orchestrator,
    }
}

fn locales() -> MemoryLocaleStore {
    MemoryLocaleStore::builder()
        .locale("90210")
        .locale("10001")
        .locale("33101")
        .build()
}

// ============================================================================
// AuthoritativeRate
// ============================================================================

#[tokio::test]
async fn test_low_confidence_on_recognized_locale_is_carrier_rated() {
    let rater = Rater::answering(Some("Express"));
    let h = harness(locales(), rater.clone(), RoutingSettings::default(), None);

    let result = h
        .orchestrator
        .predict(&request("10001", false, false), ModelKind::Base)
        .await
        .expect("test: predict");

    assert!(result.carrier_rated);
    assert_eq!(result.confidence, "100%");
    assert_eq!(result.predicted_service, "Express");
    assert_eq!(result.status.code, 1);
    assert_eq!(result.detail.estimated_cost, 21.75);
    assert_eq!(result.detail.estimated_transit_days, 2);
    assert_eq!(rater.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.orchestrator.tracker().snapshot().rated, 1);
}

#[tokio::test]
async fn test_rating_publishes_retrain_event() {
    let capture = Arc::new(Capture::default());
    let (feed, _task) = RetrainFeed::spawn(capture.clone(), "predict.retrain.unit", 8);
    let h = harness(
        locales(),
        Rater::answering(Some("Express")),
        RoutingSettings::default(),
        Some(feed),
    );

    h.orchestrator
        .predict(&request("10001", false, false), ModelKind::Base)
        .await
        .expect("test: predict");

    let published = capture.wait_for(1).await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "predict.retrain.unit");
    let unit: RetrainUnitCreated =
        serde_json::from_slice(&published[0].1).expect("test: decode retrain unit");
    assert_eq!(unit.carrier_service_name.as_deref(), Some("Express"));
    assert_eq!(unit.commit.transit_days, 2);
}

#[tokio::test]
async fn test_rated_without_qualifying_service_reports_none() {
    let h = harness(
        locales(),
        Rater::answering(None),
        RoutingSettings::default(),
        None,
    );

    let result = h
        .orchestrator
        .predict(&request("10001", false, false), ModelKind::Base)
        .await
        .expect("test: predict");

    assert!(result.carrier_rated);
    assert_eq!(result.predicted_service, "None");
    assert_eq!(result.status.code, 0);
}

#[tokio::test]
async fn test_special_locale_is_rated_when_enabled() {
    let store = MemoryLocaleStore::builder()
        .locale("90210")
        .special("90210")
        .build();
    let rater = Rater::answering(Some("Express"));
    let settings = RoutingSettings {
        rate_special_locale: true,
        ..RoutingSettings::default()
    };
    let h = harness(store, rater.clone(), settings, None);

    let result = h
        .orchestrator
        .predict(&request("90210", false, false), ModelKind::Base)
        .await
        .expect("test: predict");

    assert!(result.carrier_rated);
    assert_eq!(rater.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_special_locale_is_not_rated_when_disabled() {
    let store = MemoryLocaleStore::builder()
        .locale("90210")
        .special("90210")
        .build();
    let rater = Rater::answering(Some("Express"));
    let h = harness(store, rater.clone(), RoutingSettings::default(), None);

    let result = h
        .orchestrator
        .predict(&request("90210", false, false), ModelKind::Base)
        .await
        .expect("test: predict");

    assert!(!result.carrier_rated);
    assert_eq!(rater.calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// EstimateFromHistory / AcceptClassifier
// ============================================================================

#[tokio::test]
async fn test_confident_request_with_cost_estimate_uses_history() {
    let rater = Rater::answering(Some("Express"));
    let h = harness(locales(), rater.clone(), RoutingSettings::default(), None);

    let result = h
        .orchestrator
        .predict(&request("90210", true, false), ModelKind::Base)
        .await
        .expect("test: predict");

    assert!(!result.carrier_rated);
    assert_eq!(result.predicted_service, "Ground");
    assert_eq!(result.detail.estimated_cost, 12.50);
    assert_eq!(result.detail.estimated_transit_days, 0);
    assert_eq!(rater.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.orchestrator.tracker().snapshot().estimated, 1);
}

#[tokio::test]
async fn test_transit_estimate_only_fills_transit_days() {
    let h = harness(
        locales(),
        Rater::answering(Some("Express")),
        RoutingSettings::default(),
        None,
    );

    let result = h
        .orchestrator
        .predict(&request("90210", false, true), ModelKind::Base)
        .await
        .expect("test: predict");

    assert_eq!(result.detail.estimated_cost, 0.0);
    assert_eq!(result.detail.estimated_transit_days, 3);
}

#[tokio::test]
async fn test_confident_request_without_estimates_accepts_classifier() {
    let h = harness(
        locales(),
        Rater::answering(Some("Express")),
        RoutingSettings::default(),
        None,
    );

    let result = h
        .orchestrator
        .predict(&request("90210", false, false), ModelKind::Base)
        .await
        .expect("test: predict");

    assert!(!result.carrier_rated);
    assert_eq!(result.predicted_service, "Ground");
    assert_eq!(result.status.code, 1);
    assert!(result.confidence.ends_with('%'));
    assert_ne!(result.confidence, "100%");
    assert_eq!(result.detail.estimated_cost, 0.0);
    assert_eq!(h.orchestrator.tracker().snapshot().accepted, 1);
}

#[tokio::test]
async fn test_no_service_label_becomes_none() {
    let h = harness(
        locales(),
        Rater::answering(Some("Express")),
        RoutingSettings::default(),
        None,
    );

    // NoService skips the history estimate even when one is requested.
    let result = h
        .orchestrator
        .predict(&request("33101", true, true), ModelKind::Base)
        .await
        .expect("test: predict");

    assert_eq!(result.predicted_service, "None");
    assert_eq!(result.status.code, 0);
    assert_eq!(result.detail.estimated_cost, 0.0);
}

#[tokio::test]
async fn test_unrecognized_locale_is_invalid_postal_code() {
    let store = MemoryLocaleStore::builder().locale("90210").build();
    let rater = Rater::answering(Some("Express"));
    let h = harness(store, rater.clone(), RoutingSettings::default(), None);

    let result = h
        .orchestrator
        .predict(&request("10001", false, false), ModelKind::Base)
        .await
        .expect("test: predict");

    assert_eq!(result.predicted_service, "None");
    assert_eq!(result.status.code, 0);
    assert_eq!(result.confidence, "100");
    assert!(!result.carrier_rated);
    assert_eq!(rater.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unrecognized_locale_with_estimates_reports_no_estimate() {
    let store = MemoryLocaleStore::builder().locale("90210").build();
    let rater = Rater::answering(Some("Express"));
    let h = harness(store, rater.clone(), RoutingSettings::default(), None);

    // Prefix 100 has a history row, but 10001 is not a known locale.
    let result = h
        .orchestrator
        .predict(&request("10001", true, true), ModelKind::Base)
        .await
        .expect("test: predict");

    assert_eq!(result.predicted_service, "None");
    assert_eq!(result.status.code, 0);
    assert_eq!(result.detail.estimated_cost, 0.0);
    assert_eq!(result.detail.estimated_transit_days, 0);
    assert_eq!(rater.calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Rating failure policy
// ============================================================================

#[tokio::test]
async fn test_rating_failure_degrades_to_history() {
    let transport = Arc::new(Unreachable {
        calls: AtomicUsize::new(0),
    });
    let h = harness(
        locales(),
        transport.clone(),
        RoutingSettings::default(),
        None,
    );

    let result = h
        .orchestrator
        .predict(&request("10001", true, false), ModelKind::Base)
        .await
        .expect("test: degrade keeps request alive");

    assert!(!result.carrier_rated);
    assert_eq!(result.predicted_service, "Ground");
    assert_eq!(result.detail.estimated_cost, 8.25);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    let snapshot = h.orchestrator.tracker().snapshot();
    assert_eq!(snapshot.rate_failures, 1);
    assert_eq!(snapshot.estimated, 1);
}

#[tokio::test]
async fn test_rating_failure_propagates_when_configured() {
    let settings = RoutingSettings {
        failure_policy: FailurePolicy::Propagate,
        ..RoutingSettings::default()
    };
    let h = harness(
        locales(),
        Arc::new(Unreachable {
            calls: AtomicUsize::new(0),
        }),
        settings,
        None,
    );

    let err = h
        .orchestrator
        .predict(&request("10001", false, false), ModelKind::Base)
        .await
        .expect_err("test: must propagate");
    assert_eq!(err.kind(), "rating_unavailable");
    assert_eq!(h.orchestrator.tracker().snapshot().rate_failures, 1);
}

// ============================================================================
// Step-by-step transitions
// ============================================================================

#[tokio::test]
async fn test_step_walks_every_state_in_order() {
    let h = harness(
        locales(),
        Rater::answering(Some("Express")),
        RoutingSettings::default(),
        None,
    );
    let req = request("90210", true, false);

    let mut state = PredictState::Classify;
    let mut seen = vec![state.name()];
    while !matches!(state, PredictState::Done(_)) {
        state = h
            .orchestrator
            .step(state, &req, ModelKind::Base)
            .await
            .expect("test: step");
        seen.push(state.name());
    }

    assert_eq!(
        seen,
        vec!["classify", "confidence_check", "route", "finalize", "done"]
    );
}

#[tokio::test]
async fn test_missing_model_fails_before_routing() {
    let h = harness(
        locales(),
        Rater::answering(Some("Express")),
        RoutingSettings::default(),
        None,
    );

    let err = h
        .orchestrator
        .predict(&request("90210", false, false), ModelKind::Service)
        .await
        .expect_err("test: service model directory is absent");
    assert_eq!(err.kind(), "model_path_not_found");
    assert_eq!(h.orchestrator.tracker().snapshot().total(), 0);
}
