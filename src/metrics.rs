//! Prometheus metrics for the prediction service.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup. The helper functions
//! (`inc_request`, `record_stage_duration`, …) are no-ops if `init_metrics`
//! was never called, so library users and tests never need a registry.
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `predict_requests_total` | Counter | `endpoint` |
//! | `predict_routes_total` | Counter | `route` |
//! | `predict_errors_total` | Counter | `endpoint`, `err_type` |
//! | `predict_stage_duration_seconds` | Histogram | `stage` |
//! | `predict_retrain_shed_total` | Counter | |

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;

use crate::PredictError;

// ── Internal metrics bundle ────────────────────────────────────────────────

/// All Prometheus metrics for the service, stored in a single [`OnceLock`].
pub struct Metrics {
    /// Prometheus registry that owns all metric descriptors.
    pub registry: Registry,
    /// Requests received per endpoint.
    pub requests_total: CounterVec,
    /// Final routes taken.
    pub routes_total: CounterVec,
    /// Errors by endpoint and error type.
    pub errors_total: CounterVec,
    /// Stage latency histogram.
    pub stage_duration: HistogramVec,
    /// Retrain events dropped because the queue was full.
    pub retrain_shed: IntCounter,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn register<C>(registry: &Registry, collector: C) -> Result<C, PredictError>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|e| PredictError::Other(format!("metrics registration failed: {e}")))?;
    Ok(collector)
}

fn build(prefix: &str) -> Result<Metrics, PredictError> {
    let init_err = |e: prometheus::Error| PredictError::Other(format!("metrics init failed: {e}"));
    let registry = Registry::new();

    let requests_total = register(
        &registry,
        CounterVec::new(
            Opts::new(format!("{prefix}_requests_total"), "Requests received"),
            &["endpoint"],
        )
        .map_err(init_err)?,
    )?;
    let routes_total = register(
        &registry,
        CounterVec::new(
            Opts::new(format!("{prefix}_routes_total"), "Final prediction routes"),
            &["route"],
        )
        .map_err(init_err)?,
    )?;
    let errors_total = register(
        &registry,
        CounterVec::new(
            Opts::new(format!("{prefix}_errors_total"), "Errors by endpoint and type"),
            &["endpoint", "err_type"],
        )
        .map_err(init_err)?,
    )?;
    let stage_duration = register(
        &registry,
        HistogramVec::new(
            HistogramOpts::new(
                format!("{prefix}_stage_duration_seconds"),
                "Processing duration per stage",
            ),
            &["stage"],
        )
        .map_err(init_err)?,
    )?;
    let retrain_shed = register(
        &registry,
        IntCounter::new(
            format!("{prefix}_retrain_shed_total"),
            "Retrain events dropped because the queue was full",
        )
        .map_err(init_err)?,
    )?;

    Ok(Metrics {
        registry,
        requests_total,
        routes_total,
        errors_total,
        stage_duration,
        retrain_shed,
    })
}

// ── Initialisation ─────────────────────────────────────────────────────────

/// Initialise all Prometheus metrics in a private registry.
///
/// Calling it a second time is a no-op (returns `Ok(())`).
///
/// # Errors
///
/// Returns [`PredictError::Other`] if metric construction or registration fails.
///
/// # Panics
///
/// This function never panics.
pub fn init_metrics() -> Result<(), PredictError> {
    if METRICS.get().is_some() {
        return Ok(());
    }
    // A racing initialiser builds identical descriptors; the first one wins.
    let _ = METRICS.set(build("predict")?);
    Ok(())
}

fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

// ── Public helper functions ────────────────────────────────────────────────

/// Increment the request counter for an endpoint.
pub fn inc_request(endpoint: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.requests_total.get_metric_with_label_values(&[endpoint]) {
            c.inc();
        }
    }
}

/// Increment the counter for the route that produced an answer.
pub fn inc_route(route: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.routes_total.get_metric_with_label_values(&[route]) {
            c.inc();
        }
    }
}

/// Increment the error counter for an endpoint and error type.
pub fn inc_error(endpoint: &str, err_type: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m
            .errors_total
            .get_metric_with_label_values(&[endpoint, err_type])
        {
            c.inc();
        }
    }
}

/// Record the duration of a processing stage.
pub fn record_stage_duration(stage: &str, d: Duration) {
    if let Some(m) = metrics() {
        if let Ok(h) = m.stage_duration.get_metric_with_label_values(&[stage]) {
            h.observe(d.as_secs_f64());
        }
    }
}

/// Count a retrain event shed by a full queue.
pub fn inc_retrain_shed() {
    if let Some(m) = metrics() {
        m.retrain_shed.inc();
    }
}

/// Gather and encode all metrics in the Prometheus text exposition format.
///
/// Returns an empty string if metrics have not been initialised or if
/// encoding fails.
///
/// # Panics
///
/// This function never panics.
pub fn gather_metrics() -> String {
    let Some(m) = metrics() else {
        return String::new();
    };
    let families = m.registry.gather();
    let mut buffer = Vec::new();
    if TextEncoder::new().encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_helpers_never_panic() {
        inc_request("predict");
        inc_route("accept_classifier");
        inc_error("predict", "validation");
        record_stage_duration("classify", Duration::from_millis(3));
        inc_retrain_shed();
    }

    #[test]
    fn test_isolated_bundle_counts() {
        let m = build("t_predict").expect("test: build metrics");
        m.routes_total
            .get_metric_with_label_values(&["authoritative_rate"])
            .expect("test: label")
            .inc();
        m.retrain_shed.inc();
        m.retrain_shed.inc();

        let families = m.registry.gather();
        let routes = families
            .iter()
            .find(|f| f.get_name() == "t_predict_routes_total")
            .expect("test: routes family");
        assert!((routes.get_metric()[0].get_counter().get_value() - 1.0).abs() < f64::EPSILON);
        assert_eq!(m.retrain_shed.get(), 2);
    }

    #[test]
    fn test_gather_metrics_contains_series_after_observation() {
        let _ = init_metrics();
        inc_request("gather-test");
        let text = gather_metrics();
        assert!(text.contains("predict_requests_total"), "{text}");
    }
}
