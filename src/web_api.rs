//! Web API Server
//!
//! HTTP bindings for the prediction engine.
//!
//! ## Endpoints
//!
//! - `POST /predict`: service prediction with the base model
//! - `POST /predict/service`: service prediction with the service model
//! - `POST /predict/cost`: cost prediction for a named carrier service
//! - `GET  /health`: liveness plus route counters
//! - `GET  /metrics`: Prometheus metrics
//!
//! Failures return `{code, request_id, messages}` with a fresh UUID per
//! response and no internal detail beyond the error message.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::cost::CostRequest;
use crate::engine::PredictEngine;
use crate::model::ModelKind;
use crate::request::ShipmentRequest;
use crate::result::{CostPredictionResult, PredictionResult};
use crate::PredictError;

/// Error body returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// HTTP status code.
    pub code: u16,
    /// Identifier for correlating the response with logs.
    pub request_id: String,
    /// Human-readable messages.
    pub messages: Vec<String>,
}

/// Build the router over `engine`.
///
/// `max_body_bytes` caps request bodies; larger ones get `413`.
pub fn router(engine: PredictEngine, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/predict", post(predict_handler))
        .route("/predict/service", post(predict_service_handler))
        .route("/predict/cost", post(predict_cost_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

/// Serve the API on `config.host:config.port` until the process exits.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn start_server(
    config: &ServerConfig,
    engine: PredictEngine,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = config.bind_addr();
    let app = router(engine, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Web API ready on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Prediction Handlers
// ============================================================================

/// `POST /predict`
async fn predict_handler(
    State(engine): State<PredictEngine>,
    body: Result<Json<ShipmentRequest>, JsonRejection>,
) -> Result<Json<PredictionResult>, AppError> {
    predict_with(&engine, body, ModelKind::Base).await
}

/// `POST /predict/service`
async fn predict_service_handler(
    State(engine): State<PredictEngine>,
    body: Result<Json<ShipmentRequest>, JsonRejection>,
) -> Result<Json<PredictionResult>, AppError> {
    predict_with(&engine, body, ModelKind::Service).await
}

async fn predict_with(
    engine: &PredictEngine,
    body: Result<Json<ShipmentRequest>, JsonRejection>,
    kind: ModelKind,
) -> Result<Json<PredictionResult>, AppError> {
    let Json(request) = body?;
    let result = engine.predict(&request, kind).await?;
    Ok(Json(result))
}

/// `POST /predict/cost`
async fn predict_cost_handler(
    State(engine): State<PredictEngine>,
    body: Result<Json<CostRequest>, JsonRejection>,
) -> Result<Json<CostPredictionResult>, AppError> {
    let Json(request) = body?;
    let result = engine.predict_cost(&request).await?;
    Ok(Json(result))
}

// ============================================================================
// Utility Handlers
// ============================================================================

/// `GET /health`
async fn health_handler(State(engine): State<PredictEngine>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "routes": engine.routes(),
    }))
}

/// `GET /metrics`
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

// ============================================================================
// Error Type
// ============================================================================

/// Handler failure, mapped onto an HTTP status and an [`ErrorBody`].
#[derive(Debug)]
enum AppError {
    /// The body was not valid JSON for the endpoint.
    Malformed(String),
    /// The engine rejected the request.
    Predict(PredictError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Malformed(rejection.body_text())
    }
}

impl From<PredictError> for AppError {
    fn from(e: PredictError) -> Self {
        Self::Predict(e)
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Malformed(_) => StatusCode::BAD_REQUEST,
            Self::Predict(PredictError::Validation(_) | PredictError::Model(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Predict(PredictError::Rating(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Predict(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn messages(&self) -> Vec<String> {
        match self {
            Self::Malformed(m) => vec![m.clone()],
            Self::Predict(PredictError::Validation(v)) => v.messages.clone(),
            Self::Predict(e) => vec![e.to_string()],
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            code: status.as_u16(),
            request_id: Uuid::new_v4().to_string(),
            messages: self.messages(),
        };
        if let Self::Malformed(m) = &self {
            warn!(request_id = %body.request_id, error = %m, "malformed request body");
        }
        (status, Json(body)).into_response()
    }
}
