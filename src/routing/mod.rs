//! # Stage: Fallback Orchestrator
//!
//! ## Responsibility
//! Decide, per shipment, whether to trust the classifier, pay for an
//! authoritative rating, or fill estimates from historical data, and
//! reconcile the chosen tier's output into one [`PredictionResult`].
//!
//! ## Guarantees
//! - Explicit: the flow is an enumerated state machine and the tier choice
//!   is an ordered rule table, each testable on its own
//! - Non-fatal history: a missing dataset or match never fails a request
//! - Policy-driven: rating failure after retries either degrades or
//!   propagates, per [`FailurePolicy`]
//! - Thread-safe: the orchestrator is `Clone` and holds no per-request state
//!
//! ## NOT Responsible For
//! - HTTP or messaging bindings (see: `web_api`, `consumer`)
//! - Inference and artifact loading (see: `model`)
//!
//! [`PredictionResult`]: crate::result::PredictionResult

pub mod orchestrator;
pub mod state;
pub mod tracker;

// Re-exports for convenience
pub use orchestrator::{
    FailurePolicy, FallbackOrchestrator, PredictState, RouteContext, RoutingSettings,
};
pub use state::{finalize, select_route, Route, RouteInputs, ROUTING_TABLE};
pub use tracker::{RouteSnapshot, RouteTracker};
