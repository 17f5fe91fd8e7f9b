//! # Service Configuration
//!
//! ## Responsibility
//! Define the TOML schema for a prediction service deployment: where models,
//! historical datasets and reference tables live, how routing decides between
//! tiers, and how the rating subsystem is reached over NATS.
//!
//! ## Guarantees
//! - Every optional field has a named default function
//! - Every struct derives `JsonSchema`, so [`export_schema`] can emit a
//!   schema for editor completion
//! - A config returned by [`loader`] has passed [`validation::validate`]
//!
//! ## NOT Responsible For
//! - Wiring components from a config (see: `engine`)
//! - Hot reload; the service reads its config once at startup

pub mod loader;
pub mod validation;

use std::path::PathBuf;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::routing::{FailurePolicy, RoutingSettings};

pub use validation::ConfigError;

// ── Default value functions ────────────────────────────────────────────────

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_cache() -> bool {
    false
}

fn default_confidence_threshold() -> f64 {
    85.0
}

fn default_nats_url() -> String {
    "nats://127.0.0.1:4222".to_string()
}

fn default_rate_subject() -> String {
    "rating.rate.request".to_string()
}

fn default_retrain_subject() -> String {
    "predict.retrain.unit".to_string()
}

fn default_predict_subject() -> String {
    "predict.engine.request".to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_interval_ms() -> u64 {
    5000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_retrain_queue_capacity() -> usize {
    256
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

// ── Top-level config ───────────────────────────────────────────────────────

/// Root of a prediction service config file.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ServiceConfig {
    /// HTTP listener.
    #[serde(default)]
    pub server: ServerConfig,
    /// Model artifact locations.
    pub models: ModelsConfig,
    /// Historical dataset location.
    pub history: HistoryConfig,
    /// Reference table location.
    pub reference: ReferenceConfig,
    /// Tier selection knobs.
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Rating subsystem transport.
    #[serde(default)]
    pub rating: RatingConfig,
    /// Audit log sink.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Logging.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener settings.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted request body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Model artifact directories.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ModelsConfig {
    /// Directory holding `{rateGroup}.zip` base models.
    pub path: PathBuf,
    /// Directory holding service sub-models.
    pub service_path: PathBuf,
    /// Directory holding `{rateGroup}_COST.zip` cost models.
    pub cost_path: PathBuf,
    /// Keep loaded artifacts in memory instead of reading per call.
    #[serde(default = "default_cache")]
    pub cache: bool,
}

/// Historical dataset directory.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct HistoryConfig {
    /// Directory with one file per rate group.
    pub path: PathBuf,
}

/// Reference table directory.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ReferenceConfig {
    /// Directory containing `locales.json`, `area_surcharges.json` and
    /// `special_locales.json`.
    pub dir: PathBuf,
}

/// Tier selection settings.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RoutingConfig {
    /// Percentage below which a recognised locale is rated.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Always rate locales listed in the special-locale table.
    #[serde(default)]
    pub rate_special_locale: bool,
    /// Behaviour when rating stays unavailable after retries.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            rate_special_locale: false,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl From<&RoutingConfig> for RoutingSettings {
    fn from(c: &RoutingConfig) -> Self {
        Self {
            confidence_threshold: c.confidence_threshold,
            rate_special_locale: c.rate_special_locale,
            failure_policy: c.failure_policy,
        }
    }
}

/// NATS transport to the rating subsystem.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RatingConfig {
    /// Broker URL.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,
    /// Subject for `RateRequestCreated` request/reply.
    #[serde(default = "default_rate_subject")]
    pub rate_subject: String,
    /// Subject for `RetrainUnitCreated` events.
    #[serde(default = "default_retrain_subject")]
    pub retrain_subject: String,
    /// Subject on which inbound prediction requests arrive.
    #[serde(default = "default_predict_subject")]
    pub predict_subject: String,
    /// Attempts per rating call, including the first.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Pause between attempts.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// Per-attempt reply timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Bound of the retrain publish queue.
    #[serde(default = "default_retrain_queue_capacity")]
    pub retrain_queue_capacity: usize,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            nats_url: default_nats_url(),
            rate_subject: default_rate_subject(),
            retrain_subject: default_retrain_subject(),
            predict_subject: default_predict_subject(),
            retry_attempts: default_retry_attempts(),
            retry_interval_ms: default_retry_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            retrain_queue_capacity: default_retrain_queue_capacity(),
        }
    }
}

impl RatingConfig {
    /// Pause between attempts.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Per-attempt reply timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Audit log sink.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AuditConfig {
    /// JSON-lines file to append to. `None` keeps entries in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Logging settings.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ObservabilityConfig {
    /// Log output format.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
        }
    }
}

/// Log output format.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable output.
    Pretty,
    /// Structured JSON output.
    Json,
}

impl LogFormat {
    /// Name accepted by [`crate::init_tracing_with_format`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

/// Export the JSON Schema for [`ServiceConfig`].
///
/// # Errors
///
/// Returns `serde_json::Error` if schema serialization fails.
///
/// # Panics
///
/// This function never panics.
pub fn export_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(ServiceConfig);
    serde_json::to_string_pretty(&schema)
}
