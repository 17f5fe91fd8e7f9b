//! Configuration validation.
//!
//! ## Responsibility
//! Check semantic constraints on a parsed [`ServiceConfig`] that the type
//! system cannot express (ranges, non-empty paths and subjects).
//!
//! ## Guarantees
//! - Validation collects *all* errors before returning
//! - Error messages include the field path and the invalid value
//!
//! ## NOT Responsible For
//! - Parsing TOML or file I/O (see: `loader`)

use std::path::Path;

use super::ServiceConfig;

/// Errors arising from configuration parsing, validation, or I/O.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("Parse error in {file}: {source}")]
    Parse {
        /// Source that failed to parse.
        file: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// One or more semantic rules failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A field has an out-of-range or empty value.
    #[error("Field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Dot-separated field path, e.g. `routing.confidence_threshold`.
        field: String,
        /// The rejected value.
        value: String,
        /// The constraint it broke.
        reason: String,
    },

    /// File I/O error.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// File that could not be read.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidField {
        field: field.into(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn require_path(errors: &mut Vec<ConfigError>, field: &str, path: &Path) {
    if path.as_os_str().is_empty() {
        errors.push(invalid(field, "", "path must not be empty"));
    }
}

fn require_subject(errors: &mut Vec<ConfigError>, field: &str, subject: &str) {
    if subject.trim().is_empty() {
        errors.push(invalid(field, "", "subject must not be empty"));
    }
}

/// Validate all semantic constraints on a [`ServiceConfig`].
///
/// # Errors
///
/// Returns every violation found.
///
/// # Panics
///
/// This function never panics.
pub fn validate(config: &ServiceConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // ── Server ───────────────────────────────────────────────────────
    if config.server.port == 0 {
        errors.push(invalid("server.port", 0, "port must be at least 1"));
    }
    if config.server.max_body_bytes == 0 {
        errors.push(invalid("server.max_body_bytes", 0, "must be at least 1"));
    }

    // ── Paths ────────────────────────────────────────────────────────
    require_path(&mut errors, "models.path", &config.models.path);
    require_path(&mut errors, "models.service_path", &config.models.service_path);
    require_path(&mut errors, "models.cost_path", &config.models.cost_path);
    require_path(&mut errors, "history.path", &config.history.path);
    require_path(&mut errors, "reference.dir", &config.reference.dir);

    // ── Routing ──────────────────────────────────────────────────────
    let threshold = config.routing.confidence_threshold;
    if !(0.0..=100.0).contains(&threshold) {
        errors.push(invalid(
            "routing.confidence_threshold",
            threshold,
            "must be between 0 and 100",
        ));
    }

    // ── Rating transport ─────────────────────────────────────────────
    let rating = &config.rating;
    if rating.nats_url.trim().is_empty() {
        errors.push(invalid("rating.nats_url", "", "url must not be empty"));
    }
    require_subject(&mut errors, "rating.rate_subject", &rating.rate_subject);
    require_subject(&mut errors, "rating.retrain_subject", &rating.retrain_subject);
    require_subject(&mut errors, "rating.predict_subject", &rating.predict_subject);
    if rating.retry_attempts == 0 {
        errors.push(invalid("rating.retry_attempts", 0, "must be at least 1"));
    }
    if rating.retry_interval_ms == 0 {
        errors.push(invalid("rating.retry_interval_ms", 0, "must be at least 1ms"));
    }
    if rating.request_timeout_ms == 0 {
        errors.push(invalid("rating.request_timeout_ms", 0, "must be at least 1ms"));
    }
    if rating.retrain_queue_capacity == 0 {
        errors.push(invalid(
            "rating.retrain_queue_capacity",
            0,
            "queue capacity must be at least 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
