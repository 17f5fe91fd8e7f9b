//! Configuration file loading.
//!
//! ## Responsibility
//! Read a TOML file, parse it into a [`ServiceConfig`], and validate it
//! before returning.
//!
//! ## Guarantees
//! - A successfully loaded config is always validated
//! - I/O, parse and validation failures are distinct error variants
//! - The source name is included in every error message
//!
//! ## NOT Responsible For
//! - Defining the config schema (see: `mod.rs`)

use std::path::Path;

use super::validation::{self, ConfigError};
use super::ServiceConfig;

/// Load a [`ServiceConfig`] from a TOML file.
///
/// # Errors
///
/// - [`ConfigError::Io`] if the file cannot be read
/// - [`ConfigError::Parse`] if the TOML is malformed
/// - [`ConfigError::Validation`] if semantic constraints are violated
///
/// # Panics
///
/// This function never panics.
///
/// # Example
///
/// ```rust,ignore
/// use parcel_predict_engine::config::loader::load_from_file;
/// use std::path::Path;
///
/// let config = load_from_file(Path::new("predict-engine.toml"))?;
/// println!("models in {}", config.models.path.display());
/// ```
pub fn load_from_file(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        file: path.display().to_string(),
        source: e,
    })?;

    load_from_str(&content, &path.display().to_string())
}

/// Load a [`ServiceConfig`] from a TOML string.
///
/// `source_name` identifies the content in error messages.
///
/// # Errors
///
/// - [`ConfigError::Parse`] if the TOML is malformed
/// - [`ConfigError::Validation`] if semantic constraints are violated
///
/// # Panics
///
/// This function never panics.
pub fn load_from_str(content: &str, source_name: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
        file: source_name.to_string(),
        source: e,
    })?;

    validation::validate(&config).map_err(|errors| {
        ConfigError::Validation(
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        )
    })?;

    Ok(config)
}
