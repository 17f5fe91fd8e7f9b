//! parcel-predict-engine server
//!
//! Loads the service config, connects to NATS, and serves predictions over
//! HTTP and over the inbound predict subject.
//!
//! ## Configuration
//!
//! The config path is the first argument, else `PREDICT_ENGINE_CONFIG`,
//! else `predict-engine.toml`.
//!
//! ## Environment Variables
//!
//! - `LOG_FORMAT=json`: structured JSON output (overrides the config file)
//! - `RUST_LOG=info`: log level filter

use std::path::PathBuf;

use parcel_predict_engine::config::loader::load_from_file;
use parcel_predict_engine::rating::NatsBus;
use parcel_predict_engine::{consumer, init_tracing_with_format, metrics, web_api, PredictEngine};
use tracing::{error, info, warn};

const DEFAULT_CONFIG: &str = "predict-engine.toml";

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PREDICT_ENGINE_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string())
        .into()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let path = config_path();
    let config = load_from_file(&path)?;

    let format = std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| config.observability.log_format.as_str().to_string());
    let _ = init_tracing_with_format(&format);

    metrics::init_metrics()?;

    info!(config = %path.display(), "starting parcel-predict-engine");

    let bus = match NatsBus::connect(&config.rating.nats_url).await {
        Ok(bus) => bus,
        Err(e) => {
            warn!(error = %e, "NATS unavailable, rating and inbound requests disabled");
            NatsBus::unconnected(&config.rating.nats_url)
        }
    };

    let engine = PredictEngine::from_config(&config, bus.clone());

    if bus.is_connected().await {
        let engine = engine.clone();
        let subject = config.rating.predict_subject.clone();
        tokio::spawn(async move {
            if let Err(e) = consumer::run(engine, bus, &subject).await {
                error!(error = %e, "prediction consumer failed");
            }
        });
    }

    web_api::start_server(&config.server, engine).await
}
