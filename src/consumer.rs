//! # Inbound Prediction Consumer
//!
//! ## Responsibility
//! Serve service predictions requested over NATS: each message on the
//! predict subject carries `{predictEngineRequest: ShipmentRequest}`, and a
//! successful prediction is sent back on the message's reply subject.
//!
//! ## Guarantees
//! - Each message is handled on its own task; a slow rating call never
//!   stalls the subscription
//! - Failed or malformed requests are logged and get no reply, so the
//!   requester times out
//!
//! ## NOT Responsible For
//! - Prediction logic (see: `engine`, `routing`)

use std::sync::Arc;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::engine::PredictEngine;
use crate::model::ModelKind;
use crate::rating::{NatsBus, RatingError, RetrainPublisher};
use crate::request::ShipmentRequest;

/// Envelope of an inbound prediction message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictEnvelope {
    /// The shipment to predict.
    pub predict_engine_request: ShipmentRequest,
}

/// Run one inbound payload through the engine.
///
/// Returns the serialized `PredictionResult` to reply with, or `None` when
/// the payload is malformed or the prediction fails.
pub async fn handle_payload(engine: &PredictEngine, payload: &[u8]) -> Option<Vec<u8>> {
    let envelope: PredictEnvelope = match serde_json::from_slice(payload) {
        Ok(e) => e,
        Err(e) => {
            warn!(error = %e, "malformed inbound prediction request");
            return None;
        }
    };
    let request = envelope.predict_engine_request;
    match engine.predict(&request, ModelKind::Service).await {
        Ok(result) => match serde_json::to_vec(&result) {
            Ok(body) => Some(body),
            Err(e) => {
                error!(error = %e, "failed to encode prediction result");
                None
            }
        },
        Err(e) => {
            error!(
                rate_group = %request.rate_group,
                kind = e.kind(),
                error = %e,
                "inbound prediction failed"
            );
            None
        }
    }
}

/// Subscribe to `subject` and answer requests until the subscription ends.
///
/// # Errors
///
/// Returns [`RatingError::Transport`] if the subscription cannot be created.
pub async fn run(engine: PredictEngine, bus: NatsBus, subject: &str) -> Result<(), RatingError> {
    let mut subscriber = bus.subscribe(subject).await?;
    let bus = Arc::new(bus);
    info!(subject, "prediction consumer listening");

    while let Some(msg) = subscriber.next().await {
        let engine = engine.clone();
        let bus = bus.clone();
        tokio::spawn(async move {
            let Some(reply) = msg.reply else {
                debug!(subject = %msg.subject, "inbound request without reply subject");
                return;
            };
            if let Some(body) = handle_payload(&engine, &msg.payload).await {
                if let Err(e) = bus.publish(reply.as_str(), body).await {
                    warn!(reply = %reply, error = %e, "failed to send prediction reply");
                }
            }
        });
    }

    info!(subject, "prediction consumer stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::fixtures::ground_request;

    #[test]
    fn test_envelope_uses_camel_case_key() {
        let env = PredictEnvelope {
            predict_engine_request: ground_request(),
        };
        let json = serde_json::to_value(&env).expect("test: ser");
        assert!(json.get("predictEngineRequest").is_some());
        assert_eq!(json["predictEngineRequest"]["rateGroup"], "GROUND");
    }

    #[test]
    fn test_envelope_missing_request_fails_to_parse() {
        assert!(serde_json::from_str::<PredictEnvelope>(r#"{"other": {}}"#).is_err());
    }

    #[tokio::test]
    async fn test_run_without_connection_returns_transport_error() {
        let dir = tempfile::tempdir().expect("test: tempdir");
        let toml = format!(
            "[models]\npath = \"{0}\"\nservice_path = \"{0}\"\ncost_path = \"{0}\"\n\
             [history]\npath = \"{0}\"\n[reference]\ndir = \"{0}\"\n",
            dir.path().display()
        );
        let config =
            crate::config::loader::load_from_str(&toml, "consumer-test").expect("test: config");
        let bus = NatsBus::unconnected("nats://127.0.0.1:1");
        let engine = PredictEngine::from_config(&config, bus.clone());
        let err = run(engine, bus, "predict.engine.request")
            .await
            .expect_err("test: must fail");
        assert!(matches!(err, RatingError::Transport(_)));
    }
}
