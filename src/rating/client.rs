//! Request/reply client for the rating subsystem.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::contracts::{RateRequestCreated, RateResultCreated};
use super::retry::RetryPolicy;
use super::{RateTransport, RatingError};
use crate::metrics;

/// Issues rating requests with a process-wide retry policy.
#[derive(Clone)]
pub struct AuthoritativeRateClient {
    transport: Arc<dyn RateTransport>,
    subject: String,
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl AuthoritativeRateClient {
    /// Create a client.
    ///
    /// # Arguments
    /// * `transport`: request/reply transport
    /// * `subject`: subject the rating subsystem listens on
    /// * `policy`: retry policy for every call
    /// * `attempt_timeout`: upper bound on a single attempt
    pub fn new(
        transport: Arc<dyn RateTransport>,
        subject: impl Into<String>,
        policy: RetryPolicy,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            subject: subject.into(),
            policy,
            attempt_timeout,
        }
    }

    /// Retry policy in force.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Rate a shipment, blocking until a reply arrives or retries run out.
    ///
    /// # Errors
    ///
    /// - [`RatingError::Serialization`] if the request cannot be encoded or
    ///   the reply cannot be decoded
    /// - [`RatingError::Exhausted`] once every attempt has failed
    pub async fn rate(&self, request: &RateRequestCreated) -> Result<RateResultCreated, RatingError> {
        let start = Instant::now();
        let payload = serde_json::to_vec(request)
            .map_err(|e| RatingError::Serialization(format!("rate request: {e}")))?;

        let reply = self
            .policy
            .retry(|attempt| {
                let payload = payload.clone();
                async move {
                    if attempt > 1 {
                        warn!(
                            attempt,
                            subject = %self.subject,
                            rate_group = %request.rate_group,
                            "retrying authoritative rating"
                        );
                    }
                    self.transport
                        .request(&self.subject, payload, self.attempt_timeout)
                        .await
                }
            })
            .await?;

        let result: RateResultCreated = serde_json::from_slice(&reply)
            .map_err(|e| RatingError::Serialization(format!("rate result: {e}")))?;

        metrics::record_stage_duration("rate", start.elapsed());
        info!(
            rate_group = %request.rate_group,
            service = result.carrier_service_name.as_deref().unwrap_or("<none>"),
            total_cost = result.total_cost,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "authoritative rating received"
        );
        Ok(result)
    }
}

impl std::fmt::Debug for AuthoritativeRateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthoritativeRateClient")
            .field("subject", &self.subject)
            .field("policy", &self.policy)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish_non_exhaustive()
    }
}
