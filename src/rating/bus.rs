//! NATS transport for rating request/reply and retrain publishing.
//!
//! Payloads are the raw JSON contracts; subjects come from configuration.

use std::sync::Arc;
use std::time::Duration;

use async_nats::Client;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{RateTransport, RatingError, RetrainPublisher};

/// Shared NATS connection.
///
/// Cloning shares the underlying connection.
///
/// # Panics
/// This type never panics.
#[derive(Clone)]
pub struct NatsBus {
    client: Arc<RwLock<Option<Client>>>,
    nats_url: String,
}

impl NatsBus {
    /// Connect to a NATS server.
    ///
    /// # Arguments
    /// * `nats_url`: NATS server URL (e.g., `nats://localhost:4222`)
    ///
    /// # Returns
    /// - `Ok(NatsBus)`: connected and ready
    /// - `Err(RatingError::Transport)`: connection failed
    ///
    /// # Panics
    /// This function never panics.
    pub async fn connect(nats_url: &str) -> Result<Self, RatingError> {
        let client = async_nats::connect(nats_url).await.map_err(|e| {
            RatingError::Transport(format!("failed to connect to NATS at {nats_url}: {e}"))
        })?;

        info!(url = nats_url, "connected to NATS");

        Ok(Self {
            client: Arc::new(RwLock::new(Some(client))),
            nats_url: nats_url.to_string(),
        })
    }

    /// Create a bus with no connection; every operation fails with
    /// [`RatingError::Transport`] until the process is restarted with NATS up.
    ///
    /// # Panics
    /// This function never panics.
    pub fn unconnected(nats_url: &str) -> Self {
        Self {
            client: Arc::new(RwLock::new(None)),
            nats_url: nats_url.to_string(),
        }
    }

    async fn client(&self) -> Result<Client, RatingError> {
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| RatingError::Transport("not connected to NATS".to_string()))
    }

    /// Subscribe to `subject`.
    ///
    /// # Returns
    /// - `Ok(Subscriber)`: subscription active
    /// - `Err(RatingError::Transport)`: not connected or subscribe failed
    ///
    /// # Panics
    /// This function never panics.
    pub async fn subscribe(&self, subject: &str) -> Result<async_nats::Subscriber, RatingError> {
        let client = self.client().await?;
        let subscriber = client.subscribe(subject.to_string()).await.map_err(|e| {
            RatingError::Transport(format!("subscribe to {subject} failed: {e}"))
        })?;
        info!(subject, "subscribed");
        Ok(subscriber)
    }

    /// Check if this bus is currently connected.
    ///
    /// # Panics
    /// This function never panics.
    pub async fn is_connected(&self) -> bool {
        self.client.read().await.is_some()
    }
}

#[async_trait]
impl RateTransport for NatsBus {
    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, RatingError> {
        let client = self.client().await?;
        let reply = tokio::time::timeout(timeout, client.request(subject.to_string(), payload.into()))
            .await
            .map_err(|_| {
                RatingError::Timeout(format!(
                    "request to {subject} timed out after {}ms",
                    timeout.as_millis()
                ))
            })?
            .map_err(|e| RatingError::Transport(format!("request to {subject} failed: {e}")))?;

        debug!(subject, bytes = reply.payload.len(), "received reply");
        Ok(reply.payload.to_vec())
    }
}

#[async_trait]
impl RetrainPublisher for NatsBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), RatingError> {
        let client = self.client().await?;
        client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| RatingError::Transport(format!("publish to {subject} failed: {e}")))?;
        debug!(subject, "published message");
        Ok(())
    }
}

impl std::fmt::Debug for NatsBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsBus")
            .field("nats_url", &self.nats_url)
            .finish_non_exhaustive()
    }
}
