//! # Stage: Authoritative Rate Client
//!
//! ## Responsibility
//! Ask the external rating subsystem for the real carrier service and cost
//! of a shipment over NATS request/reply, and republish each successful
//! rating on the retraining feed.
//!
//! ## Guarantees
//! - Retry policy is fixed at construction (default 3 attempts, 5 s apart)
//! - Every attempt is bounded by a per-attempt timeout
//! - Retrain publishing never blocks or fails the caller
//! - Transport failures surface as [`RatingError`], never panic
//!
//! ## NOT Responsible For
//! - Carrier rate shopping (external collaborator)
//! - Deciding when to rate (see: `routing`)

pub mod bus;
pub mod client;
pub mod contracts;
pub mod retrain;
pub mod retry;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use bus::NatsBus;
pub use client::AuthoritativeRateClient;
pub use contracts::{Commit, RateRequestCreated, RateResultCreated, RetrainUnitCreated};
pub use retrain::RetrainFeed;
pub use retry::RetryPolicy;

/// Errors raised while talking to the rating subsystem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RatingError {
    /// The transport rejected the operation or is not connected.
    #[error("rating transport error: {0}")]
    Transport(String),

    /// No reply arrived within the per-attempt timeout.
    #[error("rating request timed out: {0}")]
    Timeout(String),

    /// A contract could not be encoded or decoded.
    #[error("rating contract serialization failed: {0}")]
    Serialization(String),

    /// Every attempt failed.
    #[error("authoritative rating unavailable after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made.
        attempts: usize,
        /// Last error observed.
        last: String,
    },
}

/// Request/reply transport to the rating subsystem.
#[async_trait]
pub trait RateTransport: Send + Sync {
    /// Send `payload` on `subject` and wait up to `timeout` for the reply body.
    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, RatingError>;
}

/// Fire-and-forget publisher for the retraining feed.
#[async_trait]
pub trait RetrainPublisher: Send + Sync {
    /// Publish `payload` on `subject`.
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), RatingError>;
}
