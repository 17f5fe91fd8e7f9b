//! Best-effort retraining feed.
//!
//! Ratings are queued on a bounded channel and published by a background
//! task. A full queue sheds the event; a publish failure is logged. Neither
//! reaches the request that produced the rating.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::contracts::RetrainUnitCreated;
use super::RetrainPublisher;
use crate::metrics;

/// Outcome of handing an event to the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Queued for publishing.
    Queued,
    /// Queue was full; the event was dropped.
    Shed,
    /// Publisher task has stopped; the event was dropped.
    Closed,
}

/// Sending half of the retraining feed.
#[derive(Debug, Clone)]
pub struct RetrainFeed {
    tx: mpsc::Sender<RetrainUnitCreated>,
}

impl RetrainFeed {
    /// Start the publisher task.
    ///
    /// # Arguments
    /// * `publisher`: transport the events go out on
    /// * `subject`: subject to publish on
    /// * `capacity`: queue depth before events are shed (minimum 1)
    ///
    /// # Returns
    /// The feed and the publisher task handle. The task ends once every
    /// clone of the feed has been dropped and the queue is drained.
    pub fn spawn(
        publisher: Arc<dyn RetrainPublisher>,
        subject: impl Into<String>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(publish_loop(publisher, subject.into(), rx));
        (Self { tx }, handle)
    }

    /// Queue `unit` without waiting.
    pub fn enqueue(&self, unit: RetrainUnitCreated) -> Enqueued {
        match self.tx.try_send(unit) {
            Ok(()) => Enqueued::Queued,
            Err(TrySendError::Full(unit)) => {
                warn!(
                    rate_group = %unit.rate_group,
                    "retrain queue full, shedding event"
                );
                metrics::inc_retrain_shed();
                Enqueued::Shed
            }
            Err(TrySendError::Closed(_)) => {
                warn!("retrain publisher stopped, dropping event");
                Enqueued::Closed
            }
        }
    }
}

async fn publish_loop(
    publisher: Arc<dyn RetrainPublisher>,
    subject: String,
    mut rx: mpsc::Receiver<RetrainUnitCreated>,
) {
    info!(subject = %subject, "retrain publisher started");
    while let Some(unit) = rx.recv().await {
        let payload = match serde_json::to_vec(&unit) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "failed to encode retrain event");
                continue;
            }
        };
        match publisher.publish(&subject, payload).await {
            Ok(()) => debug!(rate_group = %unit.rate_group, "retrain event published"),
            Err(e) => warn!(
                rate_group = %unit.rate_group,
                error = %e,
                "retrain publish failed"
            ),
        }
    }
    info!(subject = %subject, "retrain publisher shutting down");
}
