//! Route outcome counters.
//!
//! Thread-safe: all counters use atomic operations for lock-free reads
//! and writes under concurrent request handling.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::state::Route;

/// Counts how requests were resolved.
///
/// # Panics
///
/// This type and its methods never panic.
#[derive(Debug, Default)]
pub struct RouteTracker {
    accepted: AtomicU64,
    rated: AtomicU64,
    estimated: AtomicU64,
    rate_failures: AtomicU64,
}

impl RouteTracker {
    /// Create a tracker with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `route` produced the final answer.
    pub fn record(&self, route: Route) {
        let counter = match route {
            Route::AcceptClassifier => &self.accepted,
            Route::AuthoritativeRate => &self.rated,
            Route::EstimateFromHistory => &self.estimated,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an authoritative rating that failed after all retries.
    pub fn record_rate_failure(&self) {
        self.rate_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of current counters.
    pub fn snapshot(&self) -> RouteSnapshot {
        RouteSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            rated: self.rated.load(Ordering::Relaxed),
            estimated: self.estimated.load(Ordering::Relaxed),
            rate_failures: self.rate_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a [`RouteTracker`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSnapshot {
    /// Answers taken straight from the classifier.
    pub accepted: u64,
    /// Answers from the rating subsystem.
    pub rated: u64,
    /// Answers with history-backed estimates.
    pub estimated: u64,
    /// Ratings that failed after all retries.
    pub rate_failures: u64,
}

impl RouteSnapshot {
    /// Total answered requests.
    pub fn total(&self) -> u64 {
        self.accepted + self.rated + self.estimated
    }
}
