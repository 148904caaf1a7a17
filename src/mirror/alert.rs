//! Operator alerting.
//!
//! The orchestrator never talks to an alert transport directly; it is handed
//! an [`Alerter`] at construction. [`TracingAlerter`] routes alerts into the
//! log stream, which is what the bundled binaries use.

use super::stats::Diagnostics;
use std::time::{Duration, Instant};
use tracing::warn;

/// Sink for operator-facing alerts
pub trait Alerter: Send + Sync {
    /// Raise an alert with the current diagnostic snapshot
    fn alert(&self, message: &str, diagnostics: &Diagnostics);
}

/// Alerter that emits a `warn` event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlerter;

impl Alerter for TracingAlerter {
    fn alert(&self, message: &str, diagnostics: &Diagnostics) {
        warn!(
            origin = %diagnostics.origin,
            remote = %diagnostics.remote,
            diagnostics = %diagnostics.to_json(),
            "ALERT: {}",
            message
        );
    }
}

/// Lets an alert through at most once per interval.
#[derive(Debug, Clone)]
pub struct AlertThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl AlertThrottle {
    /// Throttle with the given minimum spacing
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns `true` and arms the throttle if an alert may fire at `now`.
    pub fn try_fire(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// When the last alert fired
    #[must_use]
    pub fn last(&self) -> Option<Instant> {
        self.last
    }
}
