//! Running trade counters and the diagnostic snapshot attached to progress
//! logs, aborts and alerts.

use super::bot::BotState;
use rust_decimal::Decimal;
use serde::Serialize;

/// Running counters for relayed and matched fills. Never reset while the
/// process lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Hedges confirmed filled on remote
    pub num_matched: u64,
    /// Hedges placed on remote and not yet filled
    pub num_pending: u64,
    /// Value of matched hedges
    pub value_matched: Decimal,
    /// Value of pending hedges
    pub value_pending: Decimal,
    /// Realized premium: `value * premium - value` per match
    pub premium_profit: Decimal,
}

impl Stats {
    /// A hedge was placed on remote
    pub fn record_pending(&mut self, value: Decimal) {
        self.record_outstanding(1, value);
    }

    /// `count` orders worth `value` are resting on remote awaiting a match
    pub fn record_outstanding(&mut self, count: u64, value: Decimal) {
        self.num_pending = self.num_pending.saturating_add(count);
        self.value_pending = self.value_pending.saturating_add(value);
    }

    /// A remote fill worth `value` completed a hedge
    pub fn record_matched(&mut self, value: Decimal, premium: Decimal) {
        self.num_matched = self.num_matched.saturating_add(1);
        self.num_pending = self.num_pending.saturating_sub(1);
        self.value_matched = self.value_matched.saturating_add(value);
        self.value_pending = (self.value_pending - value).max(Decimal::ZERO);
        self.premium_profit = self
            .premium_profit
            .saturating_add(value.saturating_mul(premium) - value);
    }

    /// Matched plus pending count, compared against `stop_after`
    #[must_use]
    pub fn total(&self) -> u64 {
        self.num_matched.saturating_add(self.num_pending)
    }
}

/// Everything an operator needs to understand the bot's state at a glance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// Origin venue name
    pub origin: String,
    /// Remote venue name
    pub remote: String,
    /// Lifecycle state
    pub state: BotState,
    /// Counters
    #[serde(flatten)]
    pub stats: Stats,
    /// Last observed remote spread mean
    pub mean: Option<Decimal>,
    /// Delayed rolling average of the spread mean
    pub rolling_average: Option<Decimal>,
}

impl Diagnostics {
    /// JSON rendering for log lines
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}
