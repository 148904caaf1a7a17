//! Rolling sample history with a delayed average, used as the volatility
//! circuit breaker.
//!
//! The baseline is the average of the *oldest* `rolling_num` retained
//! samples rather than the most recent ones, so it lags behind the market:
//! a sustained move away from it shows up as a large relative deviation.

use super::config::HistoryConfig;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::trace;

/// Fixed-capacity FIFO of samples with an incrementally maintained sum over
/// the oldest `rolling_num` entries.
#[derive(Debug, Clone)]
pub struct SampleHistory {
    samples: VecDeque<Decimal>,
    capacity: usize,
    rolling_num: usize,
    interval: Duration,
    last_sample: Option<Instant>,
    /// Sum of `samples[..min(len, rolling_num)]`
    rolling_sum: Decimal,
}

impl SampleHistory {
    /// Creates an empty history.
    ///
    /// `capacity` is raised to at least 1 and `rolling_num` is clamped into
    /// `1..=capacity`.
    #[must_use]
    pub fn new(capacity: usize, interval: Duration, rolling_num: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
            rolling_num: rolling_num.clamp(1, capacity),
            interval,
            last_sample: None,
            rolling_sum: Decimal::ZERO,
        }
    }

    /// Creates an empty history shaped by `config`.
    #[must_use]
    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(config.capacity, config.interval(), config.rolling_num)
    }

    /// Records a sample taken now. See [`SampleHistory::push_at`].
    pub fn push(&mut self, value: Decimal) -> bool {
        self.push_at(value, Instant::now())
    }

    /// Records a sample taken at `now`.
    ///
    /// Returns `false` without touching the history when less than the
    /// configured interval has elapsed since the last accepted sample.
    pub fn push_at(&mut self, value: Decimal, now: Instant) -> bool {
        if let Some(last) = self.last_sample {
            if now.saturating_duration_since(last) < self.interval {
                trace!("sample {} ignored, interval not elapsed", value);
                return false;
            }
        }
        self.last_sample = Some(now);
        self.samples.push_back(value);
        if self.samples.len() <= self.rolling_num {
            self.rolling_sum += value;
        }

        if self.samples.len() > self.capacity {
            if let Some(evicted) = self.samples.pop_front() {
                self.rolling_sum -= evicted;
                // eviction shifts one sample into the baseline window
                if let Some(entered) = self.samples.get(self.rolling_num - 1) {
                    self.rolling_sum += *entered;
                }
            }
        }
        true
    }

    /// Average of the oldest `min(len, rolling_num)` samples, `None` when empty.
    #[must_use]
    pub fn rolling_average(&self) -> Option<Decimal> {
        let count = self.samples.len().min(self.rolling_num);
        if count == 0 {
            return None;
        }
        self.rolling_sum.checked_div(Decimal::from(count))
    }

    /// `|value - rolling_average| / rolling_average`.
    ///
    /// `None` when there is no baseline yet or the baseline is zero.
    #[must_use]
    pub fn relative_deviation(&self, value: Decimal) -> Option<Decimal> {
        let average = self.rolling_average()?;
        (value - average).abs().checked_div(average.abs())
    }

    /// Number of retained samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if no sample has been accepted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Retained samples, oldest first
    pub fn samples(&self) -> impl Iterator<Item = &Decimal> {
        self.samples.iter()
    }

    /// Drops every sample and the interval anchor.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.rolling_sum = Decimal::ZERO;
        self.last_sample = None;
    }
}
