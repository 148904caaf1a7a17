//! Orchestrator configuration.
//!
//! [`MirrorConfig`] can be built in code with the `with_*` methods or loaded
//! from JSON. Every entry point that accepts a configuration calls
//! [`MirrorConfig::validate`] first, so configuration errors surface before
//! any venue is contacted.

use super::error::{ConfigError, MirrorError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How [`crate::mirror::reconcile::patch`] compares rates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToleranceMode {
    /// `|current - desired| / desired <= tolerance`
    #[default]
    Relative,
    /// `|current - desired| <= tolerance`
    Absolute,
}

/// Shape of the spread sample history backing the volatility breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum retained samples
    pub capacity: usize,
    /// Minimum milliseconds between accepted samples
    pub interval_ms: u64,
    /// Number of oldest samples forming the delayed baseline
    pub rolling_num: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            interval_ms: 1_000,
            rolling_num: 20,
        }
    }
}

impl HistoryConfig {
    /// Minimum spacing between samples
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Configuration for a [`crate::MirrorBot`].
///
/// # Examples
///
/// ```
/// use liquidity_mirror::MirrorConfig;
/// use rust_decimal::Decimal;
///
/// let config = MirrorConfig::new(Decimal::TWO)
///     .with_max_orders(10)
///     .with_stop_after(100);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Multiplicative markup applied when repricing between venues
    pub premium: Decimal,
    /// Rate drift tolerated before a resting origin order is replaced
    #[serde(default)]
    pub tolerance: Decimal,
    /// Whether `tolerance` is relative or absolute
    #[serde(default)]
    pub tolerance_mode: ToleranceMode,
    /// Start, reset to a safe state, and stop without trading
    #[serde(default)]
    pub reset_only: bool,
    /// Minimum notional of a tradable chunk
    #[serde(default)]
    pub min_value: Option<Decimal>,
    /// Maximum simultaneous origin orders
    #[serde(default)]
    pub max_orders: Option<usize>,
    /// Matched plus pending count at which the bot stops itself
    #[serde(default)]
    pub stop_after: Option<u64>,
    /// Milliseconds between progress logs, 0 disables the timer
    #[serde(default)]
    pub progress_interval_ms: u64,
    /// Relative deviation ceiling of the spread mean; `None` disables the breaker
    #[serde(default)]
    pub max_volatility: Option<Decimal>,
    /// Budget headroom divisor, at least 1
    #[serde(default = "default_padding")]
    pub padding: Decimal,
    /// Minimum milliseconds between two budget alerts
    #[serde(default = "default_alert_interval_ms")]
    pub alert_interval_ms: u64,
    /// Spread sample history shape
    #[serde(default)]
    pub history: HistoryConfig,
}

fn default_padding() -> Decimal {
    Decimal::new(105, 2)
}

fn default_alert_interval_ms() -> u64 {
    60_000
}

impl MirrorConfig {
    /// Creates a configuration with the given premium and defaults elsewhere.
    #[must_use]
    pub fn new(premium: Decimal) -> Self {
        Self {
            premium,
            tolerance: Decimal::ZERO,
            tolerance_mode: ToleranceMode::default(),
            reset_only: false,
            min_value: None,
            max_orders: None,
            stop_after: None,
            progress_interval_ms: 0,
            max_volatility: None,
            padding: default_padding(),
            alert_interval_ms: default_alert_interval_ms(),
            history: HistoryConfig::default(),
        }
    }

    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Json`] for malformed input and
    /// [`MirrorError::Config`] if validation fails.
    pub fn from_json_str(json: &str) -> Result<Self, MirrorError> {
        let config: MirrorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Io`] if the file cannot be read, otherwise as
    /// [`MirrorConfig::from_json_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MirrorError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks every field for values the orchestrator cannot operate with.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.premium <= Decimal::ZERO {
            return Err(ConfigError::InvalidPremium {
                premium: self.premium,
            });
        }
        if self.padding < Decimal::ONE {
            return Err(ConfigError::InvalidPadding {
                padding: self.padding,
            });
        }
        if self.tolerance < Decimal::ZERO {
            return Err(ConfigError::InvalidTolerance {
                tolerance: self.tolerance,
            });
        }
        if let Some(max_volatility) = self.max_volatility.filter(|v| *v < Decimal::ZERO) {
            return Err(ConfigError::InvalidVolatilityCeiling { max_volatility });
        }
        let HistoryConfig {
            capacity,
            rolling_num,
            ..
        } = self.history;
        if capacity == 0 || rolling_num == 0 || rolling_num > capacity {
            return Err(ConfigError::InvalidHistory {
                capacity,
                rolling_num,
            });
        }
        Ok(())
    }

    /// Sets the rate tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: Decimal, mode: ToleranceMode) -> Self {
        self.tolerance = tolerance;
        self.tolerance_mode = mode;
        self
    }

    /// Enables reset-only mode.
    #[must_use]
    pub fn with_reset_only(mut self, reset_only: bool) -> Self {
        self.reset_only = reset_only;
        self
    }

    /// Sets the minimum tradable chunk notional.
    #[must_use]
    pub fn with_min_value(mut self, min_value: Decimal) -> Self {
        self.min_value = Some(min_value);
        self
    }

    /// Caps the number of simultaneous origin orders.
    #[must_use]
    pub fn with_max_orders(mut self, max_orders: usize) -> Self {
        self.max_orders = Some(max_orders);
        self
    }

    /// Stops the bot once this many fills are matched or pending.
    #[must_use]
    pub fn with_stop_after(mut self, stop_after: u64) -> Self {
        self.stop_after = Some(stop_after);
        self
    }

    /// Sets the periodic progress log interval.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Arms the volatility circuit breaker.
    #[must_use]
    pub fn with_max_volatility(mut self, max_volatility: Decimal) -> Self {
        self.max_volatility = Some(max_volatility);
        self
    }

    /// Sets the budget padding factor.
    #[must_use]
    pub fn with_padding(mut self, padding: Decimal) -> Self {
        self.padding = padding;
        self
    }

    /// Sets the minimum spacing between budget alerts.
    #[must_use]
    pub fn with_alert_interval(mut self, interval: Duration) -> Self {
        self.alert_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the sample history shape.
    #[must_use]
    pub fn with_history(mut self, history: HistoryConfig) -> Self {
        self.history = history;
        self
    }

    /// Progress timer period, `None` when disabled
    #[must_use]
    pub fn progress_interval(&self) -> Option<Duration> {
        (self.progress_interval_ms > 0).then(|| Duration::from_millis(self.progress_interval_ms))
    }

    /// Minimum spacing between budget alerts
    #[must_use]
    pub fn alert_interval(&self) -> Duration {
        Duration::from_millis(self.alert_interval_ms)
    }
}
