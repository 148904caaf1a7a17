//! Mirror error types

use super::bot::BotState;
use rust_decimal::Decimal;
use thiserror::Error;

/// Configuration errors. These are detected before any venue is touched and
/// are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The premium must be strictly positive
    #[error("invalid premium {premium}: must be greater than zero")]
    InvalidPremium {
        /// The rejected premium
        premium: Decimal,
    },

    /// The budget padding must be at least one
    #[error("invalid padding {padding}: must be at least 1")]
    InvalidPadding {
        /// The rejected padding factor
        padding: Decimal,
    },

    /// The rate tolerance must not be negative
    #[error("invalid tolerance {tolerance}: must not be negative")]
    InvalidTolerance {
        /// The rejected tolerance
        tolerance: Decimal,
    },

    /// The volatility ceiling must not be negative
    #[error("invalid max volatility {max_volatility}: must not be negative")]
    InvalidVolatilityCeiling {
        /// The rejected ceiling
        max_volatility: Decimal,
    },

    /// A balance or rate scaled by the premium does not fit in a decimal
    #[error("{amount} scaled by premium {premium} overflows")]
    Overflow {
        /// The amount being scaled
        amount: Decimal,
        /// The premium applied
        premium: Decimal,
    },

    /// The sample history shape is unusable
    #[error("invalid sample history: capacity {capacity}, rolling window {rolling_num}")]
    InvalidHistory {
        /// Maximum retained samples
        capacity: usize,
        /// Size of the delayed baseline window
        rolling_num: usize,
    },
}

/// Errors surfaced by a venue adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum VenueError {
    /// The venue has not been readied yet, or was cleaned up
    #[error("venue {venue} is not ready")]
    NotReady {
        /// Venue name
        venue: String,
    },

    /// The venue refused the request
    #[error("venue {venue} rejected request: {message}")]
    Rejected {
        /// Venue name
        venue: String,
        /// Reason reported by the venue
        message: String,
    },

    /// Network, authentication or protocol failure
    #[error("transport failure on {venue}: {message}")]
    Transport {
        /// Venue name
        venue: String,
        /// Underlying failure description
        message: String,
    },

    /// An order to cancel is not resting on the venue
    #[error("order {order_id} not found on {venue}")]
    OrderNotFound {
        /// Venue name
        venue: String,
        /// The missing order identifier
        order_id: String,
    },
}

/// Errors that can occur within the mirror engine and orchestrator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MirrorError {
    /// The requested transition is not allowed from the current state
    #[error("invalid bot state: expected {expected}, found {actual}")]
    InvalidState {
        /// State description required by the operation
        expected: &'static str,
        /// State the bot was in
        actual: BotState,
    },

    /// Another stop is already running
    #[error("a state transition is already in progress")]
    TransitionInProgress,

    /// An order failed validation
    #[error("invalid order: {message}")]
    InvalidOrder {
        /// What was wrong with it
        message: String,
    },

    /// The remote book spread moved too far from its delayed average
    #[error("volatility breach: deviation {deviation} exceeds ceiling {ceiling}")]
    VolatilityBreach {
        /// Observed relative deviation
        deviation: Decimal,
        /// Configured ceiling
        ceiling: Decimal,
    },

    /// Venue adapter failure
    #[error(transparent)]
    Venue(#[from] VenueError),

    /// Configuration failure
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failure reading a configuration file
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure decoding JSON input
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MirrorError {
    /// Shorthand for an order validation failure
    pub(crate) fn invalid_order(message: impl Into<String>) -> Self {
        MirrorError::InvalidOrder {
            message: message.into(),
        }
    }
}
