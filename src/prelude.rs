//! Prelude module that re-exports commonly used types and traits.
//!
//! ```rust
//! use liquidity_mirror::prelude::*;
//! ```

// Order model
pub use crate::mirror::order::{Balance, BookUpdate, Level, Order, OrderOverrides, Side};

// Orchestration
pub use crate::mirror::bot::{BookOutcome, BotState, MirrorBot};
pub use crate::mirror::config::{HistoryConfig, MirrorConfig, ToleranceMode};
pub use crate::mirror::stats::{Diagnostics, Stats};

// Venues
pub use crate::mirror::dummy::DummyVenue;
pub use crate::mirror::venue::{SubscriptionId, Venue, VenueEvent, VenueListener};

// Alerting
pub use crate::mirror::alert::{Alerter, TracingAlerter};

// Errors
pub use crate::mirror::error::{ConfigError, MirrorError, VenueError};

// Utilities
pub use crate::utils::{current_time_millis, setup_logger};
