//! Liquidity mirroring: order model, reconciliation engine and the bot
//! orchestrating two venues.

/// Exclusive/shared access gate guarding origin mutation.
pub mod access;
/// Operator alerting.
pub mod alert;
pub mod bot;
/// Bot configuration.
pub mod config;
/// In-memory venue for dry runs and tests.
pub mod dummy;
pub mod error;
/// Volatility monitor over the remote spread mean.
pub mod history;
pub mod order;
pub mod reconcile;
/// Running counters and diagnostics.
pub mod stats;
/// Venue adapter contract and event plumbing.
pub mod venue;


pub use access::{AccessGuard, ExclusiveLock};
pub use alert::{AlertThrottle, Alerter, TracingAlerter};
pub use bot::{BookOutcome, BotState, MirrorBot};
pub use config::{HistoryConfig, MirrorConfig, ToleranceMode};
pub use dummy::{DummyBehavior, DummyVenue, fill_all, fill_fraction, fill_side};
pub use error::{ConfigError, MirrorError, VenueError};
pub use history::SampleHistory;
pub use order::{Balance, BookUpdate, Level, Order, OrderOverrides, Side};
pub use reconcile::{Budget, Patch, Pruned, SideBudget, Spread};
pub use stats::{Diagnostics, Stats};
pub use venue::{ListenerRegistry, SubscriptionId, Venue, VenueEvent, VenueListener};
