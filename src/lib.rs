//! # Liquidity Mirror
//!
//! A bot that mirrors the order book of a *remote* venue onto an *origin*
//! venue at a premium, and hedges every origin fill back on remote.
//!
//! ## How it works
//!
//! - **Mirroring**: every remote book update is repriced by the premium,
//!   aggregated into chunks worth at least a minimum value, pruned to what
//!   both venues' balances can cover, and turned into a cancel/place patch
//!   that converges origin's resting orders towards the desired set.
//!
//! - **Hedging**: an origin fill (say an ask filled at 700 with premium 2)
//!   is relayed to remote as the opposite order at the un-premiumed rate
//!   (a bid at 350). The premium is the profit.
//!
//! - **Safety**: a volatility circuit breaker compares the remote spread
//!   mean with a delayed rolling average and aborts on sudden moves. Any
//!   venue failure is fatal and leaves origin without resting orders.
//!
//! - **Concurrency**: origin mutation is guarded by a non-blocking exclusive
//!   lock. Book updates arriving while a reconciliation is in flight are
//!   dropped; the next update carries a fresher book anyway.
//!
//! ## Components
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`mirror::order`] | Exact decimal [`Order`] value type and book updates |
//! | [`mirror::reconcile`] | Pure functions: diff, aggregate, spread, budget, prune, patch |
//! | [`mirror::history`] | [`SampleHistory`] volatility monitor |
//! | [`mirror::access`] | [`ExclusiveLock`] gate |
//! | [`mirror::venue`] | [`Venue`] adapter trait and event subscriptions |
//! | [`mirror::bot`] | [`MirrorBot`] lifecycle state machine |
//! | [`mirror::dummy`] | [`DummyVenue`] for dry runs and tests |
//!
//! ## Example
//!
//! ```no_run
//! use liquidity_mirror::prelude::*;
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), MirrorError> {
//! setup_logger();
//! let balance = Balance::new(Decimal::from(1_000), Decimal::from(1_000_000));
//! let origin = Arc::new(DummyVenue::new("origin").with_balance(balance));
//! let remote = Arc::new(DummyVenue::new("remote").with_balance(balance));
//!
//! let config = MirrorConfig::new(Decimal::new(102, 2)).with_min_value(Decimal::from(50));
//! let bot = MirrorBot::new(origin, remote.clone(), config)?;
//! bot.start().await?;
//!
//! remote.publish_book(BookUpdate::Sided {
//!     bids: vec![Level::new(Decimal::TWO, Decimal::from(500))?],
//!     asks: vec![Level::new(Decimal::TWO, Decimal::from(510))?],
//! });
//!
//! bot.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Everything is reported through `tracing`. Binaries call
//! [`setup_logger`], which honours the `LOGLEVEL` environment variable.
//!
//! ## Features
//!
//! - `metrics`: emits counters for relayed and matched fills, reconciliation
//!   cycles, dropped book updates and aborts through the `metrics` facade.

pub mod mirror;

pub mod prelude;
mod utils;

pub use mirror::access::{AccessGuard, ExclusiveLock};
pub use mirror::alert::{AlertThrottle, Alerter, TracingAlerter};
pub use mirror::bot::{BookOutcome, BotState, MirrorBot};
pub use mirror::config::{HistoryConfig, MirrorConfig, ToleranceMode};
pub use mirror::dummy::{DummyBehavior, DummyVenue};
pub use mirror::error::{ConfigError, MirrorError, VenueError};
pub use mirror::history::SampleHistory;
pub use mirror::order::{Balance, BookUpdate, Level, Order, OrderOverrides, Side};
pub use mirror::reconcile::{Budget, Patch, Pruned, SideBudget, Spread};
pub use mirror::stats::{Diagnostics, Stats};
pub use mirror::venue::{ListenerRegistry, SubscriptionId, Venue, VenueEvent, VenueListener};
pub use utils::{current_time_millis, setup_logger};
