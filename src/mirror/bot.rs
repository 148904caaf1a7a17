//! Mirror bot orchestrator.
//!
//! [`MirrorBot`] owns the lifecycle state machine and the running
//! statistics, and drives two [`Venue`]s:
//!
//! - remote book updates are checked against the volatility breaker, run
//!   through the reconciliation engine and applied to origin under the
//!   exclusive access lock;
//! - origin fills are inverted and hedged on remote;
//! - remote fills only update the statistics.
//!
//! Any cancel/place failure, startup failure or volatility breach is fatal
//! to the session: it funnels through [`MirrorBot::abort`], which logs the
//! diagnostic snapshot and stops the bot, leaving origin without resting
//! orders.
//!
//! ```text
//!          start()                 ready
//!  idle ───────────► start ───────────────► ready
//!   ▲                  │  abort / stop        │
//!   └──────────────────┴──────────────────────┘
//! ```

use super::access::ExclusiveLock;
use super::alert::{AlertThrottle, Alerter, TracingAlerter};
use super::config::MirrorConfig;
use super::error::MirrorError;
use super::history::SampleHistory;
use super::order::{BookUpdate, Order};
use super::reconcile::{
    Patch, aggregate, budget, invert, mirror_orders, patch, prune_to_budget_detailed,
    sort_by_distance_from_mean, spread,
};
use super::stats::{Diagnostics, Stats};
use super::venue::{SubscriptionId, Venue, VenueEvent, VenueListener};
use crate::utils::lock;
use crossbeam::atomic::AtomicCell;
use dashmap::DashSet;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Poll period while `stop` waits for an in-flight reconciliation
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Lifecycle state of a [`MirrorBot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BotState {
    /// Not running
    Idle,
    /// Readying venues and converging to a safe state
    Start,
    /// Mirroring
    Ready,
}

impl fmt::Display for BotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotState::Idle => write!(f, "idle"),
            BotState::Start => write!(f, "start"),
            BotState::Ready => write!(f, "ready"),
        }
    }
}

/// What happened to a remote book update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookOutcome {
    /// Another reconciliation held the lock; the update was dropped
    Discarded,
    /// The bot is not mirroring; the update was ignored
    Ignored,
    /// The patch that was applied to origin
    Applied(Patch),
}

/// Whether the bot should keep running after relaying a fill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relay {
    Continue,
    Done,
}

struct Binding {
    subscription: SubscriptionId,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Bindings {
    origin: Option<Binding>,
    remote: Option<Binding>,
    progress: Option<JoinHandle<()>>,
}

struct Monitor {
    history: SampleHistory,
    last_mean: Option<Decimal>,
}

struct Inner {
    origin: Arc<dyn Venue>,
    remote: Arc<dyn Venue>,
    config: MirrorConfig,
    alerter: Arc<dyn Alerter>,
    state: AtomicCell<BotState>,
    stopping: AtomicBool,
    stats: Mutex<Stats>,
    monitor: Mutex<Monitor>,
    lock: ExclusiveLock,
    throttle: Mutex<AlertThrottle>,
    bindings: Mutex<Bindings>,
    /// Bumped on every remote bind and unbind; stale dispatchers compare against it
    remote_epoch: AtomicU64,
    /// Ids of remote orders already counted as pending
    hedges: DashSet<String>,
}

/// Orchestrator mirroring a remote book onto origin.
///
/// Cloning is cheap and yields another handle to the same bot.
#[derive(Clone)]
pub struct MirrorBot {
    inner: Arc<Inner>,
}

impl MirrorBot {
    /// Creates an idle bot that alerts through the log stream.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Config`] if `config` does not validate.
    pub fn new(
        origin: Arc<dyn Venue>,
        remote: Arc<dyn Venue>,
        config: MirrorConfig,
    ) -> Result<Self, MirrorError> {
        Self::with_alerter(origin, remote, config, Arc::new(TracingAlerter))
    }

    /// Creates an idle bot with a custom alert sink.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Config`] if `config` does not validate.
    pub fn with_alerter(
        origin: Arc<dyn Venue>,
        remote: Arc<dyn Venue>,
        config: MirrorConfig,
        alerter: Arc<dyn Alerter>,
    ) -> Result<Self, MirrorError> {
        config.validate()?;
        let monitor = Monitor {
            history: SampleHistory::from_config(&config.history),
            last_mean: None,
        };
        let throttle = AlertThrottle::new(config.alert_interval());
        Ok(Self {
            inner: Arc::new(Inner {
                origin,
                remote,
                config,
                alerter,
                state: AtomicCell::new(BotState::Idle),
                stopping: AtomicBool::new(false),
                stats: Mutex::new(Stats::default()),
                monitor: Mutex::new(monitor),
                lock: ExclusiveLock::new(),
                throttle: Mutex::new(throttle),
                bindings: Mutex::new(Bindings::default()),
                remote_epoch: AtomicU64::new(0),
                hedges: DashSet::new(),
            }),
        })
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> BotState {
        self.inner.state.load()
    }

    /// Snapshot of the running counters
    #[must_use]
    pub fn stats(&self) -> Stats {
        lock(&self.inner.stats).clone()
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &MirrorConfig {
        &self.inner.config
    }

    /// Number of remote hedge ids currently counted as pending
    #[must_use]
    pub fn tracked_hedges(&self) -> usize {
        self.inner.hedges.len()
    }

    /// Gate guarding origin mutation
    #[must_use]
    pub fn access_lock(&self) -> &ExclusiveLock {
        &self.inner.lock
    }

    /// Snapshot for logs and alerts
    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        let (mean, rolling_average) = {
            let monitor = lock(&self.inner.monitor);
            (monitor.last_mean, monitor.history.rolling_average())
        };
        Diagnostics {
            origin: self.inner.origin.name().to_string(),
            remote: self.inner.remote.name().to_string(),
            state: self.state(),
            stats: self.stats(),
            mean,
            rolling_average,
        }
    }

    /// Readies both venues, converges to a safe state and starts mirroring.
    ///
    /// In reset-only mode the bot stops again right after readying.
    ///
    /// # Errors
    ///
    /// Fails with [`MirrorError::InvalidState`] unless idle, without side
    /// effects. Any later failure aborts the bot and is returned.
    pub async fn start(&self) -> Result<(), MirrorError> {
        self.inner
            .state
            .compare_exchange(BotState::Idle, BotState::Start)
            .map_err(|actual| MirrorError::InvalidState {
                expected: "idle",
                actual,
            })?;
        info!(
            "starting mirror {} -> {}",
            self.inner.remote.name(),
            self.inner.origin.name()
        );

        for venue in [&self.inner.origin, &self.inner.remote] {
            if let Err(err) = venue.ready().await {
                let err = MirrorError::from(err);
                self.abort(&err).await;
                return Err(err);
            }
            debug!("{} ready", venue.name());
        }

        if self.inner.config.reset_only {
            info!("reset-only mode, stopping after reset");
            return self.stop().await;
        }

        if let Err(err) = self.reset().await {
            self.abort(&err).await;
            return Err(err);
        }

        self.bind();
        if let Err(actual) = self
            .inner
            .state
            .compare_exchange(BotState::Start, BotState::Ready)
        {
            warn!("start interrupted, bot is {}", actual);
            self.unbind_remote();
            self.unbind_origin().await;
            return Err(MirrorError::InvalidState {
                expected: "start",
                actual,
            });
        }
        info!("mirror ready");
        Ok(())
    }

    /// Stops mirroring and converges to a safe state.
    ///
    /// Remote events are unsubscribed first, both venues are cleaned up
    /// concurrently, origin orders are cancelled, and only then are origin
    /// events unsubscribed so fills caused by the cancellation are still
    /// relayed.
    ///
    /// # Errors
    ///
    /// Fails with [`MirrorError::InvalidState`] when idle and
    /// [`MirrorError::TransitionInProgress`] while another stop runs, in both
    /// cases without side effects. Otherwise returns the reset outcome; the
    /// bot is idle either way.
    pub async fn stop(&self) -> Result<(), MirrorError> {
        self.stop_with(false).await
    }

    /// Cancels every origin order and accounts for outstanding remote orders.
    ///
    /// Remote orders are left resting: they are hedges expected to be
    /// matched externally, so they are only added to the pending figures.
    /// Waits for any in-flight reconciliation so nothing is placed on
    /// origin after the cancellation.
    ///
    /// # Errors
    ///
    /// Fails with [`MirrorError::InvalidState`] when idle, or with the venue
    /// error if cancellation fails.
    pub async fn reset(&self) -> Result<(), MirrorError> {
        if self.state() == BotState::Idle {
            return Err(MirrorError::InvalidState {
                expected: "start or ready",
                actual: BotState::Idle,
            });
        }
        let _guard = self.wait_for_lock().await;
        self.reset_locked().await
    }

    /// [`MirrorBot::reset`] for callers already holding the access lock
    async fn reset_locked(&self) -> Result<(), MirrorError> {
        let state = self.state();
        if state == BotState::Idle {
            return Err(MirrorError::InvalidState {
                expected: "start or ready",
                actual: state,
            });
        }

        let resting = self.inner.origin.orders();
        if !resting.is_empty() {
            info!(
                "cancelling {} orders on {}",
                resting.len(),
                self.inner.origin.name()
            );
            self.inner.origin.cancel_orders(resting).await?;
        }

        let open = self.inner.remote.orders();
        // forget hedges that are no longer resting
        self.inner
            .hedges
            .retain(|id| open.iter().any(|order| order.id() == Some(id.as_str())));
        let outstanding: Vec<Order> = open
            .into_iter()
            .filter(|order| match order.id() {
                Some(id) => self.inner.hedges.insert(id.to_string()),
                None => true,
            })
            .collect();
        if !outstanding.is_empty() {
            let value: Decimal = outstanding.iter().map(Order::value).sum();
            lock(&self.inner.stats).record_outstanding(outstanding.len() as u64, value);
            warn!(
                "{} orders worth {} still open on {}",
                outstanding.len(),
                value,
                self.inner.remote.name()
            );
        }
        Ok(())
    }

    /// Logs `err` with the diagnostic snapshot, raises an alert and stops.
    ///
    /// A failing stop is logged, never returned: the caller already holds
    /// the error that matters.
    pub async fn abort(&self, err: &MirrorError) {
        self.abort_with(err, false).await;
    }

    /// Relays an origin fill to remote.
    ///
    /// The inverted order is placed on remote and counted as pending. A
    /// placement failure aborts the bot; reaching `stop_after` stops it.
    ///
    /// # Errors
    ///
    /// Returns the placement failure after aborting.
    pub async fn handle_origin_trade(&self, fill: Order) -> Result<(), MirrorError> {
        match self.relay_origin_trade(fill).await {
            Ok(Relay::Continue) => Ok(()),
            Ok(Relay::Done) => {
                if let Err(err) = self.stop().await {
                    warn!("self-stop failed: {}", err);
                }
                Ok(())
            }
            Err(err) => {
                self.abort(&err).await;
                Err(err)
            }
        }
    }

    /// Accounts for a remote fill of one of our hedges.
    pub fn handle_remote_trade(&self, fill: Order) {
        let value = fill.value();
        let stats = {
            let mut stats = lock(&self.inner.stats);
            stats.record_matched(value, self.inner.config.premium);
            stats.clone()
        };
        #[cfg(feature = "metrics")]
        metrics::counter!("mirror_fills_matched_total").increment(1);
        if let Some(id) = fill.id() {
            if !self
                .inner
                .remote
                .orders()
                .iter()
                .any(|order| order.id() == Some(id))
            {
                self.inner.hedges.remove(id);
            }
        }
        debug!("hedge matched on {}: {}", self.inner.remote.name(), fill);
        if self.inner.config.progress_interval().is_none() {
            info!(
                "progress: matched {} ({}), pending {} ({}), premium profit {}",
                stats.num_matched,
                stats.value_matched,
                stats.num_pending,
                stats.value_pending,
                stats.premium_profit
            );
        }
    }

    /// Reconciles origin against a remote book update.
    ///
    /// The update is dropped when another reconciliation holds the access
    /// lock, and ignored unless the bot is ready. Otherwise the volatility
    /// breaker is checked, the desired origin orders are computed and the
    /// resulting patch is applied.
    ///
    /// # Errors
    ///
    /// Volatility breaches and cancel/place failures abort the bot and are
    /// returned.
    pub async fn handle_remote_orderbook(
        &self,
        update: BookUpdate,
    ) -> Result<BookOutcome, MirrorError> {
        let Some(_guard) = self.inner.lock.try_exclusive() else {
            trace!("book update dropped, reconciliation in flight");
            #[cfg(feature = "metrics")]
            metrics::counter!("mirror_book_events_dropped_total").increment(1);
            return Ok(BookOutcome::Discarded);
        };
        if self.state() != BotState::Ready {
            trace!("book update ignored, bot is {}", self.state());
            return Ok(BookOutcome::Ignored);
        }

        match self.reconcile(update).await {
            Ok(patch) => Ok(BookOutcome::Applied(patch)),
            Err(err) => {
                self.abort_with(&err, true).await;
                Err(err)
            }
        }
    }

    async fn reconcile(&self, update: BookUpdate) -> Result<Patch, MirrorError> {
        let config = &self.inner.config;
        let book = update.into_orders();
        let book_spread = spread(&book);

        let sorted = match book_spread.mean {
            Some(mean) => {
                self.check_volatility(mean)?;
                sort_by_distance_from_mean(&book, mean)
            }
            None => book,
        };

        let quotes = mirror_orders(&sorted, config.premium);
        let chunks = aggregate(&quotes, config.min_value, None);
        let limits = budget(
            &self.inner.origin.balance(),
            &self.inner.remote.balance(),
            config.premium,
            config.padding,
        )?;
        let pruned = prune_to_budget_detailed(&chunks, &limits, config.min_value, config.max_orders);
        if pruned.kept.is_empty() && pruned.over_budget > 0 {
            self.alert_throttled(&format!(
                "budget exhausted, {} chunks unplaceable (ask {:?}, bid {:?})",
                pruned.over_budget, limits.ask, limits.bid
            ));
        }

        let current = self.inner.origin.orders();
        let mut changes = patch(&current, &pruned.kept, config.tolerance, config.tolerance_mode);
        if let Some(max) = config.max_orders {
            let kept = current.len().saturating_sub(changes.cancel.len());
            changes.place.truncate(max.saturating_sub(kept));
        }
        trace!(
            "reconcile: {} book orders, {} chunks, {} kept, cancel {}, place {}",
            sorted.len(),
            chunks.len(),
            pruned.kept.len(),
            changes.cancel.len(),
            changes.place.len()
        );

        if !changes.cancel.is_empty() {
            self.inner
                .origin
                .cancel_orders(changes.cancel.clone())
                .await?;
        }
        if !changes.place.is_empty() {
            self.inner.origin.place_orders(changes.place.clone()).await?;
        }
        #[cfg(feature = "metrics")]
        metrics::counter!("mirror_reconcile_cycles_total").increment(1);
        Ok(changes)
    }

    fn check_volatility(&self, mean: Decimal) -> Result<(), MirrorError> {
        let mut monitor = lock(&self.inner.monitor);
        monitor.last_mean = Some(mean);
        if let Some(ceiling) = self.inner.config.max_volatility {
            if let Some(deviation) = monitor.history.relative_deviation(mean) {
                if deviation > ceiling {
                    return Err(MirrorError::VolatilityBreach { deviation, ceiling });
                }
            }
        }
        monitor.history.push(mean);
        Ok(())
    }

    fn alert_throttled(&self, message: &str) {
        if lock(&self.inner.throttle).try_fire(Instant::now()) {
            self.inner.alerter.alert(message, &self.diagnostics());
        } else {
            debug!("alert suppressed: {}", message);
        }
    }

    async fn relay_origin_trade(&self, fill: Order) -> Result<Relay, MirrorError> {
        let hedge = invert(&fill, self.inner.config.premium)?;
        info!(
            "relaying fill {} from {} as {}",
            fill,
            self.inner.origin.name(),
            hedge
        );
        let placed = self.inner.remote.place_orders(vec![hedge]).await?;

        let total = {
            let mut stats = lock(&self.inner.stats);
            for order in &placed {
                if let Some(id) = order.id() {
                    self.inner.hedges.insert(id.to_string());
                }
                stats.record_pending(order.value());
            }
            stats.total()
        };
        #[cfg(feature = "metrics")]
        metrics::counter!("mirror_fills_relayed_total").increment(placed.len() as u64);

        match self.inner.config.stop_after {
            Some(limit) if total >= limit => {
                info!("stop-after threshold {} reached", limit);
                Ok(Relay::Done)
            }
            _ => Ok(Relay::Continue),
        }
    }

    async fn abort_with(&self, err: &MirrorError, holding_lock: bool) {
        let diagnostics = self.diagnostics();
        error!(
            error = %err,
            diagnostics = %diagnostics.to_json(),
            "aborting mirror"
        );
        self.inner
            .alerter
            .alert(&format!("mirror aborted: {err}"), &diagnostics);
        #[cfg(feature = "metrics")]
        metrics::counter!("mirror_aborts_total").increment(1);
        if let Err(stop_err) = self.stop_with(holding_lock).await {
            warn!("stop after abort failed: {}", stop_err);
        }
    }

    async fn stop_with(&self, holding_lock: bool) -> Result<(), MirrorError> {
        let state = self.state();
        if state == BotState::Idle {
            return Err(MirrorError::InvalidState {
                expected: "start or ready",
                actual: state,
            });
        }
        if self.inner.stopping.swap(true, Ordering::AcqRel) {
            return Err(MirrorError::TransitionInProgress);
        }
        info!("stopping mirror");

        self.unbind_remote();
        self.stop_progress();

        // an in-flight reconciliation must not place orders after the reset
        let _guard = if holding_lock {
            None
        } else {
            Some(self.wait_for_lock().await)
        };

        let (origin, remote) = tokio::join!(
            self.inner.origin.cleanup(),
            self.inner.remote.cleanup()
        );
        for (venue, result) in [(&self.inner.origin, origin), (&self.inner.remote, remote)] {
            if let Err(err) = result {
                warn!("cleanup of {} failed: {}", venue.name(), err);
            }
        }

        let reset = self.reset_locked().await;
        if let Err(err) = &reset {
            error!("reset during stop failed: {}", err);
        }

        self.unbind_origin().await;
        self.inner.state.store(BotState::Idle);
        self.inner.stopping.store(false, Ordering::Release);
        info!("mirror stopped");
        reset
    }

    async fn wait_for_lock(&self) -> super::access::AccessGuard<'_> {
        loop {
            if let Some(guard) = self.inner.lock.try_exclusive() {
                return guard;
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }
    }

    fn bind(&self) {
        let origin = self.bind_venue(&self.inner.origin, |bot, event| async move {
            if let VenueEvent::Trade(fill) = event {
                bot.dispatch_origin_trade(fill).await;
            }
        });
        let epoch = self.inner.remote_epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let remote = self.bind_venue(&self.inner.remote, move |bot, event| async move {
            if bot.inner.remote_epoch.load(Ordering::Acquire) != epoch {
                trace!("remote event discarded after unbind");
                return;
            }
            match event {
                VenueEvent::Trade(fill) => bot.handle_remote_trade(fill),
                VenueEvent::OrderBook(update) => {
                    if let Err(err) = bot.handle_remote_orderbook(update).await {
                        debug!("book update failed: {}", err);
                    }
                }
            }
        });
        let progress = self.spawn_progress();

        let mut bindings = lock(&self.inner.bindings);
        bindings.origin = Some(origin);
        bindings.remote = Some(remote);
        bindings.progress = progress;
    }

    /// Subscribes to `venue` and spawns the task draining its events in order
    fn bind_venue<F, Fut>(&self, venue: &Arc<dyn Venue>, handler: F) -> Binding
    where
        F: Fn(MirrorBot, VenueEvent) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<VenueEvent>();
        let listener: VenueListener = Arc::new(move |event: &VenueEvent| {
            if sender.send(event.clone()).is_err() {
                trace!("event dropped, dispatcher gone");
            }
        });
        let subscription = venue.subscribe(listener);

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                handler(MirrorBot { inner }, event).await;
            }
        });
        Binding { subscription, task }
    }

    /// Origin fills are relayed inline; terminal transitions are detached
    /// because stopping waits for this very task to drain.
    async fn dispatch_origin_trade(&self, fill: Order) {
        match self.relay_origin_trade(fill).await {
            Ok(Relay::Continue) => {}
            Ok(Relay::Done) => {
                let bot = self.clone();
                tokio::spawn(async move {
                    if let Err(err) = bot.stop().await {
                        debug!("self-stop skipped: {}", err);
                    }
                });
            }
            Err(err) => {
                let bot = self.clone();
                tokio::spawn(async move { bot.abort(&err).await });
            }
        }
    }

    fn unbind_remote(&self) {
        self.inner.remote_epoch.fetch_add(1, Ordering::AcqRel);
        let binding = lock(&self.inner.bindings).remote.take();
        if let Some(binding) = binding {
            self.inner.remote.unsubscribe(binding.subscription);
            // the task drains and exits once the listener's sender is gone
            drop(binding.task);
            debug!("unbound {}", self.inner.remote.name());
        }
    }

    async fn unbind_origin(&self) {
        let binding = lock(&self.inner.bindings).origin.take();
        if let Some(binding) = binding {
            self.inner.origin.unsubscribe(binding.subscription);
            if let Err(err) = binding.task.await {
                warn!("origin dispatcher ended abnormally: {}", err);
            }
            debug!("unbound {}", self.inner.origin.name());
        }
    }

    fn spawn_progress(&self) -> Option<JoinHandle<()>> {
        let period = self.inner.config.progress_interval()?;
        let weak = Arc::downgrade(&self.inner);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let diagnostics = MirrorBot { inner }.diagnostics();
                info!(progress = %diagnostics.to_json(), "mirror progress");
            }
        }))
    }

    fn stop_progress(&self) {
        if let Some(task) = lock(&self.inner.bindings).progress.take() {
            task.abort();
        }
    }
}

impl fmt::Debug for MirrorBot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorBot")
            .field("origin", &self.inner.origin.name())
            .field("remote", &self.inner.remote.name())
            .field("state", &self.state())
            .finish()
    }
}
