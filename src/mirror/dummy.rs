//! In-memory venue for dry runs and tests.
//!
//! [`DummyVenue`] implements [`Venue`] without any transport. External
//! matching is simulated deterministically: either explicitly through
//! [`DummyVenue::fill`], or by [`DummyVenue::tick`], which hands the resting
//! orders to an injected [`DummyBehavior`] and reports the difference as
//! trade events.

use super::error::VenueError;
use super::order::{Balance, BookUpdate, Order, Side};
use super::reconcile::diff;
use super::venue::{ListenerRegistry, SubscriptionId, Venue, VenueEvent, VenueListener};
use crate::utils::lock;
use async_trait::async_trait;
use crossbeam::atomic::AtomicCell;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};
use uuid::Uuid;

/// Produces the resting orders left after one round of simulated matching
pub type DummyBehavior = Arc<dyn Fn(&[Order]) -> Vec<Order> + Send + Sync>;

/// Behaviour filling every resting order completely
#[must_use]
pub fn fill_all() -> DummyBehavior {
    Arc::new(|_: &[Order]| Vec::new())
}

/// Behaviour filling every resting order on `side` completely
#[must_use]
pub fn fill_side(side: Side) -> DummyBehavior {
    Arc::new(move |orders: &[Order]| {
        orders
            .iter()
            .filter(|order| order.side() != side)
            .cloned()
            .collect()
    })
}

/// Behaviour filling `fraction` (0 to 1) of every resting order
#[must_use]
pub fn fill_fraction(fraction: Decimal) -> DummyBehavior {
    let fraction = fraction.clamp(Decimal::ZERO, Decimal::ONE);
    Arc::new(move |orders: &[Order]| {
        orders
            .iter()
            .filter_map(|order| {
                let left = order.quantity() - order.quantity() * fraction;
                (!left.is_zero()).then(|| order.resized(left))
            })
            .collect()
    })
}

/// Venue kept entirely in memory.
pub struct DummyVenue {
    name: String,
    orders: Mutex<Vec<Order>>,
    balance: AtomicCell<Balance>,
    listeners: ListenerRegistry,
    behavior: Mutex<Option<DummyBehavior>>,
    sequence: AtomicU64,
    primed: AtomicBool,
    polling: AtomicBool,
    fail_ready: AtomicBool,
    fail_place: AtomicBool,
    fail_cancel: AtomicBool,
    placed: Mutex<Vec<Order>>,
    cancelled: Mutex<Vec<Order>>,
}

impl DummyVenue {
    /// Creates an empty venue with zero balance
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            orders: Mutex::new(Vec::new()),
            balance: AtomicCell::new(Balance::default()),
            listeners: ListenerRegistry::new(),
            behavior: Mutex::new(None),
            sequence: AtomicU64::new(0),
            primed: AtomicBool::new(false),
            polling: AtomicBool::new(false),
            fail_ready: AtomicBool::new(false),
            fail_place: AtomicBool::new(false),
            fail_cancel: AtomicBool::new(false),
            placed: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    /// Sets the initial balance
    #[must_use]
    pub fn with_balance(self, balance: Balance) -> Self {
        self.balance.store(balance);
        self
    }

    /// Sets the matching behaviour used by [`DummyVenue::tick`]
    #[must_use]
    pub fn with_behavior(self, behavior: DummyBehavior) -> Self {
        *lock(&self.behavior) = Some(behavior);
        self
    }

    /// Seeds resting orders, assigning ids where missing
    #[must_use]
    pub fn with_orders(self, orders: Vec<Order>) -> Self {
        let seeded: Vec<Order> = orders.into_iter().map(|order| self.stamp(order)).collect();
        lock(&self.orders).extend(seeded);
        self
    }

    /// Replaces the balance
    pub fn set_balance(&self, balance: Balance) {
        self.balance.store(balance);
    }

    /// Replaces the matching behaviour
    pub fn set_behavior(&self, behavior: DummyBehavior) {
        *lock(&self.behavior) = Some(behavior);
    }

    /// Makes the next `ready` calls fail
    pub fn fail_ready(&self, fail: bool) {
        self.fail_ready.store(fail, Ordering::Release);
    }

    /// Makes the next `place_orders` calls fail
    pub fn fail_place(&self, fail: bool) {
        self.fail_place.store(fail, Ordering::Release);
    }

    /// Makes the next `cancel_orders` calls fail
    pub fn fail_cancel(&self, fail: bool) {
        self.fail_cancel.store(fail, Ordering::Release);
    }

    /// Emits an order book event to subscribers
    pub fn publish_book(&self, update: impl Into<BookUpdate>) {
        self.listeners.emit(&VenueEvent::OrderBook(update.into()));
    }

    /// Emits a trade event without touching resting orders
    pub fn publish_trade(&self, fill: Order) {
        self.listeners
            .emit(&VenueEvent::Trade(fill.tagged(self.name.clone())));
    }

    /// Fills up to `quantity` of the resting order `id` and emits the trade.
    ///
    /// Returns the fill, or `None` if no such order rests here.
    pub fn fill(&self, id: &str, quantity: Decimal) -> Option<Order> {
        let fill = {
            let mut orders = lock(&self.orders);
            let index = orders.iter().position(|order| order.id() == Some(id))?;
            let resting = orders[index].clone();
            let filled = quantity.min(resting.quantity()).max(Decimal::ZERO);
            let fill = resting.resized(filled);
            if filled == resting.quantity() {
                orders.remove(index);
            } else {
                orders[index] = resting.resized(resting.quantity() - filled);
            }
            fill
        };
        self.listeners.emit(&VenueEvent::Trade(fill.clone()));
        Some(fill)
    }

    /// Runs one round of the matching behaviour and emits the resulting fills.
    pub fn tick(&self) -> Vec<Order> {
        let Some(behavior) = lock(&self.behavior).clone() else {
            return Vec::new();
        };
        let fills = {
            let mut orders = lock(&self.orders);
            let next = behavior(&orders);
            let fills = diff(&orders, &next);
            *orders = next;
            fills
        };
        trace!("{} tick produced {} fills", self.name, fills.len());
        for fill in &fills {
            self.listeners.emit(&VenueEvent::Trade(fill.clone()));
        }
        fills
    }

    /// Every order placed so far, in placement order
    #[must_use]
    pub fn placed(&self) -> Vec<Order> {
        lock(&self.placed).clone()
    }

    /// Every order cancelled so far, in cancellation order
    #[must_use]
    pub fn cancelled(&self) -> Vec<Order> {
        lock(&self.cancelled).clone()
    }

    /// Returns `true` once `ready` has succeeded
    #[must_use]
    pub fn is_primed(&self) -> bool {
        self.primed.load(Ordering::Acquire)
    }

    /// Returns `true` between `ready` and `cleanup`
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.polling.load(Ordering::Acquire)
    }

    /// Number of active subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    fn stamp(&self, order: Order) -> Order {
        let order = match order.id() {
            Some(_) => order,
            None => {
                let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
                let key = format!("{}/{}", self.name, sequence);
                order.with_id(Some(
                    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string(),
                ))
            }
        };
        order.tagged(self.name.clone())
    }

    fn ensure_primed(&self) -> Result<(), VenueError> {
        if self.is_primed() {
            Ok(())
        } else {
            Err(VenueError::NotReady {
                venue: self.name.clone(),
            })
        }
    }
}

impl std::fmt::Debug for DummyVenue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DummyVenue")
            .field("name", &self.name)
            .field("orders", &lock(&self.orders).len())
            .field("balance", &self.balance.load())
            .field("listeners", &self.listeners)
            .finish()
    }
}

#[async_trait]
impl Venue for DummyVenue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ready(&self) -> Result<(), VenueError> {
        if self.fail_ready.load(Ordering::Acquire) {
            return Err(VenueError::Transport {
                venue: self.name.clone(),
                message: "simulated ready failure".to_string(),
            });
        }
        self.primed.store(true, Ordering::Release);
        self.polling.store(true, Ordering::Release);
        debug!("{} ready", self.name);
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), VenueError> {
        self.polling.store(false, Ordering::Release);
        debug!("{} cleaned up", self.name);
        Ok(())
    }

    fn orders(&self) -> Vec<Order> {
        lock(&self.orders).clone()
    }

    fn balance(&self) -> Balance {
        self.balance.load()
    }

    async fn place_orders(&self, orders: Vec<Order>) -> Result<Vec<Order>, VenueError> {
        self.ensure_primed()?;
        if self.fail_place.load(Ordering::Acquire) {
            return Err(VenueError::Rejected {
                venue: self.name.clone(),
                message: "simulated placement failure".to_string(),
            });
        }
        let placed: Vec<Order> = orders
            .into_iter()
            .map(|order| self.stamp(order.with_id(None)))
            .collect();
        lock(&self.orders).extend(placed.iter().cloned());
        lock(&self.placed).extend(placed.iter().cloned());
        trace!("{} placed {} orders", self.name, placed.len());
        Ok(placed)
    }

    async fn cancel_orders(&self, orders: Vec<Order>) -> Result<(), VenueError> {
        self.ensure_primed()?;
        if self.fail_cancel.load(Ordering::Acquire) {
            return Err(VenueError::Rejected {
                venue: self.name.clone(),
                message: "simulated cancel failure".to_string(),
            });
        }
        let mut resting = lock(&self.orders);
        for order in &orders {
            let known = order
                .id()
                .is_some_and(|id| resting.iter().any(|r| r.id() == Some(id)));
            if !known {
                return Err(VenueError::OrderNotFound {
                    venue: self.name.clone(),
                    order_id: order.id().unwrap_or("<none>").to_string(),
                });
            }
        }
        resting.retain(|r| !orders.iter().any(|order| order.id() == r.id()));
        drop(resting);
        trace!("{} cancelled {} orders", self.name, orders.len());
        lock(&self.cancelled).extend(orders);
        Ok(())
    }

    fn subscribe(&self, listener: VenueListener) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}
