//! Venue adapter contract.
//!
//! Origin and remote venues are independent implementations of [`Venue`],
//! injected into the orchestrator. Transport, authentication and rate
//! limiting live entirely behind this trait.

use super::error::VenueError;
use super::order::{Balance, BookUpdate, Order};
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Events a venue pushes to its subscribers
#[derive(Debug, Clone)]
pub enum VenueEvent {
    /// One of the venue's resting orders was filled, fully or partially.
    /// The order carries the filled quantity.
    Trade(Order),
    /// The venue's public order book changed (remote only)
    OrderBook(BookUpdate),
}

/// Subscriber callback. Invoked synchronously by the venue; implementations
/// must not block.
pub type VenueListener = Arc<dyn Fn(&VenueEvent) + Send + Sync>;

/// Handle returned by [`Venue::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Listener bookkeeping for venue implementations.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: DashMap<SubscriptionId, VenueListener>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` and returns its handle
    pub fn subscribe(&self, listener: VenueListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(id, listener);
        id
    }

    /// Removes a listener. Returns `false` if the handle was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Delivers `event` to every registered listener
    pub fn emit(&self, event: &VenueEvent) {
        // snapshot first so no shard lock is held while listeners run
        let listeners: Vec<VenueListener> = self
            .listeners
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    /// Number of registered listeners
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns `true` if nobody is subscribed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Uniform contract every venue adapter satisfies.
#[async_trait]
pub trait Venue: Send + Sync {
    /// Identifier used in logs and diagnostics
    fn name(&self) -> &str;

    /// Authenticates, subscribes and primes local state.
    ///
    /// # Errors
    ///
    /// Any error aborts the orchestrator's startup.
    async fn ready(&self) -> Result<(), VenueError>;

    /// Stops background polling and subscriptions. Best effort: errors are
    /// logged by the caller, never fatal.
    async fn cleanup(&self) -> Result<(), VenueError>;

    /// Currently known resting orders
    fn orders(&self) -> Vec<Order>;

    /// Available funds
    fn balance(&self) -> Balance;

    /// Places `orders`, returning them with venue-assigned ids.
    ///
    /// # Errors
    ///
    /// Returns the venue failure; the orchestrator treats it as fatal.
    async fn place_orders(&self, orders: Vec<Order>) -> Result<Vec<Order>, VenueError>;

    /// Cancels `orders`.
    ///
    /// # Errors
    ///
    /// Returns the venue failure; the orchestrator treats it as fatal.
    async fn cancel_orders(&self, orders: Vec<Order>) -> Result<(), VenueError>;

    /// Registers an event listener
    fn subscribe(&self, listener: VenueListener) -> SubscriptionId;

    /// Removes an event listener
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
