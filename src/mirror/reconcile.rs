//! Reconciliation engine.
//!
//! Pure functions over order collections: detecting fills, aggregating book
//! depth into tradable chunks, budgeting, pruning to budget and computing the
//! cancel/place patch that converges origin towards the desired state.
//! Nothing here holds state or fails on valid input; degenerate inputs
//! (empty books, zero quantities) produce empty results.
//!
//! A full cycle, as run by the orchestrator for every remote book update:
//!
//! ```
//! use liquidity_mirror::mirror::reconcile::{
//!     aggregate, budget, mirror_orders, patch, prune_to_budget, sort_by_distance_from_mean, spread,
//! };
//! use liquidity_mirror::{Balance, BookUpdate, Level, Side, ToleranceMode};
//! use rust_decimal::Decimal;
//!
//! let premium = Decimal::TWO;
//! let book = BookUpdate::Sided {
//!     bids: vec![Level::new(Decimal::TWO, Decimal::from(500)).unwrap()],
//!     asks: vec![],
//! }
//! .into_orders();
//!
//! let mean = spread(&book).mean;
//! assert_eq!(mean, None);
//!
//! let desired = aggregate(&mirror_orders(&book, premium), None, None);
//! let rich = Balance::new(Decimal::from(100), Decimal::from(100_000));
//! let limits = budget(&rich, &rich, premium, Decimal::ONE).unwrap();
//! let desired = prune_to_budget(&desired, &limits, None, None);
//! let result = patch(&[], &desired, Decimal::ZERO, ToleranceMode::Relative);
//!
//! assert!(result.cancel.is_empty());
//! assert_eq!(result.place.len(), 1);
//! assert_eq!(result.place[0].side(), Side::Bid);
//! assert_eq!(result.place[0].rate(), Decimal::from(250));
//! # let _ = sort_by_distance_from_mean(&book, Decimal::ZERO);
//! ```

use super::config::ToleranceMode;
use super::error::ConfigError;
use super::order::{Balance, Order, Side};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::trace;

/// Best prices of a book and their midpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Spread {
    /// Highest bid rate
    pub best_bid: Option<Decimal>,
    /// Lowest ask rate
    pub best_ask: Option<Decimal>,
    /// Midpoint of best bid and best ask; `None` if either side is empty
    pub mean: Option<Decimal>,
}

/// Maximum tradable amount for one side of origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SideBudget {
    /// Base-asset quantity
    pub quantity: Decimal,
    /// Notional value in origin terms
    pub value: Decimal,
}

/// Per-side budget deduced from both venues' balances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Budget {
    /// Limits for origin asks
    pub ask: SideBudget,
    /// Limits for origin bids
    pub bid: SideBudget,
}

impl Budget {
    /// Limits for `side`
    #[must_use]
    pub fn side(&self, side: Side) -> &SideBudget {
        match side {
            Side::Ask => &self.ask,
            Side::Bid => &self.bid,
        }
    }
}

/// Minimal set of origin mutations converging current towards desired state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Patch {
    /// Resting orders to cancel
    pub cancel: Vec<Order>,
    /// New orders to place
    pub place: Vec<Order>,
}

impl Patch {
    /// Returns `true` if nothing needs to change
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cancel.is_empty() && self.place.is_empty()
    }
}

/// Outcome of [`prune_to_budget_detailed`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pruned {
    /// Orders that fit the budget, in input order
    pub kept: Vec<Order>,
    /// Orders dropped because their side's budget was exhausted
    pub over_budget: usize,
    /// Orders dropped because their value is below the minimum
    pub dust: usize,
    /// Orders dropped by the order count cap
    pub truncated: usize,
}

/// Fills implied by the transition from `old` to `new`.
///
/// Orders are matched by id. An order missing from `new` is reported at its
/// full quantity; an order whose quantity shrank is reported with the
/// difference. Orders that only appear in `new`, grew, or carry no id are
/// never reported.
#[must_use]
pub fn diff(old: &[Order], new: &[Order]) -> Vec<Order> {
    let current: HashMap<&str, &Order> = new
        .iter()
        .filter_map(|order| order.id().map(|id| (id, order)))
        .collect();

    old.iter()
        .filter_map(|previous| {
            let id = previous.id()?;
            match current.get(id) {
                None => Some(previous.clone()),
                Some(now) if now.quantity() < previous.quantity() => {
                    Some(previous.resized(previous.quantity() - now.quantity()))
                }
                Some(_) => None,
            }
        })
        .collect()
}

#[derive(Default)]
struct Run {
    first: Option<Order>,
    count: usize,
    quantity: Decimal,
    notional: Decimal,
}

impl Run {
    fn add(&mut self, order: &Order) {
        if self.first.is_none() {
            self.first = Some(order.clone());
        }
        self.count += 1;
        self.quantity = self.quantity.saturating_add(order.quantity());
        self.notional = self.notional.saturating_add(order.value());
    }

    /// Emits the run as one order, repriced by `premium`
    fn emit(self, side: Side, premium: Decimal) -> Option<Order> {
        match (self.count, self.first) {
            (1, Some(single)) => Some(single.repriced(single.rate().checked_mul(premium)?)),
            _ => {
                let average = self.notional.checked_div(self.quantity)?;
                Some(Order::synthetic(side, self.quantity, average.checked_mul(premium)?))
            }
        }
    }
}

/// Groups consecutive same-side orders into chunks worth at least
/// `min_value`.
///
/// Within each side, orders are accumulated in input order. As soon as the
/// accumulated notional, repriced by `premium` (default 1), reaches
/// `min_value` the run is emitted as a single order whose rate is the
/// value-weighted average rate times `premium`, and a new run starts. A
/// trailing run below `min_value` is discarded. With no `min_value`, every
/// order is its own chunk, so the call is a passthrough at unit premium,
/// except that zero-quantity orders are always dropped since they carry no
/// depth. Single-order chunks keep their id. Sums saturate and a chunk whose
/// repriced rate would overflow is dropped.
///
/// # Examples
///
/// ```
/// use liquidity_mirror::mirror::reconcile::aggregate;
/// use liquidity_mirror::{Order, Side};
/// use rust_decimal::Decimal;
///
/// let orders = vec![
///     Order::parse(Side::Ask, "0.5", "2").unwrap(),
///     Order::parse(Side::Bid, "1", "20").unwrap(),
///     Order::parse(Side::Bid, "1", "40").unwrap(),
/// ];
/// let chunks = aggregate(&orders, Some(Decimal::from(50)), None);
/// assert_eq!(chunks, vec![Order::parse(Side::Bid, "2", "30").unwrap()]);
/// ```
#[must_use]
pub fn aggregate(orders: &[Order], min_value: Option<Decimal>, premium: Option<Decimal>) -> Vec<Order> {
    let premium = premium.unwrap_or(Decimal::ONE);
    if premium <= Decimal::ZERO {
        trace!("aggregate skipped, non-positive premium {}", premium);
        return Vec::new();
    }
    let min_value = min_value.unwrap_or(Decimal::ZERO);

    let mut bids = Run::default();
    let mut asks = Run::default();
    let mut chunks = Vec::new();

    for order in orders.iter().filter(|order| !order.quantity().is_zero()) {
        let side = order.side();
        let run = match side {
            Side::Bid => &mut bids,
            Side::Ask => &mut asks,
        };
        run.add(order);
        if run.notional.saturating_mul(premium) >= min_value {
            if let Some(chunk) = std::mem::take(run).emit(side, premium) {
                chunks.push(chunk);
            }
        }
    }

    if bids.count > 0 || asks.count > 0 {
        trace!(
            "aggregate discarded trailing runs: {} bids, {} asks below {}",
            bids.count, asks.count, min_value
        );
    }
    chunks
}

/// Best bid, best ask and their midpoint.
///
/// The mean is `None` unless both sides are present, so an empty or
/// one-sided book never produces a volatility signal.
#[must_use]
pub fn spread(orders: &[Order]) -> Spread {
    let best_bid = orders
        .iter()
        .filter(|order| order.side() == Side::Bid)
        .map(Order::rate)
        .max();
    let best_ask = orders
        .iter()
        .filter(|order| order.side() == Side::Ask)
        .map(Order::rate)
        .min();
    let mean = match (best_bid, best_ask) {
        (Some(bid), Some(ask)) => Some(
            bid.checked_add(ask)
                .map_or(bid / Decimal::TWO + ask / Decimal::TWO, |sum| sum / Decimal::TWO),
        ),
        _ => None,
    };
    Spread {
        best_bid,
        best_ask,
        mean,
    }
}

/// Orders sorted by ascending `|rate - mean|`, regardless of side.
///
/// The sort is stable: equidistant orders keep their relative order.
#[must_use]
pub fn sort_by_distance_from_mean(orders: &[Order], mean: Decimal) -> Vec<Order> {
    let mut sorted = orders.to_vec();
    sorted.sort_by_key(|order| (order.rate() - mean).abs());
    sorted
}

/// Budget for each origin side.
///
/// Origin asks sell base held on origin and are hedged by buying on remote
/// with remote's quote balance at `rate / premium`; origin bids spend origin's
/// quote balance and are hedged by selling remote's base. Every limit is
/// divided by `padding`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPremium`] for a non-positive premium,
/// [`ConfigError::InvalidPadding`] for a padding below 1 and
/// [`ConfigError::Overflow`] if remote's quote balance scaled by the premium
/// does not fit in a decimal.
pub fn budget(
    origin: &Balance,
    remote: &Balance,
    premium: Decimal,
    padding: Decimal,
) -> Result<Budget, ConfigError> {
    if premium <= Decimal::ZERO {
        return Err(ConfigError::InvalidPremium { premium });
    }
    if padding < Decimal::ONE {
        return Err(ConfigError::InvalidPadding { padding });
    }
    let pad = |amount: Decimal| (amount / padding).max(Decimal::ZERO);
    let hedge_value = remote
        .value
        .checked_mul(premium)
        .ok_or(ConfigError::Overflow {
            amount: remote.value,
            premium,
        })?;

    Ok(Budget {
        ask: SideBudget {
            quantity: pad(origin.quantity),
            value: pad(hedge_value),
        },
        bid: SideBudget {
            quantity: pad(remote.quantity),
            value: pad(origin.value),
        },
    })
}

/// Keeps the orders that fit within `budget`. See [`prune_to_budget_detailed`].
#[must_use]
pub fn prune_to_budget(
    orders: &[Order],
    budget: &Budget,
    min_value: Option<Decimal>,
    max_orders: Option<usize>,
) -> Vec<Order> {
    prune_to_budget_detailed(orders, budget, min_value, max_orders).kept
}

/// Walks `orders` (expected closest-to-mean first) accumulating quantity and
/// value per side.
///
/// An order is kept only if the side's running totals stay within the
/// budget; reaching the limit exactly is allowed. The first order that would
/// exceed it exhausts the side and every later order on that side is
/// dropped. Orders worth less than `min_value` are skipped without touching
/// the totals. The kept orders are finally truncated to `max_orders`.
#[must_use]
pub fn prune_to_budget_detailed(
    orders: &[Order],
    budget: &Budget,
    min_value: Option<Decimal>,
    max_orders: Option<usize>,
) -> Pruned {
    #[derive(Default)]
    struct Usage {
        quantity: Decimal,
        value: Decimal,
        exhausted: bool,
    }

    let mut bids = Usage::default();
    let mut asks = Usage::default();
    let mut pruned = Pruned::default();

    for order in orders {
        let value = order.value();
        if min_value.is_some_and(|min| value < min) {
            pruned.dust += 1;
            continue;
        }
        let usage = match order.side() {
            Side::Bid => &mut bids,
            Side::Ask => &mut asks,
        };
        if usage.exhausted {
            pruned.over_budget += 1;
            continue;
        }
        let limit = budget.side(order.side());
        let quantity = usage.quantity.saturating_add(order.quantity());
        let total = usage.value.saturating_add(value);
        if quantity > limit.quantity || total > limit.value {
            trace!("budget exhausted for {} at {}", order.side(), order);
            usage.exhausted = true;
            pruned.over_budget += 1;
            continue;
        }
        usage.quantity = quantity;
        usage.value = total;
        pruned.kept.push(order.clone());
    }

    if let Some(max) = max_orders {
        if pruned.kept.len() > max {
            pruned.truncated = pruned.kept.len() - max;
            pruned.kept.truncate(max);
        }
    }
    pruned
}

fn within_tolerance(current: Decimal, desired: Decimal, tolerance: Decimal, mode: ToleranceMode) -> bool {
    let drift = (current - desired).abs();
    match mode {
        ToleranceMode::Absolute => drift <= tolerance,
        ToleranceMode::Relative => drift <= tolerance.saturating_mul(desired.abs()),
    }
}

/// Cancel/place instructions converging `current` towards `desired`.
///
/// Each current order is kept if an unclaimed desired order of the same side
/// lies within `tolerance` of its rate (first match wins, each desired order
/// is claimed at most once); otherwise it is cancelled. Unclaimed desired
/// orders are placed.
#[must_use]
pub fn patch(
    current: &[Order],
    desired: &[Order],
    tolerance: Decimal,
    mode: ToleranceMode,
) -> Patch {
    let mut claimed = vec![false; desired.len()];
    let mut result = Patch::default();

    for order in current {
        let matched = desired.iter().enumerate().position(|(index, target)| {
            !claimed[index]
                && target.side() == order.side()
                && within_tolerance(order.rate(), target.rate(), tolerance, mode)
        });
        match matched {
            Some(index) => claimed[index] = true,
            None => result.cancel.push(order.clone()),
        }
    }

    result.place = desired
        .iter()
        .zip(claimed)
        .filter(|(_, claimed)| !claimed)
        .map(|(order, _)| order.clone())
        .collect();
    result
}

/// Reprices remote book orders into origin quotes.
///
/// Bids become `rate / premium` and asks `rate * premium`, so origin always
/// quotes wider than remote. Ids are dropped. A non-positive premium yields
/// no quotes, and an ask whose repriced rate would overflow is skipped.
#[must_use]
pub fn mirror_orders(orders: &[Order], premium: Decimal) -> Vec<Order> {
    if premium <= Decimal::ZERO {
        return Vec::new();
    }
    orders
        .iter()
        .filter_map(|order| {
            let rate = match order.side() {
                Side::Bid => order.rate().checked_div(premium)?,
                Side::Ask => order.rate().checked_mul(premium)?,
            };
            Some(Order::synthetic(order.side(), order.quantity(), rate))
        })
        .collect()
}

/// The remote hedge for an origin fill.
///
/// A filled origin ask at `r` is bought back on remote with a bid at
/// `r / premium`; a filled origin bid is sold on remote with an ask at
/// `r * premium`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPremium`] for a non-positive premium and
/// [`ConfigError::Overflow`] if the hedge rate does not fit in a decimal.
pub fn invert(fill: &Order, premium: Decimal) -> Result<Order, ConfigError> {
    if premium <= Decimal::ZERO {
        return Err(ConfigError::InvalidPremium { premium });
    }
    let rate = match fill.side() {
        Side::Ask => fill.rate() / premium,
        Side::Bid => fill
            .rate()
            .checked_mul(premium)
            .ok_or(ConfigError::Overflow {
                amount: fill.rate(),
                premium,
            })?,
    };
    Ok(Order::synthetic(fill.side().opposite(), fill.quantity(), rate))
}
