//! Order value type shared by both venues and the reconciliation engine.
//!
//! [`Order`] is immutable: every change is expressed by producing a new
//! order through [`Order::clone_with`] (or one of its `with_*` shorthands),
//! which re-validates the decimal fields. All arithmetic uses
//! [`rust_decimal::Decimal`], never binary floats.

use super::error::MirrorError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Side of a limit order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order
    Bid,
    /// Sell order
    Ask,
}

impl Side {
    /// Returns the other side of the book
    #[must_use]
    #[inline]
    pub fn opposite(self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "BID"),
            Side::Ask => write!(f, "ASK"),
        }
    }
}

/// A simple bid/ask limit order.
///
/// Equality is structural over `id`, `side`, `quantity` and `rate`; the
/// venue tag is diagnostic only.
///
/// # Examples
///
/// ```
/// use liquidity_mirror::{Order, Side};
/// use rust_decimal::Decimal;
///
/// let order = Order::parse(Side::Bid, "2", "500").unwrap();
/// assert_eq!(order.value(), Decimal::from(1000));
///
/// let half = order.with_quantity(Decimal::ONE).unwrap();
/// assert_eq!(half.value(), Decimal::from(500));
/// assert_eq!(order.quantity(), Decimal::from(2));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "OrderRecord")]
pub struct Order {
    id: Option<String>,
    side: Side,
    quantity: Decimal,
    rate: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    venue: Option<String>,
}

/// Unvalidated wire shape of an [`Order`]
#[derive(Deserialize)]
struct OrderRecord {
    #[serde(default)]
    id: Option<String>,
    side: Side,
    quantity: Decimal,
    rate: Decimal,
    #[serde(default)]
    venue: Option<String>,
}

impl TryFrom<OrderRecord> for Order {
    type Error = MirrorError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        let order = Order::new(record.id, record.side, record.quantity, record.rate)?;
        Ok(match record.venue {
            Some(venue) => order.tagged(venue),
            None => order,
        })
    }
}

/// Field overrides applied by [`Order::clone_with`]. Unset fields are
/// carried over from the source order.
#[derive(Debug, Clone, Default)]
pub struct OrderOverrides {
    /// Replacement identifier (`Some(None)` clears it)
    pub id: Option<Option<String>>,
    /// Replacement side
    pub side: Option<Side>,
    /// Replacement quantity
    pub quantity: Option<Decimal>,
    /// Replacement rate
    pub rate: Option<Decimal>,
}

impl Order {
    /// Creates a validated order.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::InvalidOrder`] if `quantity` is negative,
    /// `rate` is not strictly positive, or their product does not fit in a
    /// [`Decimal`].
    pub fn new(
        id: Option<String>,
        side: Side,
        quantity: Decimal,
        rate: Decimal,
    ) -> Result<Self, MirrorError> {
        if quantity < Decimal::ZERO {
            return Err(MirrorError::invalid_order(format!(
                "quantity {quantity} is negative"
            )));
        }
        if rate <= Decimal::ZERO {
            return Err(MirrorError::invalid_order(format!(
                "rate {rate} must be greater than zero"
            )));
        }
        if quantity.checked_mul(rate).is_none() {
            return Err(MirrorError::invalid_order(format!(
                "value of {quantity}@{rate} overflows"
            )));
        }
        Ok(Self {
            id,
            side,
            quantity: quantity.normalize(),
            rate: rate.normalize(),
            venue: None,
        })
    }

    /// Parses an order without identifier from decimal strings.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::InvalidOrder`] if either string is not a decimal
    /// or the parsed values fail validation.
    pub fn parse(side: Side, quantity: &str, rate: &str) -> Result<Self, MirrorError> {
        let quantity = Decimal::from_str(quantity)
            .map_err(|e| MirrorError::invalid_order(format!("quantity {quantity:?}: {e}")))?;
        let rate = Decimal::from_str(rate)
            .map_err(|e| MirrorError::invalid_order(format!("rate {rate:?}: {e}")))?;
        Self::new(None, side, quantity, rate)
    }

    /// Returns a copy of this order with the given fields replaced.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::InvalidOrder`] if the resulting order is invalid.
    pub fn clone_with(&self, overrides: OrderOverrides) -> Result<Self, MirrorError> {
        let mut order = Self::new(
            overrides.id.unwrap_or_else(|| self.id.clone()),
            overrides.side.unwrap_or(self.side),
            overrides.quantity.unwrap_or(self.quantity),
            overrides.rate.unwrap_or(self.rate),
        )?;
        order.venue = self.venue.clone();
        Ok(order)
    }

    /// Copy with a different quantity
    pub fn with_quantity(&self, quantity: Decimal) -> Result<Self, MirrorError> {
        self.clone_with(OrderOverrides {
            quantity: Some(quantity),
            ..Default::default()
        })
    }

    /// Copy with a different rate
    pub fn with_rate(&self, rate: Decimal) -> Result<Self, MirrorError> {
        self.clone_with(OrderOverrides {
            rate: Some(rate),
            ..Default::default()
        })
    }

    /// Copy on `side`
    #[must_use]
    pub fn with_side(&self, side: Side) -> Self {
        Self {
            side,
            ..self.clone()
        }
    }

    /// Copy with a different identifier
    #[must_use]
    pub fn with_id(&self, id: Option<String>) -> Self {
        Self {
            id,
            ..self.clone()
        }
    }

    /// Copy tagged with the venue that produced it
    #[must_use]
    pub fn tagged(self, venue: impl Into<String>) -> Self {
        Self {
            venue: Some(venue.into()),
            ..self
        }
    }

    /// Engine-built order without identifier. Callers guarantee
    /// `quantity >= 0` and `rate > 0`.
    pub(crate) fn synthetic(side: Side, quantity: Decimal, rate: Decimal) -> Self {
        Self {
            id: None,
            side,
            quantity: quantity.normalize(),
            rate: rate.normalize(),
            venue: None,
        }
    }

    /// Copy with a new quantity, same guarantee as [`Order::synthetic`]
    pub(crate) fn resized(&self, quantity: Decimal) -> Self {
        Self {
            quantity: quantity.normalize(),
            ..self.clone()
        }
    }

    /// Copy with a new rate, same guarantee as [`Order::synthetic`]
    pub(crate) fn repriced(&self, rate: Decimal) -> Self {
        Self {
            rate: rate.normalize(),
            ..self.clone()
        }
    }

    /// Venue-assigned identifier, if any
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Order side
    #[must_use]
    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Base-asset quantity
    #[must_use]
    #[inline]
    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    /// Quote-per-base rate
    #[must_use]
    #[inline]
    pub fn rate(&self) -> Decimal {
        self.rate
    }

    /// Name of the venue that produced this order, if tagged
    #[must_use]
    pub fn venue(&self) -> Option<&str> {
        self.venue.as_deref()
    }

    /// Notional value: quantity × rate, saturating at [`Decimal::MAX`] for
    /// engine-built orders
    #[must_use]
    #[inline]
    pub fn value(&self) -> Decimal {
        self.quantity.saturating_mul(self.rate)
    }
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.side == other.side
            && self.quantity == other.quantity
            && self.rate == other.rate
    }
}

impl Eq for Order {}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}@{}", self.side, self.quantity, self.rate)?;
        if let Some(id) = &self.id {
            write!(f, " ({id})")?;
        }
        Ok(())
    }
}

/// One price level of a sided book update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LevelRecord")]
pub struct Level {
    quantity: Decimal,
    rate: Decimal,
}

#[derive(Deserialize)]
struct LevelRecord {
    quantity: Decimal,
    rate: Decimal,
}

impl TryFrom<LevelRecord> for Level {
    type Error = MirrorError;

    fn try_from(record: LevelRecord) -> Result<Self, Self::Error> {
        Level::new(record.quantity, record.rate)
    }
}

impl Level {
    /// Creates a validated level.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::InvalidOrder`] under the same rules as [`Order::new`].
    pub fn new(quantity: Decimal, rate: Decimal) -> Result<Self, MirrorError> {
        let order = Order::new(None, Side::Bid, quantity, rate)?;
        Ok(Self {
            quantity: order.quantity,
            rate: order.rate,
        })
    }

    fn into_order(self, side: Side) -> Order {
        Order {
            id: None,
            side,
            quantity: self.quantity,
            rate: self.rate,
            venue: None,
        }
    }
}

/// An order book update as received at the venue boundary.
///
/// Venues report books either split by side or as a flat list of side-tagged
/// orders; both are accepted and normalized by [`BookUpdate::into_orders`].
///
/// ```
/// use liquidity_mirror::BookUpdate;
///
/// let sided: BookUpdate =
///     serde_json::from_str(r#"{"bids":[{"quantity":"2","rate":"500"}]}"#).unwrap();
/// let flat: BookUpdate =
///     serde_json::from_str(r#"[{"side":"BID","quantity":"2","rate":"500"}]"#).unwrap();
/// assert_eq!(sided.into_orders(), flat.into_orders());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BookUpdate {
    /// Book split into bid and ask levels
    Sided {
        /// Bid levels
        #[serde(default)]
        bids: Vec<Level>,
        /// Ask levels
        #[serde(default)]
        asks: Vec<Level>,
    },
    /// Flat sequence of side-tagged orders
    Flat(Vec<Order>),
}

impl BookUpdate {
    /// Normalizes into a flat sequence, bids first for the sided form.
    #[must_use]
    pub fn into_orders(self) -> Vec<Order> {
        match self {
            BookUpdate::Sided { bids, asks } => bids
                .into_iter()
                .map(|level| level.into_order(Side::Bid))
                .chain(asks.into_iter().map(|level| level.into_order(Side::Ask)))
                .collect(),
            BookUpdate::Flat(orders) => orders,
        }
    }

    /// Returns `true` if the update carries no orders
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            BookUpdate::Sided { bids, asks } => bids.is_empty() && asks.is_empty(),
            BookUpdate::Flat(orders) => orders.is_empty(),
        }
    }
}

impl From<Vec<Order>> for BookUpdate {
    fn from(orders: Vec<Order>) -> Self {
        BookUpdate::Flat(orders)
    }
}

/// Funds available on a venue: `quantity` of the base asset and `value` in
/// the quote asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Base-asset amount
    pub quantity: Decimal,
    /// Quote-asset amount
    pub value: Decimal,
}

impl Balance {
    /// Creates a balance
    #[must_use]
    pub fn new(quantity: Decimal, value: Decimal) -> Self {
        Self { quantity, value }
    }
}
