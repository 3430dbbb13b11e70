//! Order types shared by the book, the matcher and the wire protocol.
//!
//! An order carries a signed `amount`: positive quantities are bids,
//! negative quantities are asks. The side is always derived from the
//! sign and never stored next to it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque order identifier.
///
/// Assigned from the request id of the `order:submit` call that created
/// the order, so every replica receiving the same broadcast agrees on it.
pub type OrderId = Uuid;

/// Order side (bid = buy, ask = sell)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy side (bids)
    Bid,
    /// Sell side (asks)
    Ask,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

/// A limit order.
///
/// Immutable except for `amount`, which shrinks toward zero as the order
/// is partially filled.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Limit price
    pub price: Decimal,
    /// Signed quantity: `> 0` buys, `< 0` sells
    pub amount: Decimal,
}

impl Order {
    pub fn new(id: OrderId, price: Decimal, amount: Decimal) -> Self {
        Self { id, price, amount }
    }

    /// Side derived from the sign of `amount`.
    ///
    /// Zero amounts report `Ask`; they never reach the book.
    #[inline]
    pub fn side(&self) -> Side {
        if self.amount > Decimal::ZERO {
            Side::Bid
        } else {
            Side::Ask
        }
    }

    /// Unsigned quantity still open on this order.
    #[inline]
    pub fn quantity(&self) -> Decimal {
        self.amount.abs()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.amount.is_zero()
    }

    /// Consume `qty` of the open quantity, keeping the sign.
    #[inline]
    pub fn fill(&mut self, qty: Decimal) {
        debug_assert!(qty <= self.quantity());
        match self.side() {
            Side::Bid => self.amount -= qty,
            Side::Ask => self.amount += qty,
        }
    }
}

/// One match between an incoming (taker) order and a resting (maker) order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// Resting order that provided the liquidity
    pub maker_id: OrderId,
    /// Incoming order
    pub taker_id: OrderId,
    /// Side of the taker order
    pub taker_side: Side,
    /// Execution price (the maker's price)
    pub price: Decimal,
    /// Unsigned executed quantity
    pub quantity: Decimal,
}
