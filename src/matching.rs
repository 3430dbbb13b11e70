//! Matching Engine - Core order matching algorithm.
//!
//! Implements the cross/rest algorithm:
//! 1. CROSSING: Match the incoming order against the opposite side while
//!    prices cross and quantity remains
//! 2. RESTING: Place the unmatched remainder in the book on its own side
//!
//! Every replica runs its own engine; two engines fed the same sequence
//! of orders end in the same state.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::order::{Fill, Order, Side};
use crate::order_book::OrderBook;

/// Result of placing an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceResult {
    /// Fills generated, in execution order
    pub fills: Vec<Fill>,
    /// True if at least one fill happened
    pub filled: bool,
    /// Unmatched remainder now resting in the book (same id and price)
    pub resting: Option<Order>,
    /// Total resting orders after the operation
    pub resting_count: usize,
}

/// The matching engine core
#[derive(Debug, Default, Clone)]
pub struct MatchingEngine {
    /// The limit order book
    pub book: OrderBook,
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the book's contents with a snapshot.
    ///
    /// Orders are re-inserted one by one in the given order through the
    /// same insertion rule live orders use. The input is trusted to be a
    /// prior snapshot; its ordering is not validated.
    pub fn initialize<I>(&mut self, orders: I)
    where
        I: IntoIterator<Item = Order>,
    {
        self.book.clear();
        for order in orders {
            if !self.book.insert(order) {
                warn!("Skipping zero-amount order in snapshot");
            }
        }
        debug!(resting = self.book.order_count(), "Order book initialized");
    }

    /// Place an order.
    ///
    /// # Algorithm
    /// 1. Cross against the opposite side, best price first, arrival
    ///    order within a price
    /// 2. If quantity remains, rest it on the order's own side
    pub fn place_order(&mut self, order: Order) -> PlaceResult {
        let mut fills = Vec::new();

        if order.is_empty() {
            debug!(order_id = %order.id, "Ignoring zero-amount order");
            return PlaceResult {
                fills,
                filled: false,
                resting: None,
                resting_count: self.book.order_count(),
            };
        }

        // Phase 1: CROSSING (aggressive matching)
        let remaining_qty = self.cross_order(&order, order.quantity(), &mut fills);

        // Phase 2: RESTING (passive posting)
        let resting = if remaining_qty > Decimal::ZERO {
            let mut remainder = order.clone();
            remainder.fill(order.quantity() - remaining_qty);
            self.book.insert(remainder.clone());
            Some(remainder)
        } else {
            None
        };

        let result = PlaceResult {
            filled: !fills.is_empty(),
            fills,
            resting,
            resting_count: self.book.order_count(),
        };

        debug!(
            order_id = %order.id,
            price = %order.price,
            amount = %order.amount,
            fills = result.fills.len(),
            rested = result.resting.is_some(),
            resting_count = result.resting_count,
            "Order placed"
        );

        result
    }

    /// Cross (match) an incoming order against the opposite side.
    ///
    /// # Returns
    /// Remaining unsigned quantity after matching
    fn cross_order(
        &mut self,
        taker: &Order,
        mut remaining_qty: Decimal,
        fills: &mut Vec<Fill>,
    ) -> Decimal {
        let taker_side = taker.side();

        while remaining_qty > Decimal::ZERO {
            // Get best opposite price
            let best_opposite = match self.book.best_opposite_price(taker_side) {
                Some(price) => price,
                None => break, // No orders on opposite side
            };

            // Stop as soon as prices no longer cross; the rest is queued
            if !Self::prices_cross(taker.price, best_opposite, taker_side) {
                break;
            }

            remaining_qty = self.match_at_level(taker, best_opposite, remaining_qty, fills);
        }

        remaining_qty
    }

    /// Check if an incoming order price crosses the opposite best price.
    #[inline]
    fn prices_cross(order_price: Decimal, opposite_best: Decimal, order_side: Side) -> bool {
        match order_side {
            // Buyer willing to pay >= lowest ask
            Side::Bid => order_price >= opposite_best,
            // Seller willing to accept <= highest bid
            Side::Ask => order_price <= opposite_best,
        }
    }

    /// Match against orders at a specific price level, head first.
    ///
    /// # Returns
    /// Remaining quantity after matching at this level
    fn match_at_level(
        &mut self,
        taker: &Order,
        price: Decimal,
        mut remaining_qty: Decimal,
        fills: &mut Vec<Fill>,
    ) -> Decimal {
        let maker_side = taker.side().opposite();

        while remaining_qty > Decimal::ZERO {
            let (maker_id, maker_qty) = match self.book.get_level(maker_side, price).and_then(|l| l.front()) {
                Some(maker) => (maker.id, maker.quantity()),
                None => break,
            };

            let trade_qty = remaining_qty.min(maker_qty);
            fills.push(Fill {
                maker_id,
                taker_id: taker.id,
                taker_side: taker.side(),
                price,
                quantity: trade_qty,
            });
            remaining_qty -= trade_qty;

            if trade_qty == maker_qty {
                // Maker fully consumed; never leave a zero-amount entry
                self.book.pop_front(maker_side, price);
            } else {
                // Maker partially consumed; it keeps its place at the head
                self.book.fill_front(maker_side, price, trade_qty);
            }
        }

        remaining_qty
    }

    // ========================================================================
    // Utility Methods
    // ========================================================================

    /// Book contents for replication: bids then asks, priority order.
    pub fn snapshot(&self) -> Vec<Order> {
        self.book.snapshot()
    }

    /// Total resting orders on both sides
    #[inline]
    pub fn resting_count(&self) -> usize {
        self.book.order_count()
    }

    /// Get the best bid price
    #[inline]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.book.best_bid()
    }

    /// Get the best ask price
    #[inline]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.book.best_ask()
    }

    /// Compute a hash of the current state (for replica convergence checks)
    pub fn state_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        for order in self.book.bids().chain(self.book.asks()) {
            order.id.hash(&mut hasher);
            // Normalize so 100 and 100.00 hash alike
            order.price.normalize().hash(&mut hasher);
            order.amount.normalize().hash(&mut hasher);
        }
        self.book.order_count().hash(&mut hasher);
        hasher.finish()
    }
}
