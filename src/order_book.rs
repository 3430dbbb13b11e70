//! Order Book - The replicated limit order book data structure.
//!
//! Keeps bid and ask price levels in price order so that the best price
//! on either side is the first key of its map. Orders at an equal price
//! queue behind the orders already resting there (stable insertion).

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::order::{Order, Side};
use crate::price_level::PriceLevel;

/// Price-ordered order book.
///
/// `bids` are walked highest price first, `asks` lowest price first.
/// No resting order ever has a zero amount.
#[derive(Clone, Default)]
pub struct OrderBook {
    /// Bid price levels (buy orders)
    bids: BTreeMap<Decimal, PriceLevel>,
    /// Ask price levels (sell orders)
    asks: BTreeMap<Decimal, PriceLevel>,
    /// Total resting orders across both sides
    order_count: usize,
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Best Price Access
    // ========================================================================

    /// Get the best bid price (highest buy price)
    #[inline]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next_back().copied()
    }

    /// Get the best ask price (lowest sell price)
    #[inline]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    /// Get the best price on a given side
    #[inline]
    fn best_price(&self, side: Side) -> Option<Decimal> {
        match side {
            Side::Bid => self.best_bid(),
            Side::Ask => self.best_ask(),
        }
    }

    /// Get the best opposite price (for matching)
    #[inline]
    pub fn best_opposite_price(&self, side: Side) -> Option<Decimal> {
        self.best_price(side.opposite())
    }

    // ========================================================================
    // Level Access
    // ========================================================================

    /// Get a price level (immutable)
    #[inline]
    pub fn get_level(&self, side: Side, price: Decimal) -> Option<&PriceLevel> {
        self.levels(side).get(&price)
    }

    /// Get a price level (mutable)
    #[inline]
    fn get_level_mut(&mut self, side: Side, price: Decimal) -> Option<&mut PriceLevel> {
        self.levels_mut(side).get_mut(&price)
    }

    fn levels(&self, side: Side) -> &BTreeMap<Decimal, PriceLevel> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn levels_mut(&mut self, side: Side) -> &mut BTreeMap<Decimal, PriceLevel> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    // ========================================================================
    // Order Management
    // ========================================================================

    /// Rest an order on its own side, behind any order already resting at
    /// the same price.
    ///
    /// # Returns
    /// `false` if the order has a zero amount and was not stored.
    pub fn insert(&mut self, order: Order) -> bool {
        if order.is_empty() {
            return false;
        }
        let side = order.side();
        self.levels_mut(side)
            .entry(order.price)
            .or_insert_with(PriceLevel::new)
            .push_back(order);
        self.order_count += 1;
        true
    }

    /// Remove the head order at a price level, dropping the level if it
    /// becomes empty.
    pub fn pop_front(&mut self, side: Side, price: Decimal) -> Option<Order> {
        let levels = self.levels_mut(side);
        let level = levels.get_mut(&price)?;
        let order = level.pop_front()?;
        if level.is_empty() {
            levels.remove(&price);
        }
        self.order_count -= 1;
        Some(order)
    }

    /// Consume part of the head order at a price level in place.
    pub fn fill_front(&mut self, side: Side, price: Decimal, qty: Decimal) {
        if let Some(level) = self.get_level_mut(side, price) {
            level.fill_front(qty);
        }
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Bids in priority order (best price first, then arrival order).
    pub fn bids(&self) -> impl Iterator<Item = &Order> {
        self.bids.values().rev().flat_map(|level| level.iter())
    }

    /// Asks in priority order (best price first, then arrival order).
    pub fn asks(&self) -> impl Iterator<Item = &Order> {
        self.asks.values().flat_map(|level| level.iter())
    }

    /// Full book contents: bids followed by asks, each in priority order.
    ///
    /// Re-inserting the result in order into an empty book reproduces it.
    pub fn snapshot(&self) -> Vec<Order> {
        let mut orders = Vec::with_capacity(self.order_count);
        orders.extend(self.bids().cloned());
        orders.extend(self.asks().cloned());
        orders
    }

    // ========================================================================
    // Utility Methods
    // ========================================================================

    /// Get the total number of orders in the book
    pub fn order_count(&self) -> usize {
        self.order_count
    }

    /// Get the number of bid levels
    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    /// Get the number of ask levels
    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    /// Check if the book is empty
    pub fn is_empty(&self) -> bool {
        self.order_count == 0
    }

    /// Clear all orders from the book
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.order_count = 0;
    }

    /// Get depth at a price level: (total quantity, order count)
    pub fn depth_at(&self, side: Side, price: Decimal) -> (Decimal, usize) {
        self.get_level(side, price)
            .map(|l| (l.total_qty(), l.count()))
            .unwrap_or((Decimal::ZERO, 0))
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("best_bid", &self.best_bid())
            .field("best_ask", &self.best_ask())
            .field("bid_levels", &self.bids.len())
            .field("ask_levels", &self.asks.len())
            .field("order_count", &self.order_count)
            .finish()
    }
}
