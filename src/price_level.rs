//! Price Level - A FIFO queue of orders at a single price point.
//!
//! Orders at the same price keep arrival order: new entries go to the
//! tail, matching consumes from the head, and a partially filled head
//! stays at the head.

use std::collections::VecDeque;

use rust_decimal::Decimal;

use crate::order::Order;

/// A queue of orders at a specific price level.
///
/// Orders are processed in FIFO order (price-time priority).
#[derive(Clone, Debug, Default)]
pub struct PriceLevel {
    orders: VecDeque<Order>,
}

impl PriceLevel {
    /// Create a new empty price level
    pub fn new() -> Self {
        Self {
            orders: VecDeque::new(),
        }
    }

    /// Returns true if there are no orders at this level
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Number of orders at this level
    #[inline]
    pub fn count(&self) -> usize {
        self.orders.len()
    }

    /// Append an order to the tail of the queue (newest order).
    #[inline]
    pub fn push_back(&mut self, order: Order) {
        self.orders.push_back(order);
    }

    /// Remove and return the head order (oldest/highest priority).
    #[inline]
    pub fn pop_front(&mut self) -> Option<Order> {
        self.orders.pop_front()
    }

    /// Peek at the head order without removing it.
    #[inline]
    pub fn front(&self) -> Option<&Order> {
        self.orders.front()
    }

    /// Consume `qty` from the head order in place.
    ///
    /// The caller guarantees `qty` is strictly less than the head's open
    /// quantity, so the head never becomes a zero-amount entry.
    pub fn fill_front(&mut self, qty: Decimal) {
        if let Some(head) = self.orders.front_mut() {
            debug_assert!(qty < head.quantity());
            head.fill(qty);
        }
    }

    /// Total unsigned quantity across all orders at this level.
    ///
    /// Amounts are unbounded peer input, so the sum saturates at
    /// `Decimal::MAX` instead of overflowing.
    pub fn total_qty(&self) -> Decimal {
        self.orders
            .iter()
            .fold(Decimal::ZERO, |acc, o| acc.saturating_add(o.quantity()))
    }

    /// Iterate orders from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }
}
