//! Stress Tests - Push the engine to its limits.
//!
//! These tests verify correctness under extreme conditions:
//! - High contention at single price levels
//! - Rapid order churn
//! - Extreme prices and quantities
//! - Large random workloads

use peer_lob::{MatchingEngine, Order, Side};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use uuid::Uuid;

fn id(n: u64) -> Uuid {
    Uuid::from_u128(n as u128)
}

fn order(n: u64, price: i64, amount: i64) -> Order {
    Order::new(id(n), Decimal::from(price), Decimal::from(amount))
}

// ============================================================================
// High Contention Tests
// ============================================================================

#[test]
fn test_single_price_level_contention() {
    let mut engine = MatchingEngine::new();
    const ORDERS_PER_SIDE: u64 = 1000;

    // Add many sells at the same price
    for i in 0..ORDERS_PER_SIDE {
        engine.place_order(order(i, 10_000, -100));
    }

    assert_eq!(engine.resting_count(), ORDERS_PER_SIDE as usize);
    assert_eq!(engine.book.ask_levels(), 1);

    // Match through all of them
    let result = engine.place_order(order(ORDERS_PER_SIDE, 10_000, (ORDERS_PER_SIDE * 100) as i64));

    assert_eq!(result.fills.len(), ORDERS_PER_SIDE as usize, "Should have {} fills", ORDERS_PER_SIDE);
    assert!(result.resting.is_none());
    assert_eq!(engine.resting_count(), 0, "Book should be empty after matching all");
}

#[test]
fn test_fifo_priority_under_contention() {
    let mut engine = MatchingEngine::new();

    for i in 0..100u64 {
        engine.place_order(order(i, 10_000, -10));
    }

    // 50 orders worth
    let result = engine.place_order(order(1000, 10_000, 500));

    assert_eq!(result.fills.len(), 50);
    for (i, fill) in result.fills.iter().enumerate() {
        assert_eq!(fill.maker_id, id(i as u64), "Fill {} should hit order {}", i, i);
    }

    // The untouched half keeps its arrival order
    let remaining: Vec<_> = engine.snapshot().into_iter().map(|o| o.id).collect();
    let expected: Vec<_> = (50..100).map(id).collect();
    assert_eq!(remaining, expected);
}

#[test]
fn test_partial_maker_keeps_priority_under_contention() {
    let mut engine = MatchingEngine::new();
    for i in 0..10u64 {
        engine.place_order(order(i, 10_000, 10));
    }

    // Nibble the head repeatedly
    for n in 0..9u64 {
        let result = engine.place_order(order(100 + n, 10_000, -1));
        assert_eq!(result.fills[0].maker_id, id(0));
    }

    let head = &engine.snapshot()[0];
    assert_eq!(head.id, id(0));
    assert_eq!(head.amount, Decimal::ONE);
}

// ============================================================================
// Rapid Churn Tests
// ============================================================================

#[test]
fn test_rapid_match_cycles() {
    let mut engine = MatchingEngine::new();
    const CYCLES: u64 = 5_000;

    let mut total_fills = 0;

    for cycle in 0..CYCLES {
        engine.place_order(order(cycle * 2, 10_000, -100));
        let result = engine.place_order(order(cycle * 2 + 1, 10_000, 100));
        total_fills += result.fills.len();
    }

    assert_eq!(total_fills, CYCLES as usize, "Should have {} fills", CYCLES);
    assert_eq!(engine.resting_count(), 0, "Book should be empty");
    assert_eq!(engine.book.bid_levels() + engine.book.ask_levels(), 0);
}

#[test]
fn test_level_created_and_removed_repeatedly() {
    let mut engine = MatchingEngine::new();

    for cycle in 0..1_000u64 {
        let price = 10_000 + (cycle % 7) as i64;
        engine.place_order(order(cycle * 2, price, 5));
        assert_eq!(engine.best_bid(), Some(Decimal::from(price)));

        engine.place_order(order(cycle * 2 + 1, price, -5));
        assert_eq!(engine.best_bid(), None);
    }
}

// ============================================================================
// Edge Case Tests
// ============================================================================

#[test]
fn test_tiny_decimal_quantities() {
    let mut engine = MatchingEngine::new();
    let dust = Decimal::new(1, 8);

    engine.place_order(Order::new(id(1), Decimal::from(100), -dust * Decimal::from(3)));
    let result = engine.place_order(Order::new(id(2), Decimal::from(100), dust));

    assert!(result.filled);
    assert_eq!(engine.snapshot()[0].amount, -dust * Decimal::from(2));
}

#[test]
fn test_large_quantity() {
    let mut engine = MatchingEngine::new();
    let huge = Decimal::from(u64::MAX);

    engine.place_order(Order::new(id(1), Decimal::from(10_000), huge));
    let result = engine.place_order(Order::new(id(2), Decimal::from(10_000), -Decimal::ONE));

    assert!(result.filled);
    assert_eq!(engine.snapshot()[0].amount, huge - Decimal::ONE);
}

#[test]
fn test_high_precision_prices_are_distinct_levels() {
    let mut engine = MatchingEngine::new();
    engine.place_order(Order::new(id(1), Decimal::new(100_0001, 4), Decimal::ONE));
    engine.place_order(Order::new(id(2), Decimal::new(100_0002, 4), Decimal::ONE));

    assert_eq!(engine.book.bid_levels(), 2);
    assert_eq!(engine.best_bid(), Some(Decimal::new(100_0002, 4)));
}

#[test]
fn test_equal_prices_with_different_scale_share_a_level() {
    let mut engine = MatchingEngine::new();
    engine.place_order(Order::new(id(1), Decimal::new(100, 0), Decimal::ONE));
    engine.place_order(Order::new(id(2), Decimal::new(10_000, 2), Decimal::ONE));

    assert_eq!(engine.book.bid_levels(), 1);
    let ids: Vec<_> = engine.snapshot().into_iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![id(1), id(2)]);
}

#[test]
fn test_many_price_levels() {
    let mut engine = MatchingEngine::new();
    const LEVELS: u64 = 10_000;

    for i in 0..LEVELS {
        engine.place_order(order(i, (i * 1000) as i64 + 1, 100));
    }

    assert_eq!(engine.resting_count(), LEVELS as usize);
    assert_eq!(engine.book.bid_levels(), LEVELS as usize);
    assert_eq!(engine.best_bid(), Some(Decimal::from((LEVELS - 1) * 1000 + 1)));

    // One sell at the floor sweeps everything
    let result = engine.place_order(order(LEVELS, 1, -((LEVELS * 100) as i64)));
    assert_eq!(result.fills.len(), LEVELS as usize);
    assert_eq!(engine.resting_count(), 0);
}

// ============================================================================
// Matching Edge Cases
// ============================================================================

#[test]
fn test_partial_match_across_levels() {
    let mut engine = MatchingEngine::new();

    engine.place_order(order(1, 10_000, -30));
    engine.place_order(order(2, 10_010, -50));
    engine.place_order(order(3, 10_020, -70));

    // Buy 100 up to 10_020: eats 30 + 50, then 20 of the last
    let result = engine.place_order(order(4, 10_020, 100));

    let fills: Vec<_> = result
        .fills
        .iter()
        .map(|f| (f.maker_id, f.price, f.quantity))
        .collect();
    assert_eq!(
        fills,
        vec![
            (id(1), Decimal::from(10_000), Decimal::from(30)),
            (id(2), Decimal::from(10_010), Decimal::from(50)),
            (id(3), Decimal::from(10_020), Decimal::from(20)),
        ]
    );
    assert!(result.resting.is_none());
    assert_eq!(engine.snapshot(), vec![order(3, 10_020, -50)]);
}

#[test]
fn test_limit_stops_sweep() {
    let mut engine = MatchingEngine::new();

    engine.place_order(order(1, 10_000, -30));
    engine.place_order(order(2, 10_010, -50));

    let result = engine.place_order(order(3, 10_005, 100));

    assert_eq!(result.fills.len(), 1);
    assert_eq!(result.resting, Some(order(3, 10_005, 70)));
    assert_eq!(engine.best_bid(), Some(Decimal::from(10_005)));
    assert_eq!(engine.best_ask(), Some(Decimal::from(10_010)));
}

// ============================================================================
// Large Random Workload
// ============================================================================

#[test]
fn test_large_random_workload() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xDEADBEEF);
    let mut engine = MatchingEngine::new();
    const OPS: u64 = 50_000;

    for i in 0..OPS {
        let price = Decimal::new(rng.gen_range(9_900_00..10_100_00), 2);
        let qty = Decimal::new(rng.gen_range(1..100_000), 4);
        let amount = if rng.gen_bool(0.5) { qty } else { -qty };
        let result = engine.place_order(Order::new(id(i), price, amount));

        let filled: Decimal = result.fills.iter().map(|f| f.quantity).sum();
        let rested = result.resting.as_ref().map(|o| o.quantity()).unwrap_or_default();
        assert_eq!(filled + rested, qty, "Quantity not conserved at op {}", i);

        for fill in &result.fills {
            match fill.taker_side {
                Side::Bid => assert!(fill.price <= price),
                Side::Ask => assert!(fill.price >= price),
            }
        }
    }

    // Never crossed, never holds an empty order
    if let (Some(bid), Some(ask)) = (engine.best_bid(), engine.best_ask()) {
        assert!(bid < ask);
    }
    let snapshot = engine.snapshot();
    assert!(snapshot.iter().all(|o| !o.amount.is_zero()));
    assert_eq!(snapshot.len(), engine.resting_count());

    println!("Large workload complete: {} resting", engine.resting_count());
}
