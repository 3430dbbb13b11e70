use hdrhistogram::Histogram;
use peer_lob::{MatchingEngine, Order};
use rand::prelude::*;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use std::time::{Duration, Instant};
use uuid::Uuid;

fn main() -> anyhow::Result<()> {
    println!("Preparing Latency Benchmark...");

    let mut engine = MatchingEngine::new();
    let mut rng = StdRng::seed_from_u64(42);

    let mut histogram = Histogram::<u64>::new_with_bounds(1, 1_000_000, 3)?;

    const ITERATIONS: u64 = 1_000_000;

    println!("Running {} iterations...", ITERATIONS);

    let mut total_duration = Duration::ZERO;
    let mut fills = 0u64;

    for _ in 0..ITERATIONS {
        // Prices straddle 10000 so roughly half of all orders cross
        let price = Decimal::new(rng.gen_range(999_000..1_001_000), 2);
        let qty = Decimal::new(rng.gen_range(1..10_000), 4);
        let amount = if rng.gen_bool(0.5) { qty } else { -qty };
        let order = Order::new(Uuid::from_u128(rng.gen()), price, amount);

        let start = Instant::now();
        let result = std::hint::black_box(engine.place_order(order));
        let elapsed = start.elapsed();

        fills += result.fills.len() as u64;
        // Outliers above the histogram bound are dropped
        histogram.record(elapsed.as_nanos() as u64).unwrap_or(());
        total_duration += elapsed;
    }

    println!("\n=== Latency Report (ns) ===");
    println!("Total Ops:  {}", ITERATIONS);
    println!("Fills:      {}", fills);
    println!("Resting:    {}", engine.resting_count());
    println!("Throughput: {:.2} ops/sec", ITERATIONS as f64 / total_duration.as_secs_f64());
    println!("---------------------------");
    println!("Min:    {:6} ns", histogram.min());
    println!("P50:    {:6} ns", histogram.value_at_quantile(0.50));
    println!("P90:    {:6} ns", histogram.value_at_quantile(0.90));
    println!("P99:    {:6} ns", histogram.value_at_quantile(0.99));
    println!("P99.9:  {:6} ns", histogram.value_at_quantile(0.999));
    println!("Max:    {:6} ns", histogram.max());
    println!("---------------------------");

    println!("\nDistribution:");
    for v in histogram.iter_log(100, 2.0) {
        let count = v.count_since_last_iteration();
        if count > 0 {
            println!("<= {:8} ns: {:10} count", v.value_iterated_to(), count);
        }
    }

    Ok(())
}
