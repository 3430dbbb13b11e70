//! Trading Loop - pause-gated order submission and the random order
//! generator.
//!
//! Every submission is broadcast to all `order:submit` advertisers, the
//! submitting node included. Each replica matches on arrival; there is no
//! sequencer, so replicas only agree while they see broadcasts in the same
//! order.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::command::{OrderRequest, Request, Response, SubmitReply};
use crate::config::{GeneratorConfig, NodeConfig};
use crate::network::{NetworkError, PeerId, PeerNetwork};
use crate::order::OrderId;
use crate::service::NodeState;

#[derive(Debug, Error)]
pub enum TradingError {
    /// The broadcast could not be sent at all
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("{failed} of {total} replicas did not apply the order: {first}")]
    Delivery {
        failed: usize,
        total: usize,
        first: NetworkError,
    },
}

/// Outcome of a fully delivered submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReport {
    /// Id every replica stored the order under
    pub order_id: OrderId,
    pub replies: Vec<(PeerId, SubmitReply)>,
}

impl SubmitReport {
    /// True if any replica reported a trade
    pub fn filled(&self) -> bool {
        self.replies.iter().any(|(_, reply)| reply.filled)
    }
}

/// Submits locally originated orders once the network is unpaused.
#[derive(Clone)]
pub struct TradingLoop {
    network: Arc<dyn PeerNetwork>,
    state: Arc<NodeState>,
    request_timeout: Duration,
    pause_poll: Duration,
}

impl TradingLoop {
    pub fn new(network: Arc<dyn PeerNetwork>, state: Arc<NodeState>, config: &NodeConfig) -> Self {
        Self {
            network,
            state,
            request_timeout: config.request_timeout(),
            pause_poll: config.pause_poll(),
        }
    }

    /// Poll the lock set until no peer holds a pause.
    ///
    /// Waits forever behind a stale lock.
    pub async fn wait_until_unpaused(&self) {
        if !self.state.is_paused() {
            return;
        }
        debug!(node = %self.network.local_id(), "Network paused, holding order");
        while self.state.is_paused() {
            tokio::time::sleep(self.pause_poll).await;
        }
        debug!(node = %self.network.local_id(), "Network resumed");
    }

    /// Broadcast a new order to every replica.
    ///
    /// One fresh id is shared by the whole fan-out so all replicas store
    /// the order under the same id.
    pub async fn submit_order(&self, price: Decimal, amount: Decimal) -> Result<SubmitReport, TradingError> {
        self.wait_until_unpaused().await;

        let order_id = Uuid::new_v4();
        let node = self.network.local_id();
        debug!(%node, %order_id, %price, %amount, "Submitting order");

        let replies = self
            .network
            .broadcast(
                order_id,
                Request::OrderSubmit(OrderRequest { price, amount }),
                self.request_timeout,
            )
            .await?;

        let total = replies.len();
        let mut failed = 0;
        let mut first = None;
        let mut report = SubmitReport {
            order_id,
            replies: Vec::with_capacity(total),
        };

        for (peer, reply) in replies {
            let error = match reply {
                Ok(Response::Order(reply)) => {
                    debug!(%node, %peer, %order_id, filled = reply.filled, resting = reply.resting_count, "Order applied");
                    report.replies.push((peer, reply));
                    continue;
                }
                Ok(other) => NetworkError::Codec(format!("unexpected reply from {peer}: {other:?}")),
                Err(e) => e,
            };
            warn!(%node, %order_id, error = %error, "Replica did not apply order");
            failed += 1;
            first.get_or_insert(error);
        }

        match first {
            Some(first) => Err(TradingError::Delivery { failed, total, first }),
            None => Ok(report),
        }
    }

    /// Run `generator` until `shutdown` flips to true or its sender drops.
    pub fn spawn_generator(
        &self,
        mut generator: OrderGenerator,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let trading = self.clone();
        tokio::spawn(async move {
            let node = trading.network.local_id().clone();
            info!(%node, "Order generator started");

            loop {
                let next = generator.next_order();

                tokio::select! {
                    _ = tokio::time::sleep(next.delay) => {}
                    _ = shutdown.changed() => break,
                }
                if *shutdown.borrow() {
                    break;
                }
                if next.amount.is_zero() {
                    continue;
                }

                tokio::select! {
                    result = trading.submit_order(next.price, next.amount) => match result {
                        Ok(report) => {
                            debug!(%node, order_id = %report.order_id, filled = report.filled(), "Generated order delivered");
                        }
                        Err(e) => warn!(%node, error = %e, "Generated order failed"),
                    },
                    _ = shutdown.changed() => break,
                }
            }

            info!(%node, "Order generator stopped");
        })
    }
}

/// One generated order and the wait before submitting it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratedOrder {
    pub delay: Duration,
    pub price: Decimal,
    pub amount: Decimal,
}

/// Random traffic source. One uniform draw per order sets the delay,
/// the price and the signed amount together.
#[derive(Debug)]
pub struct OrderGenerator {
    rng: StdRng,
    config: GeneratorConfig,
}

impl OrderGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            config,
        }
    }

    pub fn seeded(config: GeneratorConfig, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
        }
    }

    pub fn next_order(&mut self) -> GeneratedOrder {
        let r: f64 = self.rng.gen();
        self.order_from_draw(r)
    }

    fn order_from_draw(&self, r: f64) -> GeneratedOrder {
        let config = &self.config;
        let span_ms = config.max_delay_ms.saturating_sub(config.min_delay_ms);
        let delay = Duration::from_millis(config.min_delay_ms + (r * span_ms as f64).floor() as u64);

        // Ties round away from zero, matching fixed-point formatting
        let round = |d: Decimal| {
            d.round_dp_with_strategy(config.decimals, RoundingStrategy::MidpointAwayFromZero)
        };

        let draw = Decimal::from_f64_retain(r).unwrap_or_default();
        let price = round(Decimal::from(config.price_floor) + draw * Decimal::from(config.price_span));
        // Lower half of the draw sells, upper half buys
        let amount = if r < 0.5 { -draw } else { draw / Decimal::from(2) };

        GeneratedOrder {
            delay,
            price,
            amount: round(amount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalGrape;
    use crate::command::ServiceKey;
    use crate::service::NodeService;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn generator() -> OrderGenerator {
        OrderGenerator::seeded(GeneratorConfig::default(), 7)
    }

    #[test]
    fn test_generator_draw_low_sells() {
        let order = generator().order_from_draw(0.25);
        assert_eq!(order.delay, Duration::from_millis(3_250));
        assert_eq!(order.price, dec("10025"));
        assert_eq!(order.amount, dec("-0.25"));
    }

    #[test]
    fn test_generator_draw_high_buys() {
        let order = generator().order_from_draw(0.75);
        assert_eq!(order.delay, Duration::from_millis(7_750));
        assert_eq!(order.price, dec("10075"));
        assert_eq!(order.amount, dec("0.375"));
    }

    #[test]
    fn test_generator_rounds_to_decimals() {
        let order = generator().order_from_draw(0.123456789);
        assert_eq!(order.price, dec("10012.3457"));
        assert_eq!(order.amount, dec("-0.1235"));

        let tiny = generator().order_from_draw(0.00001);
        assert!(tiny.amount.is_zero());
    }

    #[test]
    fn test_generator_ties_round_away_from_zero() {
        let buy = generator().order_from_draw(0.5625);
        assert_eq!(buy.price, dec("10056.25"));
        assert_eq!(buy.amount, dec("0.2813"));

        let sell = generator().order_from_draw(0.03125);
        assert_eq!(sell.price, dec("10003.125"));
        assert_eq!(sell.amount, dec("-0.0313"));
    }

    #[test]
    fn test_generator_seeded_is_repeatable() {
        let mut a = generator();
        let mut b = generator();
        for _ in 0..10 {
            let order = a.next_order();
            assert_eq!(order, b.next_order());
            assert!(order.delay >= Duration::from_millis(1_000));
            assert!(order.delay < Duration::from_millis(10_000));
        }
    }

    async fn trading(grape: &LocalGrape, port: u16, advertise: bool) -> (TradingLoop, Arc<NodeState>) {
        let id = PeerId::from_addr("127.0.0.1", port);
        let state = Arc::new(NodeState::new());
        let link = grape.connect(id.clone(), Arc::new(NodeService::new(id, state.clone())));
        if advertise {
            link.advertise(ServiceKey::OrderSubmit).await.unwrap();
        }
        (TradingLoop::new(Arc::new(link), state.clone(), &NodeConfig::default()), state)
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_without_peers_fails() {
        let grape = LocalGrape::new();
        let (trading, _) = trading(&grape, 1024, false).await;

        let err = trading.submit_order(dec("100"), dec("1")).await.unwrap_err();
        assert!(matches!(err, TradingError::Network(NetworkError::NoPeers(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_submit_waits_for_release() {
        let grape = LocalGrape::new();
        let (trading, state) = trading(&grape, 1024, true).await;
        let joiner = PeerId::from_addr("127.0.0.1", 1999);
        state.locks.lock().request_lock(joiner.clone());

        let submit = tokio::spawn({
            let trading = trading.clone();
            async move { trading.submit_order(dec("100"), dec("1")).await }
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!submit.is_finished());
        assert_eq!(state.resting_count(), 0);

        state.locks.lock().release_lock(&joiner);
        let report = submit.await.unwrap().unwrap();
        assert_eq!(report.replies.len(), 1);
        assert_eq!(state.snapshot()[0].id, report.order_id);
    }
}
