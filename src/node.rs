//! Node - one replica's lifecycle.
//!
//! Ties the shared state, the bootstrap coordinator and the trading loop
//! together: `start` joins the network, `shutdown` leaves it.

use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bootstrap::{BootstrapCoordinator, BootstrapError, BootstrapState};
use crate::command::ServiceKey;
use crate::config::NodeConfig;
use crate::network::{NetworkError, PeerId, PeerNetwork};
use crate::order::Order;
use crate::service::NodeState;
use crate::trading::{OrderGenerator, SubmitReport, TradingError, TradingLoop};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Trading(#[from] TradingError),

    #[error("node {0} is not trading")]
    NotTrading(PeerId),
}

/// A single replica wired to a peer network.
pub struct Node {
    id: PeerId,
    state: Arc<NodeState>,
    network: Arc<dyn PeerNetwork>,
    config: NodeConfig,
    trading: TradingLoop,
    history: Arc<Mutex<Vec<BootstrapState>>>,
    shutdown: watch::Sender<bool>,
    generator: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    pub fn new(id: PeerId, state: Arc<NodeState>, network: Arc<dyn PeerNetwork>, config: NodeConfig) -> Self {
        let trading = TradingLoop::new(network.clone(), state.clone(), &config);
        let (shutdown, _) = watch::channel(false);
        Self {
            id,
            state,
            network,
            config,
            trading,
            history: Arc::new(Mutex::new(vec![BootstrapState::Starting])),
            shutdown,
            generator: Mutex::new(None),
        }
    }

    #[inline]
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    #[inline]
    pub fn state(&self) -> &Arc<NodeState> {
        &self.state
    }

    /// Join the network, then start the order generator if enabled.
    pub async fn start(&self) -> Result<(), NodeError> {
        info!(node = %self.id, "Starting node");

        let mut coordinator = BootstrapCoordinator::with_history(
            self.network.clone(),
            self.state.clone(),
            &self.config,
            self.history.clone(),
        );
        coordinator.run().await?;

        if self.config.generator.enabled {
            self.spawn_order_generator(OrderGenerator::new(self.config.generator.clone()));
        }
        info!(node = %self.id, resting = self.state.resting_count(), "Node trading");
        Ok(())
    }

    /// Current bootstrap phase, updated while `start` is still running
    pub fn bootstrap_state(&self) -> BootstrapState {
        self.history.lock().last().copied().unwrap_or(BootstrapState::Starting)
    }

    /// Phases entered by the current or last `start`
    pub fn bootstrap_history(&self) -> Vec<BootstrapState> {
        self.history.lock().clone()
    }

    /// Run `generator` until shutdown. Replaces a running generator.
    pub fn spawn_order_generator(&self, generator: OrderGenerator) {
        let handle = self.trading.spawn_generator(generator, self.shutdown.subscribe());
        if let Some(previous) = self.generator.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Submit a locally originated order to every replica.
    pub async fn submit_order(&self, price: Decimal, amount: Decimal) -> Result<SubmitReport, NodeError> {
        if self.bootstrap_state() != BootstrapState::Trading {
            return Err(NodeError::NotTrading(self.id.clone()));
        }
        Ok(self.trading.submit_order(price, amount).await?)
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    pub fn resting_count(&self) -> usize {
        self.state.resting_count()
    }

    pub fn snapshot(&self) -> Vec<Order> {
        self.state.snapshot()
    }

    pub fn state_hash(&self) -> u64 {
        self.state.state_hash()
    }

    /// Withdraw every advertisement, stop the generator and wait out the
    /// grace period. Peer calls already in flight are left to time out.
    pub async fn shutdown(&self) -> Result<(), NodeError> {
        info!(node = %self.id, "Shutting down");

        let mut first_error = None;
        for key in ServiceKey::ALL {
            if let Err(e) = self.network.withdraw(key).await {
                warn!(node = %self.id, %key, error = %e, "Withdraw failed");
                first_error.get_or_insert(e);
            }
        }

        self.shutdown.send_replace(true);
        let generator = self.generator.lock().take();
        if let Some(handle) = generator {
            if let Err(e) = handle.await {
                warn!(node = %self.id, error = %e, "Order generator ended abnormally");
            }
        }

        tokio::time::sleep(self.config.shutdown_grace()).await;
        info!(node = %self.id, "Node stopped");

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("bootstrap_state", &self.bootstrap_state())
            .field("resting", &self.resting_count())
            .finish()
    }
}
