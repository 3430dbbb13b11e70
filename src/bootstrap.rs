//! Bootstrap Coordinator - brings a joining node into the network.
//!
//! ```text
//! STARTING -> LOCK_REQUESTED -> REGISTERING -> AWAITING_VISIBILITY
//!          -> SYNCING_BOOK -> LOCK_RELEASED -> TRADING
//! ```
//!
//! The pause request narrows the window in which the joining node could
//! miss an order or apply its snapshot over orders it already matched.
//! It does not close it: the pause is advisory and peers may already
//! have orders in flight when it lands.
//!
//! Any failure aborts the sequence and leaves the coordinator in
//! `FAILED`; an invisible node must never start trading.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::command::{Request, Response, ServiceKey};
use crate::config::NodeConfig;
use crate::network::{NetworkError, PeerId, PeerNetwork};
use crate::service::NodeState;

/// Bootstrap phases, in the order they are entered
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BootstrapState {
    Starting,
    LockRequested,
    Registering,
    AwaitingVisibility,
    SyncingBook,
    LockReleased,
    Trading,
    Failed,
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootstrapState::Starting => "STARTING",
            BootstrapState::LockRequested => "LOCK_REQUESTED",
            BootstrapState::Registering => "REGISTERING",
            BootstrapState::AwaitingVisibility => "AWAITING_VISIBILITY",
            BootstrapState::SyncingBook => "SYNCING_BOOK",
            BootstrapState::LockReleased => "LOCK_RELEASED",
            BootstrapState::Trading => "TRADING",
            BootstrapState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("pause request failed: {0}")]
    Pause(NetworkError),

    #[error("advertising {key} failed: {source}")]
    Advertise { key: ServiceKey, source: NetworkError },

    #[error("node {peer} not visible after {attempts} lookups")]
    NotVisible { peer: PeerId, attempts: u32 },

    #[error("book sync failed: {0}")]
    Sync(NetworkError),

    #[error("unexpected reply to {key}: {reply:?}")]
    UnexpectedReply { key: ServiceKey, reply: Response },

    #[error("pause release failed: {0}")]
    Release(NetworkError),
}

/// Drives one node through the join sequence.
pub struct BootstrapCoordinator {
    id: PeerId,
    network: Arc<dyn PeerNetwork>,
    state: Arc<NodeState>,
    request_timeout: Duration,
    visibility_interval: Duration,
    max_visibility_attempts: u32,
    phase: BootstrapState,
    history: Arc<Mutex<Vec<BootstrapState>>>,
}

impl BootstrapCoordinator {
    pub fn new(network: Arc<dyn PeerNetwork>, state: Arc<NodeState>, config: &NodeConfig) -> Self {
        Self::with_history(network, state, config, Arc::default())
    }

    /// Record phases into a shared log so others can watch the join live.
    ///
    /// The log is reset to `[Starting]`.
    pub fn with_history(
        network: Arc<dyn PeerNetwork>,
        state: Arc<NodeState>,
        config: &NodeConfig,
        history: Arc<Mutex<Vec<BootstrapState>>>,
    ) -> Self {
        *history.lock() = vec![BootstrapState::Starting];
        Self {
            id: network.local_id().clone(),
            network,
            state,
            request_timeout: config.request_timeout(),
            visibility_interval: config.visibility_interval(),
            max_visibility_attempts: config.bootstrap.max_visibility_attempts,
            phase: BootstrapState::Starting,
            history,
        }
    }

    /// Current phase
    pub fn state(&self) -> BootstrapState {
        self.phase
    }

    /// Every phase entered so far, starting with `Starting`
    pub fn history(&self) -> Vec<BootstrapState> {
        self.history.lock().clone()
    }

    /// Run the whole join sequence.
    ///
    /// Ends in `Trading` on success, `Failed` otherwise.
    pub async fn run(&mut self) -> Result<(), BootstrapError> {
        match self.run_steps().await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(node = %self.id, phase = %self.phase, error = %e, "Bootstrap failed");
                self.transition(BootstrapState::Failed);
                Err(e)
            }
        }
    }

    async fn run_steps(&mut self) -> Result<(), BootstrapError> {
        // Ask every reachable node to hold new orders while we sync
        self.transition(BootstrapState::LockRequested);
        self.broadcast_ack(Request::LockAcquire(self.id.clone()))
            .await
            .map_err(BootstrapError::Pause)?;

        // Become callable for orders and pause requests
        self.transition(BootstrapState::Registering);
        for key in ServiceKey::REGISTRATION {
            self.network
                .advertise(key)
                .await
                .map_err(|source| BootstrapError::Advertise { key, source })?;
        }

        // An invisible node would miss order broadcasts
        self.transition(BootstrapState::AwaitingVisibility);
        self.await_visibility().await?;

        self.transition(BootstrapState::SyncingBook);
        self.sync_book().await?;

        self.broadcast_ack(Request::LockRelease(self.id.clone()))
            .await
            .map_err(BootstrapError::Release)?;
        self.transition(BootstrapState::LockReleased);

        // Only a consistent book may be served to later joiners
        self.network
            .advertise(ServiceKey::BookSync)
            .await
            .map_err(|source| BootstrapError::Advertise {
                key: ServiceKey::BookSync,
                source,
            })?;
        self.transition(BootstrapState::Trading);

        Ok(())
    }

    fn transition(&mut self, next: BootstrapState) {
        info!(node = %self.id, from = %self.phase, to = %next, "Bootstrap transition");
        self.phase = next;
        self.history.lock().push(next);
    }

    /// Broadcast a lock request or release and require every reply to
    /// succeed. An empty network counts as success.
    async fn broadcast_ack(&self, request: Request) -> Result<(), NetworkError> {
        let key = request.key();
        let replies = match self
            .network
            .broadcast(Uuid::new_v4(), request, self.request_timeout)
            .await
        {
            Ok(replies) => replies,
            Err(NetworkError::NoPeers(_)) => {
                info!(node = %self.id, %key, "No peers reachable, nothing to coordinate");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let mut first_error = None;
        for (peer, reply) in replies {
            match reply {
                Ok(_) => debug!(node = %self.id, %peer, %key, "Acknowledged"),
                Err(e) => {
                    warn!(node = %self.id, %peer, %key, error = %e, "Peer call failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn await_visibility(&self) -> Result<(), BootstrapError> {
        for attempt in 1..=self.max_visibility_attempts {
            match self
                .network
                .discover(ServiceKey::OrderSubmit, self.request_timeout)
                .await
            {
                Ok(peers) if peers.contains(&self.id) => {
                    info!(node = %self.id, attempt, "Node visible on the network");
                    return Ok(());
                }
                Ok(peers) => {
                    debug!(node = %self.id, attempt, visible = peers.len(), "Not visible yet");
                }
                Err(e) => {
                    warn!(node = %self.id, attempt, error = %e, "Lookup failed");
                }
            }

            if attempt < self.max_visibility_attempts {
                tokio::time::sleep(self.visibility_interval).await;
            }
        }

        Err(BootstrapError::NotVisible {
            peer: self.id.clone(),
            attempts: self.max_visibility_attempts,
        })
    }

    async fn sync_book(&self) -> Result<(), BootstrapError> {
        let reply = match self
            .network
            .request(Uuid::new_v4(), Request::BookSync, self.request_timeout)
            .await
        {
            Ok(reply) => reply,
            Err(NetworkError::NoPeers(_)) => {
                info!(node = %self.id, "No peer serves the book, starting empty");
                return Ok(());
            }
            Err(e) => return Err(BootstrapError::Sync(e)),
        };

        match reply {
            Response::Book(orders) => {
                let mut engine = self.state.engine.lock();
                engine.initialize(orders);
                info!(node = %self.id, resting = engine.resting_count(), "Order book synced");
                Ok(())
            }
            reply => Err(BootstrapError::UnexpectedReply {
                key: ServiceKey::BookSync,
                reply,
            }),
        }
    }
}

impl fmt::Debug for BootstrapCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapCoordinator")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("history", &*self.history.lock())
            .finish()
    }
}
