//! Inbound request handling for one node.
//!
//! [`NodeState`] holds the node's book and lock set. Both are only
//! touched inside short synchronous sections, never across an await.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::command::{OrderRequest, Request, Response, SubmitReply};
use crate::lock::AdvisoryLockSet;
use crate::matching::{MatchingEngine, PlaceResult};
use crate::network::{PeerId, RequestHandler, RequestId};
use crate::order::Order;

/// Mutable state owned by one node instance
#[derive(Debug, Default)]
pub struct NodeState {
    pub engine: Mutex<MatchingEngine>,
    pub locks: Mutex<AdvisoryLockSet>,
}

impl NodeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.locks.lock().is_paused()
    }

    pub fn resting_count(&self) -> usize {
        self.engine.lock().resting_count()
    }

    pub fn snapshot(&self) -> Vec<Order> {
        self.engine.lock().snapshot()
    }

    pub fn state_hash(&self) -> u64 {
        self.engine.lock().state_hash()
    }

    /// Apply an order received from a peer; the request id becomes its id.
    pub fn apply_order(&self, request_id: RequestId, request: OrderRequest) -> PlaceResult {
        let order = Order::new(request_id, request.price, request.amount);
        self.engine.lock().place_order(order)
    }
}

/// Answers `lock:acquire`, `lock:release`, `book:sync` and `order:submit`.
#[derive(Debug, Clone)]
pub struct NodeService {
    id: PeerId,
    state: Arc<NodeState>,
}

impl NodeService {
    pub fn new(id: PeerId, state: Arc<NodeState>) -> Self {
        Self { id, state }
    }
}

#[async_trait]
impl RequestHandler for NodeService {
    async fn handle(&self, request_id: RequestId, request: Request) -> Response {
        match request {
            Request::LockAcquire(peer) => {
                self.state.locks.lock().request_lock(peer);
                Response::Ack
            }
            Request::LockRelease(peer) => {
                self.state.locks.lock().release_lock(&peer);
                Response::Ack
            }
            Request::BookSync => {
                let orders = self.state.snapshot();
                debug!(node = %self.id, orders = orders.len(), "Serving book snapshot");
                Response::Book(orders)
            }
            Request::OrderSubmit(order) => {
                debug!(
                    node = %self.id,
                    %request_id,
                    price = %order.price,
                    amount = %order.amount,
                    "Received new order"
                );
                let result = self.state.apply_order(request_id, order);
                Response::Order(SubmitReply {
                    accepted: true,
                    filled: result.filled,
                    resting_count: result.resting_count,
                })
            }
        }
    }
}
