//! Request and response types for the peer protocol.
//!
//! Requests are what peers send to a node's advertised services.
//! Responses are what the node answers.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::network::PeerId;
use crate::order::Order;

/// Service keys a node advertises and answers on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceKey {
    #[serde(rename = "lock:acquire")]
    LockAcquire,
    #[serde(rename = "lock:release")]
    LockRelease,
    #[serde(rename = "book:sync")]
    BookSync,
    #[serde(rename = "order:submit")]
    OrderSubmit,
}

impl ServiceKey {
    /// Keys advertised as soon as a node starts registering.
    pub const REGISTRATION: [ServiceKey; 3] = [
        ServiceKey::OrderSubmit,
        ServiceKey::LockAcquire,
        ServiceKey::LockRelease,
    ];

    /// Every key, in the order they are withdrawn at shutdown.
    pub const ALL: [ServiceKey; 4] = [
        ServiceKey::BookSync,
        ServiceKey::OrderSubmit,
        ServiceKey::LockAcquire,
        ServiceKey::LockRelease,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ServiceKey::LockAcquire => "lock:acquire",
            ServiceKey::LockRelease => "lock:release",
            ServiceKey::BookSync => "book:sync",
            ServiceKey::OrderSubmit => "order:submit",
        }
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Payload of an `order:submit` request.
///
/// Carries no id: the receiving node uses the request id as the order id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub price: Decimal,
    /// Signed quantity: `> 0` buys, `< 0` sells
    pub amount: Decimal,
}

/// Inbound requests, tagged by service key on the wire
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "key", content = "payload")]
pub enum Request {
    /// Ask the node to pause order submission on behalf of a peer
    #[serde(rename = "lock:acquire")]
    LockAcquire(PeerId),
    /// Withdraw a pause request
    #[serde(rename = "lock:release")]
    LockRelease(PeerId),
    /// Ask for the full book
    #[serde(rename = "book:sync")]
    BookSync,
    /// Apply a new order
    #[serde(rename = "order:submit")]
    OrderSubmit(OrderRequest),
}

impl Request {
    /// Service key this request is addressed to
    pub fn key(&self) -> ServiceKey {
        match self {
            Request::LockAcquire(_) => ServiceKey::LockAcquire,
            Request::LockRelease(_) => ServiceKey::LockRelease,
            Request::BookSync => ServiceKey::BookSync,
            Request::OrderSubmit(_) => ServiceKey::OrderSubmit,
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Reply to an `order:submit` request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReply {
    pub accepted: bool,
    /// At least one resting order was matched
    pub filled: bool,
    /// Resting orders on the replying node after applying the order
    pub resting_count: usize,
}

/// Responses sent back to the requesting peer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Response {
    /// Lock request or release acknowledged
    Ack,
    /// Full book snapshot: bids then asks
    Book(Vec<Order>),
    /// Order applied
    Order(SubmitReply),
}
