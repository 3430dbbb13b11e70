//! Peer messaging layer seen from one node.
//!
//! The transport itself (discovery, framing, retries) lives behind
//! [`PeerNetwork`]. The node answers inbound calls through
//! [`RequestHandler`]. `local::LocalGrape` is an in-process
//! implementation used by the simulator and the tests.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::command::{Request, Response, ServiceKey};

/// Identifier attached to every outbound call.
///
/// The `order:submit` handler uses it as the id of the order it creates.
pub type RequestId = Uuid;

/// Stable node identity, `"{ip}:{port}"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_addr(ip: &str, port: u16) -> Self {
        Self(format!("{ip}:{port}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors surfaced by the messaging layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// Nobody advertises the key. Callers decide whether that is fine.
    #[error("no peers reachable for {0}")]
    NoPeers(ServiceKey),

    #[error("request to {peer} timed out after {timeout:?}")]
    Timeout { peer: PeerId, timeout: Duration },

    #[error("transport error from {peer}: {reason}")]
    Transport { peer: PeerId, reason: String },

    #[error("lookup failed for {key}: {reason}")]
    Lookup { key: ServiceKey, reason: String },

    #[error("payload codec error: {0}")]
    Codec(String),
}

impl NetworkError {
    #[inline]
    pub fn is_no_peers(&self) -> bool {
        matches!(self, NetworkError::NoPeers(_))
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(e: serde_json::Error) -> Self {
        NetworkError::Codec(e.to_string())
    }
}

/// Per-peer outcome of a broadcast, in fan-out order.
pub type BroadcastReplies = Vec<(PeerId, Result<Response, NetworkError>)>;

/// Outbound side of the messaging layer for one node.
#[async_trait]
pub trait PeerNetwork: Send + Sync {
    /// Identity of the node this client belongs to
    fn local_id(&self) -> &PeerId;

    /// Call every peer advertising `request.key()`.
    ///
    /// Fails with [`NetworkError::NoPeers`] when nobody advertises it.
    async fn broadcast(
        &self,
        request_id: RequestId,
        request: Request,
        timeout: Duration,
    ) -> Result<BroadcastReplies, NetworkError>;

    /// Call one peer advertising `request.key()`.
    async fn request(
        &self,
        request_id: RequestId,
        request: Request,
        timeout: Duration,
    ) -> Result<Response, NetworkError>;

    /// Start answering calls on `key`.
    async fn advertise(&self, key: ServiceKey) -> Result<(), NetworkError>;

    /// Stop answering calls on `key`.
    async fn withdraw(&self, key: ServiceKey) -> Result<(), NetworkError>;

    /// Peers currently visible as advertisers of `key`.
    async fn discover(&self, key: ServiceKey, timeout: Duration) -> Result<Vec<PeerId>, NetworkError>;
}

/// Inbound side: how a node answers requests addressed to it.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request_id: RequestId, request: Request) -> Response;
}
