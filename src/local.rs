//! In-process peer network.
//!
//! [`LocalGrape`] is a shared registry standing in for the discovery DHT:
//! nodes advertise service keys on it, look each other up, and call each
//! other's handlers directly. Payloads are JSON-encoded on the way in and
//! out so the wire contract is exercised exactly as a real transport
//! would.
//!
//! A few knobs reproduce network conditions: a discovery delay for fresh
//! advertisements, peers that never become visible, failing lookups,
//! refused or stalled calls, and abrupt disconnects.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::command::{Request, Response, ServiceKey};
use crate::config::NodeConfig;
use crate::network::{BroadcastReplies, NetworkError, PeerId, PeerNetwork, RequestHandler, RequestId};
use crate::node::Node;
use crate::service::{NodeService, NodeState};

/// How calls to a faulty peer misbehave
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Calls fail immediately with a transport error
    Refuse,
    /// Calls never complete; the caller's timeout fires
    Stall,
}

struct Advert {
    key: ServiceKey,
    peer: PeerId,
    /// Discovery rounds left before this advertisement is visible
    hidden_for: u32,
}

#[derive(Default)]
struct Registry {
    handlers: FxHashMap<PeerId, Arc<dyn RequestHandler>>,
    adverts: Vec<Advert>,
    visibility_delay: u32,
    concealed: FxHashSet<PeerId>,
    faults: FxHashMap<PeerId, Fault>,
    failing_lookups: u32,
}

struct Target {
    peer: PeerId,
    handler: Option<Arc<dyn RequestHandler>>,
    fault: Option<Fault>,
}

impl Registry {
    fn is_visible(&self, advert: &Advert) -> bool {
        advert.hidden_for == 0 && !self.concealed.contains(&advert.peer)
    }

    fn targets(&self, key: ServiceKey) -> Vec<Target> {
        self.adverts
            .iter()
            .filter(|a| a.key == key && self.is_visible(a))
            .map(|a| Target {
                peer: a.peer.clone(),
                handler: self.handlers.get(&a.peer).cloned(),
                fault: self.faults.get(&a.peer).copied(),
            })
            .collect()
    }
}

/// Shared in-process registry. Cloning yields another handle to the same
/// network.
#[derive(Clone, Default)]
pub struct LocalGrape {
    inner: Arc<Mutex<Registry>>,
}

impl LocalGrape {
    pub fn new() -> Self {
        Self::default()
    }

    /// New advertisements stay invisible for `rounds` discovery calls,
    /// whatever key those calls look up.
    pub fn with_visibility_delay(rounds: u32) -> Self {
        let grape = Self::default();
        grape.inner.lock().visibility_delay = rounds;
        grape
    }

    /// Attach a node's handler and get the client it calls peers with.
    pub fn connect(&self, id: PeerId, handler: Arc<dyn RequestHandler>) -> LocalLink {
        self.inner.lock().handlers.insert(id.clone(), handler);
        debug!(peer = %id, "Peer connected");
        LocalLink {
            grape: self.clone(),
            id,
        }
    }

    /// Build a node wired to this network.
    pub fn join(&self, id: PeerId, config: NodeConfig) -> Node {
        let state = Arc::new(NodeState::new());
        let service = Arc::new(NodeService::new(id.clone(), state.clone()));
        let link = self.connect(id.clone(), service);
        Node::new(id, state, Arc::new(link), config)
    }

    /// Drop a peer without letting it withdraw anything (simulated crash).
    pub fn disconnect(&self, id: &PeerId) {
        let mut registry = self.inner.lock();
        registry.handlers.remove(id);
        registry.adverts.retain(|a| &a.peer != id);
        debug!(peer = %id, "Peer disconnected");
    }

    /// Keep a peer's advertisements out of discovery forever.
    pub fn conceal(&self, id: &PeerId) {
        self.inner.lock().concealed.insert(id.clone());
    }

    /// Make calls to `id` misbehave, or clear its fault with `None`.
    pub fn set_fault(&self, id: &PeerId, fault: Option<Fault>) {
        let mut registry = self.inner.lock();
        match fault {
            Some(fault) => registry.faults.insert(id.clone(), fault),
            None => registry.faults.remove(id),
        };
    }

    /// Fail the next `count` discovery calls with a lookup error.
    pub fn fail_lookups(&self, count: u32) {
        self.inner.lock().failing_lookups = count;
    }

    /// Peers currently visible for `key`, without consuming a discovery
    /// round.
    pub fn advertisers(&self, key: ServiceKey) -> Vec<PeerId> {
        self.inner.lock().targets(key).into_iter().map(|t| t.peer).collect()
    }

    fn advertise(&self, id: &PeerId, key: ServiceKey) {
        let mut registry = self.inner.lock();
        if registry.adverts.iter().any(|a| a.key == key && &a.peer == id) {
            return;
        }
        let hidden_for = registry.visibility_delay;
        registry.adverts.push(Advert {
            key,
            peer: id.clone(),
            hidden_for,
        });
        debug!(peer = %id, %key, hidden_for, "Advertising");
    }

    fn withdraw(&self, id: &PeerId, key: ServiceKey) {
        self.inner.lock().adverts.retain(|a| !(a.key == key && &a.peer == id));
        debug!(peer = %id, %key, "Withdrawn");
    }

    fn discover(&self, key: ServiceKey) -> Result<Vec<PeerId>, NetworkError> {
        let mut registry = self.inner.lock();
        if registry.failing_lookups > 0 {
            registry.failing_lookups -= 1;
            return Err(NetworkError::Lookup {
                key,
                reason: "lookup failed".into(),
            });
        }

        let visible: Vec<PeerId> = registry.targets(key).into_iter().map(|t| t.peer).collect();
        // Every lookup is one propagation round for the whole registry
        for advert in registry.adverts.iter_mut() {
            advert.hidden_for = advert.hidden_for.saturating_sub(1);
        }
        Ok(visible)
    }

    fn targets(&self, key: ServiceKey) -> Vec<Target> {
        self.inner.lock().targets(key)
    }
}

/// One node's client on a [`LocalGrape`].
#[derive(Clone)]
pub struct LocalLink {
    grape: LocalGrape,
    id: PeerId,
}

async fn deliver(
    target: Target,
    request_id: RequestId,
    payload: Arc<Vec<u8>>,
    timeout: Duration,
) -> Result<Response, NetworkError> {
    let Target { peer, handler, fault } = target;

    let handler = match (handler, fault) {
        (Some(handler), None | Some(Fault::Stall)) => handler,
        _ => {
            return Err(NetworkError::Transport {
                peer,
                reason: "connection refused".into(),
            })
        }
    };

    let call = async {
        if fault == Some(Fault::Stall) {
            std::future::pending::<()>().await;
        }
        let request: Request = serde_json::from_slice(&payload)?;
        let response = handler.handle(request_id, request).await;
        let bytes = serde_json::to_vec(&response)?;
        Ok::<Response, NetworkError>(serde_json::from_slice(&bytes)?)
    };

    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(NetworkError::Timeout { peer, timeout }),
    }
}

#[async_trait]
impl PeerNetwork for LocalLink {
    fn local_id(&self) -> &PeerId {
        &self.id
    }

    async fn broadcast(
        &self,
        request_id: RequestId,
        request: Request,
        timeout: Duration,
    ) -> Result<BroadcastReplies, NetworkError> {
        let key = request.key();
        let targets = self.grape.targets(key);
        if targets.is_empty() {
            return Err(NetworkError::NoPeers(key));
        }
        trace!(from = %self.id, %key, peers = targets.len(), "Broadcasting");

        let payload = Arc::new(serde_json::to_vec(&request)?);
        let calls = targets.into_iter().map(|target| {
            let payload = payload.clone();
            async move {
                let peer = target.peer.clone();
                (peer, deliver(target, request_id, payload, timeout).await)
            }
        });
        Ok(join_all(calls).await)
    }

    async fn request(
        &self,
        request_id: RequestId,
        request: Request,
        timeout: Duration,
    ) -> Result<Response, NetworkError> {
        let key = request.key();
        let mut targets = self.grape.targets(key);
        if targets.is_empty() {
            return Err(NetworkError::NoPeers(key));
        }
        targets.shuffle(&mut rand::thread_rng());
        let target = targets.swap_remove(0);
        trace!(from = %self.id, to = %target.peer, %key, "Requesting");

        let payload = Arc::new(serde_json::to_vec(&request)?);
        deliver(target, request_id, payload, timeout).await
    }

    async fn advertise(&self, key: ServiceKey) -> Result<(), NetworkError> {
        self.grape.advertise(&self.id, key);
        Ok(())
    }

    async fn withdraw(&self, key: ServiceKey) -> Result<(), NetworkError> {
        self.grape.withdraw(&self.id, key);
        Ok(())
    }

    async fn discover(&self, key: ServiceKey, _timeout: Duration) -> Result<Vec<PeerId>, NetworkError> {
        self.grape.discover(key)
    }
}
