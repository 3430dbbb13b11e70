//! Advisory Lock Set - peers currently asking the network to pause.
//!
//! A peer that is joining asks every node to hold back new orders while
//! it pulls a snapshot. The set only records who asked; it does not
//! grant exclusive access to anything, and entries never expire. A peer
//! that dies while holding its entry leaves the node paused.

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::network::PeerId;

/// Set of peer identifiers requesting a pause.
#[derive(Debug, Default, Clone)]
pub struct AdvisoryLockSet {
    holders: FxHashSet<PeerId>,
}

impl AdvisoryLockSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pause request. Repeating it is a no-op.
    pub fn request_lock(&mut self, peer: PeerId) {
        let inserted = self.holders.insert(peer.clone());
        debug!(%peer, inserted, holders = self.holders.len(), "Pause requested");
    }

    /// Drop a pause request. Releasing an unknown peer is a no-op.
    ///
    /// There is no ownership check: any caller may release any id.
    pub fn release_lock(&mut self, peer: &PeerId) {
        let removed = self.holders.remove(peer);
        debug!(%peer, removed, holders = self.holders.len(), "Pause released");
    }

    /// True while at least one peer holds a pause request.
    #[inline]
    pub fn is_paused(&self) -> bool {
        !self.holders.is_empty()
    }

    /// Peers currently holding a pause request.
    pub fn holders(&self) -> impl Iterator<Item = &PeerId> {
        self.holders.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(port: u16) -> PeerId {
        PeerId::from_addr("127.0.0.1", port)
    }

    #[test]
    fn test_empty_set_is_not_paused() {
        assert!(!AdvisoryLockSet::new().is_paused());
    }

    #[test]
    fn test_lock_then_release() {
        let mut locks = AdvisoryLockSet::new();

        locks.request_lock(peer(1024));
        assert!(locks.is_paused());

        locks.release_lock(&peer(1024));
        assert!(!locks.is_paused());
    }

    #[test]
    fn test_repeated_lock_is_idempotent() {
        let mut locks = AdvisoryLockSet::new();

        locks.request_lock(peer(1024));
        locks.request_lock(peer(1024));
        assert_eq!(locks.holders().count(), 1);

        locks.release_lock(&peer(1024));
        assert!(!locks.is_paused());

        locks.release_lock(&peer(1024));
        assert!(!locks.is_paused());
    }

    #[test]
    fn test_paused_until_every_holder_releases() {
        let mut locks = AdvisoryLockSet::new();

        locks.request_lock(peer(1024));
        locks.request_lock(peer(1025));
        locks.release_lock(&peer(1024));
        assert!(locks.is_paused());

        locks.release_lock(&peer(1025));
        assert!(!locks.is_paused());
    }

    #[test]
    fn test_release_unknown_peer() {
        let mut locks = AdvisoryLockSet::new();
        locks.request_lock(peer(1024));

        locks.release_lock(&peer(2000));
        assert!(locks.is_paused());
    }
}
