//! Replication responsibility coordinator
//!
//! Decides which overlay member is responsible for replicating each content
//! key, keeps the ledger in step with membership changes and tells observers
//! about every transition exactly once.
//!
//! The coordinator takes no locks around responsibility decisions. At most
//! one notification per transition follows from the ledger's per-key
//! compare-and-set: of several callers racing to record the same peer, only
//! one sees `update` return `true`, and only that caller notifies.

use crate::common::{Number160, Result};
use crate::peers::{MembershipView, PeerAddress, PeerMapChangeListener};
use crate::replication::ResponsibilityListener;
use crate::storage::ResponsibilityLedger;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::sync::{Arc, Weak};

/// Replication coordinator for one local peer.
///
/// Owns the observer list; the ledger and membership view are shared with
/// the rest of the node.
pub struct Replication {
    ledger: Arc<dyn ResponsibilityLedger>,
    self_address: Option<PeerAddress>,
    peer_map: Option<Arc<dyn MembershipView>>,
    listeners: RwLock<Vec<Arc<dyn ResponsibilityListener>>>,
}

impl Replication {
    /// Create a coordinator and register it with `peer_map` for its lifetime.
    ///
    /// Without both a self address and a peer map the coordinator is
    /// disabled and every responsibility operation does nothing.
    pub fn new(
        ledger: Arc<dyn ResponsibilityLedger>,
        self_address: Option<PeerAddress>,
        peer_map: Option<Arc<dyn MembershipView>>,
    ) -> Arc<Self> {
        let replication = Arc::new(Self {
            ledger,
            self_address,
            peer_map,
            listeners: RwLock::new(Vec::new()),
        });

        if let Some(peer_map) = &replication.peer_map {
            let weak: Weak<dyn PeerMapChangeListener> = Arc::downgrade(&replication) as _;
            peer_map.add_change_listener(weak);
        }

        match &replication.self_address {
            Some(me) if replication.is_replication_enabled() => {
                tracing::info!(node = %me, "replication enabled");
            }
            _ => tracing::info!("replication disabled"),
        }

        replication
    }

    pub fn is_replication_enabled(&self) -> bool {
        self.peer_map.is_some() && self.self_address.is_some()
    }

    pub fn ledger(&self) -> &Arc<dyn ResponsibilityLedger> {
        &self.ledger
    }

    pub fn add_listener(&self, listener: Arc<dyn ResponsibilityListener>) {
        self.listeners.write().push(listener);
    }

    /// Remove the first registration of `listener`. Returns whether one was found.
    pub fn remove_listener(&self, listener: &Arc<dyn ResponsibilityListener>) -> bool {
        let mut listeners = self.listeners.write();
        match listeners.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Bring the ledger entry for `key` in line with current membership.
    ///
    /// Called for every key touched by request handling. Notifies observers
    /// only if the recorded responsible peer actually changed.
    pub fn check_responsibility(&self, key: &Number160) -> Result<()> {
        let (me, peer_map) = match self.enabled() {
            Some(enabled) => enabled,
            None => return Ok(()),
        };

        let closest = closest(me, peer_map, key);
        if closest.id == me.id {
            if self.ledger.update(key, &me.id)? {
                tracing::debug!(key = %key, "became responsible");
                self.notify_me_responsible(key);
            }
        } else if self.ledger.update(key, &closest.id)? {
            tracing::debug!(key = %key, peer = %closest, "responsibility moved to peer");
            self.notify_other_responsible(key, &closest);
        }

        Ok(())
    }

    /// Record `candidate` for `key` if it is closer than the recorded peer.
    ///
    /// Fed by routing hints rather than membership events. Never records the
    /// local peer and never notifies observers.
    pub fn consider_candidate(&self, key: &Number160, candidate: &Number160) -> Result<()> {
        let (me, peer_map) = match self.enabled() {
            Some(enabled) => enabled,
            None => return Ok(()),
        };
        if *candidate == me.id {
            return Ok(());
        }

        let replace = match self.ledger.find_responsible_peer(key)? {
            None => true,
            Some(recorded) => peer_map.is_closer(key, candidate, &recorded) == Ordering::Less,
        };
        if replace && self.ledger.update(key, candidate)? {
            tracing::trace!(key = %key, candidate = %candidate, "closer candidate recorded");
        }

        Ok(())
    }

    fn enabled(&self) -> Option<(&PeerAddress, &dyn MembershipView)> {
        match (&self.self_address, &self.peer_map) {
            (Some(me), Some(peer_map)) => Some((me, peer_map.as_ref())),
            _ => None,
        }
    }

    fn snapshot_listeners(&self) -> Vec<Arc<dyn ResponsibilityListener>> {
        self.listeners.read().clone()
    }

    fn notify_me_responsible(&self, key: &Number160) {
        for listener in self.snapshot_listeners() {
            listener.me_responsible(key);
        }
    }

    fn notify_other_responsible(&self, key: &Number160, other: &PeerAddress) {
        for listener in self.snapshot_listeners() {
            listener.other_responsible(key, other);
        }
    }
}

/// The closer of the best known peer and the local peer. The local peer wins ties.
fn closest(me: &PeerAddress, peer_map: &dyn MembershipView, key: &Number160) -> PeerAddress {
    match peer_map.close_peers(key, 1).into_iter().next() {
        Some(candidate) if peer_map.is_closer(key, &candidate.id, &me.id) == Ordering::Less => {
            candidate
        }
        _ => me.clone(),
    }
}

impl PeerMapChangeListener for Replication {
    /// A new member can only take keys away from the local peer, so only the
    /// keys recorded against the local peer are re-evaluated.
    fn peer_inserted(&self, peer: &PeerAddress) -> Result<()> {
        let (me, peer_map) = match self.enabled() {
            Some(enabled) => enabled,
            None => return Ok(()),
        };

        let mine = self.ledger.find_responsible_data(&me.id)?;
        tracing::trace!(peer = %peer, keys = mine.len(), "re-evaluating own keys after join");
        for key in mine {
            let closest = closest(me, peer_map, &key);
            if closest.id != me.id && self.ledger.update(&key, &closest.id)? {
                tracing::debug!(key = %key, peer = %closest, "handing key over to joined peer");
                self.notify_other_responsible(&key, &closest);
            }
        }

        Ok(())
    }

    /// Only promotes the local peer. Every surviving member runs the same
    /// handler against its own ledger.
    fn peer_removed(&self, peer: &PeerAddress) -> Result<()> {
        let (me, peer_map) = match self.enabled() {
            Some(enabled) => enabled,
            None => return Ok(()),
        };

        let orphaned = self.ledger.find_responsible_data(&peer.id)?;
        tracing::trace!(peer = %peer, keys = orphaned.len(), "re-evaluating keys of departed peer");
        for key in orphaned {
            let closest = closest(me, peer_map, &key);
            if closest.id == me.id && self.ledger.update(&key, &me.id)? {
                tracing::debug!(key = %key, departed = %peer, "took over key from departed peer");
                self.notify_me_responsible(&key);
            }
        }

        Ok(())
    }

    /// Address changes do not move a peer in identifier space.
    fn peer_updated(&self, _peer: &PeerAddress) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peers::PeerMap;
    use crate::replication::EventRecorder;
    use crate::storage::MemoryLedger;

    fn peer(id: u64) -> PeerAddress {
        let addr = format!("127.0.0.1:{}", 4000 + id).parse().unwrap();
        PeerAddress::new(Number160::from_u64(id), addr)
    }

    #[test]
    fn test_closest_prefers_self_on_tie() {
        let me = peer(5);
        let peer_map = PeerMap::new(Number160::from_u64(999));
        // A stale entry carrying our own id
        peer_map.peer_found(peer(5)).unwrap();

        let chosen = closest(&me, &peer_map, &Number160::from_u64(5));
        assert_eq!(chosen, me);
    }

    #[test]
    fn test_closest_falls_back_to_self() {
        let me = peer(5);
        let peer_map = PeerMap::new(me.id);
        assert_eq!(closest(&me, &peer_map, &Number160::ZERO), me);

        peer_map.peer_found(peer(2)).unwrap();
        assert_eq!(closest(&me, &peer_map, &Number160::ZERO), peer(2));
        assert_eq!(closest(&me, &peer_map, &Number160::from_u64(7)), me);
    }

    #[test]
    fn test_registers_with_peer_map() {
        let peer_map = Arc::new(PeerMap::new(Number160::from_u64(5)));
        let replication = Replication::new(
            Arc::new(MemoryLedger::new()),
            Some(peer(5)),
            Some(peer_map.clone()),
        );
        assert_eq!(peer_map.listener_count(), 1);

        drop(replication);
        assert_eq!(peer_map.listener_count(), 0);
    }

    #[test]
    fn test_listener_removal_is_by_instance() {
        let replication = Replication::new(Arc::new(MemoryLedger::new()), None, None);
        let a: Arc<dyn ResponsibilityListener> = Arc::new(EventRecorder::new());
        let b: Arc<dyn ResponsibilityListener> = Arc::new(EventRecorder::new());

        replication.add_listener(a.clone());
        replication.add_listener(b.clone());
        replication.add_listener(a.clone());
        assert_eq!(replication.listener_count(), 3);

        assert!(replication.remove_listener(&a));
        assert_eq!(replication.listener_count(), 2);
        assert!(replication.remove_listener(&a));
        assert!(!replication.remove_listener(&a));
        assert!(replication.remove_listener(&b));
        assert_eq!(replication.listener_count(), 0);
    }
}
