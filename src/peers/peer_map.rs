//! In-process membership table with XOR-distance ordering
//!
//! Tracks every overlay member the local peer knows about (never itself) and
//! tells registered listeners when members join, leave or refresh their
//! address. Listener callbacks run after the table lock is released, so a
//! listener may query the map from inside its callback.

use crate::common::{distance_cmp, Number160, Result};
use crate::peers::{DistanceOracle, MembershipView, PeerAddress, PeerMapChangeListener};
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// The `count` peers closest to `key`, closest first
pub fn close_peers_in<'a, I>(key: &Number160, count: usize, peers: I) -> Vec<PeerAddress>
where
    I: IntoIterator<Item = &'a PeerAddress>,
{
    let mut sorted: Vec<PeerAddress> = peers.into_iter().cloned().collect();
    sorted.sort_by(|a, b| distance_cmp(key, &a.id, &b.id));
    sorted.truncate(count);
    sorted
}

#[derive(Clone, Copy)]
enum Change {
    Inserted,
    Updated,
}

/// Thread-safe membership table for one local peer
pub struct PeerMap {
    self_id: Number160,
    peers: RwLock<HashMap<Number160, PeerAddress>>,
    listeners: Mutex<Vec<Weak<dyn PeerMapChangeListener>>>,
}

impl PeerMap {
    pub fn new(self_id: Number160) -> Self {
        Self {
            self_id,
            peers: RwLock::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn self_id(&self) -> &Number160 {
        &self.self_id
    }

    /// Record that `peer` is online.
    ///
    /// Returns `true` if the peer was not known before. A known peer is
    /// refreshed in place and reported as updated.
    pub fn peer_found(&self, peer: PeerAddress) -> Result<bool> {
        if peer.id == self.self_id {
            return Ok(false);
        }

        let change = {
            let mut peers = self.peers.write();
            match peers.insert(peer.id, peer.clone()) {
                None => Change::Inserted,
                Some(_) => Change::Updated,
            }
        };

        self.notify_all(|listener| match change {
            Change::Inserted => listener.peer_inserted(&peer),
            Change::Updated => listener.peer_updated(&peer),
        })?;

        Ok(matches!(change, Change::Inserted))
    }

    /// Record that the peer with `id` went offline.
    pub fn peer_failed(&self, id: &Number160) -> Result<Option<PeerAddress>> {
        let removed = self.peers.write().remove(id);

        if let Some(peer) = &removed {
            tracing::trace!(peer = %peer, "peer removed from map");
            self.notify_all(|listener| listener.peer_removed(peer))?;
        }

        Ok(removed)
    }

    pub fn contains(&self, id: &Number160) -> bool {
        self.peers.read().contains_key(id)
    }

    pub fn get(&self, id: &Number160) -> Option<PeerAddress> {
        self.peers.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    /// Snapshot of every known peer
    pub fn all(&self) -> Vec<PeerAddress> {
        self.peers.read().values().cloned().collect()
    }

    pub fn listener_count(&self) -> usize {
        self.live_listeners().len()
    }

    /// Deliver one change to every live listener.
    ///
    /// The change is already committed to the table, so a failing listener
    /// must not keep the others from hearing about it. The first error is
    /// returned once everyone has been told.
    fn notify_all<F>(&self, mut deliver: F) -> Result<()>
    where
        F: FnMut(&dyn PeerMapChangeListener) -> Result<()>,
    {
        let mut first_error = None;
        for listener in self.live_listeners() {
            if let Err(e) = deliver(listener.as_ref()) {
                tracing::warn!(error = %e, "membership listener failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Upgrade registered listeners, pruning the ones that were dropped
    fn live_listeners(&self) -> Vec<Arc<dyn PeerMapChangeListener>> {
        let mut listeners = self.listeners.lock();
        let mut live = Vec::with_capacity(listeners.len());
        listeners.retain(|weak| match weak.upgrade() {
            Some(listener) => {
                live.push(listener);
                true
            }
            None => false,
        });
        live
    }
}

impl DistanceOracle for PeerMap {
    fn close_peers(&self, key: &Number160, count: usize) -> Vec<PeerAddress> {
        let peers = self.peers.read();
        if count == 1 {
            // Hot path for responsibility checks
            return peers
                .values()
                .min_by(|a, b| distance_cmp(key, &a.id, &b.id))
                .cloned()
                .into_iter()
                .collect();
        }
        close_peers_in(key, count, peers.values())
    }

    fn is_closer(&self, key: &Number160, a: &Number160, b: &Number160) -> Ordering {
        distance_cmp(key, a, b)
    }
}

impl MembershipView for PeerMap {
    fn add_change_listener(&self, listener: Weak<dyn PeerMapChangeListener>) {
        self.listeners.lock().push(listener);
    }
}
