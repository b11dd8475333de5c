//! In-memory responsibility ledger
//!
//! The forward map's entry guard is held for the whole compare-and-set. The
//! reverse index is only touched while that guard is held, and never locks
//! the forward map itself, so lock order is fixed: key shard, then owner shard.

use crate::common::{Number160, Result};
use crate::storage::ResponsibilityLedger;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeSet;

#[derive(Default)]
pub struct MemoryLedger {
    responsible: DashMap<Number160, Number160>,
    owned: DashMap<Number160, BTreeSet<Number160>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a recorded responsible peer
    pub fn len(&self) -> usize {
        self.responsible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responsible.is_empty()
    }

    fn unlink(&self, peer: &Number160, key: &Number160) {
        if let Entry::Occupied(mut keys) = self.owned.entry(*peer) {
            keys.get_mut().remove(key);
            if keys.get().is_empty() {
                keys.remove();
            }
        }
    }

    fn link(&self, peer: &Number160, key: &Number160) {
        self.owned.entry(*peer).or_default().insert(*key);
    }
}

impl ResponsibilityLedger for MemoryLedger {
    fn update(&self, key: &Number160, peer: &Number160) -> Result<bool> {
        match self.responsible.entry(*key) {
            Entry::Occupied(mut entry) => {
                if entry.get() == peer {
                    return Ok(false);
                }
                let previous = entry.insert(*peer);
                self.unlink(&previous, key);
                self.link(peer, key);
            }
            Entry::Vacant(entry) => {
                self.link(peer, key);
                entry.insert(*peer);
            }
        }

        tracing::trace!(key = %key, peer = %peer, "responsibility recorded");
        Ok(true)
    }

    fn find_responsible_peer(&self, key: &Number160) -> Result<Option<Number160>> {
        Ok(self.responsible.get(key).map(|peer| *peer))
    }

    fn find_responsible_data(&self, peer: &Number160) -> Result<Vec<Number160>> {
        Ok(self
            .owned
            .get(peer)
            .map(|keys| keys.iter().copied().collect())
            .unwrap_or_default())
    }
}
