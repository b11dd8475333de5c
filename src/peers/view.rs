//! Capabilities the replication core consumes from the overlay

use crate::common::{Number160, Result};
use crate::peers::PeerAddress;
use std::cmp::Ordering;
use std::sync::Weak;

/// Orders identifiers by proximity to a key
pub trait DistanceOracle: Send + Sync {
    /// Up to `count` known peers, closest to `key` first
    fn close_peers(&self, key: &Number160, count: usize) -> Vec<PeerAddress>;

    /// `Less` if `a` is closer to `key` than `b`, `Greater` if farther
    fn is_closer(&self, key: &Number160, a: &Number160, b: &Number160) -> Ordering;
}

/// Receives membership changes from a [`MembershipView`]
pub trait PeerMapChangeListener: Send + Sync {
    fn peer_inserted(&self, peer: &PeerAddress) -> Result<()>;

    fn peer_removed(&self, peer: &PeerAddress) -> Result<()>;

    fn peer_updated(&self, peer: &PeerAddress) -> Result<()>;
}

/// The overlay's membership table, which also answers distance queries
pub trait MembershipView: DistanceOracle {
    /// Register a listener. The view keeps a weak reference; a listener is
    /// unregistered when its last strong reference is dropped.
    fn add_change_listener(&self, listener: Weak<dyn PeerMapChangeListener>);
}
