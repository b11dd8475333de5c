//! Overlay membership
//!
//! The replication core only consumes the traits in [`view`]. [`PeerMap`] is
//! the in-process membership table used by the simulator and tests.

pub mod address;
pub mod peer_map;
pub mod view;

pub use address::PeerAddress;
pub use peer_map::{close_peers_in, PeerMap};
pub use view::{DistanceOracle, MembershipView, PeerMapChangeListener};
