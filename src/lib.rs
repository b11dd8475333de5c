//! # minidht
//!
//! Replication responsibility tracking for a Kademlia-style overlay DHT:
//! - 160-bit identifier space shared by peers and content keys (XOR distance)
//! - Responsibility ledger with per-key compare-and-set (memory or RocksDB)
//! - A coordinator that reacts to membership changes and notifies observers
//!   exactly once per responsibility transition
//!
//! ## Architecture
//!
//! ```text
//!   request handling ──check_responsibility──┐
//!   routing hints ─────consider_candidate────┤
//!                                            ▼
//! ┌──────────────┐  joined/left   ┌─────────────────────┐  me/other    ┌────────────┐
//! │   PeerMap    │ ─────────────▶ │     Replication     │ ───────────▶ │ Observers  │
//! │ (membership, │ ◀───────────── │    (coordinator)    │  responsible │ (transfer) │
//! │  distances)  │  close_peers   └──────────┬──────────┘              └────────────┘
//! └──────────────┘                           │ update (CAS) / reverse lookup
//!                                            ▼
//!                                 ┌─────────────────────┐
//!                                 │ ResponsibilityLedger│
//!                                 └─────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Simulate churn over 32 peers and check every ledger converges
//! minidht simulate --peers 32 --keys 1000 --rounds 64
//!
//! # Print the identifier of a content key
//! minidht key-id my-content
//! ```

pub mod common;
pub mod peers;
pub mod replication;
pub mod sim;
pub mod storage;

// Re-export commonly used types
pub use common::{Config, Error, Number160, Result};
pub use peers::{PeerAddress, PeerMap};
pub use replication::{Replication, ResponsibilityListener};
pub use storage::ResponsibilityLedger;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
