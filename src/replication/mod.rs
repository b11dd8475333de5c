//! Replication responsibility tracking
//!
//! The coordinator is responsible for:
//! - Deciding which peer replicates each content key (local peer vs. closest known member)
//! - Keeping the responsibility ledger in step with joins and departures
//! - Notifying observers exactly once per responsibility transition

pub mod coordinator;
pub mod listener;

pub use coordinator::Replication;
pub use listener::{
    ChannelListener, EventRecorder, LoggingListener, ResponsibilityEvent, ResponsibilityListener,
};
