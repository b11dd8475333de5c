//! Responsibility ledger: content key → peer currently responsible for it
//!
//! Both backends make [`ResponsibilityLedger::update`] an atomic
//! compare-and-set per key: the memory backend inside a sharded map's entry
//! guard, the RocksDB backend under a striped lock. Updates to different keys
//! proceed in parallel.

pub mod memory;
pub mod rocks;

pub use memory::MemoryLedger;
pub use rocks::RocksLedger;

use crate::common::{LedgerBackend, LedgerConfig, Number160, Result};
use std::sync::Arc;

/// Durable mapping from content key to the responsible peer's id
pub trait ResponsibilityLedger: Send + Sync {
    /// Record `peer` as responsible for `key`.
    ///
    /// Returns `true` iff the recorded value changed, `false` if it already
    /// was `peer`. Linearizable per key.
    fn update(&self, key: &Number160, peer: &Number160) -> Result<bool>;

    /// The peer recorded for `key`, if any
    fn find_responsible_peer(&self, key: &Number160) -> Result<Option<Number160>>;

    /// Every key currently recorded against `peer`
    fn find_responsible_data(&self, peer: &Number160) -> Result<Vec<Number160>>;
}

/// Open the ledger selected by `config`
pub fn open_ledger(config: &LedgerConfig) -> Result<Arc<dyn ResponsibilityLedger>> {
    config.validate()?;
    Ok(match config.backend {
        LedgerBackend::Memory => Arc::new(MemoryLedger::new()),
        LedgerBackend::RocksDb => Arc::new(RocksLedger::open(&config.path, config.stripes)?),
    })
}
