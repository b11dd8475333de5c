//! Persistent responsibility ledger using RocksDB
//!
//! Stores:
//! - `responsible`: content key → (peer, updated_at)
//! - `owned`: peer ‖ content key → empty, for reverse lookups by prefix scan

use crate::common::{timestamp_now_millis, Number160, Result, ID_LEN};
use crate::storage::ResponsibilityLedger;
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, Direction, IteratorMode, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use std::path::Path;

const CF_RESPONSIBLE: &str = "responsible";
const CF_OWNED: &str = "owned";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResponsibilityEntry {
    peer: Number160,
    updated_at: u64,
}

pub struct RocksLedger {
    db: DB,
    stripes: Vec<Mutex<()>>,
}

impl RocksLedger {
    /// Open or create a ledger at `path`
    pub fn open(path: impl AsRef<Path>, stripes: usize) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open_cf(&opts, path.as_ref(), [CF_RESPONSIBLE, CF_OWNED])?;
        tracing::info!("Opened responsibility ledger at {:?}", path.as_ref());

        Ok(Self {
            db,
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
        })
    }

    /// Flush to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush_cf(self.cf(CF_RESPONSIBLE)?)?;
        self.db.flush_cf(self.cf(CF_OWNED)?)?;
        Ok(())
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or(crate::Error::MissingColumnFamily(name))
    }

    fn read_entry(&self, key: &Number160) -> Result<Option<ResponsibilityEntry>> {
        match self.db.get_cf(self.cf(CF_RESPONSIBLE)?, key.as_bytes())? {
            Some(bytes) => {
                let entry = bincode::deserialize(&bytes)
                    .map_err(|e| crate::Error::LedgerCorrupted(e.to_string()))?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    fn owned_key(peer: &Number160, key: &Number160) -> [u8; ID_LEN * 2] {
        let mut out = [0u8; ID_LEN * 2];
        out[..ID_LEN].copy_from_slice(peer.as_bytes());
        out[ID_LEN..].copy_from_slice(key.as_bytes());
        out
    }
}

impl ResponsibilityLedger for RocksLedger {
    fn update(&self, key: &Number160, peer: &Number160) -> Result<bool> {
        let _guard = self.stripes[key.stripe(self.stripes.len())].lock();

        let previous = self.read_entry(key)?;
        if previous.as_ref().map(|e| e.peer) == Some(*peer) {
            return Ok(false);
        }

        let entry = ResponsibilityEntry {
            peer: *peer,
            updated_at: timestamp_now_millis(),
        };
        let value = bincode::serialize(&entry)
            .map_err(|e| crate::Error::Internal(format!("Serialize error: {}", e)))?;

        let owned = self.cf(CF_OWNED)?;
        let mut batch = WriteBatch::default();
        if let Some(previous) = previous {
            batch.delete_cf(owned, Self::owned_key(&previous.peer, key));
        }
        batch.put_cf(self.cf(CF_RESPONSIBLE)?, key.as_bytes(), value);
        batch.put_cf(owned, Self::owned_key(peer, key), b"");
        self.db.write(batch)?;

        tracing::trace!(key = %key, peer = %peer, "responsibility persisted");
        Ok(true)
    }

    fn find_responsible_peer(&self, key: &Number160) -> Result<Option<Number160>> {
        Ok(self.read_entry(key)?.map(|entry| entry.peer))
    }

    fn find_responsible_data(&self, peer: &Number160) -> Result<Vec<Number160>> {
        let prefix: &[u8] = peer.as_bytes();
        let iter = self.db.iterator_cf(
            self.cf(CF_OWNED)?,
            IteratorMode::From(prefix, Direction::Forward),
        );

        let mut keys = Vec::new();
        for item in iter {
            let (owned_key, _) = item?;
            if !owned_key.starts_with(prefix) {
                break;
            }
            keys.push(Number160::from_slice(&owned_key[ID_LEN..]).map_err(|_| {
                crate::Error::LedgerCorrupted(format!("bad reverse index entry for {}", peer))
            })?);
        }

        Ok(keys)
    }
}
