//! Durable idempotency ledger.
//!
//! Maps (device, inode) to a completion record so an interrupted run
//! can resume without rewriting files it already finished. Backed by
//! RocksDB with bincode values. Workers write disjoint keys, so the
//! store's own internal locking is all the synchronization needed.

use rocksdb::{Options, DB};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::error::{Error, ProcessError, Result};

/// Marker stored once a file's rewrite and timestamp restore have both
/// succeeded. Never updated; only removed via wholesale `discard`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRecord {
    /// Unix seconds at commit time. Informational only.
    pub completed_at: u64,
}

impl CompletionRecord {
    fn now() -> Self {
        let completed_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        CompletionRecord { completed_at }
    }
}

/// Inode numbers repeat across filesystems, so the key is the device
/// id and the inode number together, both little-endian.
pub fn ledger_key(device: u64, inode: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&device.to_le_bytes());
    key[8..].copy_from_slice(&inode.to_le_bytes());
    key
}

/// The resume ledger. With `--noresume` the `Disabled` variant stands
/// in: every lookup misses and every commit is a no-op.
pub enum Ledger {
    Active { db: DB, path: PathBuf },
    Disabled,
}

impl Ledger {
    pub fn open(path: &Path, resume: bool) -> Result<Ledger> {
        if !resume {
            debug!("Resume ledger disabled");
            return Ok(Ledger::Disabled);
        }

        let mut db_options = Options::default();
        db_options.create_if_missing(true);
        let db = DB::open(&db_options, path).map_err(|source| Error::LedgerOpen {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Using '{}' for the resume ledger", path.display());

        Ok(Ledger::Active {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Ledger::Active { .. })
    }

    /// Look up the completion record for an inode. `file_path` is only
    /// used to attribute errors.
    pub fn get(
        &self,
        file_path: &Path,
        device: u64,
        inode: u64,
    ) -> std::result::Result<Option<CompletionRecord>, ProcessError> {
        let db = match self {
            Ledger::Active { db, .. } => db,
            Ledger::Disabled => return Ok(None),
        };

        match db.get(ledger_key(device, inode)) {
            Ok(Some(value)) => {
                let record: CompletionRecord = bincode::deserialize(&value)
                    .map_err(|e| ProcessError::ledger(file_path, e))?;
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(ProcessError::ledger(file_path, e)),
        }
    }

    /// Durably record that this inode is fully done. Called only after
    /// the rewrite and timestamp restore succeed.
    pub fn mark_handled(
        &self,
        file_path: &Path,
        device: u64,
        inode: u64,
    ) -> std::result::Result<(), ProcessError> {
        let db = match self {
            Ledger::Active { db, .. } => db,
            Ledger::Disabled => return Ok(()),
        };

        let value = bincode::serialize(&CompletionRecord::now())
            .map_err(|e| ProcessError::ledger(file_path, e))?;
        db.put(ledger_key(device, inode), value)
            .map_err(|e| ProcessError::ledger(file_path, e))
    }

    /// Permanently remove all ledger state. Only called when the run
    /// finished with no abort and no failure; otherwise the ledger is
    /// simply dropped (closed) and kept for the next invocation.
    pub fn discard(self) -> Result<()> {
        match self {
            Ledger::Active { db, path } => {
                drop(db);
                fs::remove_dir_all(&path)?;
                debug!("Removed resume ledger at '{}'", path.display());
                Ok(())
            }
            Ledger::Disabled => Ok(()),
        }
    }
}
