//! # SnapshotStore — sled-backed deployment snapshots
//!
//! ## Tree Layout
//!
//! | Tree        | Key              | Value                      |
//! |-------------|------------------|----------------------------|
//! | `snapshots` | `state`          | `bincode(T)`               |
//! | `snapshots` | `sequence`       | commit counter (8B BE)     |
//! | `snapshots` | `format_version` | snapshot format (4B BE)    |
//!
//! All three keys live in the same tree so a commit is one atomic `Batch`:
//! either the new state and its sequence number land together or neither
//! does.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Batch, Db, Tree};
use std::path::Path;

use crate::config::SNAPSHOT_FORMAT_VERSION;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur while reading or writing snapshots.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("snapshot format {found} is not supported (expected {expected})")]
    FormatMismatch { found: u32, expected: u32 },

    #[error("corrupt metadata: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

const KEY_STATE: &[u8] = b"state";
const KEY_SEQUENCE: &[u8] = b"sequence";
const KEY_FORMAT: &[u8] = b"format_version";

/// A snapshot read back from disk together with its commit number.
#[derive(Debug, Clone)]
pub struct Committed<T> {
    /// Number of commits that produced this state. Starts at 1.
    pub sequence: u64,
    /// The decoded state.
    pub state: T,
}

// ---------------------------------------------------------------------------
// SnapshotStore
// ---------------------------------------------------------------------------

/// Persistent store holding the latest committed state of a deployment.
///
/// sled handles its own locking, so the store can be shared behind an
/// `Arc`. Callers are still expected to serialise commits: the sequence
/// number is read-modify-written.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    db: Db,
    snapshots: Tree,
}

impl SnapshotStore {
    /// Open or create a store at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary store that is removed when dropped.
    ///
    /// Meant for tests.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let snapshots = db.open_tree("snapshots")?;
        Ok(Self { db, snapshots })
    }

    /// Returns `true` if nothing has ever been committed.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(!self.snapshots.contains_key(KEY_STATE)?)
    }

    /// Number of commits so far, 0 for an empty store.
    pub fn sequence(&self) -> StoreResult<u64> {
        match self.snapshots.get(KEY_SEQUENCE)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| StoreError::Corrupt("invalid sequence bytes".to_string()))?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    /// Load the latest committed state, or `None` for an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::FormatMismatch`] if the snapshot was written by
    /// an incompatible format version.
    pub fn load<T: DeserializeOwned>(&self) -> StoreResult<Option<Committed<T>>> {
        let Some(bytes) = self.snapshots.get(KEY_STATE)? else {
            return Ok(None);
        };

        let format = match self.snapshots.get(KEY_FORMAT)? {
            Some(raw) => {
                let raw: [u8; 4] = raw
                    .as_ref()
                    .try_into()
                    .map_err(|_| StoreError::Corrupt("invalid format bytes".to_string()))?;
                u32::from_be_bytes(raw)
            }
            None => return Err(StoreError::Corrupt("missing format version".to_string())),
        };
        if format != SNAPSHOT_FORMAT_VERSION {
            return Err(StoreError::FormatMismatch {
                found: format,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }

        let state: T =
            bincode::deserialize(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let sequence = self.sequence()?;
        Ok(Some(Committed { sequence, state }))
    }

    /// Persist `state` as the new committed snapshot and return its
    /// sequence number.
    ///
    /// The state, the bumped sequence and the format version are written in
    /// one batch and flushed before returning.
    pub fn commit<T: Serialize>(&self, state: &T) -> StoreResult<u64> {
        let bytes =
            bincode::serialize(state).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let sequence = self.sequence()? + 1;

        let mut batch = Batch::default();
        batch.insert(KEY_STATE, bytes);
        batch.insert(KEY_SEQUENCE, sequence.to_be_bytes().to_vec());
        batch.insert(KEY_FORMAT, SNAPSHOT_FORMAT_VERSION.to_be_bytes().to_vec());
        self.snapshots.apply_batch(batch)?;

        self.db.flush()?;
        tracing::debug!(sequence, "snapshot committed");
        Ok(sequence)
    }

    /// Remove every committed snapshot. Used by `init --force`.
    pub fn clear(&self) -> StoreResult<()> {
        self.snapshots.clear()?;
        self.db.flush()?;
        Ok(())
    }
}
