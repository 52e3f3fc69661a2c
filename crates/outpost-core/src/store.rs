//! Durable queue storage using redb.
//!
//! This module provides ACID-compliant storage for:
//! - The outbox queue (pending mutations in strict insertion order)
//! - The id index (mutation id → queue sequence number)
//! - Scalar preferences (offline mode, last sync timestamp)
//!
//! ## Storage Design
//!
//! - **Primary table**: `outbox` - keyed by a monotonically increasing u64
//!   sequence number, so enumeration order is insertion order
//! - **Secondary index**: `outbox_id_index` - maps mutation id → sequence
//!   number for O(log n) delete-by-id
//! - **Meta table**: `meta` - scalar values keyed by name
//!
//! Once `insert` returns, the record has been committed and survives process
//! restart.

use crate::error::OutboxError;
use crate::types::{MutationId, PendingMutation};
use parking_lot::RwLock;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;
use std::sync::Arc;

// Table definitions
const OUTBOX_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("outbox");
const OUTBOX_ID_INDEX: TableDefinition<&str, u64> = TableDefinition::new("outbox_id_index");
const META_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

const OFFLINE_MODE_KEY: &str = "offline_mode_enabled";
const LAST_SYNC_AT_KEY: &str = "last_sync_at";

/// Crash-durable store of pending mutations
#[derive(Clone)]
pub struct QueueStore {
    db: Arc<RwLock<Database>>,
}

impl QueueStore {
    /// Open (or create) the store at the given path.
    ///
    /// This will:
    /// - Create the database directory if it doesn't exist
    /// - Initialize the database file
    /// - Create all required tables
    ///
    /// A failure here means local durability is unavailable; the engine
    /// cannot be constructed and the caller must surface that to the user.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OutboxError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;

        // Initialize all tables
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(OUTBOX_TABLE)?;
            let _ = write_txn.open_table(OUTBOX_ID_INDEX)?;
            let _ = write_txn.open_table(META_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queue Operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Persist a mutation at the tail of the queue.
    ///
    /// The sequence number is assigned inside the same write transaction as
    /// the record itself, so insertion order and enumeration order cannot
    /// diverge. Once this returns, the record is durable.
    pub fn insert(&self, mutation: &PendingMutation) -> Result<(), OutboxError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut outbox = write_txn.open_table(OUTBOX_TABLE)?;
            let mut index = write_txn.open_table(OUTBOX_ID_INDEX)?;

            let next_seq = outbox.last()?.map(|(k, _)| k.value() + 1).unwrap_or(0);
            let data = postcard::to_allocvec(mutation)
                .map_err(|e| OutboxError::Serialization(e.to_string()))?;
            let key = mutation.id.to_string_repr();

            outbox.insert(next_seq, data.as_slice())?;
            index.insert(key.as_str(), next_seq)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Load all pending mutations in insertion order.
    pub fn list_all(&self) -> Result<Vec<PendingMutation>, OutboxError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(OUTBOX_TABLE)?;

        let mut mutations = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let mutation: PendingMutation = postcard::from_bytes(value.value())
                .map_err(|e| OutboxError::Serialization(e.to_string()))?;
            mutations.push(mutation);
        }
        Ok(mutations)
    }

    /// Delete a mutation by id.
    ///
    /// Idempotent: deleting an id that is not present is not an error.
    pub fn delete_by_id(&self, id: &MutationId) -> Result<(), OutboxError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut outbox = write_txn.open_table(OUTBOX_TABLE)?;
            let mut index = write_txn.open_table(OUTBOX_ID_INDEX)?;

            let key = id.to_string_repr();
            let seq = index.remove(key.as_str())?.map(|v| v.value());
            if let Some(seq) = seq {
                outbox.remove(seq)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Number of pending mutations.
    ///
    /// Cheap aggregate; does not materialize records.
    pub fn count(&self) -> Result<u64, OutboxError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(OUTBOX_TABLE)?;
        Ok(table.len()?)
    }

    /// Increment the persisted attempt ordinal for a mutation.
    ///
    /// No-op for an id that is not present (the record may have been
    /// deleted by a concurrent pass).
    pub fn record_attempt(&self, id: &MutationId) -> Result<(), OutboxError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let index = write_txn.open_table(OUTBOX_ID_INDEX)?;
            let mut outbox = write_txn.open_table(OUTBOX_TABLE)?;

            let key = id.to_string_repr();
            let seq = index.get(key.as_str())?.map(|v| v.value());
            if let Some(seq) = seq {
                let data = outbox.get(seq)?.map(|v| v.value().to_vec());
                if let Some(data) = data {
                    let mut mutation: PendingMutation = postcard::from_bytes(&data)
                        .map_err(|e| OutboxError::Serialization(e.to_string()))?;
                    mutation.attempt += 1;
                    let updated = postcard::to_allocvec(&mutation)
                        .map_err(|e| OutboxError::Serialization(e.to_string()))?;
                    outbox.insert(seq, updated.as_slice())?;
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Enqueue timestamp of the oldest pending mutation, if any.
    ///
    /// Used for "oldest pending age" reporting.
    pub fn oldest_enqueued_at(&self) -> Result<Option<i64>, OutboxError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(OUTBOX_TABLE)?;

        let result = match table.first()? {
            Some((_, value)) => {
                let mutation: PendingMutation = postcard::from_bytes(value.value())
                    .map_err(|e| OutboxError::Serialization(e.to_string()))?;
                Ok(Some(mutation.enqueued_at))
            }
            None => Ok(None),
        };
        result
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Scalar Preferences
    // ═══════════════════════════════════════════════════════════════════════

    /// Persist the offline-mode preference.
    pub fn save_offline_mode(&self, enabled: bool) -> Result<(), OutboxError> {
        self.save_meta(OFFLINE_MODE_KEY, &enabled)
    }

    /// Load the offline-mode preference. Defaults to `false`.
    pub fn load_offline_mode(&self) -> Result<bool, OutboxError> {
        Ok(self.load_meta(OFFLINE_MODE_KEY)?.unwrap_or(false))
    }

    /// Persist the last successful sync timestamp.
    pub fn save_last_sync_at(&self, ts: i64) -> Result<(), OutboxError> {
        self.save_meta(LAST_SYNC_AT_KEY, &ts)
    }

    /// Load the last successful sync timestamp, if one has been recorded.
    pub fn load_last_sync_at(&self) -> Result<Option<i64>, OutboxError> {
        self.load_meta(LAST_SYNC_AT_KEY)
    }

    fn save_meta<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), OutboxError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(META_TABLE)?;
            let data = postcard::to_allocvec(value)
                .map_err(|e| OutboxError::Serialization(e.to_string()))?;
            table.insert(key, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn load_meta<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, OutboxError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(META_TABLE)?;

        match table.get(key)? {
            Some(v) => {
                let value: T = postcard::from_bytes(v.value())
                    .map_err(|e| OutboxError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}
