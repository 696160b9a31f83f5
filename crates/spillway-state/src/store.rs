//! GroupStore — redb-backed persistence for scaling-group bookkeeping.
//!
//! One record per group, JSON-serialized into a single `&str → &[u8]`
//! table. Every mutation is one read-modify-write transaction, so a record
//! is always internally consistent on disk. Supports both on-disk and
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::types::{CooldownStamp, GroupRecord};

/// group name → JSON-serialized [`GroupRecord`]
const GROUPS: TableDefinition<&str, &[u8]> = TableDefinition::new("groups");

/// Closure that stringifies a backend error into the given `StateError` variant.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe group store backed by redb.
#[derive(Clone)]
pub struct GroupStore {
    db: Arc<Database>,
}

impl GroupStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "group store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory group store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(GROUPS).map_err(map_err!(Storage))?;
        txn.commit().map_err(map_err!(Storage))?;
        Ok(())
    }

    /// Read a group's record, defaulting to empty for unknown groups.
    pub fn load(&self, group: &str) -> StateResult<GroupRecord> {
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let table = txn.open_table(GROUPS).map_err(map_err!(Storage))?;
        match table.get(group).map_err(map_err!(Storage))? {
            Some(guard) => serde_json::from_slice(guard.value()).map_err(map_err!(Codec)),
            None => Ok(GroupRecord::default()),
        }
    }

    /// Read-modify-write a group's record in one transaction.
    fn update<T>(&self, group: &str, f: impl FnOnce(&mut GroupRecord) -> T) -> StateResult<T> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        let result;
        {
            let mut table = txn.open_table(GROUPS).map_err(map_err!(Storage))?;
            let mut record = match table.get(group).map_err(map_err!(Storage))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Codec))?
                }
                None => GroupRecord::default(),
            };
            result = f(&mut record);
            let value = serde_json::to_vec(&record).map_err(map_err!(Codec))?;
            table
                .insert(group, value.as_slice())
                .map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Storage))?;
        Ok(result)
    }

    // ── Overflow instances ─────────────────────────────────────────

    /// Append an overflow-region instance id at the tail.
    pub fn push_overflow_instance(&self, group: &str, id: &str) -> StateResult<()> {
        self.update(group, |record| {
            record.overflow_instances.push(id.to_string());
        })?;
        debug!(%group, %id, "overflow instance recorded");
        Ok(())
    }

    /// Remove and return the most recently added overflow instance id.
    pub fn pop_overflow_instance(&self, group: &str) -> StateResult<Option<String>> {
        let popped = self.update(group, |record| record.overflow_instances.pop())?;
        if let Some(id) = &popped {
            debug!(%group, %id, "overflow instance dropped from record");
        }
        Ok(popped)
    }

    pub fn overflow_instances(&self, group: &str) -> StateResult<Vec<String>> {
        Ok(self.load(group)?.overflow_instances)
    }

    pub fn overflow_count(&self, group: &str) -> StateResult<usize> {
        Ok(self.load(group)?.overflow_instances.len())
    }

    // ── Pool members ───────────────────────────────────────────────

    /// Record the pool member created for an instance address.
    pub fn insert_pool_member(
        &self,
        group: &str,
        address: &str,
        member_id: &str,
    ) -> StateResult<()> {
        self.update(group, |record| {
            record
                .pool_members
                .insert(address.to_string(), member_id.to_string());
        })?;
        debug!(%group, %address, %member_id, "pool member recorded");
        Ok(())
    }

    /// Drop the mapping for an address, returning the member id if one was
    /// recorded.
    pub fn remove_pool_member(&self, group: &str, address: &str) -> StateResult<Option<String>> {
        self.update(group, |record| record.pool_members.remove(address))
    }

    pub fn pool_members(
        &self,
        group: &str,
    ) -> StateResult<std::collections::BTreeMap<String, String>> {
        Ok(self.load(group)?.pool_members)
    }

    // ── Cooldown ───────────────────────────────────────────────────

    pub fn last_adjustment(&self, group: &str) -> StateResult<Option<CooldownStamp>> {
        Ok(self.load(group)?.last_adjustment)
    }

    pub fn stamp_adjustment(&self, group: &str, stamp: CooldownStamp) -> StateResult<()> {
        self.update(group, |record| {
            record.last_adjustment = Some(stamp);
        })
    }

    // ── Teardown ───────────────────────────────────────────────────

    /// Delete a group's record outright. Returns true if it existed.
    pub fn clear(&self, group: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        let existed;
        {
            let mut table = txn.open_table(GROUPS).map_err(map_err!(Storage))?;
            existed = table.remove(group).map_err(map_err!(Storage))?.is_some();
        }
        txn.commit().map_err(map_err!(Storage))?;
        debug!(%group, existed, "group record cleared");
        Ok(existed)
    }
}
