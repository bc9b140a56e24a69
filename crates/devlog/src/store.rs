//! Primary store implementations.
//!
//! This module provides:
//! - [`MemoryStore`] — In-process store with call counters and an
//!   availability switch, for tests and embedded use
//! - [`JsonDirStore`] — One JSON document per table under a directory

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::debug;

use crate::cache::write_atomic;
use crate::error::StoreError;
use crate::traits::{ID_FIELD, PrimaryStore, QueryFilter, Record, StoreFuture, Table};

fn record_id(record: &Record) -> Option<&str> {
    record.get(ID_FIELD).and_then(Value::as_str)
}

fn merge_into(records: &mut [Record], table: Table, id: &str, fields: Record) -> Result<(), StoreError> {
    let record = records
        .iter_mut()
        .find(|r| record_id(r) == Some(id))
        .ok_or_else(|| StoreError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        })?;
    record.extend(fields);
    Ok(())
}

/// In-memory primary store.
///
/// Counts calls per operation and can be switched offline to exercise
/// degraded-mode behaviour.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Table, Vec<Record>>>,
    available: AtomicBool,
    latency: Option<Duration>,
    creates: AtomicUsize,
    updates: AtomicUsize,
    queries: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty, available store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            latency: None,
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
        }
    }

    /// Creates a store that fails every call.
    #[must_use]
    pub fn unavailable() -> Self {
        let store = Self::new();
        store.set_available(false);
        store
    }

    /// Delays every call by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Switches the store on or off.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Number of `create` calls, including failed ones.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Number of `update` calls, including failed ones.
    #[must_use]
    pub fn update_calls(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Number of `query` calls, including failed ones.
    #[must_use]
    pub fn query_calls(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Returns a copy of every record in `table`.
    #[must_use]
    pub fn records(&self, table: Table) -> Vec<Record> {
        self.tables.read().get(&table).cloned().unwrap_or_default()
    }

    /// Inserts a record directly, bypassing availability and counters.
    pub fn seed(&self, table: Table, record: Record) {
        self.tables.write().entry(table).or_default().push(record);
    }

    async fn enter(&self) -> Result<(), StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        }
    }
}

impl PrimaryStore for MemoryStore {
    fn create<'a>(&'a self, table: Table, record: Record) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.enter().await?;
            self.tables.write().entry(table).or_default().push(record);
            Ok(())
        })
    }

    fn update<'a>(&'a self, table: Table, id: &'a str, fields: Record) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.updates.fetch_add(1, Ordering::SeqCst);
            self.enter().await?;
            let mut tables = self.tables.write();
            let records = tables.entry(table).or_default();
            merge_into(records, table, id, fields)
        })
    }

    fn query<'a>(&'a self, table: Table, filter: &'a QueryFilter) -> StoreFuture<'a, Vec<Record>> {
        Box::pin(async move {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.enter().await?;
            let tables = self.tables.read();
            Ok(tables
                .get(&table)
                .map(|records| records.iter().filter(|r| filter.matches(r)).cloned().collect())
                .unwrap_or_default())
        })
    }
}

/// File-backed primary store.
///
/// Each table is a JSON array in `<dir>/<table>.json`, rewritten atomically
/// on every change.
#[derive(Debug)]
pub struct JsonDirStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonDirStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table_path(&self, table: Table) -> PathBuf {
        self.dir.join(format!("{}.json", table.as_str()))
    }

    fn read_table(&self, table: Table) -> Result<Vec<Record>, StoreError> {
        let path = self.table_path(table);
        match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_table(&self, table: Table, records: &[Record]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(records)?;
        write_atomic(&self.table_path(table), &json)?;
        debug!(target: "devlog", table = %table, count = records.len(), "wrote table");
        Ok(())
    }
}

impl PrimaryStore for JsonDirStore {
    fn create<'a>(&'a self, table: Table, record: Record) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let _guard = self.write_lock.lock();
            let mut records = self.read_table(table)?;
            records.push(record);
            self.write_table(table, &records)
        })
    }

    fn update<'a>(&'a self, table: Table, id: &'a str, fields: Record) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let _guard = self.write_lock.lock();
            let mut records = self.read_table(table)?;
            merge_into(&mut records, table, id, fields)?;
            self.write_table(table, &records)
        })
    }

    fn query<'a>(&'a self, table: Table, filter: &'a QueryFilter) -> StoreFuture<'a, Vec<Record>> {
        Box::pin(async move {
            let records = self.read_table(table)?;
            Ok(records.into_iter().filter(|r| filter.matches(r)).collect())
        })
    }
}
