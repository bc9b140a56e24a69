//! Two-tier persistence of log entries.
//!
//! Every mutation is written to the local cache (synchronously, under a
//! lock) and to the primary store (bounded by a timeout). Primary-store
//! failures are reported through `tracing` and in the returned
//! [`Persisted`] value; they never reach the caller as errors.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{LogError, Result, StoreError};
use crate::traits::{LocalCache, PrimaryStore, QueryFilter, Record, StoreFuture, Table, USER_ID_FIELD};
use crate::types::{EntryPatch, LogEntry};

/// Fields written to the primary store as JSON text.
pub const ENCODED_FIELDS: [&str; 2] = ["environment", "steps_taken"];

/// Fields that are decoded from JSON text when they arrive as strings.
const DECODABLE_FIELDS: [&str; 6] = [
    "environment",
    "steps_taken",
    "tags",
    "related_issues",
    "ci_cd_context",
    "test_context",
];

/// Which tiers accepted a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Persisted {
    /// The primary store accepted the write.
    pub primary: bool,
    /// The local cache accepted the write.
    pub fallback: bool,
}

impl Persisted {
    /// Returns true if at least one tier holds the data.
    #[must_use]
    pub const fn is_durable(&self) -> bool {
        self.primary || self.fallback
    }

    /// Returns true if only the local cache holds the data.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        !self.primary
    }
}

/// Encodes an entry as a primary-store record scoped to `user_id`.
///
/// # Errors
///
/// Returns an error if the entry cannot be serialized.
pub fn encode_entry(entry: &LogEntry, user_id: &str) -> Result<Record> {
    let Value::Object(mut record) = serde_json::to_value(entry)? else {
        return Err(LogError::PersistenceWrite {
            tier: "primary",
            reason: "entry did not serialize to an object".to_string(),
        });
    };
    for field in ENCODED_FIELDS {
        if let Some(value) = record.get_mut(field) {
            let text = serde_json::to_string(&*value)?;
            *value = Value::String(text);
        }
    }
    record.insert(USER_ID_FIELD.to_string(), Value::String(user_id.to_string()));
    Ok(record)
}

/// Decodes a primary-store record into an entry.
///
/// Structured fields may arrive either as JSON values or as JSON text.
///
/// # Errors
///
/// Returns an error if the record is not a valid entry.
pub fn decode_entry(mut record: Record) -> Result<LogEntry> {
    for field in DECODABLE_FIELDS {
        let decoded = match record.get(field) {
            Some(Value::String(text)) => Some(serde_json::from_str::<Value>(text)?),
            _ => None,
        };
        if let Some(decoded) = decoded {
            record.insert(field.to_string(), decoded);
        }
    }
    record.remove(USER_ID_FIELD);
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Coordinates writes and reads across the primary store and local cache.
pub struct PersistenceCoordinator {
    primary: Arc<dyn PrimaryStore>,
    cache: Arc<dyn LocalCache>,
    user_id: String,
    timeout: Duration,
    cache_lock: Mutex<()>,
}

impl PersistenceCoordinator {
    /// Creates a coordinator writing records scoped to `user_id`.
    #[must_use]
    pub fn new(
        primary: Arc<dyn PrimaryStore>,
        cache: Arc<dyn LocalCache>,
        user_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            cache,
            user_id: user_id.into(),
            timeout,
            cache_lock: Mutex::new(()),
        }
    }

    /// Returns the caller scope.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Writes a new entry to both tiers.
    pub async fn save(&self, entry: &LogEntry) -> Persisted {
        let fallback = self.upsert_cached(entry);

        let primary = match encode_entry(entry, &self.user_id) {
            Ok(record) => self.write_primary(Table::DebugLogs, record).await,
            Err(e) => {
                warn!(target: "devlog", id = %entry.id, error = %e, "could not encode entry");
                false
            }
        };

        Persisted { primary, fallback }
    }

    /// Applies `patch` to `entry.id` in both tiers.
    ///
    /// `entry` must already carry the patch; the cache stores it whole while
    /// the primary store receives only the changed fields.
    pub async fn update(&self, entry: &LogEntry, patch: &EntryPatch) -> Persisted {
        let fallback = self.upsert_cached(entry);

        let id = entry.id.to_string();
        let result = self
            .call(
                "update",
                self.primary.update(Table::DebugLogs, &id, patch.to_fields()),
            )
            .await;
        let primary = match result {
            Ok(()) => true,
            Err(e) => {
                warn!(target: "devlog", id = %entry.id, error = %e, "primary store update failed");
                false
            }
        };

        Persisted { primary, fallback }
    }

    /// Writes a typed record to a downstream table, scoped to the caller.
    pub async fn write_record(&self, table: Table, mut record: Record) -> bool {
        record.insert(USER_ID_FIELD.to_string(), Value::String(self.user_id.clone()));
        self.write_primary(table, record).await
    }

    /// Loads every known entry, oldest first.
    ///
    /// Entries from the primary store win over cached copies with the same
    /// id; cached entries missing from the primary store are kept.
    pub async fn load_all(&self) -> Vec<LogEntry> {
        let filter = QueryFilter::for_user(self.user_id.clone());
        let primary: Vec<LogEntry> = match self
            .call("query", self.primary.query(Table::DebugLogs, &filter))
            .await
        {
            Ok(records) => records
                .into_iter()
                .filter_map(|record| match decode_entry(record) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!(target: "devlog", error = %e, "skipping undecodable record");
                        None
                    }
                })
                .collect(),
            Err(e) => {
                warn!(target: "devlog", error = %e, "primary store read failed, using local cache");
                Vec::new()
            }
        };

        let cached = self.load_cached();
        let primary_count = primary.len();
        let seen: HashSet<_> = primary.iter().map(|e| e.id).collect();

        let mut entries = primary;
        entries.extend(cached.into_iter().filter(|e| !seen.contains(&e.id)));
        entries.sort_by_key(|e| e.timestamp);

        info!(
            target: "devlog",
            total = entries.len(),
            from_primary = primary_count,
            from_cache = entries.len() - primary_count,
            "loaded log history"
        );
        entries
    }

    /// Replaces the cached collection with `entries`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn flush(&self, entries: &[LogEntry]) -> Result<()> {
        let _guard = self.cache_lock.lock();
        self.cache.store(entries)
    }

    /// Removes cached entries created before `cutoff`, returning how many.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be read or written.
    pub fn prune_cache(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let _guard = self.cache_lock.lock();
        let mut entries = self.cache.load()?;
        let before = entries.len();
        entries.retain(|e| e.timestamp >= cutoff);
        let removed = before - entries.len();
        if removed > 0 {
            self.cache.store(&entries)?;
        }
        Ok(removed)
    }

    fn load_cached(&self) -> Vec<LogEntry> {
        let _guard = self.cache_lock.lock();
        self.cache.load().unwrap_or_else(|e| {
            warn!(target: "devlog", error = %e, "local cache unreadable, starting empty");
            Vec::new()
        })
    }

    fn upsert_cached(&self, entry: &LogEntry) -> bool {
        let _guard = self.cache_lock.lock();
        let mut entries = self.cache.load().unwrap_or_else(|e| {
            warn!(target: "devlog", error = %e, "local cache unreadable, rewriting");
            Vec::new()
        });
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry.clone(),
            None => entries.push(entry.clone()),
        }
        match self.cache.store(&entries) {
            Ok(()) => true,
            Err(e) => {
                warn!(target: "devlog", id = %entry.id, error = %e, "local cache write failed");
                false
            }
        }
    }

    async fn write_primary(&self, table: Table, record: Record) -> bool {
        match self.call("create", self.primary.create(table, record)).await {
            Ok(()) => {
                debug!(target: "devlog", table = %table, "primary store write ok");
                true
            }
            Err(e) => {
                warn!(target: "devlog", table = %table, error = %e, "primary store write failed");
                false
            }
        }
    }

    async fn call<T>(&self, op: &'static str, fut: StoreFuture<'_, T>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(store_failure(op, &e)),
            Err(_) => Err(LogError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

fn store_failure(op: &'static str, e: &StoreError) -> LogError {
    if op == "query" {
        LogError::PersistenceRead {
            tier: "primary",
            reason: e.to_string(),
        }
    } else {
        LogError::PersistenceWrite {
            tier: "primary",
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::store::MemoryStore;
    use crate::types::{Status, fixtures};
    use serde_json::json;

    fn coordinator(store: Arc<MemoryStore>, cache: Arc<MemoryCache>) -> PersistenceCoordinator {
        PersistenceCoordinator::new(store, cache, "alice", Duration::from_millis(200))
    }

    #[test]
    fn encode_writes_text_fields_and_scope() {
        let entry = fixtures::entry("Build failed", "missing lodash");
        let record = encode_entry(&entry, "alice").expect("encode");

        assert_eq!(record.get(USER_ID_FIELD), Some(&json!("alice")));
        assert!(record.get("environment").is_some_and(Value::is_string));
        assert!(record.get("steps_taken").is_some_and(Value::is_string));
        assert_eq!(record.get("category"), Some(&json!("build")));
    }

    #[test]
    fn decode_accepts_text_and_structured_fields() {
        let entry = fixtures::entry("Build failed", "missing lodash");
        let encoded = encode_entry(&entry, "alice").expect("encode");
        assert_eq!(decode_entry(encoded).expect("decode text"), entry);

        let structured = serde_json::to_value(&entry)
            .expect("to_value")
            .as_object()
            .cloned()
            .expect("entry is an object");
        assert_eq!(decode_entry(structured).expect("decode structured"), entry);
    }

    #[test]
    fn decode_rejects_garbage() {
        let mut record = Record::new();
        record.insert("environment".to_string(), json!("{broken"));
        assert!(decode_entry(record).is_err());
    }

    #[tokio::test]
    async fn save_writes_both_tiers() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let coordinator = coordinator(store.clone(), cache.clone());

        let entry = fixtures::entry("Build failed", "missing lodash");
        let persisted = coordinator.save(&entry).await;

        assert_eq!(persisted, Persisted { primary: true, fallback: true });
        assert_eq!(store.records(Table::DebugLogs).len(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn save_degrades_when_primary_is_down() {
        let store = Arc::new(MemoryStore::unavailable());
        let cache = Arc::new(MemoryCache::new());
        let coordinator = coordinator(store.clone(), cache.clone());

        let persisted = coordinator.save(&fixtures::entry("Timeout", "api")).await;
        assert!(persisted.is_degraded());
        assert!(persisted.is_durable());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn slow_primary_times_out() {
        let store = Arc::new(MemoryStore::new().with_latency(Duration::from_secs(5)));
        let cache = Arc::new(MemoryCache::new());
        let coordinator =
            PersistenceCoordinator::new(store, cache.clone(), "alice", Duration::from_millis(20));

        let persisted = coordinator.save(&fixtures::entry("Timeout", "api")).await;
        assert_eq!(persisted, Persisted { primary: false, fallback: true });
    }

    #[tokio::test]
    async fn update_patches_both_tiers() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let coordinator = coordinator(store.clone(), cache.clone());

        let mut entry = fixtures::entry("Build failed", "missing lodash");
        coordinator.save(&entry).await;

        let patch = EntryPatch::resolution("fixed config", None, Utc::now());
        entry.apply(&patch);
        let persisted = coordinator.update(&entry, &patch).await;
        assert_eq!(persisted, Persisted { primary: true, fallback: true });

        let records = store.records(Table::DebugLogs);
        assert_eq!(records[0].get("status"), Some(&json!("resolved")));
        let cached = cache.load().expect("load");
        assert_eq!(cached[0].status, Status::Resolved);
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test]
    async fn load_prefers_primary_and_keeps_cache_only_entries() {
        let store = Arc::new(MemoryStore::new());
        let shared = fixtures::entry("Shared", "in both tiers");
        let mut stale = shared.clone();
        stale.description = "stale cached copy".to_string();
        let cache_only = fixtures::entry("Offline", "written while primary was down");

        store.seed(Table::DebugLogs, encode_entry(&shared, "alice").expect("encode"));
        store.seed(
            Table::DebugLogs,
            encode_entry(&fixtures::entry("Other user", ""), "bob").expect("encode"),
        );
        let cache = Arc::new(MemoryCache::with_entries(vec![stale, cache_only.clone()]));

        let loaded = coordinator(store, cache).load_all().await;
        assert_eq!(loaded.len(), 2);
        let shared_loaded = loaded.iter().find(|e| e.id == shared.id).expect("shared");
        assert_eq!(shared_loaded.description, "in both tiers");
        assert!(loaded.iter().any(|e| e.id == cache_only.id));
    }

    #[tokio::test]
    async fn load_falls_back_to_cache() {
        let store = Arc::new(MemoryStore::unavailable());
        let entry = fixtures::entry("Offline", "cache only");
        let cache = Arc::new(MemoryCache::with_entries(vec![entry.clone()]));

        let loaded = coordinator(store.clone(), cache).load_all().await;
        assert_eq!(loaded, vec![entry]);
        assert_eq!(store.query_calls(), 1);
    }

    #[tokio::test]
    async fn write_record_adds_scope() {
        let store = Arc::new(MemoryStore::new());
        let coordinator = coordinator(store.clone(), Arc::new(MemoryCache::new()));

        let mut record = Record::new();
        record.insert("framework".to_string(), json!("cargo-test"));
        assert!(coordinator.write_record(Table::TestRuns, record).await);

        let records = store.records(Table::TestRuns);
        assert_eq!(records[0].get(USER_ID_FIELD), Some(&json!("alice")));
    }

    #[test]
    fn prune_cache_drops_old_entries() {
        let mut old = fixtures::entry("Old", "");
        old.timestamp = Utc::now() - chrono::Duration::days(45);
        let fresh = fixtures::entry("Fresh", "");
        let cache = Arc::new(MemoryCache::with_entries(vec![old, fresh.clone()]));
        let coordinator = coordinator(Arc::new(MemoryStore::new()), cache.clone());

        let removed = coordinator
            .prune_cache(Utc::now() - chrono::Duration::days(30))
            .expect("prune");
        assert_eq!(removed, 1);
        assert_eq!(cache.load().expect("load"), vec![fresh]);
    }
}
