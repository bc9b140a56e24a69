//! Seams between the logger and its collaborators.
//!
//! - [`PrimaryStore`] — durable, queryable store scoped by user id
//! - [`LocalCache`] — local blob holding the full entry collection
//! - [`Clock`] — source of the current time

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};
use crate::types::LogEntry;

/// A record as stored in the primary store: a JSON object.
pub type Record = Map<String, Value>;

/// Boxed future returned by [`PrimaryStore`] operations.
pub type StoreFuture<'a, T> =
    Pin<Box<dyn Future<Output = std::result::Result<T, StoreError>> + Send + 'a>>;

/// Name of the record field carrying the caller scope.
pub const USER_ID_FIELD: &str = "user_id";

/// Name of the record field carrying the record id.
pub const ID_FIELD: &str = "id";

/// Collections in the primary store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    /// General log entries.
    DebugLogs,
    /// Pipeline runs from the CI/CD emitter.
    PipelineRuns,
    /// Test runs from the test-result emitter.
    TestRuns,
    /// Samples from the performance emitter.
    PerformanceMetrics,
    /// Scans from the security emitter.
    SecurityScans,
}

impl Table {
    /// Every table.
    pub const ALL: [Self; 5] = [
        Self::DebugLogs,
        Self::PipelineRuns,
        Self::TestRuns,
        Self::PerformanceMetrics,
        Self::SecurityScans,
    ];

    /// Returns the table name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DebugLogs => "debug_logs",
            Self::PipelineRuns => "pipeline_runs",
            Self::TestRuns => "test_runs",
            Self::PerformanceMetrics => "performance_metrics",
            Self::SecurityScans => "security_scans",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter for primary store queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
    /// Only records whose `user_id` equals this value.
    pub user_id: String,
}

impl QueryFilter {
    /// Creates a filter scoped to one user.
    #[must_use]
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    /// Checks if a record matches the filter.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        record
            .get(USER_ID_FIELD)
            .and_then(Value::as_str)
            .is_some_and(|id| id == self.user_id)
    }
}

/// Durable, queryable store for records.
///
/// Every record carries a `user_id` field; queries are scoped by it.
pub trait PrimaryStore: Send + Sync {
    /// Inserts a new record.
    fn create<'a>(&'a self, table: Table, record: Record) -> StoreFuture<'a, ()>;

    /// Merges `fields` into the record with the given id.
    fn update<'a>(&'a self, table: Table, id: &'a str, fields: Record) -> StoreFuture<'a, ()>;

    /// Returns all records matching the filter, in insertion order.
    fn query<'a>(&'a self, table: Table, filter: &'a QueryFilter) -> StoreFuture<'a, Vec<Record>>;
}

/// Local key-value blob holding the full entry collection.
///
/// Reads and writes are synchronous and expected to be fast.
pub trait LocalCache: Send + Sync {
    /// Loads every cached entry. A missing blob yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob exists but cannot be read or decoded.
    fn load(&self) -> Result<Vec<LogEntry>>;

    /// Replaces the cached collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be written.
    fn store(&self, entries: &[LogEntry]) -> Result<()>;
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock fixed at `now`.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Sets the current time.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}
