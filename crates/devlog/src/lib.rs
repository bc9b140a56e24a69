//! # devlog
//!
//! Structured debug event logging with keyword correlation and two-tier
//! persistence.
//!
//! This crate provides:
//!
//! - [`LogEntry`] — Structured diagnostic record with a closed taxonomy
//! - [`DebugLogger`] — Facade recording, correlating and persisting events
//! - [`Correlator`] — Pluggable strategy relating new events to history
//! - [`PersistenceCoordinator`] — Dual writes to a primary store and a local cache
//! - [`PrimaryStore`] / [`LocalCache`] — Storage seams, with in-memory and
//!   JSON-file implementations
//! - [`MonitoringSink`] — Best-effort forwarding to an application monitor
//! - [`LoggerConfig`] — TOML-loadable configuration
//!
//! ## Example
//!
//! ```rust
//! use devlog::{Category, EntryId, LogEntry, Severity};
//! use chrono::Utc;
//!
//! let entry = LogEntry::builder()
//!     .id(EntryId::generate())
//!     .timestamp(Utc::now())
//!     .severity(Severity::Error)
//!     .category(Category::Build)
//!     .title("Build failed")
//!     .environment(devlog::Environment {
//!         runtime_version: "rust 1.85".to_string(),
//!         dependencies: Default::default(),
//!         os: "linux".to_string(),
//!         captured_at: Utc::now(),
//!         ci_cd: None,
//!     })
//!     .build()
//!     .expect("valid entry");
//!
//! assert!(entry.tags.contains("build"));
//! assert!(entry.is_unresolved());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod correlation;
pub mod environment;
pub mod error;
pub mod keywords;
pub mod logger;
pub mod persistence;
pub mod records;
pub mod sink;
pub mod store;
pub mod traits;
pub mod types;

// Re-export main types
pub use cache::{JsonFileCache, MemoryCache, DEFAULT_CACHE_KEY};
pub use config::{LoggerConfig, RETENTION_DAYS};
pub use correlation::{Correlator, KeywordCorrelator};
pub use environment::{EnvLookup, EnvironmentCollector, ProcessEnv};
pub use error::{LogError, Result, SinkError, StoreError, ValidationError};
pub use logger::{DebugLogger, DebugLoggerBuilder, Emitted, Event, LogStats, Logged, PruneReport, Updated};
pub use persistence::{PersistenceCoordinator, Persisted};
pub use records::{
    PerformanceReport, PipelineStatus, ScanStatus, SecurityScanReport, TestReport, TestStatus,
    Vulnerability, VulnerabilitySeverity,
};
pub use sink::{MemorySink, MonitoringSink, NoopSink, SinkEvent, SinkLevel, TracingSink};
pub use store::{JsonDirStore, MemoryStore};
pub use traits::{Clock, LocalCache, ManualClock, PrimaryStore, QueryFilter, Record, SystemClock, Table};
pub use types::{
    Category, CiCdContext, EntryId, EntryPatch, Environment, LogEntry, LogEntryBuilder, Severity,
    Status, TestContext,
};
