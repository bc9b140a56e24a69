//! The debug logger facade.
//!
//! [`DebugLogger`] is the single entry point for recording events. Each log
//! call captures the environment, extracts keywords, correlates against the
//! buffered history, persists through the [`PersistenceCoordinator`],
//! forwards to the monitoring sink and appends to the in-memory buffer.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use devlog::{Category, DebugLogger, Event, LoggerConfig, MemoryStore};
//!
//! # async fn run() -> devlog::Result<()> {
//! let logger = DebugLogger::builder(Arc::new(MemoryStore::new()))
//!     .config(LoggerConfig::default())
//!     .build()?;
//!
//! logger
//!     .log_error(
//!         Event::new(Category::Build, "Build failed", "Missing dependency")
//!             .error_message("Cannot resolve module lodash"),
//!     )
//!     .await?;
//!
//! for issue in logger.unresolved_issues().await {
//!     println!("{} {}", issue.id, issue.title);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, info, warn};

use crate::cache::JsonFileCache;
use crate::config::{LoggerConfig, RETENTION_DAYS};
use crate::correlation::{Correlator, KeywordCorrelator};
use crate::environment::{EnvLookup, EnvironmentCollector, ProcessEnv};
use crate::error::Result;
use crate::keywords;
use crate::persistence::{PersistenceCoordinator, Persisted};
use crate::records::{
    PerformanceReport, PipelineEvent, PipelineRun, PipelineStatus, SecurityScanReport, TestReport,
};
use crate::sink::{Breadcrumb, MonitoringSink, SinkContext, SinkLevel};
use crate::traits::{Clock, LocalCache, PrimaryStore, Record, SystemClock, Table};
use crate::types::{
    Category, CiCdContext, EntryId, EntryPatch, LogEntry, Severity, Status, TestContext,
};

/// Caller-supplied content of a log call.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    category: Category,
    title: String,
    description: String,
    error_message: Option<String>,
    stack_trace: Option<String>,
    solution: Option<String>,
    steps_taken: Vec<String>,
    ci_cd_context: Option<CiCdContext>,
    test_context: Option<TestContext>,
}

impl Event {
    /// Creates an event with the required fields.
    #[must_use]
    pub fn new(category: Category, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            category,
            title: title.into(),
            description: description.into(),
            error_message: None,
            stack_trace: None,
            solution: None,
            steps_taken: Vec::new(),
            ci_cd_context: None,
            test_context: None,
        }
    }

    /// Sets the error message.
    #[must_use]
    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Sets the stack trace.
    #[must_use]
    pub fn stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }

    /// Sets a known solution.
    #[must_use]
    pub fn solution(mut self, solution: impl Into<String>) -> Self {
        self.solution = Some(solution.into());
        self
    }

    /// Sets the steps taken around the event.
    #[must_use]
    pub fn steps<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps_taken = steps.into_iter().map(Into::into).collect();
        self
    }

    fn with_ci_cd_context(mut self, context: Option<CiCdContext>) -> Self {
        self.ci_cd_context = context;
        self
    }

    fn with_test_context(mut self, context: TestContext) -> Self {
        self.test_context = Some(context);
        self
    }
}

/// Outcome of a log call.
#[derive(Debug, Clone, PartialEq)]
pub struct Logged {
    /// The recorded entry.
    pub entry: LogEntry,
    /// Which persistence tiers accepted it.
    pub persisted: Persisted,
    /// Whether the monitoring sink accepted it.
    pub forwarded: bool,
}

/// Outcome of a specialized emitter.
#[derive(Debug, Clone, PartialEq)]
pub struct Emitted {
    /// The summarizing log entry.
    pub logged: Logged,
    /// Whether the typed downstream record was written.
    pub record_written: bool,
}

/// Outcome of a lifecycle change.
#[derive(Debug, Clone, PartialEq)]
pub struct Updated {
    /// The entry after the change.
    pub entry: LogEntry,
    /// Which persistence tiers accepted the change.
    pub persisted: Persisted,
}

/// Number of entries removed by retention pruning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Removed from the in-memory buffer.
    pub from_buffer: usize,
    /// Removed from the local cache.
    pub from_cache: usize,
}

/// Aggregate counts over the buffered entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogStats {
    /// All entries.
    pub total: usize,
    /// Entries that are open or under investigation.
    pub unresolved: usize,
    /// Entries per severity.
    pub by_severity: BTreeMap<Severity, usize>,
    /// Entries per category.
    pub by_category: BTreeMap<Category, usize>,
    /// Entries per status.
    pub by_status: BTreeMap<Status, usize>,
}

impl LogStats {
    fn from_entries(entries: &[LogEntry]) -> Self {
        let mut stats = Self {
            total: entries.len(),
            ..Self::default()
        };
        for entry in entries {
            if entry.is_unresolved() {
                stats.unresolved += 1;
            }
            *stats.by_severity.entry(entry.severity).or_default() += 1;
            *stats.by_category.entry(entry.category).or_default() += 1;
            *stats.by_status.entry(entry.status).or_default() += 1;
        }
        stats
    }
}

#[derive(Debug)]
struct InitState {
    sink_usable: bool,
    ci_context: Option<CiCdContext>,
}

/// Builder for [`DebugLogger`].
pub struct DebugLoggerBuilder {
    primary: Arc<dyn PrimaryStore>,
    config: LoggerConfig,
    cache: Option<Arc<dyn LocalCache>>,
    sink: Option<Arc<dyn MonitoringSink>>,
    clock: Arc<dyn Clock>,
    env: Arc<dyn EnvLookup>,
    correlator: Arc<dyn Correlator>,
}

impl DebugLoggerBuilder {
    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the local cache. Defaults to a [`JsonFileCache`] under the
    /// configured cache directory.
    #[must_use]
    pub fn local_cache(mut self, cache: Arc<dyn LocalCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the monitoring sink.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn MonitoringSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sets the clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the environment variable source.
    #[must_use]
    pub fn env(mut self, env: Arc<dyn EnvLookup>) -> Self {
        self.env = env;
        self
    }

    /// Sets the correlation strategy.
    #[must_use]
    pub fn correlator(mut self, correlator: Arc<dyn Correlator>) -> Self {
        self.correlator = correlator;
        self
    }

    /// Builds the logger.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> Result<DebugLogger> {
        self.config.validate()?;

        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(JsonFileCache::new(
                &self.config.cache_dir,
                &self.config.cache_key,
            ))
        });
        let coordinator = PersistenceCoordinator::new(
            self.primary,
            cache,
            self.config.user_id.clone(),
            self.config.store_timeout(),
        );
        let collector = EnvironmentCollector::new(self.env, Arc::clone(&self.clock))
            .with_dependencies(&self.config.tracked_dependencies);
        let sink = self.sink.filter(|_| self.config.sink_enabled);

        Ok(DebugLogger {
            coordinator,
            collector,
            correlator: self.correlator,
            clock: self.clock,
            sink,
            entries: RwLock::new(Vec::new()),
            init: OnceCell::new(),
            mutation: Mutex::new(()),
        })
    }
}

/// Records, correlates and persists debug events.
///
/// Construct one per process with [`DebugLogger::builder`] and share it
/// behind an `Arc`. Every operation initializes the logger on first use.
pub struct DebugLogger {
    coordinator: PersistenceCoordinator,
    collector: EnvironmentCollector,
    correlator: Arc<dyn Correlator>,
    clock: Arc<dyn Clock>,
    sink: Option<Arc<dyn MonitoringSink>>,
    entries: RwLock<Vec<LogEntry>>,
    init: OnceCell<InitState>,
    mutation: Mutex<()>,
}

impl DebugLogger {
    /// Creates a builder writing to `primary`.
    #[must_use]
    pub fn builder(primary: Arc<dyn PrimaryStore>) -> DebugLoggerBuilder {
        DebugLoggerBuilder {
            primary,
            config: LoggerConfig::default(),
            cache: None,
            sink: None,
            clock: Arc::new(SystemClock),
            env: Arc::new(ProcessEnv),
            correlator: Arc::new(KeywordCorrelator::new()),
        }
    }

    /// Loads history, probes the sink and detects the CI context.
    ///
    /// Only the first call does any work; later and concurrent calls wait
    /// for it and return. Never fails: an unreachable primary store leaves
    /// the logger running on the local cache.
    pub async fn initialize(&self) {
        self.init_state().await;
    }

    /// Returns true once [`initialize`](Self::initialize) has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.init.initialized()
    }

    /// Returns the CI context detected at initialization.
    pub async fn ci_context(&self) -> Option<CiCdContext> {
        self.init_state().await.ci_context.clone()
    }

    async fn init_state(&self) -> &InitState {
        self.init
            .get_or_init(|| async {
                let loaded = self.coordinator.load_all().await;
                let count = loaded.len();
                {
                    let mut entries = self.entries.write();
                    let mut merged = loaded;
                    merged.append(&mut entries);
                    *entries = merged;
                }

                let sink_usable = self.sink.as_ref().is_some_and(|sink| sink.probe());
                if self.sink.is_some() && !sink_usable {
                    warn!(target: "devlog", "monitoring sink failed its probe, forwarding disabled");
                }

                let ci_context = self.collector.ci_context();
                info!(
                    target: "devlog",
                    user_id = %self.coordinator.user_id(),
                    entries = count,
                    sink = sink_usable,
                    ci = ci_context.is_some(),
                    "debug logger initialized"
                );

                InitState {
                    sink_usable,
                    ci_context,
                }
            })
            .await
    }

    /// Records an `error` entry. An error message, if present, is forwarded
    /// to the sink as a captured exception.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the title is blank.
    pub async fn log_error(&self, event: Event) -> Result<Logged> {
        self.record(Severity::Error, event).await
    }

    /// Records a `critical` entry, forwarded like [`log_error`](Self::log_error)
    /// or as a fatal message when there is no error message.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the title is blank.
    pub async fn log_critical(&self, event: Event) -> Result<Logged> {
        self.record(Severity::Critical, event).await
    }

    /// Records a `warning` entry, forwarded as a captured message.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the title is blank.
    pub async fn log_warning(&self, event: Event) -> Result<Logged> {
        self.record(Severity::Warning, event).await
    }

    /// Records an `info` entry, forwarded as a breadcrumb only.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the title is blank.
    pub async fn log_info(&self, event: Event) -> Result<Logged> {
        self.record(Severity::Info, event).await
    }

    /// Records a pipeline event. The `pipeline_runs` record is written only
    /// inside a CI context.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `event_type` is blank.
    pub async fn log_cicd_event(
        &self,
        event_type: impl Into<String>,
        status: PipelineStatus,
        details: impl Into<String>,
    ) -> Result<Emitted> {
        let event = PipelineEvent {
            event_type: event_type.into(),
            status,
            details: details.into(),
        };
        let ci = self.collector.ci_context();
        let logged = self
            .log_info(
                Event::new(Category::CiCd, event.title(), event.details.clone())
                    .steps(event.steps(ci.as_ref()))
                    .with_ci_cd_context(ci.clone()),
            )
            .await?;

        let record_written = match ci {
            Some(ref ci) => {
                let run = PipelineRun::new(&event, ci, logged.entry.id, self.clock.now());
                self.write_typed(Table::PipelineRuns, run.to_record()).await
            }
            None => {
                debug!(target: "devlog", "no CI context, skipping pipeline record");
                false
            }
        };

        Ok(Emitted {
            logged,
            record_written,
        })
    }

    /// Records a test run and writes its `test_runs` record.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the framework name is blank.
    pub async fn log_test_result(&self, report: TestReport) -> Result<Emitted> {
        let logged = self
            .log_info(
                Event::new(Category::Testing, report.title(), report.description())
                    .steps(report.steps())
                    .with_test_context(report.context()),
            )
            .await?;
        let record = report.to_record(logged.entry.id, self.clock.now());
        let record_written = self.write_typed(Table::TestRuns, record).await;
        Ok(Emitted {
            logged,
            record_written,
        })
    }

    /// Records a performance measurement and writes its
    /// `performance_metrics` record.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the metric type is blank.
    pub async fn log_performance_metric(&self, report: PerformanceReport) -> Result<Emitted> {
        let logged = self
            .log_info(
                Event::new(Category::Performance, report.title(), report.description())
                    .steps(report.steps()),
            )
            .await?;
        let record = report.to_record(logged.entry.id, self.clock.now());
        let record_written = self.write_typed(Table::PerformanceMetrics, record).await;
        Ok(Emitted {
            logged,
            record_written,
        })
    }

    /// Records a security scan and writes its `security_scans` record.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the scan type is blank.
    pub async fn log_security_scan(&self, report: SecurityScanReport) -> Result<Emitted> {
        let logged = self
            .log_info(
                Event::new(Category::Security, report.title(), report.description())
                    .steps(report.steps()),
            )
            .await?;
        let record = report.to_record(logged.entry.id, self.clock.now());
        let record_written = self.write_typed(Table::SecurityScans, record).await;
        Ok(Emitted {
            logged,
            record_written,
        })
    }

    /// Marks an entry resolved with a solution. Unknown ids are a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTransition`](crate::ValidationError::InvalidTransition)
    /// if the entry is closed.
    pub async fn resolve_issue(
        &self,
        id: EntryId,
        solution: impl Into<String>,
        prevention_notes: Option<String>,
    ) -> Result<Option<Updated>> {
        let patch = EntryPatch::resolution(solution, prevention_notes, self.clock.now());
        self.change(id, patch).await
    }

    /// Marks an open entry as under investigation. Unknown ids are a no-op.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the entry is not open.
    pub async fn mark_investigating(&self, id: EntryId) -> Result<Option<Updated>> {
        self.change(id, EntryPatch::status(Status::Investigating)).await
    }

    /// Closes a resolved entry. Unknown ids are a no-op.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the entry is not resolved.
    pub async fn close_issue(&self, id: EntryId) -> Result<Option<Updated>> {
        self.change(id, EntryPatch::status(Status::Closed)).await
    }

    /// Returns a snapshot of the buffer in append order.
    pub async fn entries(&self) -> Vec<LogEntry> {
        self.initialize().await;
        self.entries.read().clone()
    }

    /// Returns the entry with the given id.
    pub async fn get(&self, id: EntryId) -> Option<LogEntry> {
        self.initialize().await;
        self.entries.read().iter().find(|e| e.id == id).cloned()
    }

    /// Returns open and investigating entries, newest first.
    pub async fn unresolved_issues(&self) -> Vec<LogEntry> {
        let mut issues = self.filtered(LogEntry::is_unresolved).await;
        issues.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        issues
    }

    /// Returns the entries of one category.
    pub async fn issues_by_category(&self, category: Category) -> Vec<LogEntry> {
        self.filtered(|e| e.category == category).await
    }

    /// Returns the entries of one severity.
    pub async fn issues_by_severity(&self, severity: Severity) -> Vec<LogEntry> {
        self.filtered(|e| e.severity == severity).await
    }

    /// Returns buffered entries sharing vocabulary with the given text.
    pub async fn find_similar(&self, title: &str, description: &str) -> Vec<LogEntry> {
        self.initialize().await;
        let entries = self.entries.read();
        self.correlator
            .find_similar(title, description, &entries)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Returns aggregate counts over the buffer.
    pub async fn stats(&self) -> LogStats {
        self.initialize().await;
        LogStats::from_entries(&self.entries.read())
    }

    /// Renders the buffer as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub async fn export_json(&self) -> Result<String> {
        let entries = self.entries().await;
        Ok(serde_json::to_string_pretty(&entries)?)
    }

    /// Drops entries older than the retention window from the buffer and
    /// the local cache. The primary store is left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the local cache cannot be rewritten.
    pub async fn prune_expired(&self) -> Result<PruneReport> {
        self.initialize().await;
        let _guard = self.mutation.lock().await;

        let cutoff = self.clock.now() - ChronoDuration::days(RETENTION_DAYS);
        let from_buffer = {
            let mut entries = self.entries.write();
            let before = entries.len();
            entries.retain(|e| e.timestamp >= cutoff);
            before - entries.len()
        };
        let from_cache = self.coordinator.prune_cache(cutoff)?;

        info!(
            target: "devlog",
            %cutoff,
            from_buffer,
            from_cache,
            "pruned expired entries"
        );
        Ok(PruneReport {
            from_buffer,
            from_cache,
        })
    }

    /// Flushes the buffer to the local cache. Does nothing if the logger was
    /// never initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the local cache cannot be written.
    pub async fn shutdown(&self) -> Result<()> {
        if !self.is_initialized() {
            debug!(target: "devlog", "shutdown before initialization, nothing to flush");
            return Ok(());
        }
        let _guard = self.mutation.lock().await;
        // Held across the flush: appends wait, then upsert into the new cache.
        let count = {
            let entries = self.entries.read();
            self.coordinator.flush(&entries)?;
            entries.len()
        };
        info!(target: "devlog", entries = count, "flushed log buffer to local cache");
        Ok(())
    }

    async fn filtered(&self, keep: impl Fn(&LogEntry) -> bool) -> Vec<LogEntry> {
        self.initialize().await;
        self.entries
            .read()
            .iter()
            .filter(|e| keep(e))
            .cloned()
            .collect()
    }

    async fn record(&self, severity: Severity, event: Event) -> Result<Logged> {
        let init = self.init_state().await;
        let entry = self.build_entry(severity, event)?;

        // Buffered before the cache write so a concurrent flush keeps it.
        self.entries.write().push(entry.clone());
        let persisted = self.coordinator.save(&entry).await;
        let forwarded = init.sink_usable && self.forward(&entry);
        summarize(&entry, persisted);

        Ok(Logged {
            entry,
            persisted,
            forwarded,
        })
    }

    fn build_entry(&self, severity: Severity, event: Event) -> Result<LogEntry> {
        let tags = keywords::extract(&format!("{} {}", event.title, event.description));
        let related = {
            let entries = self.entries.read();
            self.correlator
                .find_related(&event.title, &event.description, &entries)
        };

        Ok(LogEntry::builder()
            .id(EntryId::generate())
            .timestamp(self.clock.now())
            .severity(severity)
            .category(event.category)
            .title(event.title)
            .description(event.description)
            .error_message(event.error_message)
            .stack_trace(event.stack_trace)
            .solution(event.solution)
            .steps_taken(event.steps_taken)
            .environment(self.collector.capture())
            .tags(tags)
            .related_issues(related)
            .ci_cd_context(event.ci_cd_context)
            .test_context(event.test_context)
            .build()?)
    }

    fn forward(&self, entry: &LogEntry) -> bool {
        let Some(ref sink) = self.sink else {
            return false;
        };
        let context = SinkContext::for_entry(entry);
        let result = match (entry.severity, entry.error_message.as_deref()) {
            (Severity::Info, _) => sink.add_breadcrumb(Breadcrumb::for_entry(entry)),
            (Severity::Warning, _) => {
                sink.capture_message(&entry.title, SinkLevel::Warning, &context)
            }
            (Severity::Error | Severity::Critical, Some(message)) => {
                sink.capture_exception(message, &context)
            }
            (Severity::Critical, None) => {
                sink.capture_message(&entry.title, SinkLevel::Fatal, &context)
            }
            (Severity::Error, None) => return false,
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(target: "devlog", id = %entry.id, error = %e, "monitoring sink rejected event");
                false
            }
        }
    }

    async fn change(&self, id: EntryId, patch: EntryPatch) -> Result<Option<Updated>> {
        self.initialize().await;
        let _guard = self.mutation.lock().await;

        let updated = {
            let mut entries = self.entries.write();
            let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
                debug!(target: "devlog", %id, "no such entry, ignoring status change");
                return Ok(None);
            };
            if let Some(next) = patch.status {
                entry.transition(next)?;
            }
            entry.apply(&patch);
            entry.clone()
        };

        let persisted = self.coordinator.update(&updated, &patch).await;
        info!(
            target: "devlog",
            %id,
            status = %updated.status,
            primary = persisted.primary,
            fallback = persisted.fallback,
            "entry status changed"
        );
        Ok(Some(Updated {
            entry: updated,
            persisted,
        }))
    }

    async fn write_typed(&self, table: Table, record: Result<Record>) -> bool {
        match record {
            Ok(record) => self.coordinator.write_record(table, record).await,
            Err(e) => {
                warn!(target: "devlog", %table, error = %e, "could not encode typed record");
                false
            }
        }
    }
}

fn summarize(entry: &LogEntry, persisted: Persisted) {
    let related = entry.related_issues.len();
    match entry.severity {
        Severity::Info => info!(
            target: "devlog",
            id = %entry.id,
            category = %entry.category,
            related,
            degraded = persisted.is_degraded(),
            "{}",
            entry.title
        ),
        Severity::Warning => warn!(
            target: "devlog",
            id = %entry.id,
            category = %entry.category,
            related,
            degraded = persisted.is_degraded(),
            "{}",
            entry.title
        ),
        Severity::Error | Severity::Critical => error!(
            target: "devlog",
            id = %entry.id,
            category = %entry.category,
            severity = %entry.severity,
            related,
            degraded = persisted.is_degraded(),
            "{}",
            entry.title
        ),
    }
}
