//! Forwarding to an external application-monitoring sink.
//!
//! This module provides the [`MonitoringSink`] trait and default
//! implementations. Forwarding is best-effort: sink errors are logged by the
//! caller and never affect persistence.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SinkError;
use crate::types::{LogEntry, Severity};

/// Level attached to forwarded messages and breadcrumbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkLevel {
    /// Informational.
    Info,
    /// Warning.
    Warning,
    /// Error.
    Error,
    /// Fatal.
    Fatal,
}

impl From<Severity> for SinkLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Info => Self::Info,
            Severity::Warning => Self::Warning,
            Severity::Error => Self::Error,
            Severity::Critical => Self::Fatal,
        }
    }
}

/// Tags and extra data attached to a forwarded event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SinkContext {
    /// Indexed key-value tags.
    pub tags: BTreeMap<String, String>,
    /// Unindexed structured context.
    pub extra: BTreeMap<String, Value>,
}

impl SinkContext {
    /// Builds the context for an entry: category and title as tags;
    /// description, environment, steps and solution as extra data.
    #[must_use]
    pub fn for_entry(entry: &LogEntry) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert("category".to_string(), entry.category.as_str().to_string());
        tags.insert("title".to_string(), entry.title.clone());

        let mut extra = BTreeMap::new();
        extra.insert("entry_id".to_string(), Value::String(entry.id.to_string()));
        extra.insert(
            "description".to_string(),
            Value::String(entry.description.clone()),
        );
        extra.insert(
            "environment".to_string(),
            serde_json::to_value(&entry.environment).unwrap_or(Value::Null),
        );
        extra.insert(
            "steps_taken".to_string(),
            Value::from(entry.steps_taken.clone()),
        );
        if let Some(ref solution) = entry.solution {
            extra.insert("solution".to_string(), Value::String(solution.clone()));
        }
        Self { tags, extra }
    }
}

/// A low-noise context event kept by the sink for later reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// Breadcrumb category, usually the entry category.
    pub category: String,
    /// Human-readable message.
    pub message: String,
    /// Level.
    pub level: SinkLevel,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Additional data.
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
}

impl Breadcrumb {
    /// Builds a breadcrumb for an entry.
    #[must_use]
    pub fn for_entry(entry: &LogEntry) -> Self {
        let mut data = BTreeMap::new();
        data.insert("entry_id".to_string(), Value::String(entry.id.to_string()));
        data.insert(
            "description".to_string(),
            Value::String(entry.description.clone()),
        );
        if !entry.steps_taken.is_empty() {
            data.insert(
                "steps_taken".to_string(),
                Value::from(entry.steps_taken.clone()),
            );
        }
        Self {
            category: entry.category.as_str().to_string(),
            message: entry.title.clone(),
            level: entry.severity.into(),
            timestamp: entry.timestamp,
            data,
        }
    }
}

/// Trait for application-monitoring backends.
pub trait MonitoringSink: Send + Sync {
    /// Reports whether the sink is usable. Called once at initialization;
    /// a sink that fails the probe is never used.
    fn probe(&self) -> bool {
        true
    }

    /// Captures an error with its context.
    fn capture_exception(&self, error: &str, context: &SinkContext) -> Result<(), SinkError>;

    /// Captures a standalone message.
    fn capture_message(
        &self,
        message: &str,
        level: SinkLevel,
        context: &SinkContext,
    ) -> Result<(), SinkError>;

    /// Records a breadcrumb.
    fn add_breadcrumb(&self, breadcrumb: Breadcrumb) -> Result<(), SinkError>;
}

/// Sink that reports through `tracing` under the `devlog::sink` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    /// Creates a new tracing sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MonitoringSink for TracingSink {
    fn capture_exception(&self, error: &str, context: &SinkContext) -> Result<(), SinkError> {
        let category = context.tags.get("category").map_or("", String::as_str);
        let title = context.tags.get("title").map_or("", String::as_str);
        tracing::error!(target: "devlog::sink", %category, %title, error, "captured exception");
        Ok(())
    }

    fn capture_message(
        &self,
        message: &str,
        level: SinkLevel,
        context: &SinkContext,
    ) -> Result<(), SinkError> {
        let category = context.tags.get("category").map_or("", String::as_str);
        match level {
            SinkLevel::Info => tracing::info!(target: "devlog::sink", %category, "{message}"),
            SinkLevel::Warning => tracing::warn!(target: "devlog::sink", %category, "{message}"),
            SinkLevel::Error | SinkLevel::Fatal => {
                tracing::error!(target: "devlog::sink", %category, "{message}");
            }
        }
        Ok(())
    }

    fn add_breadcrumb(&self, breadcrumb: Breadcrumb) -> Result<(), SinkError> {
        tracing::debug!(
            target: "devlog::sink",
            category = %breadcrumb.category,
            level = ?breadcrumb.level,
            "breadcrumb: {}",
            breadcrumb.message
        );
        Ok(())
    }
}

/// A sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl MonitoringSink for NoopSink {
    fn capture_exception(&self, _error: &str, _context: &SinkContext) -> Result<(), SinkError> {
        Ok(())
    }

    fn capture_message(
        &self,
        _message: &str,
        _level: SinkLevel,
        _context: &SinkContext,
    ) -> Result<(), SinkError> {
        Ok(())
    }

    fn add_breadcrumb(&self, _breadcrumb: Breadcrumb) -> Result<(), SinkError> {
        Ok(())
    }
}

/// An event received by a [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    /// From `capture_exception`.
    Exception {
        /// Error text.
        error: String,
        /// Context.
        context: SinkContext,
    },
    /// From `capture_message`.
    Message {
        /// Message text.
        message: String,
        /// Level.
        level: SinkLevel,
        /// Context.
        context: SinkContext,
    },
    /// From `add_breadcrumb`.
    Breadcrumb(Breadcrumb),
}

/// Sink that records every event in memory.
#[derive(Debug)]
pub struct MemorySink {
    events: Mutex<Vec<SinkEvent>>,
    reachable: bool,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    /// Creates a reachable recording sink.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            reachable: true,
        }
    }

    /// Creates a sink whose probe fails and which rejects every event.
    #[must_use]
    pub const fn unreachable() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            reachable: false,
        }
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    fn record(&self, event: SinkEvent) -> Result<(), SinkError> {
        if !self.reachable {
            return Err(SinkError::Unavailable("memory sink is unreachable".to_string()));
        }
        self.events.lock().push(event);
        Ok(())
    }
}

impl MonitoringSink for MemorySink {
    fn probe(&self) -> bool {
        self.reachable
    }

    fn capture_exception(&self, error: &str, context: &SinkContext) -> Result<(), SinkError> {
        self.record(SinkEvent::Exception {
            error: error.to_string(),
            context: context.clone(),
        })
    }

    fn capture_message(
        &self,
        message: &str,
        level: SinkLevel,
        context: &SinkContext,
    ) -> Result<(), SinkError> {
        self.record(SinkEvent::Message {
            message: message.to_string(),
            level,
            context: context.clone(),
        })
    }

    fn add_breadcrumb(&self, breadcrumb: Breadcrumb) -> Result<(), SinkError> {
        self.record(SinkEvent::Breadcrumb(breadcrumb))
    }
}
