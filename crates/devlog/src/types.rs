//! Core types for the debug event log.
//!
//! This module provides:
//! - [`EntryId`] — Opaque unique identifier for entries
//! - [`Severity`], [`Category`], [`Status`] — Closed taxonomies
//! - [`Environment`] and [`CiCdContext`] — Snapshot captured at creation
//! - [`LogEntry`] — The unit of record, built through [`LogEntryBuilder`]
//! - [`EntryPatch`] — Partial update applied on lifecycle changes

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Unique identifier for a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub Uuid);

impl EntryId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Severity of a logged event, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational context.
    Info,
    /// Something unexpected that did not fail.
    Warning,
    /// A failure.
    Error,
    /// A failure that needs immediate attention.
    Critical,
}

impl Severity {
    /// All severities, least severe first.
    pub const ALL: [Self; 4] = [Self::Info, Self::Warning, Self::Error, Self::Critical];

    /// Returns the wire name of this severity.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|sev| sev.as_str() == s.trim())
            .ok_or_else(|| ValidationError::UnknownSeverity(s.to_string()))
    }
}

/// Subsystem an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Compilation and bundling.
    Build,
    /// Runtime faults.
    Runtime,
    /// Remote API calls.
    Api,
    /// Database access.
    Database,
    /// Package and dependency resolution.
    Dependency,
    /// Performance measurements.
    Performance,
    /// Security scanning and findings.
    Security,
    /// Pipeline runs.
    CiCd,
    /// Test runs.
    Testing,
}

impl Category {
    /// Every category in the taxonomy.
    pub const ALL: [Self; 9] = [
        Self::Build,
        Self::Runtime,
        Self::Api,
        Self::Database,
        Self::Dependency,
        Self::Performance,
        Self::Security,
        Self::CiCd,
        Self::Testing,
    ];

    /// Returns the wire name of this category.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Runtime => "runtime",
            Self::Api => "api",
            Self::Database => "database",
            Self::Dependency => "dependency",
            Self::Performance => "performance",
            Self::Security => "security",
            Self::CiCd => "ci-cd",
            Self::Testing => "testing",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|cat| cat.as_str() == s.trim())
            .ok_or_else(|| ValidationError::UnknownCategory(s.to_string()))
    }
}

/// Lifecycle state of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Newly recorded.
    Open,
    /// Someone is looking at it.
    Investigating,
    /// A solution was recorded.
    Resolved,
    /// No further action.
    Closed,
}

impl Status {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Open, Self::Investigating, Self::Resolved, Self::Closed];

    /// Returns the wire name of this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Investigating => "investigating",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    /// Returns true if moving from `self` to `next` is allowed.
    ///
    /// Transitions only move forward. `Resolved -> Resolved` is accepted so a
    /// later resolution overwrites an earlier one.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::Investigating)
                | (Self::Open, Self::Resolved)
                | (Self::Investigating, Self::Resolved)
                | (Self::Resolved, Self::Resolved)
                | (Self::Resolved, Self::Closed)
        )
    }

    /// Returns true for `Open` and `Investigating`.
    #[must_use]
    pub const fn is_unresolved(&self) -> bool {
        matches!(self, Self::Open | Self::Investigating)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s.trim())
            .ok_or_else(|| ValidationError::UnknownStatus(s.to_string()))
    }
}

/// Identifies the pipeline run a log call happened in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiCdContext {
    /// Pipeline or workflow run id.
    pub pipeline_id: Option<String>,
    /// Branch or ref name.
    pub branch: Option<String>,
    /// Commit SHA.
    pub commit_sha: Option<String>,
    /// Job id within the pipeline.
    pub job_id: Option<String>,
}

/// Structured details attached by the test-result emitter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestContext {
    /// Test framework name.
    pub framework: String,
    /// Total number of tests.
    pub total: u32,
    /// Passed tests.
    pub passed: u32,
    /// Failed tests.
    pub failed: u32,
    /// Skipped tests.
    pub skipped: u32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Line coverage percentage, if measured.
    pub coverage: Option<f64>,
}

/// Snapshot of the execution environment taken when an entry is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Runtime/toolchain version string.
    pub runtime_version: String,
    /// Tracked dependency versions.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Operating system identifier.
    pub os: String,
    /// When the snapshot was taken.
    pub captured_at: DateTime<Utc>,
    /// Present only when running inside a CI pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ci_cd: Option<CiCdContext>,
}

/// A structured diagnostic record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique identifier, immutable.
    pub id: EntryId,
    /// Creation instant, immutable.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub severity: Severity,
    /// Category.
    pub category: Category,
    /// Short summary.
    pub title: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Error message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Stack trace, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    /// Known or applied solution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    /// Actions performed around the event.
    #[serde(default)]
    pub steps_taken: Vec<String>,
    /// Environment captured at creation.
    pub environment: Environment,
    /// Lifecycle status.
    pub status: Status,
    /// Set when the entry is resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_date: Option<DateTime<Utc>>,
    /// Notes on avoiding a recurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prevention_notes: Option<String>,
    /// Category plus extracted keywords.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Ids of earlier entries sharing vocabulary with this one.
    #[serde(default)]
    pub related_issues: BTreeSet<EntryId>,
    /// Pipeline details from the CI/CD emitter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ci_cd_context: Option<CiCdContext>,
    /// Test run details from the test-result emitter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_context: Option<TestContext>,
}

impl LogEntry {
    /// Creates a new log entry builder.
    #[must_use]
    pub fn builder() -> LogEntryBuilder {
        LogEntryBuilder::default()
    }

    /// Returns true while the entry is open or under investigation.
    #[must_use]
    pub const fn is_unresolved(&self) -> bool {
        self.status.is_unresolved()
    }

    /// Moves the entry to `next`, rejecting backward transitions.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTransition`] if the move is not allowed.
    pub fn transition(&mut self, next: Status) -> Result<(), ValidationError> {
        if !self.status.can_transition_to(next) {
            return Err(ValidationError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Applies a patch produced by a lifecycle operation.
    pub fn apply(&mut self, patch: &EntryPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(ref solution) = patch.solution {
            self.solution = Some(solution.clone());
        }
        if let Some(date) = patch.resolution_date {
            self.resolution_date = Some(date);
        }
        if let Some(ref notes) = patch.prevention_notes {
            self.prevention_notes = Some(notes.clone());
        }
    }
}

/// Fields changed by a lifecycle operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPatch {
    /// New status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// New solution text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    /// Resolution instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_date: Option<DateTime<Utc>>,
    /// Prevention notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prevention_notes: Option<String>,
}

impl EntryPatch {
    /// Patch for a status change only.
    #[must_use]
    pub const fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            solution: None,
            resolution_date: None,
            prevention_notes: None,
        }
    }

    /// Patch for a resolution.
    #[must_use]
    pub fn resolution(
        solution: impl Into<String>,
        prevention_notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: Some(Status::Resolved),
            solution: Some(solution.into()),
            resolution_date: Some(at),
            prevention_notes,
        }
    }

    /// Returns the patch as a JSON field map for store updates.
    #[must_use]
    pub fn to_fields(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}

/// Builder for constructing log entries.
///
/// `id`, `timestamp`, `category`, `title` and `environment` are required;
/// severity defaults to `info`.
#[derive(Debug, Default)]
pub struct LogEntryBuilder {
    id: Option<EntryId>,
    timestamp: Option<DateTime<Utc>>,
    severity: Option<Severity>,
    category: Option<Category>,
    title: Option<String>,
    description: String,
    error_message: Option<String>,
    stack_trace: Option<String>,
    solution: Option<String>,
    steps_taken: Vec<String>,
    environment: Option<Environment>,
    tags: BTreeSet<String>,
    related_issues: BTreeSet<EntryId>,
    ci_cd_context: Option<CiCdContext>,
    test_context: Option<TestContext>,
}

impl LogEntryBuilder {
    /// Sets the entry id.
    #[must_use]
    pub const fn id(mut self, id: EntryId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the creation timestamp.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the severity.
    #[must_use]
    pub const fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Sets the category.
    #[must_use]
    pub const fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Sets the title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the error message.
    #[must_use]
    pub fn error_message(mut self, message: Option<String>) -> Self {
        self.error_message = message;
        self
    }

    /// Sets the stack trace.
    #[must_use]
    pub fn stack_trace(mut self, trace: Option<String>) -> Self {
        self.stack_trace = trace;
        self
    }

    /// Sets the solution.
    #[must_use]
    pub fn solution(mut self, solution: Option<String>) -> Self {
        self.solution = solution;
        self
    }

    /// Sets the steps taken.
    #[must_use]
    pub fn steps_taken(mut self, steps: Vec<String>) -> Self {
        self.steps_taken = steps;
        self
    }

    /// Sets the environment snapshot.
    #[must_use]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Adds tags.
    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Sets the related entry ids.
    #[must_use]
    pub fn related_issues(mut self, ids: impl IntoIterator<Item = EntryId>) -> Self {
        self.related_issues.extend(ids);
        self
    }

    /// Sets the CI/CD context.
    #[must_use]
    pub fn ci_cd_context(mut self, context: Option<CiCdContext>) -> Self {
        self.ci_cd_context = context;
        self
    }

    /// Sets the test context.
    #[must_use]
    pub fn test_context(mut self, context: Option<TestContext>) -> Self {
        self.test_context = context;
        self
    }

    /// Builds the entry.
    ///
    /// The category name is always added to the tags and the entry's own id
    /// is dropped from its related issues.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or the title is blank.
    pub fn build(self) -> Result<LogEntry, ValidationError> {
        let category = self.category.ok_or(ValidationError::MissingField("category"))?;
        let title = self.title.ok_or(ValidationError::MissingField("title"))?;
        if title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        let id = self.id.ok_or(ValidationError::MissingField("id"))?;
        let timestamp = self
            .timestamp
            .ok_or(ValidationError::MissingField("timestamp"))?;
        let environment = self
            .environment
            .ok_or(ValidationError::MissingField("environment"))?;

        let mut tags = self.tags;
        tags.insert(category.as_str().to_string());

        let mut related_issues = self.related_issues;
        related_issues.remove(&id);

        Ok(LogEntry {
            id,
            timestamp,
            severity: self.severity.unwrap_or(Severity::Info),
            category,
            title,
            description: self.description,
            error_message: self.error_message,
            stack_trace: self.stack_trace,
            solution: self.solution,
            steps_taken: self.steps_taken,
            environment,
            status: Status::Open,
            resolution_date: None,
            prevention_notes: None,
            tags,
            related_issues,
            ci_cd_context: self.ci_cd_context,
            test_context: self.test_context,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("build", Category::Build)]
    #[test_case("ci-cd", Category::CiCd)]
    #[test_case("testing", Category::Testing)]
    #[test_case(" api ", Category::Api ; "surrounding whitespace")]
    fn category_parses(input: &str, expected: Category) {
        assert_eq!(input.parse::<Category>(), Ok(expected));
    }

    #[test]
    fn category_rejects_unknown() {
        assert_eq!(
            "frontend".parse::<Category>(),
            Err(ValidationError::UnknownCategory("frontend".to_string()))
        );
        assert!("".parse::<Category>().is_err());
    }

    #[test]
    fn category_serializes_kebab_case() {
        let json = serde_json::to_string(&Category::CiCd).expect("serialize");
        assert_eq!(json, "\"ci-cd\"");
        let back: Category = serde_json::from_str("\"ci-cd\"").expect("deserialize");
        assert_eq!(back, Category::CiCd);
    }

    #[test]
    fn severity_ordering_and_names() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Error < Severity::Critical);
        assert_eq!("warning".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!(Severity::Critical.to_string(), "critical");
    }

    #[test_case(Status::Open, Status::Investigating, true)]
    #[test_case(Status::Open, Status::Resolved, true)]
    #[test_case(Status::Investigating, Status::Resolved, true)]
    #[test_case(Status::Resolved, Status::Closed, true)]
    #[test_case(Status::Resolved, Status::Resolved, true ; "re-resolve")]
    #[test_case(Status::Open, Status::Closed, false ; "skip resolution")]
    #[test_case(Status::Resolved, Status::Open, false ; "reopen")]
    #[test_case(Status::Closed, Status::Resolved, false ; "closed is terminal")]
    #[test_case(Status::Investigating, Status::Open, false ; "backward")]
    fn status_transitions(from: Status, to: Status, allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn builder_requires_title() {
        let result = LogEntry::builder()
            .id(EntryId::generate())
            .timestamp(Utc::now())
            .category(Category::Api)
            .title("   ")
            .environment(fixtures::environment())
            .build();
        assert_eq!(result, Err(ValidationError::EmptyTitle));

        let result = LogEntry::builder()
            .id(EntryId::generate())
            .timestamp(Utc::now())
            .category(Category::Api)
            .environment(fixtures::environment())
            .build();
        assert_eq!(result, Err(ValidationError::MissingField("title")));
    }

    #[test]
    fn builder_requires_category() {
        let result = LogEntry::builder()
            .id(EntryId::generate())
            .timestamp(Utc::now())
            .title("Timeout")
            .environment(fixtures::environment())
            .build();
        assert_eq!(result, Err(ValidationError::MissingField("category")));
    }

    #[test]
    fn builder_adds_category_tag_and_drops_self_reference() {
        let id = EntryId::generate();
        let other = EntryId::generate();
        let entry = LogEntry::builder()
            .id(id)
            .timestamp(Utc::now())
            .category(Category::Database)
            .title("Pool exhausted")
            .tags(["pool", "exhausted"])
            .related_issues([id, other])
            .environment(fixtures::environment())
            .build()
            .expect("build");

        assert!(entry.tags.contains("database"));
        assert!(entry.tags.contains("pool"));
        assert!(!entry.related_issues.contains(&id));
        assert!(entry.related_issues.contains(&other));
        assert_eq!(entry.status, Status::Open);
        assert_eq!(entry.severity, Severity::Info);
    }

    #[test]
    fn transition_rejects_backward_moves() {
        let mut entry = fixtures::entry("Build failed", "missing module");
        assert!(entry.transition(Status::Investigating).is_ok());
        assert!(entry.transition(Status::Open).is_err());
        assert!(entry.transition(Status::Resolved).is_ok());
        assert!(entry.transition(Status::Closed).is_ok());
        assert_eq!(
            entry.transition(Status::Resolved),
            Err(ValidationError::InvalidTransition {
                from: Status::Closed,
                to: Status::Resolved,
            })
        );
    }

    #[test]
    fn patch_applies_resolution_fields() {
        let mut entry = fixtures::entry("Build failed", "missing module");
        let at = Utc::now();
        let patch = EntryPatch::resolution("fixed config", Some("pin versions".to_string()), at);
        entry.apply(&patch);

        assert_eq!(entry.status, Status::Resolved);
        assert_eq!(entry.solution.as_deref(), Some("fixed config"));
        assert_eq!(entry.resolution_date, Some(at));
        assert_eq!(entry.prevention_notes.as_deref(), Some("pin versions"));
    }

    #[test]
    fn patch_fields_skip_unset_values() {
        let fields = EntryPatch::status(Status::Investigating).to_fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("status"), Some(&serde_json::json!("investigating")));
    }

    #[test]
    fn environment_omits_absent_ci_context() {
        let json = serde_json::to_value(fixtures::environment()).expect("serialize");
        assert!(json.get("ci_cd").is_none());
    }

    #[test]
    fn entry_id_parses_from_display() {
        let id = EntryId::generate();
        let parsed: EntryId = id.to_string().parse().expect("parse");
        assert_eq!(parsed, id);
    }
}
