//! Typed reports accepted by the specialized emitters and the records they
//! produce in downstream tables.
//!
//! Each report knows how to summarize itself as a log entry (title,
//! description, steps) and how to become a structured record.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LogError, Result, ValidationError};
use crate::traits::Record;
use crate::types::{CiCdContext, EntryId, TestContext};

fn to_record<T: Serialize>(value: &T) -> Result<Record> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(LogError::PersistenceWrite {
            tier: "primary",
            reason: "record did not serialize to an object".to_string(),
        }),
    }
}

macro_rules! wire_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Returns the wire name.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ValidationError::UnknownStatus(other.to_string())),
                }
            }
        }
    };
}

/// Outcome of a pipeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    /// Queued.
    Pending,
    /// In progress.
    Running,
    /// Finished successfully.
    Success,
    /// Finished with a failure.
    Failed,
    /// Stopped before finishing.
    Cancelled,
}

wire_enum!(PipelineStatus {
    Pending => "pending",
    Running => "running",
    Success => "success",
    Failed => "failed",
    Cancelled => "cancelled",
});

/// Outcome of a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// All tests passed.
    Passed,
    /// At least one test failed.
    Failed,
    /// The run itself broke.
    Error,
}

wire_enum!(TestStatus {
    Passed => "passed",
    Failed => "failed",
    Error => "error",
});

/// Outcome of a security scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Nothing found.
    Passed,
    /// Findings below the failure threshold.
    Warning,
    /// Findings that fail the scan.
    Failed,
}

wire_enum!(ScanStatus {
    Passed => "passed",
    Warning => "warning",
    Failed => "failed",
});

/// Severity of a single vulnerability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VulnerabilitySeverity {
    /// Low.
    Low,
    /// Medium.
    Medium,
    /// High.
    High,
    /// Critical.
    Critical,
}

/// A pipeline event reported to `log_cicd_event`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineEvent {
    /// Stage or event name, e.g. `build` or `deploy`.
    pub event_type: String,
    /// Outcome.
    pub status: PipelineStatus,
    /// Free-text details.
    pub details: String,
}

impl PipelineEvent {
    /// Title of the summarizing log entry.
    #[must_use]
    pub fn title(&self) -> String {
        format!("CI/CD {}: {}", self.event_type, self.status)
    }

    /// Steps of the summarizing log entry.
    #[must_use]
    pub fn steps(&self, ci: Option<&CiCdContext>) -> Vec<String> {
        let mut steps = vec![
            format!("Event: {}", self.event_type),
            format!("Status: {}", self.status),
        ];
        if let Some(ci) = ci {
            if let Some(ref id) = ci.pipeline_id {
                steps.push(format!("Pipeline: {id}"));
            }
            if let Some(ref branch) = ci.branch {
                steps.push(format!("Branch: {branch}"));
            }
            if let Some(ref sha) = ci.commit_sha {
                steps.push(format!("Commit: {sha}"));
            }
        }
        steps
    }
}

/// One stage of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStage {
    /// Stage name.
    pub name: String,
    /// Stage outcome.
    pub status: PipelineStatus,
}

/// Row of the `pipeline_runs` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Record id.
    pub id: EntryId,
    /// Id of the summarizing log entry.
    pub log_id: EntryId,
    /// Pipeline run id from the CI environment.
    pub pipeline_id: Option<String>,
    /// Outcome.
    pub status: PipelineStatus,
    /// Branch.
    pub branch: Option<String>,
    /// Commit SHA.
    pub commit_sha: Option<String>,
    /// Job id.
    pub job_id: Option<String>,
    /// Stages reported so far.
    pub stages: Vec<PipelineStage>,
    /// Free-text details.
    pub details: String,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

impl PipelineRun {
    /// Builds the record for an event inside a CI context.
    #[must_use]
    pub fn new(event: &PipelineEvent, ci: &CiCdContext, log_id: EntryId, at: DateTime<Utc>) -> Self {
        Self {
            id: EntryId::generate(),
            log_id,
            pipeline_id: ci.pipeline_id.clone(),
            status: event.status,
            branch: ci.branch.clone(),
            commit_sha: ci.commit_sha.clone(),
            job_id: ci.job_id.clone(),
            stages: vec![PipelineStage {
                name: event.event_type.clone(),
                status: event.status,
            }],
            details: event.details.clone(),
            created_at: at,
        }
    }

    /// Returns the record form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_record(&self) -> Result<Record> {
        to_record(self)
    }
}

/// Results of a test run reported to `log_test_result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    /// Test framework.
    pub framework: String,
    /// Outcome.
    pub status: TestStatus,
    /// Total tests.
    pub total: u32,
    /// Passed tests.
    pub passed: u32,
    /// Failed tests.
    pub failed: u32,
    /// Skipped tests.
    pub skipped: u32,
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// Coverage percentage.
    pub coverage: Option<f64>,
}

impl TestReport {
    /// Title of the summarizing log entry.
    #[must_use]
    pub fn title(&self) -> String {
        format!("Test run {}: {}", self.status, self.framework)
    }

    /// Description of the summarizing log entry.
    #[must_use]
    pub fn description(&self) -> String {
        let mut text = format!(
            "{}/{} tests passed, {} failed, {} skipped in {} ms",
            self.passed, self.total, self.failed, self.skipped, self.duration_ms
        );
        if let Some(coverage) = self.coverage {
            text.push_str(&format!(", coverage {coverage:.1}%"));
        }
        text
    }

    /// Steps of the summarizing log entry.
    #[must_use]
    pub fn steps(&self) -> Vec<String> {
        vec![
            format!("Framework: {}", self.framework),
            format!("Total: {}", self.total),
            format!("Passed: {}", self.passed),
            format!("Failed: {}", self.failed),
            format!("Skipped: {}", self.skipped),
        ]
    }

    /// Structured context attached to the log entry.
    #[must_use]
    pub fn context(&self) -> TestContext {
        TestContext {
            framework: self.framework.clone(),
            total: self.total,
            passed: self.passed,
            failed: self.failed,
            skipped: self.skipped,
            duration_ms: self.duration_ms,
            coverage: self.coverage,
        }
    }

    /// Returns the `test_runs` record form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_record(&self, log_id: EntryId, at: DateTime<Utc>) -> Result<Record> {
        let mut record = to_record(self)?;
        insert_meta(&mut record, log_id, at);
        Ok(record)
    }
}

/// A performance measurement reported to `log_performance_metric`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Kind of measurement, e.g. `lighthouse` or `load-time`.
    pub metric_type: String,
    /// Overall score.
    pub score: f64,
    /// Individual metric values.
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    /// Measured URL, if any.
    pub url: Option<String>,
}

impl PerformanceReport {
    /// Title of the summarizing log entry.
    #[must_use]
    pub fn title(&self) -> String {
        format!("Performance {}: score {:.1}", self.metric_type, self.score)
    }

    /// Description of the summarizing log entry.
    #[must_use]
    pub fn description(&self) -> String {
        let target = self.url.as_deref().unwrap_or("application");
        let metrics: Vec<String> = self
            .metrics
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        if metrics.is_empty() {
            format!("Measured {} for {target}", self.metric_type)
        } else {
            format!("Measured {} for {target}: {}", self.metric_type, metrics.join(", "))
        }
    }

    /// Steps of the summarizing log entry.
    #[must_use]
    pub fn steps(&self) -> Vec<String> {
        let mut steps = vec![
            format!("Metric: {}", self.metric_type),
            format!("Score: {}", self.score),
        ];
        if let Some(ref url) = self.url {
            steps.push(format!("URL: {url}"));
        }
        steps
    }

    /// Returns the `performance_metrics` record form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_record(&self, log_id: EntryId, at: DateTime<Utc>) -> Result<Record> {
        let mut record = to_record(self)?;
        insert_meta(&mut record, log_id, at);
        Ok(record)
    }
}

/// One finding of a security scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    /// Advisory id, e.g. a CVE or GHSA identifier.
    pub id: String,
    /// Affected package.
    pub package: String,
    /// Severity.
    pub severity: VulnerabilitySeverity,
    /// Short summary.
    pub title: String,
    /// First fixed version, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_in: Option<String>,
}

/// Number of findings per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    /// Critical findings.
    pub critical: u32,
    /// High findings.
    pub high: u32,
    /// Medium findings.
    pub medium: u32,
    /// Low findings.
    pub low: u32,
}

impl SeverityCounts {
    /// Tallies the findings.
    #[must_use]
    pub fn tally(vulnerabilities: &[Vulnerability]) -> Self {
        let mut counts = Self::default();
        for vuln in vulnerabilities {
            match vuln.severity {
                VulnerabilitySeverity::Critical => counts.critical += 1,
                VulnerabilitySeverity::High => counts.high += 1,
                VulnerabilitySeverity::Medium => counts.medium += 1,
                VulnerabilitySeverity::Low => counts.low += 1,
            }
        }
        counts
    }

    /// Total findings.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.critical + self.high + self.medium + self.low
    }
}

/// A security scan reported to `log_security_scan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityScanReport {
    /// Kind of scan, e.g. `dependency-audit`.
    pub scan_type: String,
    /// Outcome.
    pub status: ScanStatus,
    /// Findings.
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
}

impl SecurityScanReport {
    /// Findings per severity.
    #[must_use]
    pub fn severity_counts(&self) -> SeverityCounts {
        SeverityCounts::tally(&self.vulnerabilities)
    }

    /// Title of the summarizing log entry.
    #[must_use]
    pub fn title(&self) -> String {
        format!("Security scan {}: {}", self.scan_type, self.status)
    }

    /// Description of the summarizing log entry.
    #[must_use]
    pub fn description(&self) -> String {
        let counts = self.severity_counts();
        format!(
            "{} vulnerabilities found (critical {}, high {}, medium {}, low {})",
            counts.total(),
            counts.critical,
            counts.high,
            counts.medium,
            counts.low
        )
    }

    /// Steps of the summarizing log entry.
    #[must_use]
    pub fn steps(&self) -> Vec<String> {
        let mut steps = vec![
            format!("Scan: {}", self.scan_type),
            format!("Status: {}", self.status),
        ];
        steps.extend(
            self.vulnerabilities
                .iter()
                .map(|v| format!("{} in {} ({:?})", v.id, v.package, v.severity)),
        );
        steps
    }

    /// Returns the `security_scans` record form, including severity counts.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_record(&self, log_id: EntryId, at: DateTime<Utc>) -> Result<Record> {
        let mut record = to_record(self)?;
        record.insert(
            "severity_counts".to_string(),
            serde_json::to_value(self.severity_counts())?,
        );
        insert_meta(&mut record, log_id, at);
        Ok(record)
    }
}

fn insert_meta(record: &mut Record, log_id: EntryId, at: DateTime<Utc>) {
    record.insert("id".to_string(), Value::String(EntryId::generate().to_string()));
    record.insert("log_id".to_string(), Value::String(log_id.to_string()));
    record.insert("created_at".to_string(), Value::String(at.to_rfc3339()));
}
