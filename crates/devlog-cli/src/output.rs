//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use devlog::{LogEntry, LogStats, PruneReport};
use serde::Serialize;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone, Default)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => value.write_table(writer)?,
        }
        Ok(())
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// Entries selected by `list`.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct EntryList {
    /// Entries in display order.
    pub entries: Vec<LogEntry>,
}

impl TableDisplay for EntryList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.entries.is_empty() {
            writeln!(writer, "No entries")?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:<36}  {:<20}  {:<8}  {:<11}  {:<13}  TITLE",
            "ID", "TIMESTAMP", "SEVERITY", "CATEGORY", "STATUS"
        )?;
        writeln!(writer, "{}", "─".repeat(120))?;

        for entry in &self.entries {
            writeln!(
                writer,
                "{:<36}  {:<20}  {:<8}  {:<11}  {:<13}  {}",
                entry.id,
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.severity,
                entry.category,
                entry.status,
                truncate(&entry.title, 40)
            )?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} entr{}", self.entries.len(), if self.entries.len() == 1 { "y" } else { "ies" })?;
        Ok(())
    }
}

impl TableDisplay for LogEntry {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{}", self.title)?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "ID:          {}", self.id)?;
        writeln!(writer, "Timestamp:   {}", self.timestamp.to_rfc3339())?;
        writeln!(writer, "Severity:    {}", self.severity)?;
        writeln!(writer, "Category:    {}", self.category)?;
        writeln!(writer, "Status:      {}", self.status)?;
        if !self.description.is_empty() {
            writeln!(writer, "Description: {}", self.description)?;
        }
        if let Some(ref message) = self.error_message {
            writeln!(writer, "Error:       {message}")?;
        }
        if let Some(ref solution) = self.solution {
            writeln!(writer, "Solution:    {solution}")?;
        }
        if let Some(date) = self.resolution_date {
            writeln!(writer, "Resolved:    {}", date.to_rfc3339())?;
        }
        if let Some(ref notes) = self.prevention_notes {
            writeln!(writer, "Prevention:  {notes}")?;
        }

        let tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
        writeln!(writer, "Tags:        {}", tags.join(", "))?;

        if !self.steps_taken.is_empty() {
            writeln!(writer)?;
            writeln!(writer, "Steps")?;
            for (i, step) in self.steps_taken.iter().enumerate() {
                writeln!(writer, "  {}. {step}", i + 1)?;
            }
        }

        if !self.related_issues.is_empty() {
            writeln!(writer)?;
            writeln!(writer, "Related")?;
            for id in &self.related_issues {
                writeln!(writer, "  {id}")?;
            }
        }

        writeln!(writer)?;
        writeln!(writer, "Environment")?;
        writeln!(writer, "  Runtime:     {}", self.environment.runtime_version)?;
        writeln!(writer, "  OS:          {}", self.environment.os)?;
        if let Some(ref ci) = self.environment.ci_cd {
            writeln!(
                writer,
                "  Pipeline:    {} ({})",
                ci.pipeline_id.as_deref().unwrap_or("-"),
                ci.branch.as_deref().unwrap_or("-")
            )?;
        }
        Ok(())
    }
}

impl TableDisplay for LogStats {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Debug Log")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Total:       {}", self.total)?;
        writeln!(writer, "Unresolved:  {}", self.unresolved)?;

        writeln!(writer)?;
        writeln!(writer, "By severity")?;
        for (severity, count) in &self.by_severity {
            writeln!(writer, "  {:<13} {count}", severity.as_str())?;
        }

        writeln!(writer)?;
        writeln!(writer, "By category")?;
        for (category, count) in &self.by_category {
            writeln!(writer, "  {:<13} {count}", category.as_str())?;
        }

        writeln!(writer)?;
        writeln!(writer, "By status")?;
        for (status, count) in &self.by_status {
            writeln!(writer, "  {:<13} {count}", status.as_str())?;
        }
        Ok(())
    }
}

impl TableDisplay for PruneReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(
            writer,
            "Pruned {} entr{} from the local cache",
            self.from_cache,
            if self.from_cache == 1 { "y" } else { "ies" }
        )?;
        Ok(())
    }
}

/// Shortens `s` to at most `max_chars` characters.
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}
