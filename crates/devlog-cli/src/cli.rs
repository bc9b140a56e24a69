//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use devlog::{Category, EntryId, Severity, Status};

/// devlog - structured debug event history.
#[derive(Parser, Debug, Clone)]
#[command(name = "devlog")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "DEVLOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the local cache and the record store.
    #[arg(short, long, env = "DEVLOG_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Scope identifier written on every stored record.
    #[arg(short, long, env = "DEVLOG_USER")]
    pub user: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List recorded entries.
    List(ListArgs),

    /// Show one entry in full.
    Show {
        /// Entry id.
        id: EntryId,
    },

    /// Record a new entry.
    Log(LogArgs),

    /// Mark an entry resolved.
    Resolve {
        /// Entry id.
        id: EntryId,

        /// What fixed it.
        solution: String,

        /// How to avoid it next time.
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Move an entry to investigating or closed.
    Status {
        /// Entry id.
        id: EntryId,

        /// New status.
        #[arg(value_enum)]
        status: StatusChange,
    },

    /// Remove entries older than the retention window from the local cache.
    Prune,

    /// Print every entry as JSON.
    Export {
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show counts by severity, category and status.
    Stats,
}

/// Arguments for the list command.
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Only open and investigating entries, newest first.
    #[arg(long)]
    pub unresolved: bool,

    /// Only entries of this category.
    #[arg(long)]
    pub category: Option<Category>,

    /// Only entries of this severity.
    #[arg(long)]
    pub severity: Option<Severity>,

    /// Only entries similar to this text.
    #[arg(long, value_name = "TEXT")]
    pub similar: Option<String>,

    /// Show at most this many entries.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

/// Arguments for the log command.
#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Category of the event.
    pub category: Category,

    /// Short summary.
    pub title: String,

    /// Free-text description.
    #[arg(short, long, default_value = "")]
    pub description: String,

    /// Severity of the event.
    #[arg(short, long, default_value = "error")]
    pub severity: Severity,

    /// Error message.
    #[arg(short, long)]
    pub error_message: Option<String>,

    /// Known solution.
    #[arg(long)]
    pub solution: Option<String>,

    /// Step taken around the event; repeatable.
    #[arg(long = "step", value_name = "STEP")]
    pub steps: Vec<String>,
}

/// Status changes available from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusChange {
    /// Someone is looking at it.
    Investigating,
    /// No further action.
    Closed,
}

impl From<StatusChange> for Status {
    fn from(change: StatusChange) -> Self {
        match change {
            StatusChange::Investigating => Self::Investigating,
            StatusChange::Closed => Self::Closed,
        }
    }
}
