//! # devlog-cli
//!
//! Command-line interface over a local `devlog` event history.
//!
//! Provides commands for:
//! - Listing, filtering and showing recorded entries
//! - Recording new entries from scripts and shell sessions
//! - Resolving, investigating and closing issues
//! - Retention pruning, JSON export and summary statistics
//!
//! Entries are kept in a JSON record store under `<data dir>/store` with the
//! local cache blob alongside it, so the history survives between runs.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format, ListArgs, LogArgs, StatusChange};
pub use error::CliError;
pub use output::OutputFormat;
