//! Command implementations.
//!
//! Every command runs against a [`DebugLogger`] backed by a [`JsonDirStore`]
//! under `<data dir>/store` and the JSON cache in the data directory.

use std::io::Write;
use std::sync::Arc;

use devlog::{
    DebugLogger, Event, JsonDirStore, LogEntry, Logged, LoggerConfig, Severity, Status, TracingSink,
};
use tracing::debug;

use crate::cli::{Cli, Commands, ListArgs, LogArgs};
use crate::error::CliError;
use crate::output::{EntryList, OutputFormat};

/// Subdirectory of the data directory holding the record store.
pub const STORE_DIR: &str = "store";

/// Builds the logger configuration from the config file and flag overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or the result is invalid.
pub fn load_config(cli: &Cli) -> Result<LoggerConfig, CliError> {
    let mut config = match cli.config {
        Some(ref path) => {
            debug!(path = %path.display(), "loading configuration");
            LoggerConfig::from_file(path).map_err(|e| CliError::Config(e.to_string()))?
        }
        None => LoggerConfig::default(),
    };

    if let Some(ref dir) = cli.data_dir {
        config.cache_dir.clone_from(dir);
    }
    if let Some(ref user) = cli.user {
        config.user_id.clone_from(user);
    }

    config
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;
    Ok(config)
}

/// Opens the logger for `config`.
///
/// # Errors
///
/// Returns an error if the record store cannot be opened.
pub fn open_logger(config: LoggerConfig) -> Result<DebugLogger, CliError> {
    let store_dir = config.cache_dir.join(STORE_DIR);
    let store = JsonDirStore::open(&store_dir).map_err(|e| {
        CliError::Config(format!(
            "cannot open record store at {}: {e}",
            store_dir.display()
        ))
    })?;

    Ok(DebugLogger::builder(Arc::new(store))
        .config(config)
        .sink(Arc::new(TracingSink::new()))
        .build()?)
}

/// Executes one command and writes its output.
///
/// # Errors
///
/// Returns an error if the command fails or output cannot be written.
pub async fn execute<W: Write>(
    logger: &DebugLogger,
    command: &Commands,
    writer: &mut W,
    format: &OutputFormat,
) -> Result<(), CliError> {
    match command {
        Commands::List(args) => {
            let list = EntryList {
                entries: select(logger, args).await,
            };
            format.write(writer, &list)
        }
        Commands::Show { id } => {
            let entry = logger.get(*id).await.ok_or(CliError::NotFound(*id))?;
            format.write(writer, &entry)
        }
        Commands::Log(args) => {
            let logged = record(logger, args).await?;
            format.write(writer, &logged.entry)
        }
        Commands::Resolve {
            id,
            solution,
            notes,
        } => {
            let updated = logger
                .resolve_issue(*id, solution.clone(), notes.clone())
                .await?
                .ok_or(CliError::NotFound(*id))?;
            format.write(writer, &updated.entry)
        }
        Commands::Status { id, status } => {
            let updated = match Status::from(*status) {
                Status::Closed => logger.close_issue(*id).await?,
                _ => logger.mark_investigating(*id).await?,
            };
            let updated = updated.ok_or(CliError::NotFound(*id))?;
            format.write(writer, &updated.entry)
        }
        Commands::Prune => {
            let report = logger.prune_expired().await?;
            format.write(writer, &report)
        }
        Commands::Export { output } => {
            let json = logger.export_json().await?;
            match output {
                Some(path) => {
                    std::fs::write(path, json)?;
                    debug!(path = %path.display(), "exported entries");
                }
                None => writeln!(writer, "{json}")?,
            }
            Ok(())
        }
        Commands::Stats => format.write(writer, &logger.stats().await),
    }
}

async fn select(logger: &DebugLogger, args: &ListArgs) -> Vec<LogEntry> {
    let mut entries = match (args.similar.as_deref(), args.unresolved) {
        (Some(text), _) => logger.find_similar(text, "").await,
        (None, true) => logger.unresolved_issues().await,
        (None, false) => logger.entries().await,
    };

    entries.retain(|e| {
        (!args.unresolved || e.is_unresolved())
            && args.category.is_none_or(|c| e.category == c)
            && args.severity.is_none_or(|s| e.severity == s)
    });
    if let Some(limit) = args.limit {
        entries.truncate(limit);
    }
    entries
}

async fn record(logger: &DebugLogger, args: &LogArgs) -> Result<Logged, CliError> {
    let mut event = Event::new(args.category, args.title.clone(), args.description.clone())
        .steps(args.steps.iter().cloned());
    if let Some(ref message) = args.error_message {
        event = event.error_message(message.clone());
    }
    if let Some(ref solution) = args.solution {
        event = event.solution(solution.clone());
    }

    let logged = match args.severity {
        Severity::Info => logger.log_info(event).await?,
        Severity::Warning => logger.log_warning(event).await?,
        Severity::Error => logger.log_error(event).await?,
        Severity::Critical => logger.log_critical(event).await?,
    };
    Ok(logged)
}
