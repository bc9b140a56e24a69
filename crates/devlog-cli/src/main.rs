//! devlog CLI binary entrypoint.

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use devlog_cli::cli::Cli;
use devlog_cli::commands;
use devlog_cli::output::OutputFormat;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = commands::load_config(&cli)?;
    let data_dir = config.cache_dir.clone();
    let logger = commands::open_logger(config)
        .with_context(|| format!("opening history in {}", data_dir.display()))?;

    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();
    commands::execute(&logger, &cli.command, &mut stdout, &format).await?;

    logger.shutdown().await.context("flushing local cache")?;
    Ok(())
}
