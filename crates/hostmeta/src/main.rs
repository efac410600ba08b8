//! hostmeta CLI
//!
//! Collects metadata about compute hosts, merges per-host snapshots and
//! queries the resulting inventory.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use color_eyre::Result;
use hostmeta_collect::{Collector, LocalRunner};
use hostmeta_core::InventoryStore;

mod cli;
mod commands;
mod config;
mod logging;

use cli::{Cli, Commands};
use commands::Outcome;
use config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    // Initialize error handling
    color_eyre::install()?;

    let cli = Cli::parse();
    let (config, source) = Config::resolve(cli.config.as_deref())?;
    logging::init(
        &config.log,
        cli.verbose,
        cli.log_format.unwrap_or(config.log.format),
    )?;
    match &source {
        Some(path) => tracing::debug!(path = %path.display(), "loaded config"),
        None => tracing::warn!("no config file found, using defaults"),
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(Outcome::Usage.exit_code());
    };

    let store_path = cli.dbfile.unwrap_or_else(|| config.store.path.clone());
    let mut stdout = io::stdout().lock();

    let outcome = match command {
        Commands::Show(args) => commands::show(&store_path, &args, &mut stdout)?,
        Commands::Hosts => {
            let store = InventoryStore::load(&store_path)?;
            commands::hosts(&store, &mut stdout)?
        }
        Commands::Collect(args) => {
            let collector = Collector::new(Arc::new(LocalRunner::new()))
                .with_timeout(config.collect.timeout())
                .with_git_paths(config.collect.git_paths.clone());
            commands::collect(&collector, &config.collect, &store_path, &args, &mut stdout).await?
        }
        Commands::Merge(args) => commands::merge(&config.merge, &store_path, &args, &mut stdout)?,
    };
    stdout.flush()?;

    if let Outcome::NotFound(message) = &outcome {
        eprintln!("{message}");
    }
    Ok(outcome.exit_code())
}
