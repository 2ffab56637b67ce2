use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use hq_core::{FactManager, SystemClock};
use hq_db::Database;
use tracing_subscriber::EnvFilter;

use hq_cli::commands::{activity, add, cancel, categories, current, list, start, stop, totals};
use hq_cli::{Cli, Commands, Config};

/// Load config and open the fact store, ensuring the database directory exists.
fn open_manager(config_path: Option<&Path>) -> Result<FactManager<Database, SystemClock>> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?
        .with_rules(config.interval_rules());
    FactManager::new(db, SystemClock, config.manager_config()).context("failed to load facts")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let mut manager = open_manager(cli.config.as_deref())?;
    let mut out = std::io::stdout().lock();

    match command {
        Commands::Start(args) => start::run(&mut out, &mut manager, args)?,
        Commands::Stop(args) => stop::run(&mut out, &mut manager, args)?,
        Commands::Cancel => cancel::run(&mut out, &mut manager)?,
        Commands::Current(args) => current::run(&mut out, &mut manager, args)?,
        Commands::Add(args) => add::run(&mut out, &mut manager, args)?,
        Commands::Edit(args) => add::edit(&mut out, &mut manager, args)?,
        Commands::List(args) => list::run(&mut out, &manager, args)?,
        Commands::Totals(args) => totals::run(&mut out, &manager, args)?,
        Commands::Categories(args) => categories::run(&mut out, &manager, args)?,
        Commands::AddActivity(args) => activity::add(&mut out, &mut manager, args)?,
        Commands::RemoveCategory(args) => activity::remove_category(&mut out, &mut manager, args)?,
        Commands::RemoveActivity(args) => activity::remove_activity(&mut out, &mut manager, args)?,
    }
    out.flush()?;

    for event in manager.drain_events() {
        tracing::debug!(?event, "lifecycle event");
    }
    Ok(())
}
