//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::activity::{AddActivityArgs, RemoveArgs};
use crate::commands::add::{AddArgs, EditArgs};
use crate::commands::categories::CategoriesArgs;
use crate::commands::current::CurrentArgs;
use crate::commands::list::ListArgs;
use crate::commands::start::StartArgs;
use crate::commands::stop::StopArgs;
use crate::commands::totals::TotalsArgs;

/// Personal time tracker.
///
/// Records facts: what you worked on, in which category, from when until when.
/// Only one fact is tracked at a time; starting a new one stops the previous.
#[derive(Debug, Parser)]
#[command(name = "hq", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start tracking a fact, e.g. `hq start write-report@work,Q1 planning`.
    Start(StartArgs),

    /// Stop the fact being tracked.
    Stop(StopArgs),

    /// Discard the fact being tracked without recording it.
    Cancel,

    /// Show the fact being tracked.
    Current(CurrentArgs),

    /// Record a finished fact.
    Add(AddArgs),

    /// Replace a recorded fact.
    Edit(EditArgs),

    /// List recorded facts.
    List(ListArgs),

    /// Show tracked time per day.
    Totals(TotalsArgs),

    /// Show categories and their activities.
    Categories(CategoriesArgs),

    /// Add an activity, creating its category if needed.
    AddActivity(AddActivityArgs),

    /// Remove a category that has no activities.
    RemoveCategory(RemoveArgs),

    /// Remove an activity that has no facts.
    RemoveActivity(RemoveArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_collects_command_words() {
        let cli = Cli::parse_from([
            "hq",
            "start",
            "--at",
            "09:00",
            "write-report@work,Q1",
            "planning",
        ]);
        let Some(Commands::Start(args)) = cli.command else {
            panic!("expected start");
        };
        assert_eq!(args.at.as_deref(), Some("09:00"));
        assert_eq!(args.command.join(" "), "write-report@work,Q1 planning");
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["hq", "stop", "--verbose", "--config", "/tmp/hq.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/hq.toml")));
    }

    #[test]
    fn remove_category_accepts_uncategorised_key() {
        let cli = Cli::parse_from(["hq", "remove-category", "--", "-1"]);
        let Some(Commands::RemoveCategory(args)) = cli.command else {
            panic!("expected remove-category");
        };
        assert_eq!(args.key, -1);
    }
}
