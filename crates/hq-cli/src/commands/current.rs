//! Current command for showing the fact being tracked.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use hq_core::{Clock, FactManager, FactStore};

use super::util::{fact_label, format_duration};

#[derive(Debug, Args)]
pub struct CurrentArgs {
    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write, S: FactStore, C: Clock>(
    writer: &mut W,
    manager: &mut FactManager<S, C>,
    args: &CurrentArgs,
) -> Result<()> {
    let current = manager.current()?;

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&current)?)?;
        return Ok(());
    }

    match current {
        Some(fact) => {
            writeln!(
                writer,
                "{} since {} ({})",
                fact_label(&fact),
                fact.start.format("%H:%M"),
                format_duration(fact.wall_duration())
            )?;
            if let Some(description) = &fact.description {
                writeln!(writer, "  {description}")?;
            }
        }
        None => writeln!(writer, "Not tracking")?,
    }
    Ok(())
}
