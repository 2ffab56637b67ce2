//! Stop command.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use hq_core::{Clock, FactManager, FactStore};

use super::util::{fact_label, fact_span, format_duration, parse_optional_time};

#[derive(Debug, Args)]
pub struct StopArgs {
    /// End time instead of now (e.g. 17:30, "10 minutes ago").
    #[arg(long)]
    pub at: Option<String>,
}

pub fn run<W: Write, S: FactStore, C: Clock>(
    writer: &mut W,
    manager: &mut FactManager<S, C>,
    args: &StopArgs,
) -> Result<()> {
    let at = parse_optional_time(args.at.as_deref(), manager.now())?;
    let fact = manager.stop(at)?;
    writeln!(
        writer,
        "Stopped {} {} ({})",
        fact_label(&fact),
        fact_span(&fact),
        format_duration(fact.wall_duration())
    )?;
    Ok(())
}
