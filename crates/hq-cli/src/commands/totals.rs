//! Totals command for per-day tracked time.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use hq_core::{Clock, FactManager, FactStore};

use super::util::format_duration;

#[derive(Debug, Args)]
pub struct TotalsArgs {
    /// Only show this day (YYYY-MM-DD).
    #[arg(long)]
    pub day: Option<NaiveDate>,
}

pub fn run<W: Write, S: FactStore, C: Clock>(
    writer: &mut W,
    manager: &FactManager<S, C>,
    args: &TotalsArgs,
) -> Result<()> {
    if let Some(day) = args.day {
        writeln!(
            writer,
            "{}  {}",
            day.format("%a %Y-%m-%d"),
            format_duration(manager.day_total(day))
        )?;
        return Ok(());
    }

    let totals = manager.day_totals();
    if totals.is_empty() {
        writeln!(writer, "No time tracked.")?;
        return Ok(());
    }
    for (day, total) in totals.iter() {
        writeln!(
            writer,
            "{}  {}",
            day.format("%a %Y-%m-%d"),
            format_duration(total)
        )?;
    }
    Ok(())
}
