//! List command for recorded facts.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use hq_core::{Clock, Fact, FactManager, FactStore};

use super::util::{fact_label, fact_span, format_duration};

#[derive(Debug, Args)]
pub struct ListArgs {
    /// First day to include (YYYY-MM-DD).
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD).
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write, S: FactStore, C: Clock>(
    writer: &mut W,
    manager: &FactManager<S, C>,
    args: &ListArgs,
) -> Result<()> {
    // A single bound selects that one day.
    let facts = match (args.from, args.to) {
        (None, None) => manager.list_facts()?,
        (Some(from), None) => manager.list_facts_between(from, from)?,
        (None, Some(to)) => manager.list_facts_between(to, to)?,
        (Some(from), Some(to)) => manager.list_facts_between(from, to)?,
    };

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&facts)?)?;
        return Ok(());
    }

    if facts.is_empty() {
        writeln!(writer, "No facts recorded.")?;
        return Ok(());
    }
    for fact in &facts {
        writeln!(writer, "{}", format_row(fact))?;
    }
    Ok(())
}

fn format_row(fact: &Fact) -> String {
    let key = fact
        .key
        .map_or_else(String::new, |key| key.to_string());
    let mut row = format!(
        "{key:<4}  {}  {}  {:>7}  {}",
        fact.start.format("%Y-%m-%d"),
        fact_span(fact),
        format_duration(fact.wall_duration()),
        fact_label(fact)
    );
    if let Some(description) = &fact.description {
        row.push_str(", ");
        row.push_str(description);
    }
    row
}
