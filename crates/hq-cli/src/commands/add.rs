//! Add and edit commands for recorded facts.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use hq_core::{Clock, Fact, FactDraft, FactKey, FactManager, FactStore};

use super::util::{fact_label, fact_span, format_duration, parse_time};

#[derive(Debug, Args)]
pub struct AddArgs {
    /// When the fact started.
    #[arg(long)]
    pub start: String,

    /// When the fact ended.
    #[arg(long)]
    pub end: String,

    /// Activity name.
    pub activity: String,

    /// Category name. Omit for an uncategorised activity.
    #[arg(long, default_value = "")]
    pub category: String,

    /// Free-form notes.
    #[arg(long, default_value = "")]
    pub description: String,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Key of the fact to replace.
    pub key: i64,

    #[command(flatten)]
    pub fact: AddArgs,
}

impl AddArgs {
    fn draft(&self, now: chrono::NaiveDateTime) -> Result<FactDraft> {
        Ok(FactDraft {
            start: parse_time(&self.start, now)?,
            end: parse_time(&self.end, now)?,
            activity: self.activity.clone(),
            category: self.category.clone(),
            description: self.description.clone(),
        })
    }
}

pub fn run<W: Write, S: FactStore, C: Clock>(
    writer: &mut W,
    manager: &mut FactManager<S, C>,
    args: &AddArgs,
) -> Result<()> {
    let draft = args.draft(manager.now())?;
    let fact = manager.create(&draft)?;
    write_fact(writer, "Added", &fact)
}

pub fn edit<W: Write, S: FactStore, C: Clock>(
    writer: &mut W,
    manager: &mut FactManager<S, C>,
    args: &EditArgs,
) -> Result<()> {
    let draft = args.fact.draft(manager.now())?;
    let fact = manager.update(FactKey::new(args.key), &draft)?;
    write_fact(writer, "Updated", &fact)
}

fn write_fact<W: Write>(writer: &mut W, verb: &str, fact: &Fact) -> Result<()> {
    let key = fact
        .key
        .map_or_else(|| "?".to_string(), |key| key.to_string());
    writeln!(
        writer,
        "{verb} fact {key}: {} {} {} ({})",
        fact_label(fact),
        fact.start.format("%Y-%m-%d"),
        fact_span(fact),
        format_duration(fact.wall_duration())
    )?;
    Ok(())
}
