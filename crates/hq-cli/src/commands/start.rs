//! Start command.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use hq_core::{Clock, FactManager, FactStore, LifecycleEvent};

use super::util::{fact_label, fact_span, format_duration, parse_optional_time};

#[derive(Debug, Args)]
pub struct StartArgs {
    /// Start time instead of now (e.g. 09:30, "20 minutes ago").
    #[arg(long)]
    pub at: Option<String>,

    /// What to track: `[HH:MM[-HH:MM] ]activity[@category][,description]`.
    #[arg(required = true, trailing_var_arg = true, num_args = 1..)]
    pub command: Vec<String>,
}

pub fn run<W: Write, S: FactStore, C: Clock>(
    writer: &mut W,
    manager: &mut FactManager<S, C>,
    args: &StartArgs,
) -> Result<()> {
    let at = parse_optional_time(args.at.as_deref(), manager.now())?;
    let fact = manager.start(&args.command.join(" "), at)?;

    // Facts added before the start succeeded were auto-closed.
    for event in manager.drain_events() {
        match event {
            LifecycleEvent::StartSucceeded => break,
            LifecycleEvent::FactAdded(stopped) => writeln!(
                writer,
                "Stopped {} after {}",
                fact_label(&stopped),
                format_duration(stopped.wall_duration())
            )?,
            _ => {}
        }
    }

    if fact.is_open() {
        writeln!(
            writer,
            "Started {} at {}",
            fact_label(&fact),
            fact.start.format("%H:%M")
        )?;
    } else {
        writeln!(
            writer,
            "Recorded {} {} ({})",
            fact_label(&fact),
            fact_span(&fact),
            format_duration(fact.wall_duration())
        )?;
    }
    Ok(())
}
