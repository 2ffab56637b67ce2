//! Cancel command.

use std::io::Write;

use anyhow::Result;
use hq_core::{Clock, FactManager, FactStore};

use super::util::fact_label;

pub fn run<W: Write, S: FactStore, C: Clock>(
    writer: &mut W,
    manager: &mut FactManager<S, C>,
) -> Result<()> {
    let Some(current) = manager.current()? else {
        manager.cancel()?;
        writeln!(writer, "Nothing to cancel")?;
        return Ok(());
    };
    manager.cancel()?;
    writeln!(writer, "Cancelled {}", fact_label(&current))?;
    Ok(())
}
