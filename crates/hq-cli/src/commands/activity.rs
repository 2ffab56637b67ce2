//! Commands for adding and removing activities and categories.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use hq_core::{ActivityKey, CategoryKey, Clock, FactManager, FactStore};

#[derive(Debug, Args)]
pub struct AddActivityArgs {
    /// Activity name.
    pub name: String,

    /// Category name. Omit for an uncategorised activity.
    #[arg(long, default_value = "")]
    pub category: String,
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// Key as shown by `hq categories`.
    #[arg(allow_hyphen_values = true)]
    pub key: i64,
}

pub fn add<W: Write, S: FactStore, C: Clock>(
    writer: &mut W,
    manager: &mut FactManager<S, C>,
    args: &AddActivityArgs,
) -> Result<()> {
    let activity = manager.add_activity(&args.name, &args.category)?;
    writeln!(writer, "Activity {} [{}]", activity.name, activity.key)?;
    Ok(())
}

pub fn remove_category<W: Write, S: FactStore, C: Clock>(
    writer: &mut W,
    manager: &mut FactManager<S, C>,
    args: &RemoveArgs,
) -> Result<()> {
    if manager.remove_category(CategoryKey::new(args.key))? {
        writeln!(writer, "Removed category {}", args.key)?;
    } else {
        writeln!(
            writer,
            "Category {} was not removed (unknown or still has activities)",
            args.key
        )?;
    }
    Ok(())
}

pub fn remove_activity<W: Write, S: FactStore, C: Clock>(
    writer: &mut W,
    manager: &mut FactManager<S, C>,
    args: &RemoveArgs,
) -> Result<()> {
    if manager.remove_activity(ActivityKey::new(args.key))? {
        writeln!(writer, "Removed activity {}", args.key)?;
    } else {
        writeln!(
            writer,
            "Activity {} was not removed (unknown or still has facts)",
            args.key
        )?;
    }
    Ok(())
}
