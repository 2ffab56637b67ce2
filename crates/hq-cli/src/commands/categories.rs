//! Categories command for the category/activity tree.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use hq_core::{Clock, FactManager, FactStore};

#[derive(Debug, Args)]
pub struct CategoriesArgs {
    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write, S: FactStore, C: Clock>(
    writer: &mut W,
    manager: &FactManager<S, C>,
    args: &CategoriesArgs,
) -> Result<()> {
    let tree = manager.category_tree()?;

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&tree)?)?;
        return Ok(());
    }

    for node in tree.nodes() {
        writeln!(writer, "{} [{}]", node.name, node.key)?;
        for activity in &node.activities {
            writeln!(writer, "  {} [{}]", activity.name, activity.key)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use hq_core::ManualClock;
    use insta::assert_snapshot;

    use crate::commands::test_support::{at, manager, output};

    #[test]
    fn categories_list_activities_per_category() {
        let clock = ManualClock::new(at("2024-01-01", "09:00:00"));
        let mut manager = manager(&clock);
        manager.add_activity("coding", "work").unwrap();
        manager.add_activity("email", "work").unwrap();
        manager.add_activity("reading", "").unwrap();

        let mut buffer = Vec::new();
        run(&mut buffer, &manager, &CategoriesArgs { json: false }).unwrap();

        assert_snapshot!(output(buffer), @r"
        (uncategorised) [-1]
          reading [3]
        work [1]
          coding [1]
          email [2]
        ");
    }

    #[test]
    fn categories_json_is_keyed_by_category() {
        let clock = ManualClock::new(at("2024-01-01", "09:00:00"));
        let mut manager = manager(&clock);
        manager.add_activity("coding", "work").unwrap();

        let mut buffer = Vec::new();
        run(&mut buffer, &manager, &CategoriesArgs { json: true }).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["-1"]["name"], "(uncategorised)");
        assert_eq!(value["1"]["name"], "work");
        assert_eq!(value["1"]["activities"][0]["name"], "coding");
    }
}
