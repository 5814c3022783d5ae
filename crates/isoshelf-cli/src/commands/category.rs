//! `isoshelf category` — Manage catalog categories.

use clap::{Args, Subcommand};
use isoshelf_runtime::controller::{CategoryDeletion, Controller, Halt};

use super::unmount::{self, DecisionArg};
use crate::output::{self, GREEN, RESET};

/// Arguments for the `category` command.
#[derive(Args, Debug)]
pub struct CategoryArgs {
    /// Category operation.
    #[command(subcommand)]
    pub action: CategoryAction,
}

/// Category operations.
#[derive(Subcommand, Debug)]
pub enum CategoryAction {
    /// Create a category.
    Add {
        /// Display label.
        label: String,
    },
    /// Change a category's label.
    Edit {
        /// Category id.
        id: u32,
        /// New display label.
        label: String,
    },
    /// Unmount every item of a category, then delete it.
    Delete {
        /// Category id.
        id: u32,
        /// Answer to use for items that are in use. Prompts when omitted.
        #[arg(long, value_enum)]
        decision: Option<DecisionArg>,
    },
    /// List categories.
    List,
}

/// Executes the `category` command.
///
/// # Errors
///
/// Returns an error if the operation fails or a cascading delete stops.
pub fn execute(controller: &mut Controller, args: CategoryArgs) -> anyhow::Result<()> {
    match args.action {
        CategoryAction::Add { label } => {
            let id = controller.add_category(&label)?;
            println!("  {GREEN}Created{RESET} category {id}");
        }
        CategoryAction::Edit { id, label } => {
            controller.rename_category(id, &label)?;
            println!("  Category {id} renamed");
        }
        CategoryAction::Delete { id, decision } => {
            let mut decide = unmount::decider(decision);
            let deletion = controller.delete_category(id, |item, usage| decide(item.name(), usage))?;
            report_deletion(id, &deletion)?;
        }
        CategoryAction::List => output::print(&output::category_table(controller.catalog())),
    }
    Ok(())
}

/// Prints the outcome of a cascading delete.
///
/// # Errors
///
/// Returns an error if the cascade stopped before the category was removed.
pub fn report_deletion(id: u32, deletion: &CategoryDeletion) -> anyhow::Result<()> {
    for (_, name, report) in &deletion.unmounted {
        output::print(&output::unmount_lines(name, report));
    }
    match &deletion.halted {
        None => {
            println!("  {GREEN}Deleted{RESET} category {id}");
            Ok(())
        }
        Some(Halt::Aborted { item, .. }) => anyhow::bail!(
            "category {id} kept: unmount of item {id}/{item} aborted; {} item(s) removed",
            deletion.unmounted.len()
        ),
        Some(Halt::Failed { item, error }) => anyhow::bail!(
            "category {id} kept: item {id}/{item} could not be unmounted: {error}"
        ),
        Some(Halt::Deregistration { item, report }) => {
            output::print(&output::unmount_lines(&format!("item {id}/{item}"), report));
            anyhow::bail!(
                "category {id} kept: item {id}/{item} is unmounted but still registered; delete again to retry"
            )
        }
    }
}
