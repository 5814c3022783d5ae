//! `isoshelf status` — Show mount and registry state.

use clap::Args;
use isoshelf_runtime::controller::Controller;

use crate::output::{self, BOLD, DIM, RED, RESET};

/// Arguments for the `status` command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Item as `<category>/<item>` or storage name. All items when omitted.
    pub item: Option<String>,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `status` command.
///
/// # Errors
///
/// Returns an error if the item is unknown or its state cannot be read.
pub fn execute(controller: &Controller, args: &StatusArgs) -> anyhow::Result<()> {
    if let Some(reference) = &args.item {
        let (cat, id) = super::resolve_item(controller.catalog(), reference)?;
        let status = controller.status(cat, id)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
        } else {
            let name = controller.catalog().item(cat, id)?.name();
            println!("{name}: {}", output::status_text(&status));
        }
        return Ok(());
    }

    let entries = controller.status_all();
    if args.json {
        let rows: Vec<serde_json::Value> = entries
            .iter()
            .map(|entry| match &entry.status {
                Ok(status) => serde_json::json!({
                    "path": entry.path.to_string(),
                    "name": entry.name,
                    "mounted": status.mounted,
                    "registered": status.registered,
                }),
                Err(e) => serde_json::json!({
                    "path": entry.path.to_string(),
                    "name": entry.name,
                    "error": e.to_string(),
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No items in the catalog.");
        return Ok(());
    }
    println!("{BOLD}{:<8} {:<16} {}{RESET}", "PATH", "NAME", "STATE");
    for entry in &entries {
        let state = match &entry.status {
            Ok(status) => output::status_text(status),
            Err(e) => format!("{RED}unknown: {e}{RESET}"),
        };
        println!("{:<8} {:<16} {state}", entry.path.to_string(), entry.name);
    }
    println!("{DIM}{} item(s){RESET}", entries.len());
    Ok(())
}
