//! `isoshelf item` — Manage mount definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use isoshelf_catalog::{ItemDraft, ItemPatch};
use isoshelf_common::types::CatalogPath;
use isoshelf_runtime::controller::Controller;

use super::unmount::{self, DecisionArg};
use crate::output::{self, GREEN, RESET};

/// Arguments for the `item` command.
#[derive(Args, Debug)]
pub struct ItemArgs {
    /// Item operation.
    #[command(subcommand)]
    pub action: ItemAction,
}

/// Item operations.
#[derive(Subcommand, Debug)]
pub enum ItemAction {
    /// Add a mount definition to a category.
    Add {
        /// Category id.
        category: u32,
        /// Storage name, unique across the catalog.
        #[arg(long)]
        name: String,
        /// Display label.
        #[arg(long)]
        label: String,
        /// NFS server address.
        #[arg(long)]
        server: String,
        /// Exported path; `\\server\share\dir` is accepted.
        #[arg(long)]
        export: String,
        /// Local mount base. Defaults to `<mount_root>/<name>`.
        #[arg(long)]
        mount_base: Option<PathBuf>,
    },
    /// Change fields of a mount definition.
    Edit {
        /// Item as `<category>/<item>` or storage name.
        item: String,
        /// New storage name.
        #[arg(long)]
        name: Option<String>,
        /// New display label.
        #[arg(long)]
        label: Option<String>,
        /// New NFS server address.
        #[arg(long)]
        server: Option<String>,
        /// New exported path.
        #[arg(long)]
        export: Option<String>,
        /// New mount base.
        #[arg(long)]
        mount_base: Option<PathBuf>,
    },
    /// Unmount an item, then delete it.
    Delete {
        /// Item as `<category>/<item>` or storage name.
        item: String,
        /// Answer to use if the storage is in use. Prompts when omitted.
        #[arg(long, value_enum)]
        decision: Option<DecisionArg>,
    },
    /// List items, optionally of one category.
    List {
        /// Category id.
        category: Option<u32>,
    },
    /// Show every field of an item.
    Show {
        /// Item as `<category>/<item>` or storage name.
        item: String,
    },
}

/// Executes the `item` command.
///
/// # Errors
///
/// Returns an error if the operation fails.
pub fn execute(controller: &mut Controller, args: ItemArgs) -> anyhow::Result<()> {
    match args.action {
        ItemAction::Add {
            category,
            name,
            label,
            server,
            export,
            mount_base,
        } => {
            let draft = ItemDraft {
                name,
                label,
                nfs_server: server,
                nfs_export: export,
                mount_base,
            };
            let id = controller.add_item(category, draft)?;
            println!("  {GREEN}Created{RESET} item {}", CatalogPath::Item(category, id));
        }
        ItemAction::Edit {
            item,
            name,
            label,
            server,
            export,
            mount_base,
        } => {
            let (cat, id) = super::resolve_item(controller.catalog(), &item)?;
            let patch = ItemPatch {
                name,
                label,
                nfs_server: server,
                nfs_export: export,
                mount_base,
            };
            if patch.is_empty() {
                anyhow::bail!("nothing to change; pass at least one field");
            }
            let updated = controller.edit_item(cat, id, &patch)?;
            output::print(&output::item_details(CatalogPath::Item(cat, id), &updated));
        }
        ItemAction::Delete { item, decision } => {
            let (cat, id) = super::resolve_item(controller.catalog(), &item)?;
            let name = controller.catalog().item(cat, id)?.name().to_string();
            let mut decide = unmount::decider(decision);
            let outcome = controller.delete_item(cat, id, |usage| decide(&name, usage))?;
            unmount::report(&name, &outcome)?;
            unmount::ensure_released(&name, &outcome)?;
            println!("  {GREEN}Deleted{RESET} item {}", CatalogPath::Item(cat, id));
        }
        ItemAction::List { category } => {
            let store = controller.catalog();
            match category {
                Some(id) => output::print(&output::item_table(id, store.category(id)?)),
                None => {
                    for (id, category) in store.categories() {
                        println!("  {} {}", id, category.label());
                        output::print(&output::item_table(id, category));
                    }
                }
            }
        }
        ItemAction::Show { item } => {
            let (cat, id) = super::resolve_item(controller.catalog(), &item)?;
            let record = controller.catalog().item(cat, id)?;
            output::print(&output::item_details(CatalogPath::Item(cat, id), record));
            let status = controller.status(cat, id)?;
            println!("  state:        {}", output::status_text(&status));
        }
    }
    Ok(())
}
