//! `isoshelf mount` — Mount an item read-only and register it.

use clap::Args;
use isoshelf_runtime::controller::Controller;

use crate::output;

/// Arguments for the `mount` command.
#[derive(Args, Debug)]
pub struct MountArgs {
    /// Item as `<category>/<item>` or storage name.
    pub item: String,
}

/// Executes the `mount` command.
///
/// # Errors
///
/// Returns an error if the item is unknown or the mount fails.
pub fn execute(controller: &Controller, args: &MountArgs) -> anyhow::Result<()> {
    let (cat, id) = super::resolve_item(controller.catalog(), &args.item)?;
    let item = controller.catalog().item(cat, id)?;
    eprintln!("  Mounting {} from {}...", item.name(), item.nfs_source());
    let report = controller.mount_item(cat, id)?;
    output::print(&output::mount_lines(item.name(), &report));
    Ok(())
}
