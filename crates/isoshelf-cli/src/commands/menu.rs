//! `isoshelf menu` — Interactive catalog and mount management.
//!
//! Errors from a single action are shown and the loop continues. Ctrl+C
//! between actions quits with status 0; during an action it lets the action
//! finish first.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use isoshelf_catalog::{ItemDraft, ItemPatch};
use isoshelf_common::constants::APP_NAME;
use isoshelf_common::types::CatalogPath;
use isoshelf_runtime::controller::Controller;

use super::category::report_deletion;
use super::unmount;
use crate::output::{self, BOLD, DIM, RED, RESET};
use crate::prompt::Prompter;

/// Ctrl+C state shared with the signal thread.
#[derive(Default)]
struct Interrupt {
    busy: AtomicBool,
    requested: AtomicBool,
}

/// Executes the interactive menu until the operator quits.
///
/// # Errors
///
/// Returns an error if the Ctrl+C handler cannot be installed or the
/// terminal cannot be read.
pub fn execute(controller: &mut Controller) -> anyhow::Result<()> {
    let interrupt = Arc::new(Interrupt::default());
    let handler_state = Arc::clone(&interrupt);
    ctrlc::set_handler(move || {
        if handler_state.busy.load(Ordering::SeqCst) {
            handler_state.requested.store(true, Ordering::SeqCst);
            eprintln!("\n  Finishing the current operation before exiting...");
        } else {
            eprintln!();
            std::process::exit(0);
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"))?;

    let mut prompter = Prompter::terminal();
    eprintln!();
    eprintln!("  {BOLD}{APP_NAME}{RESET} {DIM}v{}{RESET}", env!("CARGO_PKG_VERSION"));

    loop {
        print_menu();
        let Some(choice) = prompter.ask("  Select")? else {
            return Ok(());
        };
        if matches!(choice.as_str(), "0" | "q" | "quit") {
            return Ok(());
        }

        interrupt.busy.store(true, Ordering::SeqCst);
        let result = run_action(controller, &mut prompter, &choice);
        interrupt.busy.store(false, Ordering::SeqCst);

        if let Err(e) = result {
            eprintln!("  {RED}error:{RESET} {e:#}");
        }
        if interrupt.requested.load(Ordering::SeqCst) {
            return Ok(());
        }
    }
}

fn print_menu() {
    eprintln!();
    eprintln!("  1) List catalog        6) Edit item");
    eprintln!("  2) Add category        7) Delete item");
    eprintln!("  3) Rename category     8) Mount item");
    eprintln!("  4) Delete category     9) Unmount item");
    eprintln!("  5) Add item           10) Status");
    eprintln!("  0) Quit");
}

fn run_action<R: BufRead, W: Write>(
    controller: &mut Controller,
    prompter: &mut Prompter<R, W>,
    choice: &str,
) -> anyhow::Result<()> {
    match choice {
        "1" => list(controller),
        "2" => {
            let label = prompter.required("  Label")?;
            let id = controller.add_category(&label)?;
            println!("  Created category {id}");
        }
        "3" => {
            let id = ask_category(prompter)?;
            let current = controller.catalog().category(id)?.label().to_string();
            if let Some(label) = prompter.replacement("  Label", &current)? {
                controller.rename_category(id, &label)?;
                println!("  Category {id} renamed");
            }
        }
        "4" => {
            let id = ask_category(prompter)?;
            let count = controller.catalog().category(id)?.len();
            let question = format!("  Unmount {count} item(s) and delete category {id}?");
            if prompter.confirm(&question)? {
                let deletion = controller.delete_category(id, |item, usage| {
                    prompter.decision(item.name(), usage)
                })?;
                report_deletion(id, &deletion)?;
            }
        }
        "5" => add_item(controller, prompter)?,
        "6" => edit_item(controller, prompter)?,
        "7" => {
            let (cat, id) = ask_item(controller, prompter)?;
            let name = controller.catalog().item(cat, id)?.name().to_string();
            if prompter.confirm(&format!("  Unmount and delete {name}?"))? {
                let outcome =
                    controller.delete_item(cat, id, |usage| prompter.decision(&name, usage))?;
                unmount::report(&name, &outcome)?;
                unmount::ensure_released(&name, &outcome)?;
                println!("  Deleted item {}", CatalogPath::Item(cat, id));
            }
        }
        "8" => {
            let (cat, id) = ask_item(controller, prompter)?;
            let name = controller.catalog().item(cat, id)?.name().to_string();
            let report = controller.mount_item(cat, id)?;
            output::print(&output::mount_lines(&name, &report));
        }
        "9" => {
            let (cat, id) = ask_item(controller, prompter)?;
            let name = controller.catalog().item(cat, id)?.name().to_string();
            let outcome =
                controller.unmount_item(cat, id, |usage| prompter.decision(&name, usage))?;
            unmount::report(&name, &outcome)?;
        }
        "10" => {
            for entry in controller.status_all() {
                let state = entry
                    .status
                    .map_or_else(|e| format!("unknown: {e}"), |s| output::status_text(&s));
                println!("  {:<8} {:<16} {state}", entry.path.to_string(), entry.name);
            }
        }
        other => eprintln!("  Unknown choice `{other}`"),
    }
    Ok(())
}

fn list(controller: &Controller) {
    let store = controller.catalog();
    if store.categories().next().is_none() {
        println!("  The catalog is empty.");
        return;
    }
    for (id, category) in store.categories() {
        println!();
        println!("  {BOLD}{id}. {}{RESET}", category.label());
        output::print(&output::item_table(id, category));
    }
}

fn ask_category<R: BufRead, W: Write>(prompter: &mut Prompter<R, W>) -> anyhow::Result<u32> {
    let answer = prompter.required("  Category id")?;
    answer
        .parse()
        .map_err(|_| anyhow::anyhow!("`{answer}` is not a category id"))
}

fn ask_item<R: BufRead, W: Write>(
    controller: &Controller,
    prompter: &mut Prompter<R, W>,
) -> anyhow::Result<(u32, u32)> {
    let answer = prompter.required("  Item (<category>/<item> or name)")?;
    super::resolve_item(controller.catalog(), &answer)
}

fn add_item<R: BufRead, W: Write>(
    controller: &mut Controller,
    prompter: &mut Prompter<R, W>,
) -> anyhow::Result<()> {
    let category = ask_category(prompter)?;
    let _ = controller.catalog().category(category)?;
    let name = prompter.required("  Storage name")?;
    let label = prompter.required("  Label")?;
    let nfs_server = prompter.required("  NFS server")?;
    let nfs_export = prompter.required("  NFS export")?;
    let default_base = controller.catalog().mount_root().join(&name);
    let mount_base = prompter
        .replacement("  Mount base", &default_base.display().to_string())?
        .map(PathBuf::from);

    let id = controller.add_item(
        category,
        ItemDraft {
            name,
            label,
            nfs_server,
            nfs_export,
            mount_base,
        },
    )?;
    println!("  Created item {}", CatalogPath::Item(category, id));
    Ok(())
}

fn edit_item<R: BufRead, W: Write>(
    controller: &mut Controller,
    prompter: &mut Prompter<R, W>,
) -> anyhow::Result<()> {
    let (cat, id) = ask_item(controller, prompter)?;
    let current = controller.catalog().item(cat, id)?.clone();
    let patch = ItemPatch {
        name: prompter.replacement("  Storage name", current.name())?,
        label: prompter.replacement("  Label", current.label())?,
        nfs_server: prompter.replacement("  NFS server", current.nfs_server())?,
        nfs_export: prompter.replacement("  NFS export", current.nfs_export())?,
        mount_base: prompter
            .replacement("  Mount base", &current.mount_base().display().to_string())?
            .map(PathBuf::from),
    };
    if patch.is_empty() {
        println!("  Nothing changed");
        return Ok(());
    }
    let updated = controller.edit_item(cat, id, &patch)?;
    output::print(&output::item_details(CatalogPath::Item(cat, id), &updated));
    Ok(())
}
