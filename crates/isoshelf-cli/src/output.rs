//! Formatted output helpers for CLI commands.
//!
//! Functions here build lines of text; callers decide where to print them.

use isoshelf_catalog::{CatalogStore, Category, Item};
use isoshelf_common::error::Result;
use isoshelf_common::types::{CatalogPath, ItemStatus, RegistryChange, UnmountKind};
use isoshelf_runtime::guard::UsageReport;
use isoshelf_runtime::lifecycle::{MountReport, UnmountReport};

pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const RED: &str = "\x1b[31m";
pub const RESET: &str = "\x1b[0m";

/// Prints lines to stdout, indented like the rest of the CLI output.
pub fn print(lines: &[String]) {
    for line in lines {
        println!("  {line}");
    }
}

/// One-line summary of an item's live state.
#[must_use]
pub fn status_text(status: &ItemStatus) -> String {
    let mounted = if status.mounted { "mounted" } else { "not mounted" };
    let registered = match status.registered {
        Some(true) => "registered",
        Some(false) => "not registered",
        None => "registry unavailable",
    };
    if status.diverged() {
        format!("{mounted}, {registered} (out of sync)")
    } else {
        format!("{mounted}, {registered}")
    }
}

/// Describes the outcome of a registry update.
#[must_use]
pub fn registry_text(change: &Result<RegistryChange>) -> String {
    match change {
        Ok(change) => format!("registry: {change}"),
        Err(e) => format!("registry update failed: {e}"),
    }
}

/// Lists the consumers found by the usage guard.
#[must_use]
pub fn usage_lines(usage: &UsageReport) -> Vec<String> {
    let mut lines = Vec::new();
    for vm in &usage.vms {
        let name = if vm.name.is_empty() { "-" } else { vm.name.as_str() };
        lines.push(format!("VM {} ({name}) uses {}", vm.vmid, vm.devices.join(", ")));
    }
    for process in &usage.processes {
        lines.push(format!("process {} ({}) has files open", process.pid, process.command));
    }
    if lines.is_empty() {
        lines.push("no VM or process uses this storage".into());
    }
    for note in &usage.degraded {
        lines.push(format!("note: {note}"));
    }
    lines
}

/// Summarizes a mount.
#[must_use]
pub fn mount_lines(name: &str, report: &MountReport) -> Vec<String> {
    let first = if report.already_mounted {
        format!("{name} was already mounted")
    } else {
        format!("{name} mounted read-only")
    };
    vec![first, registry_text(&report.registration)]
}

/// Summarizes a completed unmount.
#[must_use]
pub fn unmount_lines(name: &str, report: &UnmountReport) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(remediation) = &report.remediation {
        for (vmid, device) in &remediation.ejected {
            lines.push(format!("ejected {device} from VM {vmid}"));
        }
        for failure in &remediation.failures {
            lines.push(format!(
                "could not eject {} from VM {}: {}",
                failure.device, failure.vmid, failure.reason
            ));
        }
        for vm in &remediation.still_referencing {
            lines.push(format!(
                "VM {} still references the storage ({})",
                vm.vmid,
                vm.devices.join(", ")
            ));
        }
    }
    match report.kind {
        UnmountKind::Forced => {
            lines.push(format!("{name} {}", report.kind));
            if let Some(error) = &report.graceful_error {
                lines.push(format!("graceful unmount failed: {error}"));
            }
        }
        UnmountKind::Clean | UnmountKind::AlreadyUnmounted => {
            lines.push(format!("{name} {}", report.kind));
        }
    }
    lines.push(registry_text(&report.deregistration));
    lines
}

/// Table of categories.
#[must_use]
pub fn category_table(store: &CatalogStore) -> Vec<String> {
    let mut lines = vec![format!("{:<6} {:<30} {:>5}", "ID", "LABEL", "ITEMS")];
    lines.extend(
        store
            .categories()
            .map(|(id, category)| format!("{id:<6} {:<30} {:>5}", category.label(), category.len())),
    );
    lines
}

/// Table of the items of one category.
#[must_use]
pub fn item_table(category_id: u32, category: &Category) -> Vec<String> {
    let mut lines = vec![format!(
        "{:<8} {:<16} {:<24} {:<32} {}",
        "PATH", "NAME", "LABEL", "SOURCE", "TARGET"
    )];
    lines.extend(category.items().map(|(id, item)| {
        format!(
            "{:<8} {:<16} {:<24} {:<32} {}",
            CatalogPath::Item(category_id, id).to_string(),
            item.name(),
            item.label(),
            item.nfs_source(),
            item.mount_target().display()
        )
    }));
    lines
}

/// Every field of one item.
#[must_use]
pub fn item_details(path: CatalogPath, item: &Item) -> Vec<String> {
    vec![
        format!("path:         {path}"),
        format!("name:         {}", item.name()),
        format!("label:        {}", item.label()),
        format!("nfs server:   {}", item.nfs_server()),
        format!("nfs export:   {}", item.nfs_export()),
        format!("mount base:   {}", item.mount_base().display()),
        format!("mount target: {}", item.mount_target().display()),
    ]
}
