//! CLI command definitions and dispatch.

pub mod category;
pub mod item;
pub mod menu;
pub mod mount;
pub mod status;
pub mod unmount;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use isoshelf_catalog::CatalogStore;
use isoshelf_common::config::IsoshelfConfig;
use isoshelf_common::constants::REQUIRED_TOOLS;
use isoshelf_common::types::CatalogPath;
use isoshelf_runtime::controller::Controller;

/// isoshelf — NFS ISO library manager for virtualization hosts.
#[derive(Parser, Debug)]
#[command(name = "isoshelf", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute. Defaults to the interactive menu.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// JSON configuration file.
    #[arg(long, global = true, env = "ISOSHELF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Catalog document, overriding the configuration.
    #[arg(long, global = true, env = "ISOSHELF_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Host storage registry, overriding the configuration.
    #[arg(long, global = true, env = "ISOSHELF_STORAGE_CFG")]
    pub storage_cfg: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

impl Cli {
    /// Resolves the effective configuration: file (if any), then overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded or the
    /// result is invalid.
    pub fn settings(&self) -> anyhow::Result<IsoshelfConfig> {
        let mut config = match &self.config {
            Some(path) => IsoshelfConfig::load(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => IsoshelfConfig::default(),
        };
        if let Some(catalog) = &self.catalog {
            config.catalog_file.clone_from(catalog);
        }
        if let Some(storage_cfg) = &self.storage_cfg {
            config.storage_cfg.clone_from(storage_cfg);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage catalog categories.
    Category(category::CategoryArgs),
    /// Manage mount definitions.
    Item(item::ItemArgs),
    /// Mount an item read-only and register it.
    Mount(mount::MountArgs),
    /// Unmount an item and deregister it.
    Unmount(unmount::UnmountArgs),
    /// Show mount and registry state.
    Status(status::StatusArgs),
    /// Interactive menu.
    Menu,
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if startup fails or the requested operation fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.settings()?;
    isoshelf_core::tool::ensure_available(REQUIRED_TOOLS)?;
    let mut controller = Controller::open(&config)
        .with_context(|| format!("opening catalog {}", config.catalog_file.display()))?;

    match cli.command.unwrap_or(Command::Menu) {
        Command::Category(args) => category::execute(&mut controller, args),
        Command::Item(args) => item::execute(&mut controller, args),
        Command::Mount(args) => mount::execute(&controller, &args),
        Command::Unmount(args) => unmount::execute(&controller, &args),
        Command::Status(args) => status::execute(&controller, &args),
        Command::Menu => menu::execute(&mut controller),
    }
}

/// Resolves `<category>/<item>` or a storage name to catalog ids.
///
/// # Errors
///
/// Returns an error if the reference is malformed or matches nothing.
pub fn resolve_item(store: &CatalogStore, reference: &str) -> anyhow::Result<(u32, u32)> {
    let reference = reference.trim();
    if let Some((cat, item)) = reference.split_once('/') {
        let cat: u32 = cat
            .trim()
            .parse()
            .with_context(|| format!("invalid category id in `{reference}`"))?;
        let item: u32 = item
            .trim()
            .parse()
            .with_context(|| format!("invalid item id in `{reference}`"))?;
        let _ = store.item(cat, item)?;
        return Ok((cat, item));
    }
    match store.find_by_name(reference) {
        Some((CatalogPath::Item(cat, item), _)) => Ok((cat, item)),
        _ => anyhow::bail!("no item named `{reference}`"),
    }
}
