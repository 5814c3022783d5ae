//! Catalog operations bound to the mount lifecycle.
//!
//! Every mutation is saved to the catalog file before returning. Deletes go
//! through the full unmount sequence first; a record whose share is still
//! mounted is never dropped.

use isoshelf_catalog::{CatalogFile, CatalogStore, Item, ItemDraft, ItemPatch};
use isoshelf_common::config::IsoshelfConfig;
use isoshelf_common::error::{IsoshelfError, Result};
use isoshelf_common::types::{CatalogPath, ItemStatus, UnmountDecision};

use crate::guard::UsageReport;
use crate::lifecycle::{MountLifecycle, MountReport, UnmountOutcome, UnmountReport};

/// Why a cascading category delete stopped early.
#[derive(Debug)]
pub enum Halt {
    /// The operator aborted the unmount of this item.
    Aborted {
        /// Item id within the category.
        item: u32,
        /// The assessment that was declined.
        usage: UsageReport,
    },
    /// The unmount of this item failed.
    Failed {
        /// Item id within the category.
        item: u32,
        /// The failure.
        error: IsoshelfError,
    },
    /// The item was unmounted but its registry entry could not be removed;
    /// the record was kept so the deregistration can be retried.
    Deregistration {
        /// Item id within the category.
        item: u32,
        /// The unmount, carrying the registry error.
        report: UnmountReport,
    },
}

/// Outcome of [`Controller::delete_category`].
#[derive(Debug)]
pub struct CategoryDeletion {
    /// Items unmounted and removed, in id order.
    pub unmounted: Vec<(u32, String, UnmountReport)>,
    /// Set when the cascade stopped; the category was kept.
    pub halted: Option<Halt>,
}

impl CategoryDeletion {
    /// Returns whether the category itself was removed.
    #[must_use]
    pub const fn removed(&self) -> bool {
        self.halted.is_none()
    }
}

/// Live status of one catalog item.
#[derive(Debug)]
pub struct StatusEntry {
    /// Where the item lives.
    pub path: CatalogPath,
    /// Storage name.
    pub name: String,
    /// Host state, or why it could not be read.
    pub status: Result<ItemStatus>,
}

/// Owns the catalog document and the lifecycle that acts on its items.
pub struct Controller {
    file: CatalogFile,
    store: CatalogStore,
    lifecycle: MountLifecycle,
}

impl Controller {
    /// Loads the catalog and wires the host lifecycle described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog file exists but cannot be read.
    pub fn open(config: &IsoshelfConfig) -> Result<Self> {
        let file = CatalogFile::new(&config.catalog_file);
        let store = file.load(&config.mount_root)?;
        tracing::info!(
            catalog = %file.path().display(),
            categories = store.as_map().len(),
            "catalog opened"
        );
        Ok(Self::new(file, store, MountLifecycle::from_config(config)))
    }

    /// Assembles a controller from its parts.
    #[must_use]
    pub const fn new(file: CatalogFile, store: CatalogStore, lifecycle: MountLifecycle) -> Self {
        Self {
            file,
            store,
            lifecycle,
        }
    }

    /// Read access to the catalog.
    #[must_use]
    pub const fn catalog(&self) -> &CatalogStore {
        &self.store
    }

    /// Adds a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the label is empty or the catalog cannot be saved.
    pub fn add_category(&mut self, label: &str) -> Result<u32> {
        let id = self.store.add_category(label)?;
        self.save()?;
        Ok(id)
    }

    /// Changes a category label.
    ///
    /// # Errors
    ///
    /// Returns an error if the category is unknown, the label is empty, or the
    /// catalog cannot be saved.
    pub fn rename_category(&mut self, id: u32, label: &str) -> Result<()> {
        self.store.update_category(id, label)?;
        self.save()
    }

    /// Adds an item to a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the category is unknown, the draft is invalid, or
    /// the catalog cannot be saved.
    pub fn add_item(&mut self, category: u32, draft: ItemDraft) -> Result<u32> {
        let id = self.store.add_item(category, draft)?;
        self.save()?;
        Ok(id)
    }

    /// Applies a partial update to an item and returns the new record.
    ///
    /// Label changes are always accepted. A change to the storage name, the
    /// mount base or the NFS source is refused while the item is mounted or
    /// registered, since the live mount and registry block are keyed by the
    /// old values.
    ///
    /// # Errors
    ///
    /// Returns [`IsoshelfError::InvalidInput`] if the patch is invalid or
    /// would move a live item, and an error if the item is unknown, its host
    /// state cannot be read, or the catalog cannot be saved.
    pub fn edit_item(&mut self, category: u32, item: u32, patch: &ItemPatch) -> Result<Item> {
        let previous = self.store.item(category, item)?;
        let candidate = previous.patched(patch, self.store.mount_root())?;
        let moves_host_state = candidate.name() != previous.name()
            || candidate.mount_base() != previous.mount_base()
            || candidate.nfs_source() != previous.nfs_source();
        if moves_host_state {
            let status = self.lifecycle.status(previous)?;
            if status.mounted || status.registered == Some(true) {
                tracing::warn!(name = previous.name(), "edit refused; item is live");
                return Err(IsoshelfError::invalid(
                    "item",
                    format!(
                        "{} is {}; unmount it before changing its name, mount base or NFS source",
                        previous.name(),
                        if status.mounted { "mounted" } else { "registered" },
                    ),
                ));
            }
        }
        let updated = self.store.update_item(category, item, patch)?.clone();
        self.save()?;
        Ok(updated)
    }

    /// Mounts an item.
    ///
    /// # Errors
    ///
    /// Returns an error if the item is unknown or the mount fails.
    pub fn mount_item(&self, category: u32, item: u32) -> Result<MountReport> {
        self.lifecycle.mount(self.store.item(category, item)?)
    }

    /// Unmounts an item, consulting `decide` if it is in use.
    ///
    /// # Errors
    ///
    /// Returns an error if the item is unknown or the unmount fails.
    pub fn unmount_item<D>(&self, category: u32, item: u32, decide: D) -> Result<UnmountOutcome>
    where
        D: FnOnce(&UsageReport) -> UnmountDecision,
    {
        self.lifecycle.unmount(self.store.item(category, item)?, decide)
    }

    /// Unmounts an item and removes it from the catalog.
    ///
    /// The record is kept when the operator aborts, the unmount fails, or
    /// the registry entry cannot be removed; see [`UnmountOutcome::released`].
    ///
    /// # Errors
    ///
    /// Returns an error if the item is unknown, the unmount fails, or the
    /// catalog cannot be saved.
    pub fn delete_item<D>(&mut self, category: u32, item: u32, decide: D) -> Result<UnmountOutcome>
    where
        D: FnOnce(&UsageReport) -> UnmountDecision,
    {
        let path = CatalogPath::Item(category, item);
        let outcome = self.unmount_item(category, item, decide)?;
        if outcome.released() {
            let removed = self.store.remove_item(category, item)?;
            self.save()?;
            tracing::info!(%path, name = removed.name(), "item deleted");
        } else if matches!(outcome, UnmountOutcome::Completed(_)) {
            tracing::warn!(%path, "item unmounted but still registered; record kept");
        }
        Ok(outcome)
    }

    /// Unmounts every item of a category in id order, then removes it.
    ///
    /// Each released item is removed as it goes. The first abort, unmount
    /// failure or deregistration failure stops the cascade and keeps the
    /// category with its remaining items; progress up to that point is saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the category is unknown or the catalog cannot be
    /// saved. Unmount failures are reported through [`CategoryDeletion`].
    pub fn delete_category<D>(&mut self, category: u32, mut decide: D) -> Result<CategoryDeletion>
    where
        D: FnMut(&Item, &UsageReport) -> UnmountDecision,
    {
        let children: Vec<(u32, Item)> = self
            .store
            .items(category)?
            .into_iter()
            .map(|(id, item)| (id, item.clone()))
            .collect();

        let mut deletion = CategoryDeletion {
            unmounted: Vec::new(),
            halted: None,
        };
        for (id, item) in children {
            match self.lifecycle.unmount(&item, |usage| decide(&item, usage)) {
                Ok(UnmountOutcome::Completed(report)) if report.deregistration.is_err() => {
                    tracing::error!(category, item = id, "category delete stopped; registry entry kept");
                    deletion.halted = Some(Halt::Deregistration { item: id, report });
                    break;
                }
                Ok(UnmountOutcome::Completed(report)) => {
                    let _ = self.store.remove_item(category, id)?;
                    deletion
                        .unmounted
                        .push((id, item.name().to_string(), report));
                }
                Ok(UnmountOutcome::Aborted { usage }) => {
                    tracing::info!(category, item = id, "category delete aborted by operator");
                    deletion.halted = Some(Halt::Aborted { item: id, usage });
                    break;
                }
                Err(error) => {
                    tracing::error!(category, item = id, error = %error, "category delete stopped");
                    deletion.halted = Some(Halt::Failed { item: id, error });
                    break;
                }
            }
        }

        if deletion.removed() {
            let _ = self.store.remove_category(category)?;
            tracing::info!(category, items = deletion.unmounted.len(), "category deleted");
        }
        self.save()?;
        Ok(deletion)
    }

    /// Live status of one item.
    ///
    /// # Errors
    ///
    /// Returns an error if the item is unknown or the host state cannot be read.
    pub fn status(&self, category: u32, item: u32) -> Result<ItemStatus> {
        self.lifecycle.status(self.store.item(category, item)?)
    }

    /// Live status of every item, in catalog order.
    #[must_use]
    pub fn status_all(&self) -> Vec<StatusEntry> {
        self.store
            .categories()
            .flat_map(|(cat_id, category)| {
                category.items().map(move |(item_id, item)| (cat_id, item_id, item))
            })
            .map(|(cat_id, item_id, item)| StatusEntry {
                path: CatalogPath::Item(cat_id, item_id),
                name: item.name().to_string(),
                status: self.lifecycle.status(item),
            })
            .collect()
    }

    fn save(&self) -> Result<()> {
        self.file.save(&self.store)
    }
}
