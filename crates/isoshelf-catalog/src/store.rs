//! In-memory catalog tree with id allocation.
//!
//! Ids are the smallest positive integers not in use at their level, so a
//! deleted id is handed out again by the next add.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use isoshelf_common::error::{IsoshelfError, Result};
use isoshelf_common::types::CatalogPath;

use crate::model::{Category, Item, ItemDraft, ItemPatch};

/// The catalog: categories keyed by id, each holding items keyed by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogStore {
    categories: BTreeMap<u32, Category>,
    mount_root: PathBuf,
}

impl CatalogStore {
    /// Creates an empty catalog. `mount_root` is the parent of default
    /// mount bases.
    #[must_use]
    pub fn new(mount_root: impl Into<PathBuf>) -> Self {
        Self::from_categories(mount_root, BTreeMap::new())
    }

    /// Wraps an existing category tree.
    #[must_use]
    pub fn from_categories(
        mount_root: impl Into<PathBuf>,
        categories: BTreeMap<u32, Category>,
    ) -> Self {
        Self {
            categories,
            mount_root: mount_root.into(),
        }
    }

    /// Wraps a category tree read from an untrusted document.
    ///
    /// Every record is checked the way an operator-supplied draft is, and
    /// storage names must be unique across the whole tree.
    ///
    /// # Errors
    ///
    /// Returns [`IsoshelfError::InvalidInput`] naming the first offending
    /// record.
    pub fn from_document(
        mount_root: impl Into<PathBuf>,
        categories: BTreeMap<u32, Category>,
    ) -> Result<Self> {
        let mut seen: BTreeMap<&str, CatalogPath> = BTreeMap::new();
        for (&cat_id, category) in &categories {
            category
                .validate()
                .map_err(|e| at(CatalogPath::Category(cat_id), &e))?;
            for (item_id, item) in category.items() {
                let path = CatalogPath::Item(cat_id, item_id);
                item.validate().map_err(|e| at(path, &e))?;
                if let Some(first) = seen.insert(item.name(), path) {
                    return Err(IsoshelfError::invalid(
                        "name",
                        format!("`{}` is used by both {first} and {path}", item.name()),
                    ));
                }
            }
        }
        Ok(Self::from_categories(mount_root, categories))
    }

    /// Parent directory of default mount bases.
    #[must_use]
    pub fn mount_root(&self) -> &Path {
        &self.mount_root
    }

    /// The whole category tree, for persistence.
    #[must_use]
    pub const fn as_map(&self) -> &BTreeMap<u32, Category> {
        &self.categories
    }

    /// Categories ordered by id.
    pub fn categories(&self) -> impl Iterator<Item = (u32, &Category)> {
        self.categories.iter().map(|(id, cat)| (*id, cat))
    }

    /// Looks up a category.
    ///
    /// # Errors
    ///
    /// Returns [`IsoshelfError::NotFound`] if no category has this id.
    pub fn category(&self, id: u32) -> Result<&Category> {
        self.categories
            .get(&id)
            .ok_or_else(|| not_found(CatalogPath::Category(id)))
    }

    /// Items of a category ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`IsoshelfError::NotFound`] if the category does not exist.
    pub fn items(&self, category: u32) -> Result<Vec<(u32, &Item)>> {
        Ok(self.category(category)?.items().collect())
    }

    /// Looks up an item.
    ///
    /// # Errors
    ///
    /// Returns [`IsoshelfError::NotFound`] if the category or item does not exist.
    pub fn item(&self, category: u32, item: u32) -> Result<&Item> {
        self.category(category)?
            .item(item)
            .ok_or_else(|| not_found(CatalogPath::Item(category, item)))
    }

    /// Finds an item by storage name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<(CatalogPath, &Item)> {
        self.categories.iter().find_map(|(cat_id, cat)| {
            cat.items()
                .find(|(_, item)| item.name() == name)
                .map(|(item_id, item)| (CatalogPath::Item(*cat_id, item_id), item))
        })
    }

    /// Adds a category and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`IsoshelfError::InvalidInput`] if the label is empty.
    pub fn add_category(&mut self, label: &str) -> Result<u32> {
        let category = Category::new(label)?;
        let id = next_free_id(&self.categories);
        let _ = self.categories.insert(id, category);
        tracing::debug!(id, label = %label.trim(), "category added");
        Ok(id)
    }

    /// Replaces a category's label.
    ///
    /// # Errors
    ///
    /// Returns [`IsoshelfError::NotFound`] or [`IsoshelfError::InvalidInput`].
    pub fn update_category(&mut self, id: u32, label: &str) -> Result<()> {
        let category = self
            .categories
            .get_mut(&id)
            .ok_or_else(|| not_found(CatalogPath::Category(id)))?;
        category.set_label(label)
    }

    /// Removes a category record and everything under it.
    ///
    /// This is bare record removal; unmounting the children first is the
    /// caller's job.
    ///
    /// # Errors
    ///
    /// Returns [`IsoshelfError::NotFound`] if the category does not exist.
    pub fn remove_category(&mut self, id: u32) -> Result<Category> {
        let removed = self
            .categories
            .remove(&id)
            .ok_or_else(|| not_found(CatalogPath::Category(id)))?;
        tracing::debug!(id, items = removed.len(), "category removed");
        Ok(removed)
    }

    /// Adds an item to a category and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`IsoshelfError::NotFound`] if the category does not exist and
    /// [`IsoshelfError::InvalidInput`] if the draft is invalid or its name is
    /// already used anywhere in the catalog.
    pub fn add_item(&mut self, category: u32, draft: ItemDraft) -> Result<u32> {
        let _ = self.category(category)?;
        let item = Item::new(draft, &self.mount_root)?;
        self.ensure_unique_name(item.name(), None)?;

        let items = self.items_mut(category)?;
        let id = next_free_id(items);
        let _ = items.insert(id, item);
        tracing::debug!(category, id, "item added");
        Ok(id)
    }

    /// Applies a partial update to an item and returns the stored result.
    ///
    /// The patched record is validated in full before it replaces the old
    /// one; on error nothing changes.
    ///
    /// # Errors
    ///
    /// Returns [`IsoshelfError::NotFound`] or [`IsoshelfError::InvalidInput`].
    pub fn update_item(&mut self, category: u32, item: u32, patch: &ItemPatch) -> Result<&Item> {
        let path = CatalogPath::Item(category, item);
        let updated = self.item(category, item)?.patched(patch, &self.mount_root)?;
        self.ensure_unique_name(updated.name(), Some(path))?;

        let slot = self
            .items_mut(category)?
            .get_mut(&item)
            .ok_or_else(|| not_found(path))?;
        *slot = updated;
        tracing::debug!(%path, name = %slot.name(), "item updated");
        Ok(&*slot)
    }

    /// Removes an item record.
    ///
    /// # Errors
    ///
    /// Returns [`IsoshelfError::NotFound`] if the item does not exist.
    pub fn remove_item(&mut self, category: u32, item: u32) -> Result<Item> {
        let path = CatalogPath::Item(category, item);
        let removed = self
            .items_mut(category)?
            .remove(&item)
            .ok_or_else(|| not_found(path))?;
        tracing::debug!(%path, name = %removed.name(), "item removed");
        Ok(removed)
    }

    fn items_mut(&mut self, category: u32) -> Result<&mut BTreeMap<u32, Item>> {
        self.categories
            .get_mut(&category)
            .map(Category::items_mut)
            .ok_or_else(|| not_found(CatalogPath::Category(category)))
    }

    fn ensure_unique_name(&self, name: &str, except: Option<CatalogPath>) -> Result<()> {
        match self.find_by_name(name) {
            Some((path, _)) if Some(path) != except => Err(IsoshelfError::invalid(
                "name",
                format!("`{name}` is already used by item {path}"),
            )),
            _ => Ok(()),
        }
    }
}

fn at(path: CatalogPath, error: &IsoshelfError) -> IsoshelfError {
    match error {
        IsoshelfError::InvalidInput { field, message } => {
            IsoshelfError::invalid(*field, format!("{message} (at {path})"))
        }
        other => IsoshelfError::invalid("catalog", format!("{other} (at {path})")),
    }
}

/// Smallest positive id not present in `map`.
fn next_free_id<V>(map: &BTreeMap<u32, V>) -> u32 {
    let mut candidate = 1;
    for &id in map.keys() {
        if id < candidate {
            continue;
        }
        if id != candidate {
            break;
        }
        candidate += 1;
    }
    candidate
}

fn not_found(path: CatalogPath) -> IsoshelfError {
    let kind = match path {
        CatalogPath::Category(_) => "category",
        CatalogPath::Item(..) => "item",
    };
    IsoshelfError::NotFound {
        kind,
        id: path.to_string(),
    }
}
