//! Whole-document JSON persistence of the catalog.
//!
//! The file maps category ids to `{label, items}` and item ids to the item
//! record. Writes go through a temporary file in the same directory and a
//! rename, so a crash never leaves a half-written catalog behind.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use isoshelf_common::error::{IsoshelfError, Result};

use crate::model::Category;
use crate::store::CatalogStore;

/// Catalog document on disk.
#[derive(Debug, Clone)]
pub struct CatalogFile {
    path: PathBuf,
}

impl CatalogFile {
    /// Points at a catalog file. Nothing is read until [`CatalogFile::load`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the catalog. A missing file is an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, and
    /// [`IsoshelfError::InvalidInput`] if a record is malformed or a storage
    /// name appears twice.
    pub fn load(&self, mount_root: &Path) -> Result<CatalogStore> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no catalog file yet");
            return Ok(CatalogStore::new(mount_root));
        }
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| IsoshelfError::io(&self.path, e))?;
        let categories: BTreeMap<u32, Category> = if content.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_json::from_str(&content)?
        };
        tracing::debug!(
            path = %self.path.display(),
            categories = categories.len(),
            "catalog loaded"
        );
        CatalogStore::from_document(mount_root, categories)
    }

    /// Writes the whole catalog, replacing the previous document.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the document
    /// cannot be written or renamed into place.
    pub fn save(&self, store: &CatalogStore) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| IsoshelfError::io(&parent, e))?;

        let mut json = serde_json::to_string_pretty(store.as_map())?;
        json.push('\n');

        let mut tmp =
            tempfile::NamedTempFile::new_in(&parent).map_err(|e| IsoshelfError::io(&parent, e))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| IsoshelfError::io(tmp.path(), e))?;
        let _ = tmp
            .persist(&self.path)
            .map_err(|e| IsoshelfError::io(&self.path, e.error))?;
        tracing::debug!(path = %self.path.display(), "catalog saved");
        Ok(())
    }
}
