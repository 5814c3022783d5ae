//! Catalog records.
//!
//! [`Item`] keeps its fields private: the only ways to obtain one are
//! [`Item::new`], [`Item::patched`] and deserialization, and all three derive
//! `mount_target` from `mount_base`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use isoshelf_common::constants::ISO_SUBDIR;
use isoshelf_common::error::{IsoshelfError, Result};
use serde::{Deserialize, Serialize};

/// A mount definition: one NFS export exposed as one named ISO storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ItemRecord", into = "ItemRecord")]
pub struct Item {
    name: String,
    label: String,
    nfs_server: String,
    nfs_export: String,
    mount_base: PathBuf,
    mount_target: PathBuf,
}

/// Fields supplied by the operator when creating an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDraft {
    /// Storage name, unique across the catalog.
    pub name: String,
    /// Display label.
    pub label: String,
    /// NFS server address.
    pub nfs_server: String,
    /// Exported path; UNC-style input is accepted.
    pub nfs_export: String,
    /// Local mount base. Defaults to `<mount_root>/<name>`.
    pub mount_base: Option<PathBuf>,
}

/// Partial replacement of an item's fields. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    /// New storage name. Without `mount_base`, the base is recomputed.
    pub name: Option<String>,
    /// New display label.
    pub label: Option<String>,
    /// New NFS server address.
    pub nfs_server: Option<String>,
    /// New exported path.
    pub nfs_export: Option<String>,
    /// New mount base.
    pub mount_base: Option<PathBuf>,
}

impl ItemPatch {
    /// Returns whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.label.is_none()
            && self.nfs_server.is_none()
            && self.nfs_export.is_none()
            && self.mount_base.is_none()
    }
}

impl Item {
    /// Validates a draft and builds the item.
    ///
    /// # Errors
    ///
    /// Returns [`IsoshelfError::InvalidInput`] if a required field is empty,
    /// the name is not a valid storage identifier, the server contains path
    /// separators, or the mount base is not absolute.
    pub fn new(draft: ItemDraft, mount_root: &Path) -> Result<Self> {
        let name = validate_name(&draft.name)?;
        let label = require("label", &draft.label)?;
        let nfs_server = validate_server(&draft.nfs_server)?;
        let nfs_export = normalize_export(&require("nfs_export", &draft.nfs_export)?);
        let mount_base = match draft.mount_base {
            Some(base) => validate_base(&base)?,
            None => mount_root.join(&name),
        };
        Ok(Self {
            mount_target: derive_mount_target(&mount_base),
            name,
            label,
            nfs_server,
            nfs_export,
            mount_base,
        })
    }

    /// Returns a copy with `patch` applied, validated as a whole.
    ///
    /// A rename without an explicit `mount_base` moves the base to
    /// `<mount_root>/<new name>`.
    ///
    /// # Errors
    ///
    /// Same as [`Item::new`]; `self` is never modified.
    pub fn patched(&self, patch: &ItemPatch, mount_root: &Path) -> Result<Self> {
        let renamed = patch
            .name
            .as_deref()
            .is_some_and(|name| name.trim() != self.name);
        let mount_base = match &patch.mount_base {
            Some(base) => Some(base.clone()),
            None if renamed => None,
            None => Some(self.mount_base.clone()),
        };
        let draft = ItemDraft {
            name: patch.name.clone().unwrap_or_else(|| self.name.clone()),
            label: patch.label.clone().unwrap_or_else(|| self.label.clone()),
            nfs_server: patch
                .nfs_server
                .clone()
                .unwrap_or_else(|| self.nfs_server.clone()),
            nfs_export: patch
                .nfs_export
                .clone()
                .unwrap_or_else(|| self.nfs_export.clone()),
            mount_base,
        };
        Self::new(draft, mount_root)
    }

    /// Re-runs the draft checks on a record that came from disk.
    pub(crate) fn validate(&self) -> Result<()> {
        let _ = validate_name(&self.name)?;
        let _ = require("label", &self.label)?;
        let _ = validate_server(&self.nfs_server)?;
        let _ = require("nfs_export", &self.nfs_export)?;
        let _ = validate_base(&self.mount_base)?;
        Ok(())
    }

    /// Storage name; the key used in the host registry.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// NFS server address.
    #[must_use]
    pub fn nfs_server(&self) -> &str {
        &self.nfs_server
    }

    /// Normalized absolute export path.
    #[must_use]
    pub fn nfs_export(&self) -> &str {
        &self.nfs_export
    }

    /// `server:export` as passed to `mount`.
    #[must_use]
    pub fn nfs_source(&self) -> String {
        format!("{}:{}", self.nfs_server, self.nfs_export)
    }

    /// Directory advertised to the storage registry.
    #[must_use]
    pub fn mount_base(&self) -> &Path {
        &self.mount_base
    }

    /// Directory the export is mounted on, always `<mount_base>/template/iso`.
    #[must_use]
    pub fn mount_target(&self) -> &Path {
        &self.mount_target
    }
}

/// On-disk shape of an item. `mount_target` is written for readers of the
/// file but ignored on load.
#[derive(Serialize, Deserialize)]
struct ItemRecord {
    name: String,
    label: String,
    nfs_server: String,
    nfs_export: String,
    mount_base: PathBuf,
    #[serde(default)]
    mount_target: PathBuf,
}

impl From<ItemRecord> for Item {
    fn from(record: ItemRecord) -> Self {
        let mount_target = derive_mount_target(&record.mount_base);
        if record.mount_target != mount_target {
            tracing::warn!(
                name = %record.name,
                stored = %record.mount_target.display(),
                derived = %mount_target.display(),
                "stored mount target disagrees with mount base; using derived value"
            );
        }
        Self {
            nfs_export: normalize_export(&record.nfs_export),
            name: record.name,
            label: record.label,
            nfs_server: record.nfs_server,
            mount_base: record.mount_base,
            mount_target,
        }
    }
}

impl From<Item> for ItemRecord {
    fn from(item: Item) -> Self {
        Self {
            name: item.name,
            label: item.label,
            nfs_server: item.nfs_server,
            nfs_export: item.nfs_export,
            mount_base: item.mount_base,
            mount_target: item.mount_target,
        }
    }
}

/// A labelled group of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    label: String,
    #[serde(default)]
    items: BTreeMap<u32, Item>,
}

impl Category {
    /// Creates an empty category.
    ///
    /// # Errors
    ///
    /// Returns [`IsoshelfError::InvalidInput`] if the label is empty.
    pub fn new(label: &str) -> Result<Self> {
        Ok(Self {
            label: require("label", label)?,
            items: BTreeMap::new(),
        })
    }

    /// Display label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Items ordered by id.
    pub fn items(&self) -> impl Iterator<Item = (u32, &Item)> {
        self.items.iter().map(|(id, item)| (*id, item))
    }

    /// Looks up an item by id.
    #[must_use]
    pub fn item(&self, id: u32) -> Option<&Item> {
        self.items.get(&id)
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether the category has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let _ = require("label", &self.label)?;
        Ok(())
    }

    pub(crate) fn set_label(&mut self, label: &str) -> Result<()> {
        self.label = require("label", label)?;
        Ok(())
    }

    pub(crate) const fn items_mut(&mut self) -> &mut BTreeMap<u32, Item> {
        &mut self.items
    }
}

/// Reduces an export path to a plain absolute path.
///
/// `\\10.1.1.1\OSimg\X` and `//10.1.1.1/OSimg/X` both become `/OSimg/X`.
/// A path without an embedded server is kept, gaining a leading `/` if it
/// lacks one.
#[must_use]
pub fn normalize_export(input: &str) -> String {
    let unified = input.trim().replace('\\', "/");
    let path = match unified.strip_prefix("//") {
        Some(rest) => rest.find('/').map_or("", |idx| &rest[idx..]),
        None => unified.as_str(),
    };
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Mount target for a mount base.
#[must_use]
pub fn derive_mount_target(mount_base: &Path) -> PathBuf {
    mount_base.join(ISO_SUBDIR)
}

fn require(field: &'static str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(IsoshelfError::invalid(field, "must not be empty"));
    }
    Ok(value.to_string())
}

fn validate_name(raw: &str) -> Result<String> {
    let name = require("name", raw)?;
    let starts_with_letter = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let allowed = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !starts_with_letter || !allowed {
        return Err(IsoshelfError::invalid(
            "name",
            format!("`{name}` must start with a letter and use only letters, digits, '-', '_' or '.'"),
        ));
    }
    Ok(name)
}

fn validate_server(raw: &str) -> Result<String> {
    let server = require("nfs_server", raw)?;
    if server.contains(['/', '\\']) || server.contains(char::is_whitespace) {
        return Err(IsoshelfError::invalid(
            "nfs_server",
            format!("`{server}` must be a bare host name or address"),
        ));
    }
    Ok(server)
}

fn validate_base(base: &Path) -> Result<PathBuf> {
    let raw = require("mount_base", &base.to_string_lossy())?;
    let trimmed = raw.trim_end_matches('/');
    if !raw.starts_with('/') {
        return Err(IsoshelfError::invalid(
            "mount_base",
            format!("`{raw}` must be an absolute path"),
        ));
    }
    Ok(PathBuf::from(if trimmed.is_empty() { "/" } else { trimmed }))
}
