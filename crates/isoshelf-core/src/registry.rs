//! Host storage registry (`storage.cfg`).
//!
//! Each entry is a header line `<type>: <name>` followed by indented
//! property lines and a blank line. Entries written here look like:
//!
//! ```text
//! dir: isos
//! 	path /mnt/pve/isos
//! 	content iso
//!
//! ```
//!
//! When the file does not exist every operation reports
//! [`RegistryChange::Unavailable`] instead of failing, which lets the tool
//! run on a host without a storage registry.

use std::path::{Path, PathBuf};

use isoshelf_common::constants::{REGISTRY_CONTENT, REGISTRY_STORAGE_TYPE};
use isoshelf_common::error::{IsoshelfError, Result};
use isoshelf_common::types::RegistryChange;

/// Named storage entries on the host.
pub trait StorageRegistry {
    /// Adds an entry for `name` unless one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be updated.
    fn register(&self, name: &str, storage_path: &Path) -> Result<RegistryChange>;

    /// Removes the entry for `name` if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be updated.
    fn deregister(&self, name: &str) -> Result<RegistryChange>;

    /// Returns whether an entry exists, `None` if the registry is unavailable.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    fn is_registered(&self, name: &str) -> Result<Option<bool>>;
}

/// Reads and edits the storage registry file.
#[derive(Debug, Clone)]
pub struct StorageRegistrar {
    path: PathBuf,
}

impl StorageRegistrar {
    /// Points at a registry file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the registry file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether the registry file exists.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.path.is_file()
    }

    fn read(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(IsoshelfError::io(&self.path, e)),
        }
    }

    fn write(&self, content: &str) -> Result<()> {
        std::fs::write(&self.path, content).map_err(|e| IsoshelfError::io(&self.path, e))
    }
}

impl StorageRegistry for StorageRegistrar {
    /// Refuses a name already taken by an entry of another storage type.
    fn register(&self, name: &str, storage_path: &Path) -> Result<RegistryChange> {
        let Some(content) = self.read()? else {
            tracing::info!(name, "storage registry unavailable; skipping registration");
            return Ok(RegistryChange::Unavailable);
        };
        if find_header(&content, name).is_some() {
            tracing::info!(name, "storage already registered");
            return Ok(RegistryChange::AlreadyRegistered);
        }
        if let Some(other) = conflicting_header(&content, name) {
            return Err(IsoshelfError::Config {
                message: format!(
                    "storage id `{name}` is already used by `{other}` in {}",
                    self.path.display()
                ),
            });
        }
        self.write(&append_block(&content, name, storage_path))?;
        tracing::info!(name, path = %storage_path.display(), "storage registered");
        Ok(RegistryChange::Registered)
    }

    fn deregister(&self, name: &str) -> Result<RegistryChange> {
        let Some(content) = self.read()? else {
            tracing::info!(name, "storage registry unavailable; skipping deregistration");
            return Ok(RegistryChange::Unavailable);
        };
        let Some(updated) = remove_block(&content, name) else {
            tracing::info!(name, "storage not registered");
            return Ok(RegistryChange::NotRegistered);
        };
        self.write(&updated)?;
        tracing::info!(name, "storage deregistered");
        Ok(RegistryChange::Deregistered)
    }

    fn is_registered(&self, name: &str) -> Result<Option<bool>> {
        Ok(self
            .read()?
            .map(|content| find_header(&content, name).is_some()))
    }
}

fn header(name: &str) -> String {
    format!("{REGISTRY_STORAGE_TYPE}: {name}")
}

/// Index of the line that is exactly our header for `name`.
fn find_header(content: &str, name: &str) -> Option<usize> {
    let header = header(name);
    content.lines().position(|line| line.trim_end() == header)
}

/// A header of another storage type that uses the same id.
fn conflicting_header<'a>(content: &'a str, name: &str) -> Option<&'a str> {
    content.lines().map(str::trim_end).find(|line| {
        !line.starts_with(char::is_whitespace)
            && line
                .split_once(": ")
                .is_some_and(|(kind, id)| id.trim() == name && kind != REGISTRY_STORAGE_TYPE)
    })
}

/// Appends a block, separated from existing content by one blank line.
fn append_block(content: &str, name: &str, storage_path: &Path) -> String {
    let mut out = content.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    if !out.is_empty() && !out.ends_with("\n\n") {
        out.push('\n');
    }
    out.push_str(&format!(
        "{}\n\tpath {}\n\tcontent {REGISTRY_CONTENT}\n\n",
        header(name),
        storage_path.display()
    ));
    out
}

/// Removes the header line for `name` and the lines after it up to the next
/// blank line. Returns `None` if there is no such header.
fn remove_block(content: &str, name: &str) -> Option<String> {
    let start = find_header(content, name)?;
    let lines: Vec<&str> = content.lines().collect();
    let mut end = lines[start..]
        .iter()
        .position(|line| line.trim().is_empty())
        .map_or(lines.len(), |offset| start + offset);

    // Keep a single separator where the block used to be.
    let blank_before = start == 0 || lines[start - 1].trim().is_empty();
    if blank_before && end < lines.len() {
        end += 1;
    }

    let kept: Vec<&str> = lines[..start].iter().chain(&lines[end..]).copied().collect();
    let mut out = kept.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXISTING: &str = "\
dir: local
\tpath /var/lib/vz
\tcontent iso,vztmpl,backup

lvmthin: local-lvm
\tthinpool data
\tvgname pve
\tcontent rootdir,images
";

    fn registrar_with(content: Option<&str>) -> (tempfile::TempDir, StorageRegistrar) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("storage.cfg");
        if let Some(content) = content {
            std::fs::write(&path, content).expect("write");
        }
        (dir, StorageRegistrar::new(path))
    }

    fn contents(registrar: &StorageRegistrar) -> String {
        std::fs::read_to_string(registrar.path()).expect("read")
    }

    #[test]
    fn register_appends_block_after_blank_line() {
        let (_dir, registrar) = registrar_with(Some(EXISTING));
        let change = registrar
            .register("isos", Path::new("/mnt/pve/isos"))
            .expect("register");
        assert_eq!(change, RegistryChange::Registered);
        assert_eq!(
            contents(&registrar),
            format!("{EXISTING}\ndir: isos\n\tpath /mnt/pve/isos\n\tcontent iso\n\n")
        );
    }

    #[test]
    fn register_twice_writes_one_block() {
        let (_dir, registrar) = registrar_with(Some(EXISTING));
        let base = Path::new("/mnt/pve/isos");
        assert_eq!(registrar.register("isos", base).expect("first"), RegistryChange::Registered);
        assert_eq!(
            registrar.register("isos", base).expect("second"),
            RegistryChange::AlreadyRegistered
        );
        assert_eq!(contents(&registrar).matches("dir: isos\n").count(), 1);
    }

    #[test]
    fn register_prefix_name_is_distinct() {
        let (_dir, registrar) = registrar_with(Some(EXISTING));
        let _ = registrar
            .register("isos-old", Path::new("/mnt/pve/isos-old"))
            .expect("register");
        assert_eq!(
            registrar.register("isos", Path::new("/mnt/pve/isos")).expect("register"),
            RegistryChange::Registered
        );
        assert_eq!(registrar.is_registered("isos").expect("read"), Some(true));
    }

    #[test]
    fn register_rejects_id_of_other_storage_type() {
        let (_dir, registrar) = registrar_with(Some(EXISTING));
        let err = registrar
            .register("local-lvm", Path::new("/mnt/pve/local-lvm"))
            .unwrap_err();
        assert!(matches!(err, IsoshelfError::Config { .. }));
        assert_eq!(contents(&registrar), EXISTING);
    }

    #[test]
    fn deregister_restores_original_content() {
        let (_dir, registrar) = registrar_with(Some(EXISTING));
        let _ = registrar
            .register("isos", Path::new("/mnt/pve/isos"))
            .expect("register");
        assert_eq!(registrar.deregister("isos").expect("deregister"), RegistryChange::Deregistered);
        let after = contents(&registrar);
        assert!(!after.contains("dir: isos"));
        assert!(after.starts_with(EXISTING));
        assert_eq!(after.trim_end(), EXISTING.trim_end());
    }

    #[test]
    fn deregister_middle_block_keeps_neighbours() {
        let content = "\
dir: first
\tpath /a
\tcontent iso

dir: middle
\tpath /b
\tcontent iso

dir: last
\tpath /c
\tcontent iso
";
        let updated = remove_block(content, "middle").expect("found");
        assert_eq!(
            updated,
            "dir: first\n\tpath /a\n\tcontent iso\n\ndir: last\n\tpath /c\n\tcontent iso\n"
        );
    }

    #[test]
    fn deregister_absent_name_is_not_registered() {
        let (_dir, registrar) = registrar_with(Some(EXISTING));
        assert_eq!(registrar.deregister("isos").expect("deregister"), RegistryChange::NotRegistered);
        assert_eq!(contents(&registrar), EXISTING);
    }

    #[test]
    fn deregister_leaves_other_types_alone() {
        let (_dir, registrar) = registrar_with(Some(EXISTING));
        assert_eq!(
            registrar.deregister("local-lvm").expect("deregister"),
            RegistryChange::NotRegistered
        );
    }

    #[test]
    fn repeated_cycles_do_not_grow_the_file() {
        let (_dir, registrar) = registrar_with(Some(EXISTING));
        let base = Path::new("/mnt/pve/isos");
        let _ = registrar.register("isos", base).expect("register");
        let _ = registrar.deregister("isos").expect("deregister");
        let once = contents(&registrar);
        let _ = registrar.register("isos", base).expect("register");
        let _ = registrar.deregister("isos").expect("deregister");
        assert_eq!(contents(&registrar), once);
    }

    #[test]
    fn missing_registry_is_unavailable() {
        let (_dir, registrar) = registrar_with(None);
        assert!(!registrar.is_available());
        assert_eq!(
            registrar.register("isos", Path::new("/mnt/pve/isos")).expect("register"),
            RegistryChange::Unavailable
        );
        assert_eq!(registrar.deregister("isos").expect("deregister"), RegistryChange::Unavailable);
        assert_eq!(registrar.is_registered("isos").expect("read"), None);
        assert!(!registrar.path().exists());
    }

    #[test]
    fn empty_registry_gets_block_without_leading_blank() {
        let (_dir, registrar) = registrar_with(Some(""));
        let _ = registrar
            .register("isos", Path::new("/mnt/pve/isos"))
            .expect("register");
        assert_eq!(
            contents(&registrar),
            "dir: isos\n\tpath /mnt/pve/isos\n\tcontent iso\n\n"
        );
    }
}
