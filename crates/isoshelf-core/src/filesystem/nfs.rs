//! Host implementation of [`MountOps`] for read-only NFS shares.
//!
//! Mounting goes through `mount(8)` so the `mount.nfs` helper negotiates
//! the protocol; unmounting calls `umount2(2)` directly.

use std::path::{Path, PathBuf};

use isoshelf_common::error::{IsoshelfError, Result};

use super::{MountOps, mountinfo};

/// Mounts NFS exports read-only on the local host.
#[derive(Debug, Clone)]
pub struct NfsMounter {
    options: String,
    mountinfo: PathBuf,
}

impl NfsMounter {
    /// Creates a mounter. `extra_options` are appended after `ro`.
    #[must_use]
    pub fn new(extra_options: &str) -> Self {
        Self {
            options: mount_options(extra_options),
            mountinfo: PathBuf::from(isoshelf_common::constants::MOUNTINFO_PATH),
        }
    }

    /// Reads the mount table from another file. Used by tests.
    #[must_use]
    pub fn with_mountinfo(mut self, path: impl Into<PathBuf>) -> Self {
        self.mountinfo = path.into();
        self
    }

    /// The full `-o` option string.
    #[must_use]
    pub fn options(&self) -> &str {
        &self.options
    }
}

impl MountOps for NfsMounter {
    fn prepare_target(&self, target: &Path) -> Result<()> {
        std::fs::create_dir_all(target).map_err(|e| IsoshelfError::io(target, e))
    }

    fn mount_readonly(&self, source: &str, target: &Path) -> Result<()> {
        let target_str = target.to_string_lossy();
        let _ = crate::tool::run(
            "mount",
            &["-t", "nfs", "-o", &self.options, source, &target_str],
        )?;
        tracing::info!(source, mount_point = %target.display(), "nfs share mounted read-only");
        Ok(())
    }

    #[cfg(target_os = "linux")]
    fn unmount(&self, target: &Path) -> Result<()> {
        nix::mount::umount(target).map_err(|e| IsoshelfError::Command {
            program: "umount".into(),
            message: format!("{}: {e}", target.display()),
        })?;
        tracing::info!(mount_point = %target.display(), "unmounted");
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn unmount(&self, target: &Path) -> Result<()> {
        let target_str = target.to_string_lossy();
        let _ = crate::tool::run("umount", &[&target_str])?;
        Ok(())
    }

    #[cfg(target_os = "linux")]
    fn force_unmount(&self, target: &Path) -> Result<()> {
        use nix::mount::MntFlags;

        nix::mount::umount2(target, MntFlags::MNT_FORCE | MntFlags::MNT_DETACH).map_err(|e| {
            IsoshelfError::Command {
                program: "umount".into(),
                message: format!("forced detach of {}: {e}", target.display()),
            }
        })?;
        tracing::warn!(mount_point = %target.display(), "force-unmounted (lazy detach)");
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn force_unmount(&self, target: &Path) -> Result<()> {
        let target_str = target.to_string_lossy();
        let _ = crate::tool::run("umount", &["-f", &target_str])?;
        Ok(())
    }

    fn is_mounted(&self, target: &Path) -> Result<bool> {
        let entries = mountinfo::read(&self.mountinfo)?;
        Ok(mountinfo::find(&entries, target).is_some())
    }
}

/// Builds the `-o` string, always starting with `ro` and dropping any
/// option that would make the mount writable.
fn mount_options(extra: &str) -> String {
    let mut options = vec!["ro"];
    options.extend(
        extra
            .split(',')
            .map(str::trim)
            .filter(|opt| !opt.is_empty() && *opt != "ro" && *opt != "rw"),
    );
    options.join(",")
}
