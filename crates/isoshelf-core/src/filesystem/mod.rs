//! Filesystem operations on mount targets.
//!
//! [`MountOps`] is the seam between the lifecycle and the host: the
//! lifecycle never calls `mount`/`umount` directly.

pub mod mountinfo;
pub mod nfs;

use std::path::Path;

use isoshelf_common::error::Result;

pub use nfs::NfsMounter;

/// Mount and unmount operations against one mount target.
pub trait MountOps {
    /// Creates the mount target directory and its parents.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    fn prepare_target(&self, target: &Path) -> Result<()>;

    /// Mounts `source` (`server:/export`) read-only at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount does not succeed.
    fn mount_readonly(&self, source: &str, target: &Path) -> Result<()>;

    /// Unmounts `target` normally.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel refuses, e.g. because the target is busy
    /// or not mounted.
    fn unmount(&self, target: &Path) -> Result<()>;

    /// Forcibly and lazily detaches `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if even the detach fails.
    fn force_unmount(&self, target: &Path) -> Result<()>;

    /// Returns whether `target` is currently a mount point.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount table cannot be read.
    fn is_mounted(&self, target: &Path) -> Result<bool>;
}
