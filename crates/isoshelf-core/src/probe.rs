//! Open-handle probing.
//!
//! A process keeps a mount busy if its working directory, root, executable
//! or any open file descriptor resolves to a path under the mount.

use std::fs;
use std::path::{Path, PathBuf};

use isoshelf_common::constants::PROC_ROOT;
use isoshelf_common::error::{IsoshelfError, Result};

/// A process holding something open under a mount target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHolder {
    /// Process id.
    pub pid: u32,
    /// Command name from `comm`, or `?` if unreadable.
    pub command: String,
}

/// Finds processes using a path.
pub trait HandleProbe {
    /// Returns the processes holding `target` or anything below it open.
    ///
    /// # Errors
    ///
    /// Returns an error if process introspection is not possible on this host.
    fn holders(&self, target: &Path) -> Result<Vec<ProcessHolder>>;
}

/// [`HandleProbe`] backed by the `/proc` filesystem.
///
/// Processes that exit mid-scan or whose links are unreadable are skipped,
/// so without root the result only covers the caller's own processes.
#[derive(Debug, Clone)]
pub struct ProcfsProbe {
    root: PathBuf,
}

impl ProcfsProbe {
    /// Scans the host's `/proc`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(PROC_ROOT)
    }

    /// Scans another proc-like tree. Used by tests.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn process_links(&self, pid_dir: &Path) -> Vec<PathBuf> {
        let mut links: Vec<PathBuf> = ["cwd", "root", "exe"]
            .iter()
            .filter_map(|name| fs::read_link(pid_dir.join(name)).ok())
            .collect();
        if let Ok(fds) = fs::read_dir(pid_dir.join("fd")) {
            links.extend(
                fds.filter_map(std::result::Result::ok)
                    .filter_map(|fd| fs::read_link(fd.path()).ok()),
            );
        }
        links
    }
}

impl Default for ProcfsProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleProbe for ProcfsProbe {
    fn holders(&self, target: &Path) -> Result<Vec<ProcessHolder>> {
        let entries = fs::read_dir(&self.root).map_err(|e| IsoshelfError::io(&self.root, e))?;
        let mut holders: Vec<ProcessHolder> = entries
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| {
                let pid: u32 = entry.file_name().to_str()?.parse().ok()?;
                let pid_dir = entry.path();
                let busy = self
                    .process_links(&pid_dir)
                    .iter()
                    .any(|link| link.starts_with(target));
                busy.then(|| ProcessHolder {
                    pid,
                    command: fs::read_to_string(pid_dir.join("comm"))
                        .map_or_else(|_| "?".to_string(), |c| c.trim().to_string()),
                })
            })
            .collect();
        holders.sort_by_key(|h| h.pid);
        tracing::debug!(mount_point = %target.display(), count = holders.len(), "handle probe finished");
        Ok(holders)
    }
}
