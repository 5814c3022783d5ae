//! System-wide constants and default paths.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Default base directory for isoshelf data when running as root.
pub const SYSTEM_DATA_DIR: &str = "/var/lib/isoshelf";

/// Returns the data directory: the system location for root or when it
/// already exists, otherwise `$HOME/.isoshelf`.
///
/// Nothing is created here; the catalog writer creates the directory on the
/// first save.
fn resolve_data_dir() -> PathBuf {
    let system = PathBuf::from(SYSTEM_DATA_DIR);
    if system.is_dir() || nix::unistd::Uid::effective().is_root() {
        return system;
    }
    std::env::var_os("HOME").map_or(system, |home| PathBuf::from(home).join(".isoshelf"))
}

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the resolved data directory for this session.
pub fn data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(resolve_data_dir)
}

/// Returns the default catalog file path.
pub fn default_catalog_file() -> PathBuf {
    data_dir().join(CATALOG_FILE_NAME)
}

/// File name of the catalog document inside the data directory.
pub const CATALOG_FILE_NAME: &str = "catalog.json";

/// Proxmox storage registry.
pub const DEFAULT_STORAGE_CFG: &str = "/etc/pve/storage.cfg";

/// Parent directory of default mount bases (`<root>/<name>`).
pub const DEFAULT_MOUNT_ROOT: &str = "/mnt/pve";

/// Subdirectory of a mount base that receives the NFS mount.
pub const ISO_SUBDIR: &str = "template/iso";

/// Registry storage type used for every block written.
pub const REGISTRY_STORAGE_TYPE: &str = "dir";

/// Registry content type advertised for every block written.
pub const REGISTRY_CONTENT: &str = "iso";

/// Extra NFS mount options appended after `ro`.
pub const DEFAULT_NFS_OPTIONS: &str = "soft";

/// Delay after ejecting media before re-checking VMs, in seconds.
pub const DEFAULT_EJECT_SETTLE_SECS: u64 = 3;

/// Tools without which no operation can run.
pub const REQUIRED_TOOLS: &[&str] = &["mount"];

/// Proxmox VM management tool.
pub const QM_BIN: &str = "qm";

/// Root of the process filesystem scanned for open handles.
pub const PROC_ROOT: &str = "/proc";

/// Mount table of the current process.
pub const MOUNTINFO_PATH: &str = "/proc/self/mountinfo";

/// Application name used in CLI output.
pub const APP_NAME: &str = "isoshelf";
