//! Domain primitive types used across the isoshelf workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Address of a record in the catalog tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogPath {
    /// A category by id.
    Category(u32),
    /// An item by category id and item id.
    Item(u32, u32),
}

impl fmt::Display for CatalogPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category(cat) => write!(f, "{cat}"),
            Self::Item(cat, item) => write!(f, "{cat}/{item}"),
        }
    }
}

/// Verdict of the usage guard on whether unmounting is currently safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskClass {
    /// No consumer was detected.
    Clear,
    /// At least one VM or process is using the mount.
    InUse,
}

impl fmt::Display for RiskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clear => write!(f, "clear"),
            Self::InUse => write!(f, "in use"),
        }
    }
}

/// Operator decision requested when an unmount target is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnmountDecision {
    /// Stop; leave the mount and the registry untouched.
    Abort,
    /// Eject the storage's media from every implicated VM, then unmount.
    RemediateAndProceed,
    /// Unmount without ejecting anything.
    ForceProceed,
}

impl UnmountDecision {
    /// Maps free-form operator input to a decision.
    ///
    /// Accepts the menu numbers `1`/`2`/`3` as well as words. Anything
    /// unrecognized, including empty input, is [`UnmountDecision::Abort`].
    #[must_use]
    pub fn from_operator_input(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "2" | "e" | "eject" | "r" | "remediate" => Self::RemediateAndProceed,
            "3" | "f" | "force" => Self::ForceProceed,
            _ => Self::Abort,
        }
    }
}

impl fmt::Display for UnmountDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::RemediateAndProceed => write!(f, "eject and proceed"),
            Self::ForceProceed => write!(f, "force"),
        }
    }
}

/// Result of a storage registry operation that did not fail.
///
/// Only `Registered` and `Deregistered` mean the file was changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistryChange {
    /// A new block was appended.
    Registered,
    /// A block with this name already existed; nothing was written.
    AlreadyRegistered,
    /// The block was removed.
    Deregistered,
    /// No block with this name existed; nothing was written.
    NotRegistered,
    /// The registry file is not present on this host (standalone mode).
    Unavailable,
}

impl RegistryChange {
    /// Returns whether the registry file was modified.
    #[must_use]
    pub const fn modified(self) -> bool {
        matches!(self, Self::Registered | Self::Deregistered)
    }
}

impl fmt::Display for RegistryChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered => write!(f, "registered"),
            Self::AlreadyRegistered => write!(f, "already registered, skipped"),
            Self::Deregistered => write!(f, "deregistered"),
            Self::NotRegistered => write!(f, "not registered, skipped"),
            Self::Unavailable => write!(f, "storage registry unavailable (standalone mode)"),
        }
    }
}

/// How a successful unmount was achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnmountKind {
    /// The graceful unmount succeeded.
    Clean,
    /// The graceful unmount failed and the lazy/forced fallback succeeded.
    Forced,
    /// The target was not mounted; nothing had to be unmounted.
    AlreadyUnmounted,
}

impl fmt::Display for UnmountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "unmounted"),
            Self::Forced => write!(f, "force-unmounted"),
            Self::AlreadyUnmounted => write!(f, "was not mounted"),
        }
    }
}

/// Live state of an item, derived from the host at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStatus {
    /// Whether the mount target is currently a mount point.
    pub mounted: bool,
    /// Whether the registry holds a block for the item, `None` in standalone mode.
    pub registered: Option<bool>,
}

impl ItemStatus {
    /// Returns whether the mount and registry facts disagree.
    #[must_use]
    pub const fn diverged(&self) -> bool {
        matches!(
            (self.mounted, self.registered),
            (true, Some(false)) | (false, Some(true))
        )
    }
}
