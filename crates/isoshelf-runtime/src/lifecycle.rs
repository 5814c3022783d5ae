//! Mount and safety-gated unmount of catalog items.
//!
//! The registry always follows the filesystem: an item is registered only
//! after its share is mounted, and deregistered only after it is unmounted.

use isoshelf_catalog::Item;
use isoshelf_common::config::IsoshelfConfig;
use isoshelf_common::error::{IsoshelfError, Result};
use isoshelf_common::types::{ItemStatus, RegistryChange, UnmountDecision, UnmountKind};
use isoshelf_core::filesystem::{MountOps, NfsMounter};
use isoshelf_core::probe::ProcfsProbe;
use isoshelf_core::registry::{StorageRegistrar, StorageRegistry};
use isoshelf_core::vm::QmInventory;

use crate::guard::{RemediationReport, UsageGuard, UsageReport};

/// Outcome of [`MountLifecycle::mount`].
#[derive(Debug)]
pub struct MountReport {
    /// The target was already a mount point; no mount was attempted.
    pub already_mounted: bool,
    /// Outcome of the registry update. A failure here does not undo the mount.
    pub registration: Result<RegistryChange>,
}

/// Outcome of [`MountLifecycle::unmount`] when no step failed.
#[derive(Debug)]
pub enum UnmountOutcome {
    /// The operator declined; mount and registry are unchanged.
    Aborted {
        /// The assessment shown to the operator.
        usage: UsageReport,
    },
    /// The target is no longer mounted.
    Completed(UnmountReport),
}

impl UnmountOutcome {
    /// Returns whether the share is unmounted and its registry entry is gone.
    ///
    /// Only a released item may be dropped from the catalog; otherwise the
    /// registry would keep a block no record can reach.
    #[must_use]
    pub const fn released(&self) -> bool {
        matches!(self, Self::Completed(report) if report.deregistration.is_ok())
    }
}

/// Details of a completed unmount.
#[derive(Debug)]
pub struct UnmountReport {
    /// How the unmount was achieved.
    pub kind: UnmountKind,
    /// Assessment made before unmounting.
    pub usage: UsageReport,
    /// Operator decision, if one was asked for.
    pub decision: Option<UnmountDecision>,
    /// Eject results when the operator chose remediation.
    pub remediation: Option<RemediationReport>,
    /// Outcome of the registry update.
    pub deregistration: Result<RegistryChange>,
    /// Error from the graceful attempt when the fallback path was taken.
    pub graceful_error: Option<String>,
}

/// Drives mounts, unmounts and registry updates for single items.
pub struct MountLifecycle {
    mounter: Box<dyn MountOps>,
    registry: Box<dyn StorageRegistry>,
    guard: UsageGuard,
}

impl MountLifecycle {
    /// Assembles a lifecycle from its host seams.
    #[must_use]
    pub fn new(
        mounter: Box<dyn MountOps>,
        registry: Box<dyn StorageRegistry>,
        guard: UsageGuard,
    ) -> Self {
        Self {
            mounter,
            registry,
            guard,
        }
    }

    /// Builds the host implementation described by `config`.
    #[must_use]
    pub fn from_config(config: &IsoshelfConfig) -> Self {
        let guard = UsageGuard::new(Box::new(QmInventory::new()), Box::new(ProcfsProbe::new()))
            .with_settle_delay(config.eject_settle());
        Self::new(
            Box::new(NfsMounter::new(&config.nfs_options)),
            Box::new(StorageRegistrar::new(&config.storage_cfg)),
            guard,
        )
    }

    /// Mounts `item` read-only and registers it.
    ///
    /// # Errors
    ///
    /// Returns [`IsoshelfError::MountFailed`] if the target cannot be
    /// created or mounted. The registry is not touched in that case.
    pub fn mount(&self, item: &Item) -> Result<MountReport> {
        let target = item.mount_target();
        let already_mounted = self.mounter.is_mounted(target).unwrap_or_else(|e| {
            tracing::warn!(name = item.name(), error = %e, "mount table unreadable; attempting mount");
            false
        });

        if already_mounted {
            tracing::info!(name = item.name(), mount_point = %target.display(), "already mounted");
        } else {
            let failed = |e: IsoshelfError| IsoshelfError::MountFailed {
                name: item.name().to_string(),
                target: target.to_path_buf(),
                reason: e.to_string(),
            };
            self.mounter.prepare_target(target).map_err(failed)?;
            self.mounter
                .mount_readonly(&item.nfs_source(), target)
                .map_err(failed)?;
        }

        let registration = self.registry.register(item.name(), item.mount_base());
        if let Err(e) = &registration {
            tracing::error!(name = item.name(), error = %e, "registration failed; share stays mounted");
        }
        Ok(MountReport {
            already_mounted,
            registration,
        })
    }

    /// Unmounts `item` and deregisters it.
    ///
    /// `decide` is called only when the guard finds the mount in use.
    ///
    /// # Errors
    ///
    /// Returns [`IsoshelfError::UnmountFailed`] if both the graceful and the
    /// forced unmount fail. The registry is not touched in that case.
    pub fn unmount<D>(&self, item: &Item, decide: D) -> Result<UnmountOutcome>
    where
        D: FnOnce(&UsageReport) -> UnmountDecision,
    {
        let name = item.name();
        let target = item.mount_target();
        let usage = self.guard.assess(target, name);

        let mut decision = None;
        let mut remediation = None;
        if usage.in_use() {
            let chosen = decide(&usage);
            tracing::info!(name, decision = %chosen, "operator decision");
            decision = Some(chosen);
            match chosen {
                UnmountDecision::Abort => return Ok(UnmountOutcome::Aborted { usage }),
                UnmountDecision::RemediateAndProceed => {
                    remediation = Some(self.guard.remediate(&usage, name));
                }
                UnmountDecision::ForceProceed => {}
            }
        }

        let (kind, graceful_error) = match self.mounter.unmount(target) {
            Ok(()) => (UnmountKind::Clean, None),
            Err(graceful) => {
                tracing::warn!(name, error = %graceful, "graceful unmount failed");
                let still_mounted = self.mounter.is_mounted(target).unwrap_or_else(|e| {
                    tracing::warn!(name, error = %e, "mount table unreadable; assuming still mounted");
                    true
                });
                if still_mounted {
                    self.mounter.force_unmount(target).map_err(|forced| {
                        IsoshelfError::UnmountFailed {
                            name: name.to_string(),
                            target: target.to_path_buf(),
                            graceful: graceful.to_string(),
                            forced: forced.to_string(),
                        }
                    })?;
                    (UnmountKind::Forced, Some(graceful.to_string()))
                } else {
                    (UnmountKind::AlreadyUnmounted, Some(graceful.to_string()))
                }
            }
        };
        tracing::info!(name, kind = %kind, "unmount finished");

        let deregistration = self.registry.deregister(name);
        if let Err(e) = &deregistration {
            tracing::error!(name, error = %e, "deregistration failed");
        }
        Ok(UnmountOutcome::Completed(UnmountReport {
            kind,
            usage,
            decision,
            remediation,
            deregistration,
            graceful_error,
        }))
    }

    /// Reports whether `item` is mounted and registered right now.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount table or the registry cannot be read.
    pub fn status(&self, item: &Item) -> Result<ItemStatus> {
        Ok(ItemStatus {
            mounted: self.mounter.is_mounted(item.mount_target())?,
            registered: self.registry.is_registered(item.name())?,
        })
    }
}
