//! Usage detection and media-eject remediation.
//!
//! Two independent signals feed the verdict: VMs whose drives reference the
//! storage, and processes with open handles under the mount target. A
//! signal that cannot be evaluated counts as "no evidence" and is noted in
//! [`UsageReport::degraded`]; the guard itself never fails.

use std::path::Path;
use std::time::Duration;

use isoshelf_common::error::Result;
use isoshelf_common::types::RiskClass;
use isoshelf_core::probe::{HandleProbe, ProcessHolder};
use isoshelf_core::vm::{self, VmInventory};

/// A VM with drives on the storage being unmounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmUsage {
    /// VM id.
    pub vmid: u32,
    /// VM name.
    pub name: String,
    /// Drive keys referencing the storage, e.g. `ide2`.
    pub devices: Vec<String>,
}

/// Outcome of [`UsageGuard::assess`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageReport {
    /// Overall verdict.
    pub risk: RiskClass,
    /// VMs referencing the storage.
    pub vms: Vec<VmUsage>,
    /// Processes holding the mount target open.
    pub processes: Vec<ProcessHolder>,
    /// Signals that could not be evaluated, for display.
    pub degraded: Vec<String>,
}

impl UsageReport {
    fn new(vms: Vec<VmUsage>, processes: Vec<ProcessHolder>, degraded: Vec<String>) -> Self {
        let risk = if vms.is_empty() && processes.is_empty() {
            RiskClass::Clear
        } else {
            RiskClass::InUse
        };
        Self {
            risk,
            vms,
            processes,
            degraded,
        }
    }

    /// Returns whether any consumer was found.
    #[must_use]
    pub fn in_use(&self) -> bool {
        self.risk == RiskClass::InUse
    }
}

/// A drive that could not be ejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EjectFailure {
    /// VM id.
    pub vmid: u32,
    /// Drive key.
    pub device: String,
    /// Error reported by the host.
    pub reason: String,
}

/// Outcome of [`UsageGuard::remediate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemediationReport {
    /// `(vmid, device)` pairs ejected successfully.
    pub ejected: Vec<(u32, String)>,
    /// Drives that could not be ejected.
    pub failures: Vec<EjectFailure>,
    /// VMs still referencing the storage after the settle delay.
    pub still_referencing: Vec<VmUsage>,
}

/// Determines whether a mount has consumers and detaches VM media.
pub struct UsageGuard {
    vms: Box<dyn VmInventory>,
    probe: Box<dyn HandleProbe>,
    settle: Duration,
}

impl UsageGuard {
    /// Creates a guard with the default settle delay.
    #[must_use]
    pub fn new(vms: Box<dyn VmInventory>, probe: Box<dyn HandleProbe>) -> Self {
        Self {
            vms,
            probe,
            settle: Duration::from_secs(isoshelf_common::constants::DEFAULT_EJECT_SETTLE_SECS),
        }
    }

    /// Sets the pause between ejecting media and re-checking VMs.
    #[must_use]
    pub const fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Classifies the risk of unmounting `target`, registered as `storage`.
    pub fn assess(&self, target: &Path, storage: &str) -> UsageReport {
        let mut degraded = Vec::new();

        let vms = self.vm_usage(storage).unwrap_or_else(|e| {
            tracing::warn!(storage, error = %e, "VM check unavailable; assuming no VM uses the storage");
            degraded.push(format!("VM check skipped: {e}"));
            Vec::new()
        });

        let processes = self.probe.holders(target).unwrap_or_else(|e| {
            tracing::warn!(mount_point = %target.display(), error = %e, "open-handle check unavailable");
            degraded.push(format!("open-handle check skipped: {e}"));
            Vec::new()
        });

        let report = UsageReport::new(vms, processes, degraded);
        tracing::info!(
            storage,
            risk = %report.risk,
            vms = report.vms.len(),
            processes = report.processes.len(),
            "usage assessed"
        );
        report
    }

    /// Ejects every drive listed in `report`, waits for the settle delay,
    /// and re-checks which VMs still reference `storage`.
    ///
    /// Each eject is attempted regardless of earlier failures.
    pub fn remediate(&self, report: &UsageReport, storage: &str) -> RemediationReport {
        let mut outcome = RemediationReport::default();
        for usage in &report.vms {
            for device in &usage.devices {
                match self.vms.eject(usage.vmid, device) {
                    Ok(()) => outcome.ejected.push((usage.vmid, device.clone())),
                    Err(e) => {
                        tracing::error!(vmid = usage.vmid, device, error = %e, "eject failed");
                        outcome.failures.push(EjectFailure {
                            vmid: usage.vmid,
                            device: device.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        std::thread::sleep(self.settle);

        outcome.still_referencing = self.vm_usage(storage).unwrap_or_else(|e| {
            tracing::warn!(storage, error = %e, "post-eject VM check unavailable");
            Vec::new()
        });
        for usage in &outcome.still_referencing {
            tracing::warn!(vmid = usage.vmid, devices = ?usage.devices, "VM still references storage");
        }
        outcome
    }

    fn vm_usage(&self, storage: &str) -> Result<Vec<VmUsage>> {
        if !self.vms.is_available() {
            return Err(isoshelf_common::error::IsoshelfError::ToolMissing {
                tool: isoshelf_common::constants::QM_BIN.into(),
            });
        }
        let mut usages = Vec::new();
        for summary in self.vms.list()? {
            let config = match self.vms.config(summary.vmid) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(vmid = summary.vmid, error = %e, "skipping VM with unreadable config");
                    continue;
                }
            };
            let devices = vm::referencing_devices(&config, storage);
            if !devices.is_empty() {
                usages.push(VmUsage {
                    vmid: summary.vmid,
                    name: summary.name,
                    devices,
                });
            }
        }
        Ok(usages)
    }
}
