//! Virtual machine inventory.
//!
//! The usage guard asks which VMs have a drive whose volume lives on a
//! given storage (`ide2: isos:iso/debian.iso,media=cdrom`) and, during
//! remediation, swaps those drives for an empty CD-ROM.

use isoshelf_common::constants::QM_BIN;
use isoshelf_common::error::{IsoshelfError, Result};

/// A VM known to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmSummary {
    /// Numeric VM id.
    pub vmid: u32,
    /// VM name, possibly empty.
    pub name: String,
    /// Power state as reported by the host.
    pub status: String,
}

/// Access to the host's VM configurations.
pub trait VmInventory {
    /// Returns whether the inventory tooling exists on this host.
    fn is_available(&self) -> bool;

    /// Lists all VMs.
    ///
    /// # Errors
    ///
    /// Returns an error if the inventory cannot be queried.
    fn list(&self) -> Result<Vec<VmSummary>>;

    /// Returns a VM's configuration as `(key, value)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read.
    fn config(&self, vmid: u32) -> Result<Vec<(String, String)>>;

    /// Replaces the medium in `device` with an empty CD-ROM.
    ///
    /// # Errors
    ///
    /// Returns an error if the host rejects the change.
    fn eject(&self, vmid: u32, device: &str) -> Result<()>;
}

/// Returns the drive keys of `config` whose volume is on `storage`.
#[must_use]
pub fn referencing_devices(config: &[(String, String)], storage: &str) -> Vec<String> {
    let prefix = format!("{storage}:");
    config
        .iter()
        .filter(|(key, value)| {
            is_drive_key(key) && value.split(',').next().is_some_and(|vol| vol.trim().starts_with(&prefix))
        })
        .map(|(key, _)| key.clone())
        .collect()
}

/// `ide0`, `sata3`, `scsi12`, `virtio1` and the like.
fn is_drive_key(key: &str) -> bool {
    ["ide", "sata", "scsi", "virtio"].iter().any(|bus| {
        key.strip_prefix(bus)
            .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
    })
}

/// Proxmox inventory through the `qm` tool.
#[derive(Debug, Clone)]
pub struct QmInventory {
    program: String,
}

impl QmInventory {
    /// Uses `qm` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: QM_BIN.to_string(),
        }
    }
}

impl Default for QmInventory {
    fn default() -> Self {
        Self::new()
    }
}

impl VmInventory for QmInventory {
    fn is_available(&self) -> bool {
        crate::tool::is_available(&self.program)
    }

    fn list(&self) -> Result<Vec<VmSummary>> {
        let output = crate::tool::run(&self.program, &["list"])?;
        Ok(parse_list(&output))
    }

    fn config(&self, vmid: u32) -> Result<Vec<(String, String)>> {
        let output = crate::tool::run(&self.program, &["config", &vmid.to_string()])?;
        Ok(parse_config(&output))
    }

    fn eject(&self, vmid: u32, device: &str) -> Result<()> {
        if !is_drive_key(device) {
            return Err(IsoshelfError::invalid(
                "device",
                format!("`{device}` is not a drive key"),
            ));
        }
        let flag = format!("--{device}");
        let _ = crate::tool::run(
            &self.program,
            &["set", &vmid.to_string(), &flag, "none,media=cdrom"],
        )?;
        tracing::info!(vmid, device, "media ejected");
        Ok(())
    }
}

/// Parses `qm list`: a header row, then `VMID NAME STATUS ...` rows.
fn parse_list(output: &str) -> Vec<VmSummary> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let vmid = fields.next()?.parse().ok()?;
            let name = fields.next().unwrap_or_default().to_string();
            let status = fields.next().unwrap_or_default().to_string();
            Some(VmSummary { vmid, name, status })
        })
        .collect()
}

/// Parses `qm config`: one `key: value` per line. Snapshot sections start
/// with `[name]` and are ignored.
fn parse_config(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .take_while(|line| !line.starts_with('['))
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
