//! In-memory host used by the runtime integration tests.
//!
//! Every fake shares one [`HostState`] and appends to a single event log,
//! so tests can assert on the order of host side effects. The storage
//! registry is the real [`StorageRegistrar`] over a temporary file, wrapped
//! to record calls.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use isoshelf_catalog::{CatalogFile, CatalogStore, Item, ItemDraft};
use isoshelf_common::error::{IsoshelfError, Result};
use isoshelf_common::types::RegistryChange;
use isoshelf_core::filesystem::MountOps;
use isoshelf_core::probe::{HandleProbe, ProcessHolder};
use isoshelf_core::registry::{StorageRegistrar, StorageRegistry};
use isoshelf_core::vm::{VmInventory, VmSummary};
use isoshelf_runtime::controller::Controller;
use isoshelf_runtime::guard::UsageGuard;
use isoshelf_runtime::lifecycle::MountLifecycle;

pub const MOUNT_ROOT: &str = "/mnt/pve";

pub const BASE_REGISTRY: &str = "\
dir: local
\tpath /var/lib/vz
\tcontent iso,vztmpl,backup
";

/// Mutable state of the simulated host.
#[derive(Debug, Default)]
pub struct HostState {
    pub mounted: BTreeSet<PathBuf>,
    pub events: Vec<String>,
    pub fail_mount: bool,
    /// Graceful unmounts fail while the target is mounted.
    pub busy: bool,
    /// Graceful unmounts fail even when nothing is mounted.
    pub fail_graceful_always: bool,
    pub fail_force: bool,
    pub qm_missing: bool,
    pub probe_broken: bool,
    pub vms: BTreeMap<u32, Vec<(String, String)>>,
    pub holders: BTreeMap<PathBuf, Vec<ProcessHolder>>,
    pub locked_vms: BTreeSet<u32>,
    /// Registry writes fail as on a read-only `/etc/pve`.
    pub registry_read_only: bool,
}

pub type Shared = Rc<RefCell<HostState>>;

impl HostState {
    pub fn events_matching(&self, prefix: &str) -> Vec<String> {
        self.events
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events.iter().position(|e| e == event)
    }
}

pub struct FakeMounter(pub Shared);

impl MountOps for FakeMounter {
    fn prepare_target(&self, target: &Path) -> Result<()> {
        self.0
            .borrow_mut()
            .events
            .push(format!("mkdir {}", target.display()));
        Ok(())
    }

    fn mount_readonly(&self, source: &str, target: &Path) -> Result<()> {
        let mut host = self.0.borrow_mut();
        host.events
            .push(format!("mount {source} {}", target.display()));
        if host.fail_mount {
            return Err(IsoshelfError::Command {
                program: "mount".into(),
                message: "mount.nfs: access denied by server".into(),
            });
        }
        let _ = host.mounted.insert(target.to_path_buf());
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        let mut host = self.0.borrow_mut();
        host.events.push(format!("umount {}", target.display()));
        let is_mounted = host.mounted.contains(target);
        if host.fail_graceful_always || (host.busy && is_mounted) {
            return Err(IsoshelfError::Command {
                program: "umount".into(),
                message: "target is busy".into(),
            });
        }
        if !is_mounted {
            return Err(IsoshelfError::Command {
                program: "umount".into(),
                message: "not mounted".into(),
            });
        }
        let _ = host.mounted.remove(target);
        Ok(())
    }

    fn force_unmount(&self, target: &Path) -> Result<()> {
        let mut host = self.0.borrow_mut();
        host.events
            .push(format!("force-umount {}", target.display()));
        if host.fail_force {
            return Err(IsoshelfError::Command {
                program: "umount".into(),
                message: "device or resource busy".into(),
            });
        }
        let _ = host.mounted.remove(target);
        Ok(())
    }

    fn is_mounted(&self, target: &Path) -> Result<bool> {
        Ok(self.0.borrow().mounted.contains(target))
    }
}

pub struct FakeVms(pub Shared);

impl VmInventory for FakeVms {
    fn is_available(&self) -> bool {
        !self.0.borrow().qm_missing
    }

    fn list(&self) -> Result<Vec<VmSummary>> {
        Ok(self
            .0
            .borrow()
            .vms
            .keys()
            .map(|vmid| VmSummary {
                vmid: *vmid,
                name: format!("vm{vmid}"),
                status: "running".into(),
            })
            .collect())
    }

    fn config(&self, vmid: u32) -> Result<Vec<(String, String)>> {
        Ok(self.0.borrow().vms.get(&vmid).cloned().unwrap_or_default())
    }

    fn eject(&self, vmid: u32, device: &str) -> Result<()> {
        let mut host = self.0.borrow_mut();
        host.events.push(format!("eject {vmid} {device}"));
        if host.locked_vms.contains(&vmid) {
            return Err(IsoshelfError::Command {
                program: "qm".into(),
                message: format!("VM {vmid} is locked (backup)"),
            });
        }
        if let Some(config) = host.vms.get_mut(&vmid) {
            for (key, value) in config.iter_mut() {
                if key == device {
                    *value = "none,media=cdrom".into();
                }
            }
        }
        Ok(())
    }
}

pub struct FakeProbe(pub Shared);

impl HandleProbe for FakeProbe {
    fn holders(&self, target: &Path) -> Result<Vec<ProcessHolder>> {
        let host = self.0.borrow();
        if host.probe_broken {
            return Err(IsoshelfError::io(
                "/proc",
                std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            ));
        }
        Ok(host.holders.get(target).cloned().unwrap_or_default())
    }
}

/// Real registrar that also logs each call to the host event list.
pub struct RecordingRegistry {
    inner: StorageRegistrar,
    host: Shared,
}

impl StorageRegistry for RecordingRegistry {
    fn register(&self, name: &str, storage_path: &Path) -> Result<RegistryChange> {
        self.host
            .borrow_mut()
            .events
            .push(format!("register {name}"));
        self.refuse_write()?;
        self.inner.register(name, storage_path)
    }

    fn deregister(&self, name: &str) -> Result<RegistryChange> {
        self.host
            .borrow_mut()
            .events
            .push(format!("deregister {name}"));
        self.refuse_write()?;
        self.inner.deregister(name)
    }

    fn is_registered(&self, name: &str) -> Result<Option<bool>> {
        self.inner.is_registered(name)
    }
}

impl RecordingRegistry {
    fn refuse_write(&self) -> Result<()> {
        if self.host.borrow().registry_read_only {
            return Err(IsoshelfError::io(
                self.inner.path(),
                std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            ));
        }
        Ok(())
    }
}

/// A simulated host plus the temporary files backing the registry and catalog.
pub struct Harness {
    pub host: Shared,
    pub dir: tempfile::TempDir,
}

impl Harness {
    /// Host with a registry file present.
    pub fn new() -> Self {
        let harness = Self::standalone();
        std::fs::write(harness.registry_path(), BASE_REGISTRY).expect("write registry");
        harness
    }

    /// Host without a registry file.
    pub fn standalone() -> Self {
        Self {
            host: Rc::new(RefCell::new(HostState::default())),
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn registry_path(&self) -> PathBuf {
        self.dir.path().join("storage.cfg")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.dir.path().join("catalog.json")
    }

    pub fn registrar(&self) -> StorageRegistrar {
        StorageRegistrar::new(self.registry_path())
    }

    pub fn registry_text(&self) -> String {
        std::fs::read_to_string(self.registry_path()).unwrap_or_default()
    }

    pub fn lifecycle(&self) -> MountLifecycle {
        let guard = UsageGuard::new(
            Box::new(FakeVms(Rc::clone(&self.host))),
            Box::new(FakeProbe(Rc::clone(&self.host))),
        )
        .with_settle_delay(Duration::ZERO);
        MountLifecycle::new(
            Box::new(FakeMounter(Rc::clone(&self.host))),
            Box::new(RecordingRegistry {
                inner: self.registrar(),
                host: Rc::clone(&self.host),
            }),
            guard,
        )
    }

    pub fn controller(&self) -> Controller {
        let file = CatalogFile::new(self.catalog_path());
        let store = file.load(Path::new(MOUNT_ROOT)).expect("load catalog");
        Controller::new(file, store, self.lifecycle())
    }

    pub fn reload_catalog(&self) -> CatalogStore {
        CatalogFile::new(self.catalog_path())
            .load(Path::new(MOUNT_ROOT))
            .expect("reload catalog")
    }

    /// Attaches a CD-ROM drive on `storage` to a VM.
    pub fn attach_cdrom(&self, vmid: u32, device: &str, storage: &str) {
        self.host
            .borrow_mut()
            .vms
            .entry(vmid)
            .or_default()
            .push((device.into(), format!("{storage}:iso/install.iso,media=cdrom")));
    }

    pub fn mark_mounted(&self, item: &Item) {
        let _ = self
            .host
            .borrow_mut()
            .mounted
            .insert(item.mount_target().to_path_buf());
    }

    pub fn is_mounted(&self, item: &Item) -> bool {
        self.host.borrow().mounted.contains(item.mount_target())
    }

    pub fn events(&self) -> Vec<String> {
        self.host.borrow().events.clone()
    }
}

pub fn draft(name: &str) -> ItemDraft {
    ItemDraft {
        name: name.into(),
        label: format!("{name} images"),
        nfs_server: "10.1.1.1".into(),
        nfs_export: format!("\\\\10.1.1.1\\OSimg\\{name}"),
        mount_base: None,
    }
}

pub fn item(name: &str) -> Item {
    Item::new(draft(name), Path::new(MOUNT_ROOT)).expect("valid item")
}
