//! Mount and unmount sequences against a simulated host.
//!
//! Covers the safety gate, the unmount fallback ladder and degraded
//! (standalone) operation.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

mod support;

use isoshelf_common::error::IsoshelfError;
use isoshelf_common::types::{RegistryChange, RiskClass, UnmountDecision, UnmountKind};
use isoshelf_core::probe::ProcessHolder;
use isoshelf_runtime::lifecycle::{UnmountOutcome, UnmountReport};
use support::{BASE_REGISTRY, Harness, item};

fn completed(outcome: UnmountOutcome) -> UnmountReport {
    match outcome {
        UnmountOutcome::Completed(report) => report,
        UnmountOutcome::Aborted { .. } => panic!("unexpected abort"),
    }
}

fn never_asked(_: &isoshelf_runtime::guard::UsageReport) -> UnmountDecision {
    panic!("operator must not be asked when nothing uses the mount")
}

// ── Mount ────────────────────────────────────────────────────────────

#[test]
fn mount_registers_after_mounting() {
    let harness = Harness::new();
    let isos = item("isos");

    let report = harness.lifecycle().mount(&isos).expect("mount");
    assert!(!report.already_mounted);
    assert_eq!(report.registration.expect("registration"), RegistryChange::Registered);

    assert_eq!(
        harness.events(),
        vec![
            "mkdir /mnt/pve/isos/template/iso".to_string(),
            "mount 10.1.1.1:/OSimg/isos /mnt/pve/isos/template/iso".to_string(),
            "register isos".to_string(),
        ]
    );
    assert!(
        harness
            .registry_text()
            .contains("dir: isos\n\tpath /mnt/pve/isos\n\tcontent iso\n")
    );
}

#[test]
fn mount_failure_leaves_registry_untouched() {
    let harness = Harness::new();
    harness.host.borrow_mut().fail_mount = true;
    let isos = item("isos");

    let err = harness.lifecycle().mount(&isos).unwrap_err();
    assert!(matches!(err, IsoshelfError::MountFailed { ref name, .. } if name == "isos"));
    assert!(harness.host.borrow().events_matching("register").is_empty());
    assert_eq!(harness.registry_text(), BASE_REGISTRY);
    assert!(!harness.is_mounted(&isos));
}

#[test]
fn mounting_twice_keeps_one_registry_block() {
    let harness = Harness::new();
    let isos = item("isos");
    let lifecycle = harness.lifecycle();

    let _ = lifecycle.mount(&isos).expect("first mount");
    let second = lifecycle.mount(&isos).expect("second mount");

    assert!(second.already_mounted);
    assert_eq!(
        second.registration.expect("registration"),
        RegistryChange::AlreadyRegistered
    );
    assert_eq!(harness.host.borrow().events_matching("mount ").len(), 1);
    assert_eq!(harness.registry_text().matches("dir: isos\n").count(), 1);
}

#[test]
fn registration_failure_keeps_the_mount() {
    let harness = Harness::new();
    harness.host.borrow_mut().registry_read_only = true;
    let isos = item("isos");

    let report = harness.lifecycle().mount(&isos).expect("mount still succeeds");

    assert!(matches!(report.registration, Err(IsoshelfError::Io { .. })));
    assert!(harness.is_mounted(&isos));
    assert!(harness.host.borrow().events_matching("umount").is_empty());
    assert!(harness.host.borrow().events_matching("force-umount").is_empty());
    assert_eq!(harness.registry_text(), BASE_REGISTRY);
}

// ── Safety gate ──────────────────────────────────────────────────────

#[test]
fn clear_unmount_is_clean_and_deregisters() {
    let harness = Harness::new();
    let isos = item("isos");
    let lifecycle = harness.lifecycle();
    let _ = lifecycle.mount(&isos).expect("mount");

    let report = completed(lifecycle.unmount(&isos, never_asked).expect("unmount"));

    assert_eq!(report.kind, UnmountKind::Clean);
    assert_eq!(report.usage.risk, RiskClass::Clear);
    assert!(report.decision.is_none());
    assert_eq!(report.deregistration.expect("deregistration"), RegistryChange::Deregistered);
    assert!(!harness.is_mounted(&isos));
    assert_eq!(harness.registry_text().trim_end(), BASE_REGISTRY.trim_end());
}

#[test]
fn abort_keeps_mount_and_registry() {
    let harness = Harness::new();
    let isos = item("isos");
    let lifecycle = harness.lifecycle();
    let _ = lifecycle.mount(&isos).expect("mount");
    harness.attach_cdrom(100, "ide2", "isos");
    let registry_before = harness.registry_text();

    let outcome = lifecycle
        .unmount(&isos, |usage| {
            assert_eq!(usage.vms.len(), 1);
            assert_eq!(usage.vms[0].devices, vec!["ide2".to_string()]);
            UnmountDecision::Abort
        })
        .expect("unmount");

    assert!(matches!(outcome, UnmountOutcome::Aborted { .. }));
    assert!(harness.is_mounted(&isos));
    assert_eq!(harness.registry_text(), registry_before);
    let host = harness.host.borrow();
    assert!(host.events_matching("umount").is_empty());
    assert!(host.events_matching("eject").is_empty());
    assert!(host.events_matching("deregister").is_empty());
}

#[test]
fn unrecognized_operator_input_aborts() {
    let harness = Harness::new();
    let isos = item("isos");
    let lifecycle = harness.lifecycle();
    let _ = lifecycle.mount(&isos).expect("mount");
    harness.attach_cdrom(100, "ide2", "isos");

    let outcome = lifecycle
        .unmount(&isos, |_| UnmountDecision::from_operator_input("yes please"))
        .expect("unmount");

    assert!(matches!(outcome, UnmountOutcome::Aborted { .. }));
    assert!(harness.is_mounted(&isos));
}

#[test]
fn remediation_ejects_every_device_before_unmounting() {
    let harness = Harness::new();
    let isos = item("isos");
    let lifecycle = harness.lifecycle();
    let _ = lifecycle.mount(&isos).expect("mount");
    harness.attach_cdrom(100, "ide2", "isos");
    harness.attach_cdrom(101, "ide2", "isos");
    harness.attach_cdrom(101, "sata1", "isos");
    harness.attach_cdrom(102, "ide2", "other-store");

    let report = completed(
        lifecycle
            .unmount(&isos, |_| UnmountDecision::RemediateAndProceed)
            .expect("unmount"),
    );

    assert_eq!(report.kind, UnmountKind::Clean);
    assert_eq!(report.decision, Some(UnmountDecision::RemediateAndProceed));
    let remediation = report.remediation.expect("remediation ran");
    assert_eq!(remediation.ejected.len(), 3);
    assert!(remediation.failures.is_empty());
    assert!(remediation.still_referencing.is_empty());

    let host = harness.host.borrow();
    let umount_at = host
        .position("umount /mnt/pve/isos/template/iso")
        .expect("unmounted");
    for eject in ["eject 100 ide2", "eject 101 ide2", "eject 101 sata1"] {
        assert!(host.position(eject).expect(eject) < umount_at);
    }
    assert!(host.position("eject 102 ide2").is_none());
}

#[test]
fn eject_failure_does_not_block_unmount() {
    let harness = Harness::new();
    let isos = item("isos");
    let lifecycle = harness.lifecycle();
    let _ = lifecycle.mount(&isos).expect("mount");
    harness.attach_cdrom(100, "ide2", "isos");
    harness.attach_cdrom(101, "ide2", "isos");
    let _ = harness.host.borrow_mut().locked_vms.insert(100);

    let report = completed(
        lifecycle
            .unmount(&isos, |_| UnmountDecision::RemediateAndProceed)
            .expect("unmount"),
    );

    let remediation = report.remediation.expect("remediation ran");
    assert_eq!(remediation.ejected, vec![(101, "ide2".to_string())]);
    assert_eq!(remediation.failures.len(), 1);
    assert_eq!(remediation.failures[0].vmid, 100);
    assert_eq!(remediation.still_referencing.len(), 1);
    assert_eq!(report.kind, UnmountKind::Clean);
    assert!(!harness.is_mounted(&isos));
}

#[test]
fn force_proceed_ejects_nothing() {
    let harness = Harness::new();
    let isos = item("isos");
    let lifecycle = harness.lifecycle();
    let _ = lifecycle.mount(&isos).expect("mount");
    harness.attach_cdrom(100, "ide2", "isos");

    let report = completed(
        lifecycle
            .unmount(&isos, |_| UnmountDecision::ForceProceed)
            .expect("unmount"),
    );

    assert_eq!(report.decision, Some(UnmountDecision::ForceProceed));
    assert!(report.remediation.is_none());
    assert!(harness.host.borrow().events_matching("eject").is_empty());
    assert!(!harness.is_mounted(&isos));
}

#[test]
fn open_handles_alone_mark_mount_in_use() {
    let harness = Harness::new();
    let isos = item("isos");
    let lifecycle = harness.lifecycle();
    let _ = lifecycle.mount(&isos).expect("mount");
    let _ = harness.host.borrow_mut().holders.insert(
        isos.mount_target().to_path_buf(),
        vec![ProcessHolder {
            pid: 4242,
            command: "rsync".into(),
        }],
    );

    let mut asked = false;
    let outcome = lifecycle
        .unmount(&isos, |usage| {
            asked = true;
            assert!(usage.vms.is_empty());
            assert_eq!(usage.processes[0].pid, 4242);
            UnmountDecision::Abort
        })
        .expect("unmount");

    assert!(asked);
    assert!(matches!(outcome, UnmountOutcome::Aborted { .. }));
}

// ── Fallback ladder ──────────────────────────────────────────────────

#[test]
fn busy_target_is_force_unmounted_and_deregistered_once() {
    let harness = Harness::new();
    let isos = item("isos");
    let lifecycle = harness.lifecycle();
    let _ = lifecycle.mount(&isos).expect("mount");
    harness.host.borrow_mut().busy = true;

    let report = completed(lifecycle.unmount(&isos, never_asked).expect("unmount"));

    assert_eq!(report.kind, UnmountKind::Forced);
    assert!(report.graceful_error.expect("graceful error kept").contains("busy"));
    assert_eq!(report.deregistration.expect("deregistration"), RegistryChange::Deregistered);
    let host = harness.host.borrow();
    assert_eq!(host.events_matching("deregister"), vec!["deregister isos".to_string()]);
    assert!(
        host.position("force-umount /mnt/pve/isos/template/iso").expect("forced")
            < host.position("deregister isos").expect("deregistered")
    );
}

#[test]
fn failed_fallback_leaves_registry_in_place() {
    let harness = Harness::new();
    let isos = item("isos");
    let lifecycle = harness.lifecycle();
    let _ = lifecycle.mount(&isos).expect("mount");
    {
        let mut host = harness.host.borrow_mut();
        host.busy = true;
        host.fail_force = true;
    }

    let err = lifecycle.unmount(&isos, never_asked).unwrap_err();

    match err {
        IsoshelfError::UnmountFailed {
            name,
            graceful,
            forced,
            ..
        } => {
            assert_eq!(name, "isos");
            assert!(graceful.contains("busy"));
            assert!(forced.contains("resource busy"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(harness.is_mounted(&isos));
    assert!(harness.registry_text().contains("dir: isos\n"));
    assert!(harness.host.borrow().events_matching("deregister").is_empty());
}

#[test]
fn unmounting_an_unmounted_item_is_a_no_op() {
    let harness = Harness::new();
    let isos = item("isos");

    let report = completed(harness.lifecycle().unmount(&isos, never_asked).expect("unmount"));

    assert_eq!(report.kind, UnmountKind::AlreadyUnmounted);
    assert_eq!(
        report.deregistration.expect("deregistration"),
        RegistryChange::NotRegistered
    );
    assert!(harness.host.borrow().events_matching("force-umount").is_empty());
}

// ── Degraded mode ────────────────────────────────────────────────────

#[test]
fn standalone_host_still_mounts_and_unmounts() {
    let harness = Harness::standalone();
    {
        let mut host = harness.host.borrow_mut();
        host.qm_missing = true;
        host.probe_broken = true;
    }
    let isos = item("isos");
    let lifecycle = harness.lifecycle();

    let mounted = lifecycle.mount(&isos).expect("mount");
    assert_eq!(mounted.registration.expect("registration"), RegistryChange::Unavailable);
    assert!(harness.is_mounted(&isos));

    let status = lifecycle.status(&isos).expect("status");
    assert!(status.mounted);
    assert_eq!(status.registered, None);

    let report = completed(lifecycle.unmount(&isos, never_asked).expect("unmount"));
    assert_eq!(report.kind, UnmountKind::Clean);
    assert_eq!(report.usage.degraded.len(), 2);
    assert_eq!(
        report.deregistration.expect("deregistration"),
        RegistryChange::Unavailable
    );
    assert!(!harness.registry_path().exists());
}

#[test]
fn status_reports_divergence() {
    let harness = Harness::new();
    let isos = item("isos");
    harness.mark_mounted(&isos);

    let status = harness.lifecycle().status(&isos).expect("status");
    assert!(status.mounted);
    assert_eq!(status.registered, Some(false));
    assert!(status.diverged());
}
