//! # isoshelf-core
//!
//! Host-facing primitives used by the mount lifecycle:
//! - **Filesystem**: read-only NFS mounts, graceful and forced unmounts,
//!   and the kernel mount table.
//! - **Registry**: the host storage registry (`storage.cfg`).
//! - **VM inventory**: which VMs reference a storage, and ejecting media.
//! - **Probe**: processes holding files open under a mount.
//! - **Tool**: locating and running host executables.
//!
//! Each collaborator that the lifecycle needs to fake in tests sits behind
//! a trait; the host implementations live next to it.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod filesystem;
pub mod probe;
pub mod registry;
pub mod tool;
pub mod vm;
