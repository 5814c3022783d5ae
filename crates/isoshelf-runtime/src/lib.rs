//! Mount lifecycle management for isoshelf.
//!
//! [`guard::UsageGuard`] decides whether a mount is in use,
//! [`lifecycle::MountLifecycle`] runs the mount and safety-gated unmount
//! sequences, and [`controller::Controller`] applies them to catalog items.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod controller;
pub mod guard;
pub mod lifecycle;
