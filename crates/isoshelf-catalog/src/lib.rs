//! Catalog of ISO mount definitions.
//!
//! Categories hold items; each item describes one read-only NFS export, the
//! local directory it is mounted under, and the storage name it is
//! registered as on the host.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod file;
pub mod model;
pub mod store;

pub use file::CatalogFile;
pub use model::{Category, Item, ItemDraft, ItemPatch};
pub use store::CatalogStore;
