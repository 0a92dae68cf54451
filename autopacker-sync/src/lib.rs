//! # autopacker-sync
//!
//! Folder-to-archive reconciliation and release packaging.
//!
//! Call [`reconcile`] to bring one unpacked folder's archive up to date,
//! [`pipeline::run`] to do it for every unit under a root, or
//! [`ReleaseBuilder::publish_all`] to zip every mod under development.

pub mod archive;
pub mod error;
pub mod pipeline;
pub mod reconcile;
pub mod release;
pub mod scan;

pub use error::SyncError;
pub use reconcile::{reconcile, EntryChange, ReconcileReport};
pub use release::{RefusalReason, ReleaseBuilder, ReleaseOutcome, ReleaseSummary};
