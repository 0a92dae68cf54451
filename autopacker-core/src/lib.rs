//! Autopacker core library — conventions, settings, path rules, errors.
//!
//! Public API surface:
//! - [`types`] — [`UnpackedDir`] and the [`Conventions`] naming rules
//! - [`config`] — working/release directory resolution and `autopacker.yaml`
//! - [`classify`] — temp, hidden and backup file predicates
//! - [`locate`] — mapping a changed path to its unpacked directory
//! - [`lock`] — [`LockMonitor`], the owner-process capability
//! - [`report`] — error rendering for the `--print-error-stack` switch
//! - [`error`] — [`ConfigError`]

pub mod classify;
pub mod config;
pub mod error;
pub mod locate;
pub mod lock;
pub mod report;
pub mod types;

pub use error::ConfigError;
pub use lock::LockMonitor;
pub use report::ErrorVerbosity;
pub use types::{Conventions, UnpackedDir};
