//! Background sync: change watcher, sync queue, lock-gated worker.

mod error;
pub mod monitor;
pub mod queue;
mod runtime;
pub mod worker;

pub use error::DaemonError;
pub use monitor::ProcessMonitor;
pub use queue::SyncQueue;
pub use runtime::{init_tracing, on_path_changed, run, start_blocking};
pub use worker::{Worker, WorkerConfig};
