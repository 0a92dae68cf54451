//! The "game is running" capability.
//!
//! While the owner process runs it keeps archives open, so nothing may
//! rewrite them. Implementations poll the OS; tests pass closures.

/// Reports whether the process that locks the archives is alive.
pub trait LockMonitor: Send + Sync {
    fn is_owner_running(&self) -> bool;
}

impl<F> LockMonitor for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_owner_running(&self) -> bool {
        self()
    }
}
