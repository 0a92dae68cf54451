//! Process-table backed [`LockMonitor`].

use std::ffi::OsStr;
use std::sync::{Mutex, PoisonError};

use sysinfo::{ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};

use autopacker_core::classify::strip_suffix_ignore_case;
use autopacker_core::LockMonitor;

/// Reports the game as running while any live process carries its name.
pub struct ProcessMonitor {
    process_name: String,
    system: Mutex<System>,
}

impl ProcessMonitor {
    pub fn new(process_name: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
            system: Mutex::new(System::new()),
        }
    }

    pub fn process_name(&self) -> &str {
        &self.process_name
    }
}

impl LockMonitor for ProcessMonitor {
    fn is_owner_running(&self) -> bool {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing(),
        );
        system.processes().values().any(|process| {
            process.status() != ProcessStatus::Zombie
                && matches_process_name(process.name(), &self.process_name)
        })
    }
}

/// `name` equals `expected` ignoring ASCII case, with or without `.exe`.
pub fn matches_process_name(name: &OsStr, expected: &str) -> bool {
    let name = name.to_string_lossy();
    let stem = strip_suffix_ignore_case(&name, ".exe").unwrap_or(&name);
    stem.eq_ignore_ascii_case(expected)
}
