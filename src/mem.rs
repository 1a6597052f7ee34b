//! Resident-memory sampling for record enrichment.

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Samples the resident set size of the current process.
///
/// Holds one `System` instance and refreshes only this process's memory on
/// each call. Returns 0 when the process cannot be inspected rather than
/// failing record encoding.
pub(crate) struct MemorySampler {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl MemorySampler {
    pub(crate) fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// Resident memory of this process in whole megabytes.
    pub(crate) fn resident_mb(&self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        let mut system = self.system.lock();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        system
            .process(pid)
            .map(|process| process.memory() / (1024 * 1024))
            .unwrap_or(0)
    }
}
