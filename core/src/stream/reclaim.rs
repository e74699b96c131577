//! Periodic reclamation for long runs.
//!
//! Every `every_rows` written records the sink flushes its destinations,
//! trims the buffer pool back to its working set and samples the resident
//! set size of the process, so a very long run holds a flat memory profile
//! and the plateau is observable.

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

pub struct Reclaimer {
    every_rows: u64,
    since_last: u64,
    system: System,
    pid: Option<Pid>,
}

impl Reclaimer {
    pub fn new(every_rows: u64) -> Self {
        Self {
            every_rows: every_rows.max(1),
            since_last: 0,
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// Count one written row; true when a pass is due.
    pub fn tick(&mut self) -> bool {
        self.since_last += 1;
        if self.since_last >= self.every_rows {
            self.since_last = 0;
            true
        } else {
            false
        }
    }

    /// Resident set size in bytes, if the platform reports it.
    pub fn sample_resident(&mut self) -> Option<u64> {
        let pid = self.pid?;
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.system.process(pid).map(|p| p.memory())
    }

    pub fn every_rows(&self) -> u64 {
        self.every_rows
    }
}
