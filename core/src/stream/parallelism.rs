//! Worker pool sizing and the in-flight window.

use crate::constants::{DEFAULT_QUEUE_CAP, MAX_INFLIGHT, MAX_QUEUE_CAP, MAX_WORKERS};
use crate::types::StreamError;

/// Parallelism configuration
///
/// - `workers`: transform threads pulling from the shared input queue
/// - `input_queue_cap` / `output_queue_cap`: bounded queue capacities; a full
///   input queue blocks the source scan (backpressure)
/// - `inflight_records`: permits for records alive anywhere between dispatch
///   and write, reorder buffer included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelismProfile {
    pub workers: usize,
    pub input_queue_cap: usize,
    pub output_queue_cap: usize,
    pub inflight_records: usize,
}

impl ParallelismProfile {
    pub fn single_threaded() -> Self {
        Self::new(1, 1, 1)
    }

    /// Window defaults to everything the queues and workers can hold, plus the
    /// record the sink is writing.
    pub fn new(workers: usize, input_queue_cap: usize, output_queue_cap: usize) -> Self {
        Self {
            workers,
            input_queue_cap,
            output_queue_cap,
            inflight_records: input_queue_cap
                .saturating_add(output_queue_cap)
                .saturating_add(workers)
                .saturating_add(1),
        }
    }

    pub fn with_inflight(mut self, inflight_records: usize) -> Self {
        self.inflight_records = inflight_records;
        self
    }

    /// Size the pool from the machine: one worker per core minus one, and a
    /// window limited to `mem_fraction` of available memory at
    /// `max_record_len` per record, capped at `hard_cap`.
    pub fn dynamic(max_record_len: usize, mem_fraction: f64, hard_cap: usize) -> Self {
        let cores = num_cpus::get();
        let workers = cores.saturating_sub(1).max(1);

        let mut sys = sysinfo::System::new();
        sys.refresh_memory();
        let avail_bytes = sys.available_memory();
        let budget = (avail_bytes as f64 * mem_fraction) as u64;
        let by_memory = (budget / max_record_len.max(1) as u64).max(1) as usize;

        let queue_cap = DEFAULT_QUEUE_CAP;
        let wanted = queue_cap * 2 + workers + 1;
        let inflight = wanted.min(by_memory).min(hard_cap.max(1));

        tracing::debug!(workers, queue_cap, inflight, "dynamic parallelism profile");

        Self {
            workers,
            input_queue_cap: queue_cap,
            output_queue_cap: queue_cap,
            inflight_records: inflight,
        }
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(StreamError::Config(format!(
                "invalid workers count: {}, must be within 1..={}",
                self.workers, MAX_WORKERS
            )));
        }
        for (name, cap) in [("input", self.input_queue_cap), ("output", self.output_queue_cap)] {
            if cap == 0 || cap > MAX_QUEUE_CAP {
                return Err(StreamError::Config(format!(
                    "invalid {name} queue capacity: {cap}, must be within 1..={MAX_QUEUE_CAP}"
                )));
            }
        }
        if self.inflight_records == 0 || self.inflight_records > MAX_INFLIGHT {
            return Err(StreamError::Config(format!(
                "invalid in-flight window: {}, must be within 1..={MAX_INFLIGHT}",
                self.inflight_records
            )));
        }
        Ok(())
    }
}

impl Default for ParallelismProfile {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_WORKERS, DEFAULT_QUEUE_CAP, DEFAULT_QUEUE_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_covers_queues_and_workers() {
        let p = ParallelismProfile::new(4, 10, 10);
        assert_eq!(p.inflight_records, 25);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn zero_sized_knobs_are_rejected() {
        assert!(ParallelismProfile::new(0, 1, 1).validate().is_err());
        assert!(ParallelismProfile::new(1, 0, 1).validate().is_err());
        assert!(ParallelismProfile::new(1, 1, 1).with_inflight(0).validate().is_err());
    }

    #[test]
    fn huge_knobs_do_not_overflow_the_window() {
        let p = ParallelismProfile::new(usize::MAX, usize::MAX, usize::MAX);
        assert_eq!(p.inflight_records, usize::MAX);
        assert!(matches!(p.validate(), Err(StreamError::Config(_))));

        let p = ParallelismProfile::new(1, 1, 1).with_inflight(MAX_INFLIGHT + 1);
        assert!(matches!(p.validate(), Err(StreamError::Config(_))));
    }

    #[test]
    fn dynamic_profile_is_valid() {
        let p = ParallelismProfile::dynamic(1024 * 1024, 0.5, 64);
        assert!(p.validate().is_ok());
        assert!(p.inflight_records <= 64);
    }
}
