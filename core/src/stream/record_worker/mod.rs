//! Record workers: the per-record transforms and the loop that runs them.

pub mod types;
pub mod encrypt;
pub mod decrypt;

pub use types::*;
pub use encrypt::EncryptRecordWorker;
pub use decrypt::DecryptRecordWorker;

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use crossbeam::channel::{Receiver, Sender};

use crate::stream::pool::BufferPool;
use crate::telemetry::{StageTimes, TelemetryCounters};

/// Apply `worker` to one input, turning a panic into an error so the sink
/// never waits on a record that will not arrive.
pub fn transform_one<T: RecordTransform + ?Sized>(
    worker: &T,
    input: RecordInput,
    pool: &BufferPool,
    counters: &mut TelemetryCounters,
    times: &mut StageTimes,
) -> RecordOutput {
    let input_len = input.bytes.len();
    let start = Instant::now();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker.transform(input.bytes, pool)))
        .unwrap_or_else(|payload| Err(WorkerError::Panicked(panic_message(&payload))));

    times.add(worker.stage(), start.elapsed());
    if let Ok(out) = &outcome {
        worker.count(counters, input_len, out.len());
    }

    RecordOutput { index: input.index, input_len, outcome }
}

/// Worker loop: drain `rx` until the dispatcher closes it (or the sink goes
/// away), returning this worker's private counters for merging at join.
pub fn run_worker<T: RecordTransform + ?Sized>(
    id: usize,
    worker: &T,
    pool: &BufferPool,
    rx: Receiver<RecordInput>,
    tx: Sender<RecordOutput>,
) -> (TelemetryCounters, StageTimes) {
    let mut counters = TelemetryCounters::default();
    let mut times = StageTimes::default();

    tracing::debug!(worker = id, "worker started");
    for input in rx.iter() {
        let index = input.index;
        let output = transform_one(worker, input, pool, &mut counters, &mut times);
        if tx.send(output).is_err() {
            tracing::debug!(worker = id, index, "output queue closed, worker stopping");
            break;
        }
    }
    tracing::debug!(worker = id, transformed = counters.records_transformed, "worker finished");

    (counters, times)
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Stage;
    use crossbeam::channel::bounded;

    struct Exploding;

    impl RecordTransform for Exploding {
        fn transform(&self, _input: Vec<u8>, _pool: &BufferPool) -> Result<Vec<u8>, WorkerError> {
            panic!("boom");
        }
        fn stage(&self) -> Stage {
            Stage::Encrypt
        }
        fn count(&self, _c: &mut TelemetryCounters, _i: usize, _o: usize) {}
    }

    #[test]
    fn panic_becomes_fatal_error() {
        let pool = BufferPool::new(1, 8, 64);
        let (in_tx, in_rx) = bounded(1);
        let (out_tx, out_rx) = bounded(1);
        in_tx.send(RecordInput { index: 3, bytes: b"x\n".to_vec() }).unwrap();
        drop(in_tx);

        run_worker(0, &Exploding, &pool, in_rx, out_tx);
        let out = out_rx.recv().unwrap();
        assert_eq!(out.index, 3);
        match out.outcome {
            Err(e @ WorkerError::Panicked(_)) => assert!(!e.is_record_local()),
            other => panic!("expected Panicked, got {:?}", other),
        }
    }
}
