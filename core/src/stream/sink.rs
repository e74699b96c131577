//! Ordered, serialized sink

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::time::Instant;

use crossbeam::channel::Receiver;

use crate::ledger::LedgerWriter;
use crate::stream::core::FailurePolicy;
use crate::stream::io::{RecordReader, ScanResult};
use crate::stream::pool::BufferPool;
use crate::stream::reclaim::Reclaimer;
use crate::stream::record_worker::RecordOutput;
use crate::telemetry::{LiveGauges, RecordFailure, Stage, StageTimes, TelemetryCounters};
use crate::types::StreamError;

/// Where emitted records land. Only the sink thread touches a target.
pub trait SinkTarget: Send {
    /// Write record `index`; every byte of it, before any byte of the next.
    fn write_record(&mut self, index: u64, payload: &[u8]) -> Result<(), StreamError>;

    /// Record `index` was dropped under `FailurePolicy::Collect`.
    fn skip_record(&mut self, index: u64) -> Result<(), StreamError>;

    fn flush(&mut self) -> Result<(), StreamError>;

    /// Called once after the last record, `records` being the count emitted
    /// or skipped.
    fn finish(&mut self, records: u64) -> Result<(), StreamError>;
}

// ============================================================
// Encrypt side: envelope stream + ledger, in lockstep
// ============================================================
pub struct EnvelopeTarget<W: Write, L: Write> {
    ciphertext: W,
    ledger: LedgerWriter<L>,
}

impl<W: Write, L: Write> EnvelopeTarget<W, L> {
    pub fn new(ciphertext: W, ledger: L) -> Self {
        Self { ciphertext, ledger: LedgerWriter::new(ledger) }
    }

    pub fn ledger_entries(&self) -> u64 {
        self.ledger.entries()
    }

    pub fn into_parts(self) -> (W, L) {
        (self.ciphertext, self.ledger.into_inner())
    }
}

impl<W: Write + Send, L: Write + Send> SinkTarget for EnvelopeTarget<W, L> {
    fn write_record(&mut self, _index: u64, payload: &[u8]) -> Result<(), StreamError> {
        self.ciphertext.write_all(payload)?;
        self.ledger.append(payload.len())?;
        Ok(())
    }

    // Nothing was written for the record, so nothing goes in the ledger.
    fn skip_record(&mut self, _index: u64) -> Result<(), StreamError> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StreamError> {
        self.ciphertext.flush()?;
        self.ledger.flush()?;
        Ok(())
    }

    fn finish(&mut self, _records: u64) -> Result<(), StreamError> {
        self.flush()
    }
}

// ============================================================
// Decrypt side: plaintext, optionally checked against the source
// ============================================================
pub struct PlaintextTarget<W: Write, V: BufRead> {
    output: W,
    verify: Option<RecordReader<V>>,
    scratch: Vec<u8>,
}

impl<W: Write, V: BufRead> PlaintextTarget<W, V> {
    pub fn new(output: W, verify: Option<RecordReader<V>>) -> Self {
        Self { output, verify, scratch: Vec::new() }
    }

    pub fn into_inner(self) -> W {
        self.output
    }

    /// Pull the source record at the current position; `None` at source end.
    fn next_source_record(&mut self, index: u64) -> Result<Option<&[u8]>, StreamError> {
        let Some(reader) = self.verify.as_mut() else {
            return Ok(None);
        };
        match reader.read_record_into(&mut self.scratch)? {
            ScanResult::Record => Ok(Some(&self.scratch)),
            ScanResult::Eof => Ok(None),
            ScanResult::TooLarge => Err(StreamError::Verification { index }),
        }
    }
}

impl<W: Write + Send, V: BufRead + Send> SinkTarget for PlaintextTarget<W, V> {
    fn write_record(&mut self, index: u64, payload: &[u8]) -> Result<(), StreamError> {
        if self.verify.is_some() {
            match self.next_source_record(index)? {
                Some(expected) if expected == payload => {}
                _ => return Err(StreamError::Verification { index }),
            }
        }
        self.output.write_all(payload)?;
        Ok(())
    }

    // Keep the source aligned with the envelope positions.
    fn skip_record(&mut self, index: u64) -> Result<(), StreamError> {
        if self.verify.is_some() && self.next_source_record(index)?.is_none() {
            return Err(StreamError::Verification { index });
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StreamError> {
        self.output.flush()?;
        Ok(())
    }

    fn finish(&mut self, records: u64) -> Result<(), StreamError> {
        if self.verify.is_some() && self.next_source_record(records)?.is_some() {
            // Source holds records the ciphertext never had.
            return Err(StreamError::Verification { index: records });
        }
        self.flush()
    }
}

// ============================================================
// Ordered sink
// ============================================================

/// What the sink thread hands back at join.
#[derive(Debug, Default)]
pub struct SinkReport {
    pub counters: TelemetryCounters,
    pub times: StageTimes,
    pub failures: Vec<RecordFailure>,
    /// Records emitted or skipped, i.e. the next index that was expected.
    pub records: u64,
    /// Records still parked in the reorder buffer when input ended.
    pub stranded: usize,
}

/// Single consumer of the output queue.
///
/// Workers finish in any order; results are parked in a reorder buffer keyed
/// by source index and emitted strictly in increasing index order. Each
/// emitted record gives back one in-flight permit, which is what lets the
/// dispatcher read further ahead.
pub struct OrderedSink<'a, T: SinkTarget + ?Sized> {
    target: &'a mut T,
    pool: &'a BufferPool,
    permits: Receiver<()>,
    policy: FailurePolicy,
    gauges: Option<&'a LiveGauges>,
    reclaimer: Reclaimer,
    keep_buffers: usize,

    pending: BTreeMap<u64, RecordOutput>,
    next_index: u64,
    counters: TelemetryCounters,
    times: StageTimes,
    failures: Vec<RecordFailure>,
}

impl<'a, T: SinkTarget + ?Sized> OrderedSink<'a, T> {
    pub fn new(
        target: &'a mut T,
        pool: &'a BufferPool,
        permits: Receiver<()>,
        policy: FailurePolicy,
        reclaim_every_rows: u64,
        keep_buffers: usize,
        gauges: Option<&'a LiveGauges>,
    ) -> Self {
        Self {
            target,
            pool,
            permits,
            policy,
            gauges,
            reclaimer: Reclaimer::new(reclaim_every_rows),
            keep_buffers,
            pending: BTreeMap::new(),
            next_index: 0,
            counters: TelemetryCounters::default(),
            times: StageTimes::default(),
            failures: Vec::new(),
        }
    }

    /// Record the output queue depth seen on receive.
    pub fn observe_queue(&mut self, depth: usize) {
        self.counters.observe_output_queue(depth);
        if let Some(g) = self.gauges {
            g.set_output_queue_depth(depth);
        }
    }

    /// Accept one worker result and emit everything that became contiguous.
    pub fn push(&mut self, out: RecordOutput) -> Result<(), StreamError> {
        if out.index < self.next_index || self.pending.contains_key(&out.index) {
            return Err(StreamError::Pipeline(format!("record {} delivered twice", out.index)));
        }
        self.pending.insert(out.index, out);
        self.counters.observe_reorder_depth(self.pending.len());

        while let Some(ready) = self.pending.remove(&self.next_index) {
            self.emit(ready)?;
        }
        Ok(())
    }

    fn emit(&mut self, out: RecordOutput) -> Result<(), StreamError> {
        let index = out.index;
        match out.outcome {
            Ok(payload) => {
                let start = Instant::now();
                self.target.write_record(index, &payload)?;
                self.times.add(Stage::Write, start.elapsed());

                self.counters.records_written += 1;
                self.pool.release(payload);
            }
            Err(e) if self.policy == FailurePolicy::Collect && e.is_record_local() => {
                tracing::warn!(index, error = %e, "record skipped");
                self.target.skip_record(index)?;
                self.counters.records_failed += 1;
                self.failures.push(RecordFailure { index, reason: e.to_string() });
            }
            Err(e) => return Err(StreamError::Record { index, source: e }),
        }

        self.next_index += 1;
        // The dispatcher deposited this record's permit before dispatching it.
        let _ = self.permits.try_recv();
        if let Some(g) = self.gauges {
            g.set_rows_written(self.next_index);
        }

        if self.reclaimer.tick() {
            self.reclaim()?;
        }
        Ok(())
    }

    fn reclaim(&mut self) -> Result<(), StreamError> {
        let start = Instant::now();
        self.target.flush()?;
        let dropped = self.pool.trim(self.keep_buffers);
        let resident = self.reclaimer.sample_resident();
        if let Some(bytes) = resident {
            self.counters.observe_resident(bytes);
        }
        self.counters.reclaim_passes += 1;
        self.times.add(Stage::Reclaim, start.elapsed());

        tracing::info!(
            rows = self.next_index,
            dropped_buffers = dropped,
            reorder_depth = self.pending.len(),
            resident_bytes = resident.unwrap_or(0),
            "reclamation pass"
        );
        Ok(())
    }

    pub fn into_report(self) -> SinkReport {
        SinkReport {
            counters: self.counters,
            times: self.times,
            failures: self.failures,
            records: self.next_index,
            stranded: self.pending.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crossbeam::channel::bounded;

    use crate::crypto::CryptoError;
    use crate::stream::record_worker::WorkerError;

    fn ok(index: u64, bytes: &[u8]) -> RecordOutput {
        RecordOutput { index, input_len: bytes.len(), outcome: Ok(bytes.to_vec()) }
    }

    fn auth_failure(index: u64) -> RecordOutput {
        RecordOutput {
            index,
            input_len: 0,
            outcome: Err(WorkerError::Crypto(CryptoError::AuthenticationFailure)),
        }
    }

    fn permits(n: usize) -> Receiver<()> {
        let (tx, rx) = bounded(n);
        for _ in 0..n {
            tx.send(()).unwrap();
        }
        rx
    }

    #[test]
    fn emits_in_index_order() {
        let pool = BufferPool::new(4, 8, 64);
        let mut target = EnvelopeTarget::new(Vec::new(), Vec::new());
        {
            let mut sink = OrderedSink::new(&mut target, &pool, permits(3), FailurePolicy::FailFast, 100, 4, None);
            sink.push(ok(2, b"cc")).unwrap();
            sink.push(ok(0, b"a")).unwrap();
            sink.push(ok(1, b"bbb")).unwrap();
            let report = sink.into_report();
            assert_eq!(report.records, 3);
            assert_eq!(report.stranded, 0);
            assert_eq!(report.counters.peak_reorder_depth, 2);
        }
        let (ct, ledger) = target.into_parts();
        assert_eq!(ct, b"abbbcc");
        assert_eq!(ledger, b"1\n3\n2\n");
    }

    #[test]
    fn duplicate_index_is_a_pipeline_error() {
        let pool = BufferPool::new(1, 8, 64);
        let mut target = EnvelopeTarget::new(Vec::new(), Vec::new());
        let mut sink = OrderedSink::new(&mut target, &pool, permits(2), FailurePolicy::FailFast, 100, 1, None);
        sink.push(ok(0, b"a")).unwrap();
        assert!(matches!(sink.push(ok(0, b"a")), Err(StreamError::Pipeline(_))));
    }

    #[test]
    fn collect_skips_and_keeps_source_aligned() {
        let pool = BufferPool::new(1, 8, 64);
        let source = RecordReader::new(Cursor::new(b"x\ny\nz\n".to_vec()), 64);
        let mut target = PlaintextTarget::new(Vec::new(), Some(source));
        {
            let mut sink = OrderedSink::new(&mut target, &pool, permits(3), FailurePolicy::Collect, 100, 1, None);
            sink.push(ok(0, b"x\n")).unwrap();
            sink.push(auth_failure(1)).unwrap();
            sink.push(ok(2, b"z\n")).unwrap();
            let report = sink.into_report();
            assert_eq!(report.failures.len(), 1);
            assert_eq!(report.failures[0].index, 1);
            assert_eq!(report.counters.records_failed, 1);
            target.finish(report.records).unwrap();
        }
        assert_eq!(target.into_inner(), b"x\nz\n");
    }

    #[test]
    fn fail_fast_aborts_on_auth_failure() {
        let pool = BufferPool::new(1, 8, 64);
        let mut target = PlaintextTarget::<Vec<u8>, Cursor<Vec<u8>>>::new(Vec::new(), None);
        let mut sink = OrderedSink::new(&mut target, &pool, permits(1), FailurePolicy::FailFast, 100, 1, None);
        assert!(matches!(sink.push(auth_failure(0)), Err(StreamError::Record { index: 0, .. })));
    }

    #[test]
    fn verification_flags_mismatch_and_extra_source() {
        let source = RecordReader::new(Cursor::new(b"a\nb\n".to_vec()), 64);
        let mut target = PlaintextTarget::new(Vec::new(), Some(source));
        target.write_record(0, b"a\n").unwrap();
        assert!(matches!(target.write_record(1, b"B\n"), Err(StreamError::Verification { index: 1 })));

        let source = RecordReader::new(Cursor::new(b"a\nb\n".to_vec()), 64);
        let mut target = PlaintextTarget::new(Vec::new(), Some(source));
        target.write_record(0, b"a\n").unwrap();
        assert!(matches!(target.finish(1), Err(StreamError::Verification { index: 1 })));
    }

    #[test]
    fn reclamation_runs_on_interval() {
        let pool = BufferPool::new(8, 8, 64);
        for _ in 0..8 {
            pool.release(Vec::with_capacity(8));
        }
        let mut target = EnvelopeTarget::new(Vec::new(), Vec::new());
        let mut sink = OrderedSink::new(&mut target, &pool, permits(5), FailurePolicy::FailFast, 2, 1, None);
        for i in 0..5 {
            sink.push(ok(i, b"r")).unwrap();
        }
        let report = sink.into_report();
        assert_eq!(report.counters.reclaim_passes, 2);
        assert!(pool.retained() <= 2);
    }
}
