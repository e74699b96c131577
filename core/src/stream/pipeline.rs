//! Pure pipeline wiring (no crypto logic)

use std::io::{BufRead, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use crossbeam::channel::{bounded, Sender};

use crate::constants::{POOL_INITIAL_BUF, POOL_MAX_RETAINED_BUF};
use crate::ledger::EnvelopeReader;
use crate::stream::core::PipelineConfig;
use crate::stream::io::{RecordReader, ScanResult};
use crate::stream::pool::BufferPool;
use crate::stream::record_worker::{run_worker, transform_one, RecordInput, RecordOutput, RecordTransform};
use crate::stream::sink::{OrderedSink, SinkReport, SinkTarget};
use crate::telemetry::{LiveGauges, Stage, StageTimes, TelemetryCounters, TelemetrySnapshot, TelemetryTimer};
use crate::types::StreamError;

// ============================================================
// Sources
// ============================================================

/// Something the dispatcher can pull units from, in source order.
pub trait RecordSource {
    /// Fill `buf` with unit `index`; `false` once the source is exhausted.
    fn next_unit(&mut self, index: u64, buf: &mut Vec<u8>) -> Result<bool, StreamError>;
}

impl<R: BufRead> RecordSource for RecordReader<R> {
    fn next_unit(&mut self, index: u64, buf: &mut Vec<u8>) -> Result<bool, StreamError> {
        match self.read_record_into(buf)? {
            ScanResult::Record => Ok(true),
            ScanResult::Eof => Ok(false),
            ScanResult::TooLarge => Err(StreamError::RecordTooLarge { index, limit: self.max_record_len() }),
        }
    }
}

impl<R: Read, L: BufRead> RecordSource for EnvelopeReader<R, L> {
    fn next_unit(&mut self, _index: u64, buf: &mut Vec<u8>) -> Result<bool, StreamError> {
        Ok(self.next_into(buf)?)
    }
}

// ============================================================
// State
// ============================================================

/// Dispatcher mode. The first record is transformed by the dispatcher
/// itself, before the pool sees anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    AwaitFirstRecord,
    Streaming,
}

/// Shared completion bookkeeping for one run; lives exactly as long as the
/// thread scope.
#[derive(Debug)]
pub struct PipelineState {
    outstanding_workers: AtomicUsize,
    source_exhausted: AtomicBool,
}

impl PipelineState {
    pub fn new(workers: usize) -> Self {
        Self {
            outstanding_workers: AtomicUsize::new(workers),
            source_exhausted: AtomicBool::new(false),
        }
    }

    pub fn worker_done(&self) {
        self.outstanding_workers.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn outstanding_workers(&self) -> usize {
        self.outstanding_workers.load(Ordering::Acquire)
    }

    pub fn mark_source_exhausted(&self) {
        self.source_exhausted.store(true, Ordering::Release);
    }

    pub fn source_exhausted(&self) -> bool {
        self.source_exhausted.load(Ordering::Acquire)
    }
}

fn closed(what: &str) -> StreamError {
    StreamError::Pipeline(format!("{what} closed"))
}

// ============================================================
// Run
// ============================================================

/// Drive `source` through `transform` into `target`.
///
/// Topology: the calling thread dispatches, `workers` scoped threads
/// transform, one scoped thread sinks. All queues are bounded; the permit
/// window bounds everything in flight including the reorder buffer.
pub fn run_pipeline<S, X, T>(
    source: &mut S,
    transform: &X,
    target: &mut T,
    config: &PipelineConfig,
) -> Result<TelemetrySnapshot, StreamError>
where
    S: RecordSource + ?Sized,
    X: RecordTransform,
    T: SinkTarget + ?Sized,
{
    config.validate()?;
    let profile = &config.profile;
    let mut timer = TelemetryTimer::new();

    let pool = BufferPool::new(
        profile.inflight_records + profile.workers + 1,
        POOL_INITIAL_BUF,
        POOL_MAX_RETAINED_BUF,
    );
    let state = PipelineState::new(profile.workers);
    let gauges = config.gauges.as_deref();

    let (in_tx, in_rx) = bounded::<RecordInput>(profile.input_queue_cap);
    let (out_tx, out_rx) = bounded::<RecordOutput>(profile.output_queue_cap);
    let (permit_tx, permit_rx) = bounded::<()>(profile.inflight_records);

    tracing::info!(
        workers = profile.workers,
        input_queue_cap = profile.input_queue_cap,
        output_queue_cap = profile.output_queue_cap,
        inflight = profile.inflight_records,
        "pipeline start"
    );

    let sink_target: &mut T = &mut *target;
    let (dispatched, workers, sunk) = thread::scope(|scope| {
        // ---- Sink ----
        let pool_ref = &pool;
        let sink_handle = scope.spawn(move || -> Result<SinkReport, StreamError> {
            let mut sink = OrderedSink::new(
                sink_target,
                pool_ref,
                permit_rx,
                config.failure_policy,
                config.reclaim_every_rows,
                profile.workers + 1,
                gauges,
            );
            for out in out_rx.iter() {
                sink.observe_queue(out_rx.len());
                sink.push(out)?;
            }
            tracing::debug!("output queue closed, sink drained");
            Ok(sink.into_report())
        });

        // ---- Workers ----
        let worker_handles: Vec<_> = (0..profile.workers)
            .map(|id| {
                let rx = in_rx.clone();
                let tx = out_tx.clone();
                let pool = &pool;
                let state = &state;
                scope.spawn(move || {
                    let report = run_worker(id, transform, pool, rx, tx);
                    state.worker_done();
                    report
                })
            })
            .collect();
        drop(in_rx);

        // ---- Dispatcher (this thread) ----
        let dispatched = dispatch(source, transform, &pool, in_tx, out_tx, permit_tx, gauges, &state);

        let workers: Vec<_> = worker_handles.into_iter().map(|h| h.join()).collect();
        let sunk = sink_handle.join();
        (dispatched, workers, sunk)
    });

    // Sink failures are the root cause of any closed-channel error upstream.
    let report = match sunk {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => return Err(e),
        Err(_) => return Err(StreamError::Pipeline("sink thread panicked".into())),
    };
    let (mut counters, mut times) = dispatched?;

    for joined in workers {
        let (wc, wt) = joined.map_err(|_| StreamError::Pipeline("worker thread panicked".into()))?;
        counters.merge(&wc);
        times.merge(&wt);
    }
    counters.merge(&report.counters);
    times.merge(&report.times);

    if report.stranded > 0 {
        return Err(StreamError::Pipeline(format!(
            "pipeline ended with {} records stranded in the reorder buffer",
            report.stranded
        )));
    }
    if !state.source_exhausted() || state.outstanding_workers() != 0 {
        return Err(StreamError::Pipeline("pipeline ended before all stages completed".into()));
    }

    let start = Instant::now();
    target.finish(report.records)?;
    times.add(Stage::Write, start.elapsed());

    timer.stage_times.merge(&times);
    timer.finish();

    if !report.failures.is_empty() {
        tracing::warn!(failed = report.failures.len(), "records skipped during run");
    }
    tracing::info!(
        records = counters.records_written,
        failed = counters.records_failed,
        reclaim_passes = counters.reclaim_passes,
        elapsed_ms = timer.elapsed().as_millis() as u64,
        "pipeline finished"
    );

    Ok(TelemetrySnapshot::from(&counters, &timer, report.failures))
}

#[allow(clippy::too_many_arguments)]
fn dispatch<S, X>(
    source: &mut S,
    transform: &X,
    pool: &BufferPool,
    in_tx: Sender<RecordInput>,
    first_tx: Sender<RecordOutput>,
    permits: Sender<()>,
    gauges: Option<&LiveGauges>,
    state: &PipelineState,
) -> Result<(TelemetryCounters, StageTimes), StreamError>
where
    S: RecordSource + ?Sized,
    X: RecordTransform,
{
    let mut counters = TelemetryCounters::default();
    let mut times = StageTimes::default();
    let mut mode = DispatchState::AwaitFirstRecord;
    let mut first_tx = Some(first_tx);
    let mut index = 0u64;

    loop {
        let mut buf = pool.acquire();
        let start = Instant::now();
        let has_record = source.next_unit(index, &mut buf)?;
        times.add(Stage::Read, start.elapsed());
        if !has_record {
            pool.release(buf);
            break;
        }
        counters.records_read += 1;

        // Blocks while the window is full; released by the sink on emit.
        permits.send(()).map_err(|_| closed("in-flight window"))?;

        let input = RecordInput { index, bytes: buf };
        match mode {
            DispatchState::AwaitFirstRecord => {
                let out = transform_one(transform, input, pool, &mut counters, &mut times);
                let tx = first_tx.take().ok_or_else(|| closed("first record path"))?;
                tx.send(out).map_err(|_| closed("output queue"))?;
                tracing::debug!(index, "first record transformed inline");
                mode = DispatchState::Streaming;
            }
            DispatchState::Streaming => {
                // Blocks while the input queue is full.
                in_tx.send(input).map_err(|_| closed("input queue"))?;
                let depth = in_tx.len();
                counters.observe_input_queue(depth);
                if let Some(g) = gauges {
                    g.set_input_queue_depth(depth);
                }
            }
        }

        index += 1;
        if let Some(g) = gauges {
            g.set_rows_dispatched(index);
        }
    }

    state.mark_source_exhausted();
    tracing::debug!(records = index, "source exhausted, closing input queue");
    Ok((counters, times))
}
