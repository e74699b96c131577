//! Stable public API.

use std::sync::Arc;

use crate::{
    constants::{DEFAULT_MAX_RECORD_LEN, DEFAULT_RECLAIM_EVERY_ROWS, MAX_RECORD_LEN},
    crypto::{Cipher, SecretKey, ENVELOPE_OVERHEAD},
    ledger::EnvelopeReader,
    stream::{
        io::{open_input, open_output, InputSource, OutputSink, RecordReader},
        parallelism::ParallelismProfile,
        pipeline::run_pipeline,
        record_worker::{DecryptRecordWorker, EncryptRecordWorker},
        sink::{EnvelopeTarget, PlaintextTarget},
    },
    telemetry::{LiveGauges, TelemetrySnapshot},
    types::StreamError,
};

/// What a record-local decryption failure does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort on the first failure.
    #[default]
    FailFast,
    /// Skip the record, note it in the snapshot, keep going. Only
    /// authentication failures qualify; entropy and I/O errors still abort.
    Collect,
}

/// Immutable run configuration, built once by the caller.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub profile: ParallelismProfile,
    /// Written rows between reclamation passes.
    pub reclaim_every_rows: u64,
    /// Longest accepted plaintext record, delimiter included.
    pub max_record_len: usize,
    pub failure_policy: FailurePolicy,
    /// Optional live view for an external observer.
    pub gauges: Option<Arc<LiveGauges>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(ParallelismProfile::default())
    }
}

impl PipelineConfig {
    pub fn new(profile: ParallelismProfile) -> Self {
        Self {
            profile,
            reclaim_every_rows: DEFAULT_RECLAIM_EVERY_ROWS,
            max_record_len: DEFAULT_MAX_RECORD_LEN,
            failure_policy: FailurePolicy::FailFast,
            gauges: None,
        }
    }

    pub fn with_reclaim_every(mut self, rows: u64) -> Self {
        self.reclaim_every_rows = rows;
        self
    }

    pub fn with_max_record_len(mut self, len: usize) -> Self {
        self.max_record_len = len;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_gauges(mut self, gauges: Arc<LiveGauges>) -> Self {
        self.gauges = Some(gauges);
        self
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        self.profile.validate()?;
        if self.reclaim_every_rows == 0 {
            return Err(StreamError::Config("reclaim interval must be at least one row".into()));
        }
        if self.max_record_len == 0 || self.max_record_len > MAX_RECORD_LEN {
            return Err(StreamError::Config(format!(
                "invalid max record length: {}, must be within 1..={MAX_RECORD_LEN}",
                self.max_record_len
            )));
        }
        Ok(())
    }
}

/// Encrypt a line-oriented source into an envelope stream plus its ledger.
pub fn encrypt_records(
    input: InputSource,
    ciphertext: OutputSink,
    ledger: OutputSink,
    key: &SecretKey,
    config: &PipelineConfig,
) -> Result<TelemetrySnapshot, StreamError> {
    config.validate()?;

    let mut source = RecordReader::new(open_input(input)?, config.max_record_len);
    let mut target = EnvelopeTarget::new(open_output(ciphertext)?, open_output(ledger)?);

    let cipher = Cipher::new(key);
    let worker = EncryptRecordWorker::new(&cipher);

    let mut snapshot = run_pipeline(&mut source, &worker, &mut target, config)?;
    snapshot.counters.ledger_entries = target.ledger_entries();

    let (mut ciphertext, mut ledger) = target.into_parts();
    ciphertext.sync()?;
    ledger.sync()?;

    Ok(snapshot)
}

/// Decrypt an envelope stream framed by `ledger`.
///
/// With `verify`, every recovered record is compared against the source
/// record at the same position.
pub fn decrypt_records(
    ciphertext: InputSource,
    ledger: InputSource,
    output: OutputSink,
    key: &SecretKey,
    config: &PipelineConfig,
    verify: Option<InputSource>,
) -> Result<TelemetrySnapshot, StreamError> {
    config.validate()?;

    let max_envelope_len = config
        .max_record_len
        .checked_add(ENVELOPE_OVERHEAD)
        .ok_or_else(|| StreamError::Config("max record length overflows the envelope size".into()))?;
    let mut source = EnvelopeReader::new(open_input(ciphertext)?, open_input(ledger)?, max_envelope_len);
    let verify = verify
        .map(|src| open_input(src).map(|r| RecordReader::new(r, config.max_record_len)))
        .transpose()?;
    let mut target = PlaintextTarget::new(open_output(output)?, verify);

    let cipher = Cipher::new(key);
    let worker = DecryptRecordWorker::new(&cipher);

    let mut snapshot = run_pipeline(&mut source, &worker, &mut target, config)?;
    snapshot.counters.ledger_entries = source.entries();

    target.into_inner().sync()?;

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_knobs_are_rejected() {
        assert!(PipelineConfig::default().with_reclaim_every(0).validate().is_err());
        assert!(PipelineConfig::default().with_max_record_len(0).validate().is_err());
    }

    #[test]
    fn oversized_record_bound_is_a_config_error() {
        let config = PipelineConfig::default().with_max_record_len(usize::MAX);
        assert!(matches!(config.validate(), Err(StreamError::Config(_))));

        let key = SecretKey::from_bytes([7; crate::crypto::KEY_LEN_32]);
        let err = decrypt_records(
            InputSource::Memory(Vec::new()),
            InputSource::Memory(Vec::new()),
            OutputSink::Writer(Box::new(std::io::sink())),
            &key,
            &config,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
    }
}
