use crate::constants::RECORD_DELIMITER;
use crate::crypto::aead::Cipher;
use crate::stream::pool::BufferPool;
use crate::telemetry::{Stage, TelemetryCounters};

use super::types::{RecordTransform, WorkerError};

/// Opens envelopes back into newline-terminated records.
pub struct DecryptRecordWorker<'a> {
    cipher: &'a Cipher,
}

impl<'a> DecryptRecordWorker<'a> {
    pub fn new(cipher: &'a Cipher) -> Self {
        Self { cipher }
    }
}

impl RecordTransform for DecryptRecordWorker<'_> {
    fn transform(&self, mut input: Vec<u8>, pool: &BufferPool) -> Result<Vec<u8>, WorkerError> {
        if let Err(e) = self.cipher.open_in_place(&mut input) {
            pool.release(input);
            return Err(e.into());
        }
        if input.last() != Some(&RECORD_DELIMITER) {
            input.push(RECORD_DELIMITER);
        }
        Ok(input)
    }

    fn stage(&self) -> Stage {
        Stage::Decrypt
    }

    fn count(&self, counters: &mut TelemetryCounters, input_len: usize, output_len: usize) {
        counters.add_decrypt(input_len, output_len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{generate_key, CryptoError};

    #[test]
    fn restores_missing_delimiter() {
        let cipher = Cipher::new(&generate_key().unwrap());
        let pool = BufferPool::new(4, 64, 1024);
        let worker = DecryptRecordWorker::new(&cipher);

        let env = cipher.encrypt(b"no newline").unwrap();
        assert_eq!(worker.transform(env, &pool).unwrap(), b"no newline\n");
    }

    #[test]
    fn bad_tag_is_record_local() {
        let cipher = Cipher::new(&generate_key().unwrap());
        let pool = BufferPool::new(4, 64, 1024);
        let worker = DecryptRecordWorker::new(&cipher);

        let mut env = cipher.encrypt(b"row\n").unwrap();
        env[30] ^= 0x80;
        let err = worker.transform(env, &pool).unwrap_err();
        assert!(matches!(err, WorkerError::Crypto(CryptoError::AuthenticationFailure)));
        assert!(err.is_record_local());
        assert_eq!(pool.retained(), 1);
    }
}
