use crate::crypto::aead::Cipher;
use crate::stream::pool::BufferPool;
use crate::telemetry::{Stage, TelemetryCounters};

use super::types::{RecordTransform, WorkerError};

/// Seals plaintext records into envelopes.
pub struct EncryptRecordWorker<'a> {
    cipher: &'a Cipher,
}

impl<'a> EncryptRecordWorker<'a> {
    pub fn new(cipher: &'a Cipher) -> Self {
        Self { cipher }
    }
}

impl RecordTransform for EncryptRecordWorker<'_> {
    fn transform(&self, input: Vec<u8>, pool: &BufferPool) -> Result<Vec<u8>, WorkerError> {
        let mut envelope = pool.acquire();
        let sealed = self.cipher.seal_into(&input, &mut envelope);
        pool.release(input);

        match sealed {
            Ok(()) => Ok(envelope),
            Err(e) => {
                pool.release(envelope);
                Err(e.into())
            }
        }
    }

    fn stage(&self) -> Stage {
        Stage::Encrypt
    }

    fn count(&self, counters: &mut TelemetryCounters, input_len: usize, output_len: usize) {
        counters.add_encrypt(input_len, output_len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{envelope_len, generate_key};

    #[test]
    fn returns_input_buffer_to_pool() {
        let cipher = Cipher::new(&generate_key().unwrap());
        let pool = BufferPool::new(4, 64, 1024);
        let worker = EncryptRecordWorker::new(&cipher);

        let env = worker.transform(b"1,2,3\n".to_vec(), &pool).unwrap();
        assert_eq!(env.len(), envelope_len(6));
        assert_eq!(pool.retained(), 1);
        assert_eq!(cipher.decrypt(&env).unwrap(), b"1,2,3\n");
    }
}
