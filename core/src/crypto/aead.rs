//! src/crypto/aead.rs
//! Record envelope cipher over XChaCha20-Poly1305.
//!
//! Design notes:
//! - Envelope layout: `nonce(24) || ciphertext || tag(16)`; length is
//!   `plaintext + ENVELOPE_OVERHEAD`, so it varies per record.
//! - A fresh random nonce is drawn for every seal.
//! - Open fails closed: short envelopes are rejected before touching the AEAD,
//!   and the tag is verified before any plaintext is exposed.
//! - `seal_into` / `open_in_place` work on caller-owned buffers so pipeline
//!   workers can recycle allocations through the buffer pool.

use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{Key, Tag, XChaCha20Poly1305, XNonce};

use crate::crypto::nonce::generate_nonce_24;
use crate::crypto::types::{CryptoError, SecretKey, ENVELOPE_OVERHEAD, MIN_ENVELOPE_LEN, NONCE_LEN_24, TAG_LEN};

/// Authenticated seal/open bound to one key. Cheap to share by reference
/// across worker threads; holds no mutable state.
#[derive(Clone)]
pub struct Cipher {
    aead: XChaCha20Poly1305,
}

impl Cipher {
    pub fn new(key: &SecretKey) -> Self {
        Self {
            aead: XChaCha20Poly1305::new(Key::from_slice(key.as_bytes())),
        }
    }

    /// Seal `plaintext` into a new envelope.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut out = Vec::with_capacity(plaintext.len() + ENVELOPE_OVERHEAD);
        self.seal_into(plaintext, &mut out)?;
        Ok(out)
    }

    /// Open an envelope. Returns plaintext only when the tag verifies.
    pub fn decrypt(&self, envelope: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut buf = envelope.to_vec();
        self.open_in_place(&mut buf)?;
        Ok(buf)
    }

    /// Seal `plaintext` into `out`, replacing its contents with the envelope.
    pub fn seal_into(&self, plaintext: &[u8], out: &mut Vec<u8>) -> Result<(), CryptoError> {
        let nonce = generate_nonce_24()?;

        out.clear();
        out.reserve(plaintext.len() + ENVELOPE_OVERHEAD);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(plaintext);

        let tag = self
            .aead
            .encrypt_in_place_detached(XNonce::from_slice(&nonce), b"", &mut out[NONCE_LEN_24..])
            .map_err(|_| {
                out.clear();
                CryptoError::Failure("XChaCha20-Poly1305 seal failed".into())
            })?;
        out.extend_from_slice(&tag);
        Ok(())
    }

    /// Open the envelope held in `buf`; on success `buf` holds the plaintext.
    /// On failure `buf` is cleared so no unauthenticated bytes escape.
    pub fn open_in_place(&self, buf: &mut Vec<u8>) -> Result<(), CryptoError> {
        if buf.len() < MIN_ENVELOPE_LEN {
            buf.clear();
            return Err(CryptoError::AuthenticationFailure);
        }

        let nonce = XNonce::clone_from_slice(&buf[..NONCE_LEN_24]);
        let tag_at = buf.len() - TAG_LEN;
        let tag = Tag::clone_from_slice(&buf[tag_at..]);

        if self
            .aead
            .decrypt_in_place_detached(&nonce, b"", &mut buf[NONCE_LEN_24..tag_at], &tag)
            .is_err()
        {
            buf.clear();
            return Err(CryptoError::AuthenticationFailure);
        }

        buf.truncate(tag_at);
        buf.drain(..NONCE_LEN_24);
        Ok(())
    }
}

/// Envelope length for a plaintext of `plaintext_len` bytes.
#[inline]
pub fn envelope_len(plaintext_len: usize) -> usize {
    plaintext_len + ENVELOPE_OVERHEAD
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::nonce::generate_key;

    #[test]
    fn envelope_carries_nonce_prefix_and_tag() {
        let cipher = Cipher::new(&generate_key().unwrap());
        let env = cipher.encrypt(b"a,b,c\n").unwrap();
        assert_eq!(env.len(), envelope_len(6));
    }

    #[test]
    fn failed_open_leaves_no_bytes_behind() {
        let cipher = Cipher::new(&generate_key().unwrap());
        let mut env = cipher.encrypt(b"secret row\n").unwrap();
        let last = env.len() - 1;
        env[last] ^= 0x01;
        assert!(matches!(cipher.open_in_place(&mut env), Err(CryptoError::AuthenticationFailure)));
        assert!(env.is_empty());
    }

    #[test]
    fn empty_plaintext_is_sealable() {
        let cipher = Cipher::new(&generate_key().unwrap());
        let env = cipher.encrypt(b"").unwrap();
        assert_eq!(env.len(), MIN_ENVELOPE_LEN);
        assert!(cipher.decrypt(&env).unwrap().is_empty());
    }
}
