use std::fmt;

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Stable key size (XChaCha20-Poly1305).
pub const KEY_LEN_32: usize = 32;

/// Extended 24-byte nonce length; large enough to draw at random per record.
pub const NONCE_LEN_24: usize = 24;

/// Fixed AEAD tag length (bytes).
pub const TAG_LEN: usize = 16;

/// Smallest envelope that can possibly authenticate: nonce + tag, empty plaintext.
pub const MIN_ENVELOPE_LEN: usize = NONCE_LEN_24 + TAG_LEN;

/// Bytes an envelope adds on top of its plaintext.
pub const ENVELOPE_OVERHEAD: usize = NONCE_LEN_24 + TAG_LEN;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// The OS entropy source could not supply bytes. Never recoverable.
    #[error("entropy source unavailable: {0}")]
    Entropy(String),

    /// Invalid key length provided to cipher.
    #[error("invalid key length: expected={expected}, actual={actual}")]
    InvalidKeyLen { expected: usize, actual: usize },

    /// Key material could not be parsed (hex key files).
    #[error("invalid key encoding: {0}")]
    KeyEncoding(String),

    /// Short envelope or tag mismatch. Carries no plaintext.
    #[error("authentication failure")]
    AuthenticationFailure,

    /// Seal rejected by the AEAD backend (plaintext beyond the cipher limit).
    #[error("crypto failure: {0}")]
    Failure(String),
}

/// Process-wide symmetric key. Read-only after creation, shared by all workers.
/// Wiped on drop. No `PartialEq`: compare `as_bytes()` where needed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_LEN_32]);

impl SecretKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN_32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; KEY_LEN_32] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLen {
            expected: KEY_LEN_32,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Parse a key from its hex form. Surrounding whitespace is ignored so key
    /// files written with a trailing newline load unchanged.
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        let raw = Zeroizing::new(hex::decode(text.trim()).map_err(|e| CryptoError::KeyEncoding(e.to_string()))?);
        Self::from_slice(&raw)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN_32] {
        &self.0
    }
}

// Never print key material, not even in debug output.
impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}
