//! crypto/nonce.rs
//! Random key and nonce generation from the OS CSPRNG.
//!
//! Design:
//! - Every seal draws a fresh 24-byte nonce. With XChaCha20 the collision
//!   probability of random 192-bit nonces is negligible, so workers need no
//!   shared counter and no coordination.
//! - Entropy failures surface as `CryptoError::Entropy` instead of panicking.
//!
//! Security notes:
//! - Never derive nonces from record indices here: the same key is reused
//!   across runs, so a counter would repeat between processes.

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::crypto::types::{CryptoError, SecretKey, KEY_LEN_32, NONCE_LEN_24};

/// Fill `buf` from the OS entropy source.
#[inline]
fn fill_random(buf: &mut [u8]) -> Result<(), CryptoError> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError::Entropy(e.to_string()))
}

/// Generate a fresh 24-byte nonce.
#[inline]
pub fn generate_nonce_24() -> Result<[u8; NONCE_LEN_24], CryptoError> {
    let mut nonce = [0u8; NONCE_LEN_24];
    fill_random(&mut nonce)?;
    Ok(nonce)
}

/// Generate a new random secret key. Failure is a provisioning error.
pub fn generate_key() -> Result<SecretKey, CryptoError> {
    let mut key = Zeroizing::new([0u8; KEY_LEN_32]);
    fill_random(&mut key[..])?;
    Ok(SecretKey::from_bytes(*key))
}
