#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use linecrypt_core::crypto::{
        envelope_len, generate_key, Cipher, CryptoError, SecretKey, MIN_ENVELOPE_LEN, NONCE_LEN_24,
    };

    fn cipher() -> Cipher {
        Cipher::new(&generate_key().expect("key"))
    }

    proptest! {
        #[test]
        fn decrypt_inverts_encrypt(plaintext in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let c = cipher();
            let env = c.encrypt(&plaintext).unwrap();
            prop_assert_eq!(env.len(), envelope_len(plaintext.len()));
            prop_assert_eq!(c.decrypt(&env).unwrap(), plaintext);
        }

        #[test]
        fn any_single_byte_flip_is_rejected(
            plaintext in proptest::collection::vec(any::<u8>(), 0..256),
            pos in any::<proptest::sample::Index>(),
            mask in 1u8..=255,
        ) {
            let c = cipher();
            let mut env = c.encrypt(&plaintext).unwrap();
            let i = pos.index(env.len());
            env[i] ^= mask;
            prop_assert!(matches!(c.decrypt(&env), Err(CryptoError::AuthenticationFailure)));
        }
    }

    #[test]
    fn envelopes_shorter_than_overhead_are_rejected() {
        let c = cipher();
        for len in 0..MIN_ENVELOPE_LEN {
            let env = vec![0u8; len];
            assert!(matches!(c.decrypt(&env), Err(CryptoError::AuthenticationFailure)), "len {len}");
        }
    }

    #[test]
    fn wrong_key_does_not_open() {
        let env = cipher().encrypt(b"a,b,c\n").unwrap();
        assert!(matches!(cipher().decrypt(&env), Err(CryptoError::AuthenticationFailure)));
    }

    #[test]
    fn same_plaintext_never_yields_same_envelope() {
        let c = cipher();
        let a = c.encrypt(b"1,2,3\n").unwrap();
        let b = c.encrypt(b"1,2,3\n").unwrap();
        assert_ne!(a, b);
        assert_ne!(a[..NONCE_LEN_24], b[..NONCE_LEN_24]);
    }

    fn assert_fresh_nonces(calls: usize) {
        let c = Cipher::new(&SecretKey::from_bytes([9u8; 32]));
        let mut seen: HashSet<[u8; NONCE_LEN_24]> = HashSet::with_capacity(calls);
        for _ in 0..calls {
            let env = c.encrypt(b"").unwrap();
            let mut nonce = [0u8; NONCE_LEN_24];
            nonce.copy_from_slice(&env[..NONCE_LEN_24]);
            assert!(seen.insert(nonce), "nonce repeated");
        }
    }

    #[test]
    fn nonces_are_fresh_across_many_encryptions() {
        assert_fresh_nonces(50_000);
    }

    #[test]
    #[ignore = "slow: one million encryptions"]
    fn nonces_are_fresh_across_a_million_encryptions() {
        assert_fresh_nonces(1_000_000);
    }
}
