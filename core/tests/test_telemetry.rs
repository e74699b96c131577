mod common;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use linecrypt_core::crypto::envelope_len;
    use linecrypt_core::prelude::*;
    use linecrypt_core::telemetry::Stage;

    use crate::common::{config, decrypt_mem, encrypt_mem};

    #[test]
    fn encrypt_counts_match_data() {
        let key = generate_key().unwrap();
        let data = b"id,name\n1,ann\n2,bob\n";
        let enc = encrypt_mem(data, &key, &config(2, 2)).unwrap();
        let c = &enc.snapshot.counters;

        assert_eq!(c.records_read, 3);
        assert_eq!(c.records_transformed, 3);
        assert_eq!(c.records_written, 3);
        assert_eq!(c.bytes_plaintext, data.len() as u64);
        assert_eq!(c.bytes_envelope, (envelope_len(8) + envelope_len(6) * 2) as u64);
        assert_eq!(c.bytes_envelope, enc.ciphertext.len() as u64);
        assert!(enc.snapshot.failures.is_empty());
    }

    #[test]
    fn decrypt_counts_match_data() {
        let key = generate_key().unwrap();
        let data = b"x\ny\n";
        let enc = encrypt_mem(data, &key, &config(1, 1)).unwrap();
        let (_, snap) = decrypt_mem(&enc.ciphertext, &enc.ledger, &key, &config(1, 1), None).unwrap();

        assert_eq!(snap.counters.records_transformed, 2);
        assert_eq!(snap.counters.bytes_plaintext, 4);
        assert_eq!(snap.counters.bytes_envelope, enc.ciphertext.len() as u64);
        assert_eq!(snap.counters.ledger_entries, 2);
    }

    #[test]
    fn gauges_reflect_the_finished_run() {
        let gauges = Arc::new(LiveGauges::new());
        let cfg = config(3, 2).with_gauges(gauges.clone());
        let key = generate_key().unwrap();
        encrypt_mem(&crate::common::csv_rows(250), &key, &cfg).unwrap();

        assert_eq!(gauges.rows_dispatched(), 250);
        assert_eq!(gauges.rows_written(), 250);
        assert!(gauges.input_queue_depth() <= 2);
    }

    #[test]
    fn snapshot_serialises_to_json() {
        let key = generate_key().unwrap();
        let enc = encrypt_mem(b"a\n", &key, &config(1, 1)).unwrap();
        assert!(enc.snapshot.stage_times.get(Stage::Encrypt) > std::time::Duration::ZERO);

        let json = enc.snapshot.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["counters"]["records_written"], 1);
        assert!(value["failures"].as_array().unwrap().is_empty());
    }
}
