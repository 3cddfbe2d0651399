use crypto_core::{decrypt, decrypt_or_passthrough, encrypt, Envelope, KEY_LEN};

fn test_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    for (i, b) in key.iter_mut().enumerate() {
        *b = i as u8;
    }
    key
}

#[test]
fn round_trips_plaintext() {
    let key = test_key();
    let long = "a".repeat(10_000);
    for plaintext in ["hi", "", "héllo wörld 🎮", long.as_str()] {
        let envelope = encrypt(plaintext, &key).unwrap();
        assert_eq!(decrypt(&envelope, &key).unwrap(), plaintext);
    }
}

#[test]
fn round_trips_through_storage_string() {
    let key = test_key();
    let envelope = encrypt("stored as text", &key).unwrap();
    let stored = envelope.to_storage_string();
    let reloaded = Envelope::from_storage_str(&stored).unwrap();
    assert_eq!(decrypt(&reloaded, &key).unwrap(), "stored as text");
}

#[test]
fn nonces_are_fresh_per_message() {
    let key = test_key();
    let a = encrypt("same plaintext", &key).unwrap();
    let b = encrypt("same plaintext", &key).unwrap();
    assert_ne!(a.nonce, b.nonce);
    assert_ne!(a.ciphertext, b.ciphertext);
}

#[test]
fn legacy_plaintext_passes_through_unchanged() {
    let key = test_key();
    // Rows written before encryption hold the raw message text.
    for legacy in ["hello there", "not json at all", "{almost json", ""] {
        assert_eq!(decrypt_or_passthrough(legacy, &key).unwrap(), legacy);
    }
}

#[test]
fn envelope_reads_do_not_fall_back_on_bad_key() {
    let key = test_key();
    let mut other_key = test_key();
    other_key[0] ^= 0xff;

    let stored = encrypt("secret", &key).unwrap().to_storage_string();
    // A well-formed envelope that fails to decrypt is an error, never
    // passthrough: returning ciphertext as plaintext would be worse.
    assert!(decrypt_or_passthrough(&stored, &other_key).is_err());
}

#[test]
fn tampered_ciphertext_is_rejected() {
    let key = test_key();
    let mut envelope = encrypt("integrity matters", &key).unwrap();
    let mut raw = envelope.ciphertext.into_bytes();
    raw[0] = if raw[0] == b'A' { b'B' } else { b'A' };
    envelope.ciphertext = String::from_utf8(raw).unwrap();
    assert!(decrypt(&envelope, &key).is_err());
}
