use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

pub mod jwt;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("encryption error")]
    Encryption,
    #[error("decryption error")]
    Decryption,
    #[error("malformed envelope")]
    Malformed,
}

/// Storage form of an encrypted message body.
///
/// Serialized to a JSON string before persistence so the store only ever
/// sees text. There is no version field: rotating the key makes existing
/// envelopes undecryptable, so rotation is unsupported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub nonce: String,
    pub ciphertext: String,
}

impl Envelope {
    pub fn to_storage_string(&self) -> String {
        // Two string fields, serialization cannot fail.
        serde_json::to_string(self).expect("envelope serializes")
    }

    pub fn from_storage_str(raw: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(raw).map_err(|_| CryptoError::Malformed)
    }
}

pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypt a message body with the process-wide key (AES-256-GCM,
/// fresh random nonce per message).
pub fn encrypt(plaintext: &str, key: &[u8; KEY_LEN]) -> Result<Envelope, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = generate_nonce();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|_| CryptoError::Encryption)?;
    Ok(Envelope {
        nonce: STANDARD.encode(nonce),
        ciphertext: STANDARD.encode(ciphertext),
    })
}

/// Decrypt an envelope produced by [`encrypt`] with the same key.
pub fn decrypt(envelope: &Envelope, key: &[u8; KEY_LEN]) -> Result<String, CryptoError> {
    let nonce = STANDARD
        .decode(&envelope.nonce)
        .map_err(|_| CryptoError::Malformed)?;
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::Malformed);
    }
    let ciphertext = STANDARD
        .decode(&envelope.ciphertext)
        .map_err(|_| CryptoError::Malformed)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
        .map_err(|_| CryptoError::Decryption)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::Decryption)
}

/// Read a stored content value, tolerating the legacy format.
///
/// Rows written before encryption was introduced hold bare plaintext, not
/// an envelope, and are never rewritten. Any value that does not parse as
/// an envelope is therefore returned unchanged. A value that *does* parse
/// but fails authenticated decryption is a hard error (wrong key or
/// tampering), not a fallback case.
pub fn decrypt_or_passthrough(stored: &str, key: &[u8; KEY_LEN]) -> Result<String, CryptoError> {
    match Envelope::from_storage_str(stored) {
        Ok(envelope) => decrypt(&envelope, key),
        Err(_) => Ok(stored.to_string()),
    }
}
