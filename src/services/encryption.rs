use crate::error::AppError;
use crypto_core::{decrypt_or_passthrough, encrypt};

/// Server-held symmetric encryption of message bodies with a single
/// process-wide key. Stored envelopes carry no version field, so rotating
/// the key would orphan existing ciphertext; rotation is unsupported.
#[derive(Clone)]
pub struct EncryptionService {
    master_key: [u8; 32],
}

impl EncryptionService {
    pub fn new(master_key: [u8; 32]) -> Self {
        Self { master_key }
    }

    /// Encrypt a message body into its storage string (JSON envelope).
    pub fn encrypt_content(&self, plaintext: &str) -> Result<String, AppError> {
        let envelope = encrypt(plaintext, &self.master_key)?;
        Ok(envelope.to_storage_string())
    }

    /// Decrypt a stored content value. Legacy rows hold bare plaintext and
    /// are returned unchanged; see `crypto_core::decrypt_or_passthrough`.
    pub fn decrypt_content(&self, stored: &str) -> Result<String, AppError> {
        Ok(decrypt_or_passthrough(stored, &self.master_key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypts_to_envelope_and_back() {
        let svc = EncryptionService::new([7u8; 32]);
        let stored = svc.encrypt_content("hello").unwrap();
        assert_ne!(stored, "hello");
        assert!(stored.starts_with('{'));
        assert_eq!(svc.decrypt_content(&stored).unwrap(), "hello");
    }

    #[test]
    fn legacy_rows_read_as_is() {
        let svc = EncryptionService::new([7u8; 32]);
        assert_eq!(svc.decrypt_content("pre-codec row").unwrap(), "pre-codec row");
    }
}
