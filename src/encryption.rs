//! Passphrase-based encryption for vault contents and account keys.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::VaultError;

/// A non-empty secret string. Never serialized, never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Passphrase(String);

impl Passphrase {
    pub fn new(value: impl Into<String>) -> Result<Self, VaultError> {
        let value = value.into();
        if value.is_empty() {
            return Err(VaultError::Argument("passphrase cannot be empty".to_string()));
        }
        Ok(Passphrase(value))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Passphrase(***)")
    }
}

impl Drop for Passphrase {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Contract the vault requires from an encryption primitive. `decrypt`
/// must fail on a wrong passphrase, never return garbage.
pub trait EncryptionService: Send + Sync {
    fn encrypt(&self, passphrase: &Passphrase, plaintext: &str) -> Result<String, VaultError>;
    fn decrypt(&self, passphrase: &Passphrase, ciphertext: &str) -> Result<String, VaultError>;
}

/// Ciphertext envelope produced by [`AesGcmEncryptionService`]. Serialized
/// as one JSON string so stores can treat it as opaque contents.
#[derive(Serialize, Deserialize)]
struct Envelope {
    salt: String,
    nonce: String,
    data: String,
}

/// AES-256-GCM with a PBKDF2-HMAC-SHA256 stretched key.
pub struct AesGcmEncryptionService {
    iterations: u32,
}

impl AesGcmEncryptionService {
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    fn derive_key(&self, passphrase: &Passphrase, salt: &[u8]) -> [u8; 32] {
        let mut key = [0u8; 32];
        pbkdf2::<Hmac<Sha256>>(passphrase.expose().as_bytes(), salt, self.iterations, &mut key);
        key
    }
}

impl Default for AesGcmEncryptionService {
    fn default() -> Self {
        Self::new(100_000)
    }
}

impl EncryptionService for AesGcmEncryptionService {
    fn encrypt(&self, passphrase: &Passphrase, plaintext: &str) -> Result<String, VaultError> {
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);

        let mut key = self.derive_key(passphrase, &salt);
        let cipher = Aes256Gcm::new(&key.into());
        key.zeroize();

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| VaultError::Encryption(format!("{:?}", e)))?;

        let envelope = Envelope {
            salt: hex::encode(salt),
            nonce: hex::encode(nonce_bytes),
            data: hex::encode(ciphertext),
        };

        serde_json::to_string(&envelope).map_err(|e| VaultError::Encryption(e.to_string()))
    }

    fn decrypt(&self, passphrase: &Passphrase, ciphertext: &str) -> Result<String, VaultError> {
        let envelope: Envelope =
            serde_json::from_str(ciphertext).map_err(|_| VaultError::Decryption)?;

        let salt = hex::decode(&envelope.salt).map_err(|_| VaultError::Decryption)?;
        let nonce_bytes = hex::decode(&envelope.nonce).map_err(|_| VaultError::Decryption)?;
        let data = hex::decode(&envelope.data).map_err(|_| VaultError::Decryption)?;

        if nonce_bytes.len() != 12 {
            return Err(VaultError::Decryption);
        }

        let mut key = self.derive_key(passphrase, &salt);
        let cipher = Aes256Gcm::new(&key.into());
        key.zeroize();

        let nonce = Nonce::from_slice(&nonce_bytes);
        let plaintext = cipher.decrypt(nonce, data.as_ref()).map_err(|_| VaultError::Decryption)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::Decryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passphrase_rejects_empty() {
        assert!(Passphrase::new("").is_err());
        assert!(Passphrase::new("hunter2").is_ok());
    }

    #[test]
    fn test_passphrase_debug_redacts() {
        let p = Passphrase::new("super secret").unwrap();
        assert_eq!(format!("{:?}", p), "Passphrase(***)");
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let service = AesGcmEncryptionService::new(1_000);
        let passphrase = Passphrase::new("correct horse").unwrap();

        let ciphertext = service.encrypt(&passphrase, "vault contents").unwrap();
        assert_ne!(ciphertext, "vault contents");

        let plaintext = service.decrypt(&passphrase, &ciphertext).unwrap();
        assert_eq!(plaintext, "vault contents");
    }

    #[test]
    fn test_decrypt_fails_on_wrong_passphrase() {
        let service = AesGcmEncryptionService::new(1_000);
        let passphrase = Passphrase::new("correct horse").unwrap();
        let wrong = Passphrase::new("battery staple").unwrap();

        let ciphertext = service.encrypt(&passphrase, "vault contents").unwrap();
        assert!(matches!(service.decrypt(&wrong, &ciphertext), Err(VaultError::Decryption)));
    }

    #[test]
    fn test_decrypt_fails_on_corrupt_envelope() {
        let service = AesGcmEncryptionService::new(1_000);
        let passphrase = Passphrase::new("correct horse").unwrap();

        assert!(service.decrypt(&passphrase, "not an envelope").is_err());
        assert!(service
            .decrypt(&passphrase, r#"{"salt":"00","nonce":"00","data":"00"}"#)
            .is_err());
    }
}
