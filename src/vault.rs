//! The vault aggregate and its encrypted-at-rest envelope.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::Account;
use crate::error::VaultError;
use crate::protocol::SupportedProtocols;
use crate::recovery::RecoveryPhrase;

/// Ciphertext envelope persisted by a [`crate::storage::VaultStore`].
/// `contents` is whatever the encryption service produced; opaque here.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EncryptedVault {
    pub contents: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl EncryptedVault {
    pub fn new(contents: String) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            contents,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fresh contents for an already-existing vault: creation time sticks.
    pub fn updated(contents: String, created_at: i64) -> Self {
        Self {
            contents,
            created_at,
            updated_at: Utc::now().timestamp_millis(),
        }
    }
}

/// Decrypted aggregate of accounts and recovery phrases. Exclusively owned
/// by the teller while unlocked; nothing else holds decrypted secrets.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Vault {
    pub id: String,
    pub accounts: Vec<Account>,
    pub recovery_phrases: Vec<RecoveryPhrase>,
}

impl Vault {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            accounts: Vec::new(),
            recovery_phrases: Vec::new(),
        }
    }

    /// Fresh identity, same contents. Every import rotates the id.
    pub fn rotate_id(&mut self) {
        self.id = Uuid::new_v4().to_string();
    }

    pub fn serialize(&self) -> Result<String, VaultError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn deserialize(data: &str) -> Result<Self, VaultError> {
        serde_json::from_str(data).map_err(|e| VaultError::VaultRestore(e.to_string()))
    }

    pub fn account_by_id(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    pub fn account_by_id_mut(&mut self, id: &str) -> Option<&mut Account> {
        self.accounts.iter_mut().find(|a| a.id == id)
    }

    pub fn account_position(&self, protocol: SupportedProtocols, address: &str) -> Option<usize> {
        self.accounts
            .iter()
            .position(|a| a.protocol == protocol && a.address == address)
    }

    pub fn phrase_by_id(&self, id: &str) -> Option<&RecoveryPhrase> {
        self.recovery_phrases.iter().find(|p| p.id == id)
    }

    pub fn phrase_by_id_mut(&mut self, id: &str) -> Option<&mut RecoveryPhrase> {
        self.recovery_phrases.iter_mut().find(|p| p.id == id)
    }

    /// Derivation indices already taken for (recovery phrase, protocol).
    pub fn used_hdw_indices(&self, phrase_id: &str, protocol: SupportedProtocols) -> Vec<u32> {
        self.accounts
            .iter()
            .filter(|a| {
                a.parent_id.as_deref() == Some(phrase_id) && a.protocol == protocol
            })
            .filter_map(|a| a.hdw_index)
            .collect()
    }
}

impl Default for Vault {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_round_trip() {
        let vault = Vault::new();
        let restored = Vault::deserialize(&vault.serialize().unwrap()).unwrap();
        assert_eq!(restored, vault);
    }

    #[test]
    fn test_rotate_id_changes_identity_only() {
        let mut vault = Vault::new();
        let original = vault.id.clone();
        vault.rotate_id();
        assert_ne!(vault.id, original);
        assert!(vault.accounts.is_empty());
        assert!(vault.recovery_phrases.is_empty());
    }

    #[test]
    fn test_deserialize_garbage_is_restore_error() {
        assert!(matches!(
            Vault::deserialize("definitely not a vault"),
            Err(VaultError::VaultRestore(_))
        ));
    }

    #[test]
    fn test_updated_envelope_keeps_creation_time() {
        let original = EncryptedVault::new("v1".to_string());
        let updated = EncryptedVault::updated("v2".to_string(), original.created_at);
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(updated.contents, "v2");
    }
}
