use serde::{Deserialize, Serialize};

use crate::protocol::SupportedProtocols;

/// How an account came to exist.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountType {
    /// Created from a standalone private key (generated or imported).
    Individual,
    /// Derived from a recovery phrase at a specific index.
    HDChild,
}

/// Secret-bearing account record. Lives inside the vault aggregate, which
/// is encrypted at rest; `private_key` is additionally wrapped with the
/// account's own passphrase when `is_secure` is set.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub name: String,
    // Immutable after creation
    pub address: String,
    pub protocol: SupportedProtocols,
    pub account_type: AccountType,
    /// Recovery phrase id for HD children.
    pub parent_id: Option<String>,

    pub public_key: String,
    /// Clear hex, or an encryption envelope when `is_secure`.
    pub private_key: String,
    pub is_secure: bool,
    /// Derivation index, HD children only.
    pub hdw_index: Option<u32>,
}

impl Account {
    /// Public projection handed to callers: no key material.
    pub fn reference(&self) -> AccountReference {
        AccountReference {
            id: self.id.clone(),
            name: self.name.clone(),
            address: self.address.clone(),
            protocol: self.protocol,
            account_type: self.account_type,
            parent_id: self.parent_id.clone(),
        }
    }
}

/// Public account handle: everything callers may see without a session
/// that reads secrets.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AccountReference {
    pub id: String,
    pub name: String,
    pub address: String,
    pub protocol: SupportedProtocols,
    pub account_type: AccountType,
    pub parent_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_carries_no_key_material() {
        let account = Account {
            id: "acc-1".to_string(),
            name: "Main".to_string(),
            address: "30fd308b3bf2126030aba7f0e342dcb8b4922a8b".to_string(),
            protocol: SupportedProtocols::Pocket,
            account_type: AccountType::Individual,
            parent_id: None,
            public_key: "49b7b82f".to_string(),
            private_key: "f0f18c74".to_string(),
            is_secure: false,
            hdw_index: None,
        };

        let reference = account.reference();
        assert_eq!(reference.id, account.id);
        assert_eq!(reference.address, account.address);

        let json = serde_json::to_string(&reference).unwrap();
        assert!(!json.contains("private_key"));
        assert!(!json.contains("f0f18c74"));
    }
}
