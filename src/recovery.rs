//! Recovery phrases (BIP-39 mnemonics) and HD index allocation.

use bip39::{Language, Mnemonic};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::VaultError;

/// An imported or created mnemonic. Lives inside the vault aggregate,
/// which is encrypted at rest; the optional seed passphrase is kept so HD
/// children can be derived later without re-prompting.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RecoveryPhrase {
    pub id: String,
    pub name: String,
    pub phrase: String,
    pub seed_passphrase: Option<String>,
}

impl RecoveryPhrase {
    pub fn has_passphrase(&self) -> bool {
        self.seed_passphrase.is_some()
    }

    /// Uniqueness key inside a vault: (decrypted phrase, seed passphrase).
    pub fn matches(&self, phrase: &str, seed_passphrase: Option<&str>) -> bool {
        self.phrase == phrase && self.seed_passphrase.as_deref() == seed_passphrase
    }

    pub fn reference(&self) -> RecoveryPhraseReference {
        RecoveryPhraseReference {
            id: self.id.clone(),
            name: self.name.clone(),
            has_passphrase: self.has_passphrase(),
        }
    }
}

/// Public projection: no phrase, no seed passphrase.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RecoveryPhraseReference {
    pub id: String,
    pub name: String,
    pub has_passphrase: bool,
}

/// Generate a fresh mnemonic with the requested word count.
pub fn generate_mnemonic(word_count: usize) -> Result<String, VaultError> {
    let entropy_bytes = match word_count {
        12 => 16,
        15 => 20,
        18 => 24,
        21 => 28,
        24 => 32,
        other => {
            return Err(VaultError::Argument(format!(
                "unsupported mnemonic word count: {}",
                other
            )))
        }
    };

    let mut entropy = [0u8; 32];
    OsRng.fill_bytes(&mut entropy[..entropy_bytes]);

    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy[..entropy_bytes])
        .map_err(|e| VaultError::RecoveryPhrase(e.to_string()))?;
    Ok(mnemonic.to_string())
}

/// Validate and normalize a mnemonic. Word casing and spacing are folded
/// to the canonical form so uniqueness checks compare like with like.
pub fn validate_mnemonic(phrase: &str) -> Result<String, VaultError> {
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)
        .map_err(|e| VaultError::RecoveryPhrase(e.to_string()))?;
    Ok(mnemonic.to_string())
}

/// BIP-39 seed for derivation, honoring the optional seed passphrase.
pub fn mnemonic_to_seed(phrase: &str, seed_passphrase: Option<&str>) -> Result<[u8; 64], VaultError> {
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)
        .map_err(|e| VaultError::RecoveryPhrase(e.to_string()))?;
    Ok(mnemonic.to_seed(seed_passphrase.unwrap_or("")))
}

/// Allocate `count` derivation indices against the already-used set.
/// Each allocation takes the lowest unused index, so removals leave gaps
/// that get refilled before the range grows past `max + 1`.
pub fn allocate_hdw_indices(used: &[u32], count: u32) -> Vec<u32> {
    let mut taken: BTreeSet<u32> = used.iter().copied().collect();
    let mut allocated = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let mut candidate = 0u32;
        while taken.contains(&candidate) {
            candidate += 1;
        }
        taken.insert(candidate);
        allocated.push(candidate);
    }
    allocated
}
