use thiserror::Error;

/// Crate-wide error taxonomy. Every variant is recoverable by the caller
/// (retry with the right passphrase, re-request permission, pick another
/// account); genuinely corrupt internal states panic instead.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Invalid argument: {0}")]
    Argument(String),
    #[error("Vault has not been initialized")]
    VaultUninitialized,
    #[error("Vault is already initialized")]
    VaultAlreadyInitialized,
    #[error("Unable to restore vault: {0}")]
    VaultRestore(String),
    #[error("Vault is locked")]
    VaultIsLocked,
    #[error("Session id is required")]
    SessionIdRequired,
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Session is not allowed to perform this operation")]
    ForbiddenSession,
    #[error("Account not found")]
    AccountNotFound,
    #[error("An account already exists for this address and protocol")]
    AccountExists,
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("Unable to restore private key: wrong or missing account passphrase")]
    PrivateKeyRestore,
    #[error("Invalid recovery phrase: {0}")]
    RecoveryPhrase(String),
    #[error("This recovery phrase was already imported")]
    RecoveryPhraseExists,
    #[error("Recovery phrase not found")]
    RecoveryPhraseNotFound,
    #[error("Network request failed: {0}")]
    NetworkRequest(String),
    #[error("Protocol not supported: {0}")]
    ProtocolNotSupported(String),
    #[error("Unknown resource: {0}")]
    UnknownResource(String),
    #[error("Unknown actions for resource '{resource}': {}", .actions.join(", "))]
    UnknownActions {
        resource: String,
        actions: Vec<String>,
    },
    #[error("Encryption failed: {0}")]
    Encryption(String),
    #[error("Decryption failed")]
    Decryption,
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::Serialization(err.to_string())
    }
}
