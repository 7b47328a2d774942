pub mod account;
pub mod config;
pub mod encryption;
pub mod error;
pub mod permissions;
pub mod protocol;
pub mod recovery;
pub mod session;
pub mod storage;
pub mod teller;
pub mod vault;

pub use account::{Account, AccountReference, AccountType};
pub use config::TellerConfig;
pub use encryption::{AesGcmEncryptionService, EncryptionService, Passphrase};
pub use error::VaultError;
pub use permissions::{Permission, PermissionsBuilder};
pub use protocol::{
    Asset, Network, NetworkStatus, ProtocolRegistry, ProtocolService, SupportedProtocols,
};
pub use recovery::{RecoveryPhrase, RecoveryPhraseReference};
pub use session::{ExternalAccessRequest, Session};
pub use storage::{
    FileStorage, FileVaultStore, InMemoryStorage, InMemoryVaultStore, RecordStorage, VaultStore,
};
pub use teller::{
    AddHdAccountOptions, CreateAccountOptions, DeriveAccountOptions, ImportAccountOptions,
    ImportRecoveryPhraseOptions, TransferArgs, TransferOrigin, UnlockOptions,
    UpdateRecoveryPhraseOptions, VaultTeller,
};
pub use vault::{EncryptedVault, Vault};
