//! The vault teller: every mutating or secret-reading call enters here.
//!
//! The teller validates the caller's session, decrypts the vault with the
//! supplied passphrase when secrets must be touched, delegates
//! protocol-specific work to the matching protocol service, re-encrypts and
//! persists the vault, and returns plain results or typed errors. The
//! decrypted vault is exclusively owned here while unlocked.

use num_bigint::BigUint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::account::{Account, AccountReference, AccountType};
use crate::config::TellerConfig;
use crate::encryption::{EncryptionService, Passphrase};
use crate::error::VaultError;
use crate::permissions::{owner_permissions, Permission};
use crate::protocol::{
    Asset, DerivedAccount, Network, ProtocolRegistry, SupportedProtocols, TransferRequest,
};
use crate::recovery::{
    allocate_hdw_indices, generate_mnemonic, validate_mnemonic, RecoveryPhrase,
    RecoveryPhraseReference,
};
use crate::session::{ExternalAccessRequest, Session};
use crate::storage::{RecordStorage, VaultStore};
use crate::vault::{EncryptedVault, Vault};

pub struct UnlockOptions {
    pub session_max_age_secs: Option<i64>,
}

pub struct CreateAccountOptions {
    pub name: String,
    pub protocol: SupportedProtocols,
    /// Optional per-account passphrase; set => the key is stored encrypted.
    pub passphrase: Option<Passphrase>,
}

pub struct ImportAccountOptions {
    pub name: String,
    pub protocol: SupportedProtocols,
    pub private_key: String,
    pub passphrase: Option<Passphrase>,
}

pub struct DeriveAccountOptions {
    pub name: Option<String>,
    pub protocol: SupportedProtocols,
    pub private_key: String,
}

pub struct ImportRecoveryPhraseOptions {
    pub recovery_phrase: String,
    pub recovery_phrase_name: String,
    /// Protocol of the HD child derived automatically at index 0.
    pub protocol: SupportedProtocols,
    /// Optional BIP-39 seed passphrase.
    pub passphrase: Option<String>,
}

pub struct UpdateRecoveryPhraseOptions {
    pub recovery_phrase_id: String,
    pub name: Option<String>,
}

pub struct AddHdAccountOptions {
    pub recovery_phrase_id: String,
    pub protocol: SupportedProtocols,
    pub count: u32,
}

/// Where the funds of a transfer come from.
pub enum TransferOrigin {
    RawPrivateKey {
        private_key: String,
    },
    VaultAccountId {
        account_id: String,
        /// Account passphrase, required when the account is secure.
        passphrase: Option<Passphrase>,
    },
}

pub struct TransferArgs {
    pub origin: TransferOrigin,
    /// Raw destination address.
    pub to: String,
    pub amount: BigUint,
    pub network: Network,
    pub asset: Option<Asset>,
    pub memo: Option<String>,
}

pub struct VaultTeller {
    vault_store: Arc<dyn VaultStore>,
    session_store: Arc<dyn RecordStorage<Session>>,
    encryption: Arc<dyn EncryptionService>,
    protocols: ProtocolRegistry,
    config: TellerConfig,
    vault: Mutex<Option<Vault>>,
    unlocked: AtomicBool,
}

impl VaultTeller {
    pub fn new(
        vault_store: Arc<dyn VaultStore>,
        session_store: Arc<dyn RecordStorage<Session>>,
        encryption: Arc<dyn EncryptionService>,
        protocols: ProtocolRegistry,
        config: TellerConfig,
    ) -> Self {
        Self {
            vault_store,
            session_store,
            encryption,
            protocols,
            config,
            vault: Mutex::new(None),
            unlocked: AtomicBool::new(false),
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked.load(Ordering::SeqCst)
    }

    // ---------- vault lifecycle ----------

    pub async fn initialize_vault(&self, passphrase: &Passphrase) -> Result<(), VaultError> {
        if self.vault_store.get().await?.is_some() {
            return Err(VaultError::VaultAlreadyInitialized);
        }

        let vault = Vault::new();
        let contents = self.encryption.encrypt(passphrase, &vault.serialize()?)?;
        self.vault_store.save(&EncryptedVault::new(contents)).await?;
        info!(vault_id = %vault.id, "vault initialized");
        Ok(())
    }

    pub async fn unlock_vault(
        &self,
        passphrase: &Passphrase,
        options: Option<UnlockOptions>,
    ) -> Result<Session, VaultError> {
        let (vault, _) = self.load_decrypted(passphrase).await?;
        let vault_id = vault.id.clone();

        *self.vault.lock().await = Some(vault);
        self.unlocked.store(true, Ordering::SeqCst);

        let max_age = options
            .and_then(|o| o.session_max_age_secs)
            .unwrap_or(self.config.sessions.default_max_age_secs as i64);
        let session = Session::new(owner_permissions(), Some(max_age), None)?;
        self.session_store.save(&session).await?;

        info!(vault_id = %vault_id, session_id = %session.id, "vault unlocked");
        Ok(session)
    }

    /// Drops the decrypted vault. Persisted sessions are untouched.
    pub async fn lock_vault(&self) {
        *self.vault.lock().await = None;
        self.unlocked.store(false, Ordering::SeqCst);
        info!("vault locked");
    }

    /// Re-encrypts the *persisted* vault contents under `new_passphrase`
    /// (or the current one) and returns the envelope without storing it.
    pub async fn export_vault(
        &self,
        passphrase: &Passphrase,
        new_passphrase: Option<&Passphrase>,
    ) -> Result<EncryptedVault, VaultError> {
        let envelope = self.vault_store.get().await?.ok_or(VaultError::VaultUninitialized)?;
        let plaintext = Zeroizing::new(
            self.encryption
                .decrypt(passphrase, &envelope.contents)
                .map_err(|_| {
                    VaultError::VaultRestore("wrong passphrase or corrupted contents".to_string())
                })?,
        );

        let contents = self
            .encryption
            .encrypt(new_passphrase.unwrap_or(passphrase), &plaintext)?;
        Ok(EncryptedVault::updated(contents, envelope.created_at))
    }

    /// Replaces any persisted vault with the imported one under a fresh
    /// identity. The teller relocks; callers unlock explicitly afterwards.
    pub async fn import_vault(
        &self,
        encrypted: &EncryptedVault,
        passphrase: &Passphrase,
        new_passphrase: Option<&Passphrase>,
    ) -> Result<(), VaultError> {
        if encrypted.contents.is_empty() {
            return Err(VaultError::VaultRestore("empty vault contents".to_string()));
        }

        let plaintext = Zeroizing::new(
            self.encryption
                .decrypt(passphrase, &encrypted.contents)
                .map_err(|_| {
                    VaultError::VaultRestore("wrong passphrase or corrupted contents".to_string())
                })?,
        );
        let mut vault = Vault::deserialize(&plaintext)?;
        vault.rotate_id();

        let contents = self
            .encryption
            .encrypt(new_passphrase.unwrap_or(passphrase), &vault.serialize()?)?;
        self.vault_store.save(&EncryptedVault::new(contents)).await?;

        *self.vault.lock().await = None;
        self.unlocked.store(false, Ordering::SeqCst);
        info!(vault_id = %vault.id, "vault imported under a fresh identity");
        Ok(())
    }

    // ---------- sessions ----------

    /// Never errors: any failure to locate or validate reads as false.
    pub async fn is_session_valid(&self, session_id: Option<&str>) -> bool {
        let Some(id) = session_id.filter(|s| !s.is_empty()) else {
            return false;
        };
        match self.session_store.get_by_id(id).await {
            Ok(Some(session)) => session.is_valid(),
            _ => false,
        }
    }

    pub async fn authorize_external(
        &self,
        request: ExternalAccessRequest,
    ) -> Result<Session, VaultError> {
        if !self.is_unlocked() {
            return Err(VaultError::Argument(
                "Vault must be unlocked to authorize external access".to_string(),
            ));
        }
        request.validate()?;

        let mut session = Session::new(
            request.permissions.clone(),
            request.max_age_secs,
            request.origin.clone(),
        )?;
        if request.grants_revoke_permission {
            let own_id = session.id.clone();
            session
                .permissions
                .push(Permission::new("session", "revoke", vec![own_id]));
        }
        self.session_store.save(&session).await?;

        info!(
            session_id = %session.id,
            origin = request.origin.as_deref().unwrap_or("unknown"),
            "external session granted"
        );
        Ok(session)
    }

    pub async fn list_sessions(&self, session_id: Option<&str>) -> Result<Vec<Session>, VaultError> {
        self.authorize(session_id, "session", "list", None).await?;
        self.session_store.list().await
    }

    pub async fn revoke_session(
        &self,
        session_id: Option<&str>,
        target_id: &str,
    ) -> Result<(), VaultError> {
        self.authorize(session_id, "session", "revoke", Some(target_id)).await?;

        let mut target = self
            .session_store
            .get_by_id(target_id)
            .await?
            .ok_or_else(|| VaultError::Unauthorized("session id not found".to_string()))?;
        target.invalidate();
        self.session_store.save(&target).await?;
        info!(session_id = %target_id, "session revoked");
        Ok(())
    }

    // ---------- accounts ----------

    pub async fn create_account(
        &self,
        session_id: Option<&str>,
        passphrase: &Passphrase,
        options: CreateAccountOptions,
    ) -> Result<AccountReference, VaultError> {
        self.authorize(session_id, "account", "create", None).await?;
        let service = self.protocols.get(options.protocol)?;
        let derived = service.create_account()?;

        let account =
            self.build_account(derived, options.name, options.protocol, options.passphrase.as_ref())?;
        let reference = account.reference();

        self.mutate_vault(passphrase, move |vault| {
            vault.accounts.push(account);
            Ok(())
        })
        .await?;

        info!(account_id = %reference.id, protocol = %reference.protocol, "account created");
        Ok(reference)
    }

    pub async fn create_account_from_private_key(
        &self,
        session_id: Option<&str>,
        passphrase: &Passphrase,
        options: ImportAccountOptions,
        replace: bool,
    ) -> Result<AccountReference, VaultError> {
        self.authorize(session_id, "account", "create", None).await?;
        let service = self.protocols.get(options.protocol)?;
        let derived = service.derive_account_from_private_key(&options.private_key)?;

        let mut account =
            self.build_account(derived, options.name, options.protocol, options.passphrase.as_ref())?;

        let reference = self
            .mutate_vault(passphrase, move |vault| {
                match vault.account_position(account.protocol, &account.address) {
                    Some(_) if !replace => Err(VaultError::AccountExists),
                    Some(position) => {
                        // overwrite in place, preserving the original id
                        account.id = vault.accounts[position].id.clone();
                        let reference = account.reference();
                        vault.accounts[position] = account;
                        Ok(reference)
                    }
                    None => {
                        let reference = account.reference();
                        vault.accounts.push(account);
                        Ok(reference)
                    }
                }
            })
            .await?;

        info!(account_id = %reference.id, protocol = %reference.protocol, "account imported");
        Ok(reference)
    }

    /// Stateless preview: derives without touching session or storage.
    pub fn derive_account_from_private_key(
        &self,
        options: DeriveAccountOptions,
    ) -> Result<Account, VaultError> {
        let service = self.protocols.get(options.protocol)?;
        let derived = service.derive_account_from_private_key(&options.private_key)?;
        let name = options.name.unwrap_or_default();
        Ok(new_account(derived, name, options.protocol, None, None, false))
    }

    pub async fn list_accounts(
        &self,
        session_id: Option<&str>,
    ) -> Result<Vec<AccountReference>, VaultError> {
        self.authorize(session_id, "account", "read", None).await?;
        let guard = self.vault.lock().await;
        let vault = guard.as_ref().ok_or(VaultError::VaultIsLocked)?;
        Ok(vault.accounts.iter().map(|a| a.reference()).collect())
    }

    pub async fn update_account_name(
        &self,
        session_id: Option<&str>,
        passphrase: &Passphrase,
        account_id: &str,
        name: String,
    ) -> Result<AccountReference, VaultError> {
        self.authorize(session_id, "account", "update", Some(account_id)).await?;
        let account_id = account_id.to_string();
        self.mutate_vault(passphrase, move |vault| {
            let account = vault
                .account_by_id_mut(&account_id)
                .ok_or(VaultError::AccountNotFound)?;
            account.name = name;
            Ok(account.reference())
        })
        .await
    }

    pub async fn remove_account(
        &self,
        session_id: Option<&str>,
        passphrase: &Passphrase,
        account: &AccountReference,
    ) -> Result<(), VaultError> {
        self.authorize(session_id, "account", "delete", Some(&account.id)).await?;
        let account_id = account.id.clone();
        self.mutate_vault(passphrase, move |vault| {
            let position = vault
                .accounts
                .iter()
                .position(|a| a.id == account_id)
                .ok_or(VaultError::AccountNotFound)?;
            vault.accounts.remove(position);
            Ok(())
        })
        .await?;
        info!(account_id = %account.id, "account removed");
        Ok(())
    }

    pub async fn get_account_private_key(
        &self,
        session_id: Option<&str>,
        passphrase: &Passphrase,
        account: &AccountReference,
        account_passphrase: Option<&Passphrase>,
    ) -> Result<String, VaultError> {
        self.authorize(session_id, "account", "read", Some(&account.id)).await?;
        if !self.is_unlocked() {
            return Err(VaultError::VaultIsLocked);
        }

        // decrypting the persisted envelope also verifies the passphrase
        let (vault, _) = self.load_decrypted(passphrase).await?;
        let stored = vault.account_by_id(&account.id).ok_or(VaultError::AccountNotFound)?;

        if stored.is_secure {
            let account_passphrase = account_passphrase.ok_or(VaultError::PrivateKeyRestore)?;
            self.encryption
                .decrypt(account_passphrase, &stored.private_key)
                .map_err(|_| VaultError::PrivateKeyRestore)
        } else {
            Ok(stored.private_key.clone())
        }
    }

    // ---------- recovery phrases ----------

    pub async fn import_recovery_phrase(
        &self,
        session_id: Option<&str>,
        passphrase: &Passphrase,
        options: ImportRecoveryPhraseOptions,
    ) -> Result<RecoveryPhraseReference, VaultError> {
        self.authorize(session_id, "seed", "create", None).await?;
        let normalized = validate_mnemonic(&options.recovery_phrase)?;
        let service = self.protocols.get(options.protocol)?;

        let phrase = RecoveryPhrase {
            id: Uuid::new_v4().to_string(),
            name: options.recovery_phrase_name,
            phrase: normalized,
            seed_passphrase: options.passphrase,
        };
        let reference = phrase.reference();

        // the first HD child comes with the phrase
        let derived =
            service.derive_hd_account(&phrase.phrase, phrase.seed_passphrase.as_deref(), 0)?;
        let child = new_account(
            derived,
            format!("{} 0", phrase.name),
            options.protocol,
            Some(phrase.id.clone()),
            Some(0),
            false,
        );

        self.mutate_vault(passphrase, move |vault| {
            let duplicate = vault
                .recovery_phrases
                .iter()
                .any(|p| p.matches(&phrase.phrase, phrase.seed_passphrase.as_deref()));
            if duplicate {
                return Err(VaultError::RecoveryPhraseExists);
            }
            vault.recovery_phrases.push(phrase);
            vault.accounts.push(child);
            Ok(())
        })
        .await?;

        info!(recovery_phrase_id = %reference.id, "recovery phrase imported");
        Ok(reference)
    }

    pub async fn list_recovery_phrases(
        &self,
        session_id: Option<&str>,
    ) -> Result<Vec<RecoveryPhraseReference>, VaultError> {
        self.authorize(session_id, "seed", "read", None).await?;
        let guard = self.vault.lock().await;
        let vault = guard.as_ref().ok_or(VaultError::VaultIsLocked)?;
        Ok(vault.recovery_phrases.iter().map(|p| p.reference()).collect())
    }

    pub async fn update_recovery_phrase(
        &self,
        session_id: Option<&str>,
        passphrase: &Passphrase,
        options: UpdateRecoveryPhraseOptions,
    ) -> Result<RecoveryPhraseReference, VaultError> {
        self.authorize(session_id, "seed", "update", Some(&options.recovery_phrase_id)).await?;
        self.mutate_vault(passphrase, move |vault| {
            let phrase = vault
                .phrase_by_id_mut(&options.recovery_phrase_id)
                .ok_or(VaultError::RecoveryPhraseNotFound)?;
            if let Some(name) = options.name {
                phrase.name = name;
            }
            Ok(phrase.reference())
        })
        .await
    }

    /// Reveals the stored mnemonic. `seed:read` scoped to the phrase id.
    pub async fn get_recovery_phrase(
        &self,
        session_id: Option<&str>,
        passphrase: &Passphrase,
        recovery_phrase_id: &str,
    ) -> Result<String, VaultError> {
        self.authorize(session_id, "seed", "read", Some(recovery_phrase_id)).await?;
        if !self.is_unlocked() {
            return Err(VaultError::VaultIsLocked);
        }

        let (vault, _) = self.load_decrypted(passphrase).await?;
        let phrase = vault
            .phrase_by_id(recovery_phrase_id)
            .ok_or(VaultError::RecoveryPhraseNotFound)?;
        Ok(phrase.phrase.clone())
    }

    /// Removes the phrase and every HD child derived from it.
    pub async fn remove_recovery_phrase(
        &self,
        session_id: Option<&str>,
        passphrase: &Passphrase,
        recovery_phrase_id: &str,
    ) -> Result<(), VaultError> {
        self.authorize(session_id, "seed", "delete", Some(recovery_phrase_id)).await?;
        let phrase_id = recovery_phrase_id.to_string();
        self.mutate_vault(passphrase, move |vault| {
            let position = vault
                .recovery_phrases
                .iter()
                .position(|p| p.id == phrase_id)
                .ok_or(VaultError::RecoveryPhraseNotFound)?;
            vault.recovery_phrases.remove(position);
            vault.accounts.retain(|a| a.parent_id.as_deref() != Some(phrase_id.as_str()));
            Ok(())
        })
        .await?;
        info!(recovery_phrase_id, "recovery phrase removed");
        Ok(())
    }

    pub async fn add_hd_wallet_account(
        &self,
        session_id: Option<&str>,
        passphrase: &Passphrase,
        options: AddHdAccountOptions,
    ) -> Result<Vec<AccountReference>, VaultError> {
        self.authorize(session_id, "account", "create", None).await?;
        if options.count == 0 {
            return Err(VaultError::Argument("count must be at least 1".to_string()));
        }
        let service = self.protocols.get(options.protocol)?;

        let references = self
            .mutate_vault(passphrase, move |vault| {
                let phrase = vault
                    .phrase_by_id(&options.recovery_phrase_id)
                    .ok_or(VaultError::RecoveryPhraseNotFound)?
                    .clone();

                let used = vault.used_hdw_indices(&phrase.id, options.protocol);
                let indices = allocate_hdw_indices(&used, options.count);

                let mut references = Vec::with_capacity(indices.len());
                for index in indices {
                    let derived = service.derive_hd_account(
                        &phrase.phrase,
                        phrase.seed_passphrase.as_deref(),
                        index,
                    )?;
                    let child = new_account(
                        derived,
                        format!("{} {}", phrase.name, index),
                        options.protocol,
                        Some(phrase.id.clone()),
                        Some(index),
                        false,
                    );
                    references.push(child.reference());
                    vault.accounts.push(child);
                }
                Ok(references)
            })
            .await?;

        debug!(count = references.len(), "hd accounts derived");
        Ok(references)
    }

    // ---------- transfers ----------

    pub async fn transfer_funds(
        &self,
        session_id: Option<&str>,
        args: TransferArgs,
    ) -> Result<String, VaultError> {
        let service = self.protocols.get(args.network.protocol)?;

        let private_key = match &args.origin {
            TransferOrigin::RawPrivateKey { private_key } => {
                self.authorize(session_id, "transaction", "send", None).await?;
                if !service.is_valid_private_key(private_key) {
                    return Err(VaultError::InvalidPrivateKey(
                        "origin key does not match the protocol format".to_string(),
                    ));
                }
                Zeroizing::new(private_key.clone())
            }
            TransferOrigin::VaultAccountId {
                account_id,
                passphrase,
            } => {
                self.authorize(session_id, "transaction", "send", Some(account_id)).await?;

                let guard = self.vault.lock().await;
                let vault = guard.as_ref().ok_or(VaultError::VaultIsLocked)?;
                let account = vault.account_by_id(account_id).ok_or(VaultError::AccountNotFound)?;

                if account.is_secure {
                    let account_passphrase =
                        passphrase.as_ref().ok_or(VaultError::PrivateKeyRestore)?;
                    Zeroizing::new(
                        self.encryption
                            .decrypt(account_passphrase, &account.private_key)
                            .map_err(|_| VaultError::PrivateKeyRestore)?,
                    )
                } else {
                    Zeroizing::new(account.private_key.clone())
                }
            }
        };

        let request = TransferRequest {
            private_key: private_key.to_string(),
            to: args.to.clone(),
            amount: args.amount.clone(),
            memo: args.memo.clone(),
            asset: args.asset.clone(),
        };
        let hash = service.send_transaction(&args.network, &request).await?;
        info!(tx_hash = %hash, protocol = %args.network.protocol, "transfer broadcast");
        Ok(hash)
    }

    // ---------- pure utilities ----------

    pub fn create_recovery_phrase(word_count: usize) -> Result<String, VaultError> {
        generate_mnemonic(word_count)
    }

    pub fn validate_recovery_phrase(phrase: &str) -> Result<String, VaultError> {
        validate_mnemonic(phrase)
    }

    // ---------- internals ----------

    /// Session checks in contract order: id present, found, valid, permitted.
    async fn authorize(
        &self,
        session_id: Option<&str>,
        resource: &str,
        action: &str,
        identity: Option<&str>,
    ) -> Result<Session, VaultError> {
        let id = session_id
            .filter(|s| !s.is_empty())
            .ok_or(VaultError::SessionIdRequired)?;
        let session = self
            .session_store
            .get_by_id(id)
            .await?
            .ok_or_else(|| VaultError::Unauthorized("session id not found".to_string()))?;
        if !session.is_valid() {
            return Err(VaultError::Unauthorized("session is invalid".to_string()));
        }
        if !session.includes(resource, action, identity) {
            return Err(VaultError::ForbiddenSession);
        }
        Ok(session)
    }

    async fn load_decrypted(&self, passphrase: &Passphrase) -> Result<(Vault, i64), VaultError> {
        let envelope = self.vault_store.get().await?.ok_or(VaultError::VaultUninitialized)?;
        let plaintext = Zeroizing::new(
            self.encryption
                .decrypt(passphrase, &envelope.contents)
                .map_err(|_| {
                    VaultError::VaultRestore("wrong passphrase or corrupted contents".to_string())
                })?,
        );
        Ok((Vault::deserialize(&plaintext)?, envelope.created_at))
    }

    /// Decrypt, mutate, persist as one critical section: the in-memory
    /// vault is only replaced after the persisted write succeeded.
    async fn mutate_vault<R>(
        &self,
        passphrase: &Passphrase,
        mutate: impl FnOnce(&mut Vault) -> Result<R, VaultError>,
    ) -> Result<R, VaultError> {
        let mut guard = self.vault.lock().await;
        if guard.is_none() {
            return Err(VaultError::VaultIsLocked);
        }

        let (mut vault, created_at) = self.load_decrypted(passphrase).await?;
        let result = mutate(&mut vault)?;

        let contents = self.encryption.encrypt(passphrase, &vault.serialize()?)?;
        self.vault_store
            .save(&EncryptedVault::updated(contents, created_at))
            .await?;
        *guard = Some(vault);
        Ok(result)
    }

    fn build_account(
        &self,
        derived: DerivedAccount,
        name: String,
        protocol: SupportedProtocols,
        account_passphrase: Option<&Passphrase>,
    ) -> Result<Account, VaultError> {
        let mut account = new_account(derived, name, protocol, None, None, false);
        if let Some(account_passphrase) = account_passphrase {
            account.private_key = self.encryption.encrypt(account_passphrase, &account.private_key)?;
            account.is_secure = true;
        }
        Ok(account)
    }
}

fn new_account(
    derived: DerivedAccount,
    name: String,
    protocol: SupportedProtocols,
    parent_id: Option<String>,
    hdw_index: Option<u32>,
    is_secure: bool,
) -> Account {
    let account_type = if hdw_index.is_some() {
        AccountType::HDChild
    } else {
        AccountType::Individual
    };
    Account {
        id: Uuid::new_v4().to_string(),
        name,
        address: derived.address.clone(),
        protocol,
        account_type,
        parent_id,
        public_key: derived.public_key.clone(),
        private_key: derived.private_key.clone(),
        is_secure,
        hdw_index,
    }
}
