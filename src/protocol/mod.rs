//! Uniform blockchain-operation contract and the per-protocol services.
//!
//! One implementation per protocol behind [`ProtocolService`]; callers pick
//! an implementation out of [`ProtocolRegistry`] keyed on
//! [`SupportedProtocols`] and never branch on protocol identity themselves.

pub mod ethereum;
pub mod pocket;
pub mod shannon;

use async_trait::async_trait;
use chrono::Utc;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::NetworkDefaults;
use crate::error::VaultError;

pub use ethereum::EthereumService;
pub use pocket::PocketService;
pub use shannon::ShannonService;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportedProtocols {
    Pocket,
    Ethereum,
    Shannon,
}

impl std::fmt::Display for SupportedProtocols {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupportedProtocols::Pocket => write!(f, "pocket"),
            SupportedProtocols::Ethereum => write!(f, "ethereum"),
            SupportedProtocols::Shannon => write!(f, "shannon"),
        }
    }
}

/// RPC endpoint descriptor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub protocol: SupportedProtocols,
    pub chain_id: String,
    pub rpc_url: String,
}

/// Chain/token descriptor. `contract_address` selects a token balance
/// instead of the native coin where the protocol supports it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub protocol: SupportedProtocols,
    pub chain_id: String,
    pub symbol: String,
    pub contract_address: Option<String>,
    pub decimals: Option<u8>,
}

/// Key material produced by account creation/derivation. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedAccount {
    #[zeroize(skip)]
    pub address: String,
    #[zeroize(skip)]
    pub public_key: String,
    pub private_key: String,
}

/// Transaction fee in the protocol's base denomination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fee {
    pub amount: BigUint,
    pub denom: String,
}

/// Capability probe result; each capability carries its probe timestamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkStatus {
    pub can_provide_balance: bool,
    pub balance_checked_at_ms: Option<i64>,
    pub can_provide_fee: bool,
    pub fee_checked_at_ms: Option<i64>,
    pub can_send_transaction: bool,
    pub send_checked_at_ms: Option<i64>,
}

/// A transfer with the origin key already resolved by the teller.
pub struct TransferRequest {
    pub private_key: String,
    pub to: String,
    pub amount: BigUint,
    pub memo: Option<String>,
    pub asset: Option<Asset>,
}

pub struct PersonalSignRequest {
    pub private_key: String,
    /// Hex (0x-prefixed or bare) is signed as bytes, anything else as UTF-8.
    pub message: String,
}

/// Typed-data signing: the caller supplies the EIP-712 domain-separator
/// and struct hashes; the service signs the prefixed digest.
pub struct TypedSignRequest {
    pub private_key: String,
    pub domain_hash: String,
    pub struct_hash: String,
}

/// Uniform per-protocol contract. Implementations validate argument shape
/// before any I/O and normalize RPC failures to `NetworkRequest`.
#[async_trait]
pub trait ProtocolService: Send + Sync {
    fn protocol(&self) -> SupportedProtocols;

    fn create_account(&self) -> Result<DerivedAccount, VaultError>;
    fn derive_account_from_private_key(&self, private_key: &str)
        -> Result<DerivedAccount, VaultError>;
    fn derive_hd_account(
        &self,
        phrase: &str,
        seed_passphrase: Option<&str>,
        index: u32,
    ) -> Result<DerivedAccount, VaultError>;

    fn is_valid_private_key(&self, private_key: &str) -> bool {
        self.derive_account_from_private_key(private_key).is_ok()
    }

    async fn get_balance(
        &self,
        address: &str,
        network: &Network,
        asset: Option<&Asset>,
    ) -> Result<BigUint, VaultError>;
    async fn get_fee(&self, network: &Network) -> Result<Fee, VaultError>;
    async fn get_network_status(&self, network: &Network) -> Result<NetworkStatus, VaultError>;
    async fn send_transaction(
        &self,
        network: &Network,
        request: &TransferRequest,
    ) -> Result<String, VaultError>;

    fn sign_personal_data(&self, request: &PersonalSignRequest) -> Result<String, VaultError>;

    fn sign_typed_data(&self, _request: &TypedSignRequest) -> Result<String, VaultError> {
        Err(VaultError::ProtocolNotSupported(format!(
            "{} does not support typed data signing",
            self.protocol()
        )))
    }
}

/// Services keyed by protocol tag.
pub struct ProtocolRegistry {
    services: HashMap<SupportedProtocols, Arc<dyn ProtocolService>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// All bundled protocol services, sharing the configured RPC timeout.
    pub fn with_defaults(config: &NetworkDefaults) -> Self {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let mut registry = Self::new();
        registry.register(Arc::new(PocketService::new(timeout)));
        registry.register(Arc::new(EthereumService::new(timeout)));
        registry.register(Arc::new(ShannonService::new(timeout)));
        registry
    }

    pub fn register(&mut self, service: Arc<dyn ProtocolService>) {
        self.services.insert(service.protocol(), service);
    }

    pub fn get(&self, protocol: SupportedProtocols) -> Result<Arc<dyn ProtocolService>, VaultError> {
        self.services
            .get(&protocol)
            .cloned()
            .ok_or_else(|| VaultError::ProtocolNotSupported(protocol.to_string()))
    }
}

impl Default for ProtocolRegistry {
    fn default() -> Self {
        Self::with_defaults(&crate::config::TellerConfig::default().networks)
    }
}

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Shared up-front network validation: right protocol, usable endpoint.
pub(crate) fn ensure_network(
    network: &Network,
    expected: SupportedProtocols,
) -> Result<(), VaultError> {
    if network.protocol != expected {
        return Err(VaultError::Argument(format!(
            "network protocol mismatch: expected {}, got {}",
            expected, network.protocol
        )));
    }
    if network.rpc_url.is_empty() {
        return Err(VaultError::Argument("network rpc_url cannot be empty".to_string()));
    }
    if network.chain_id.is_empty() {
        return Err(VaultError::Argument("network chain_id cannot be empty".to_string()));
    }
    Ok(())
}

pub(crate) fn ensure_asset(asset: &Asset, expected: SupportedProtocols) -> Result<(), VaultError> {
    if asset.protocol != expected {
        return Err(VaultError::Argument(format!(
            "asset protocol mismatch: expected {}, got {}",
            expected, asset.protocol
        )));
    }
    Ok(())
}

/// Message payloads: hex decodes as bytes, anything else signs as UTF-8.
pub(crate) fn message_bytes(message: &str) -> Vec<u8> {
    let stripped = message.strip_prefix("0x").unwrap_or(message);
    if !stripped.is_empty() && stripped.len() % 2 == 0 {
        if let Ok(bytes) = hex::decode(stripped) {
            return bytes;
        }
    }
    message.as_bytes().to_vec()
}

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(protocol: SupportedProtocols) -> Network {
        Network {
            protocol,
            chain_id: "mainnet".to_string(),
            rpc_url: "http://localhost:8081".to_string(),
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ProtocolRegistry::default();
        for protocol in [
            SupportedProtocols::Pocket,
            SupportedProtocols::Ethereum,
            SupportedProtocols::Shannon,
        ] {
            assert_eq!(registry.get(protocol).unwrap().protocol(), protocol);
        }

        let empty = ProtocolRegistry::new();
        assert!(matches!(
            empty.get(SupportedProtocols::Pocket),
            Err(VaultError::ProtocolNotSupported(_))
        ));
    }

    #[test]
    fn test_ensure_network_rejects_mismatch_before_io() {
        let err =
            ensure_network(&network(SupportedProtocols::Pocket), SupportedProtocols::Ethereum)
                .unwrap_err();
        assert!(matches!(err, VaultError::Argument(_)));

        let mut bad = network(SupportedProtocols::Pocket);
        bad.rpc_url = String::new();
        assert!(ensure_network(&bad, SupportedProtocols::Pocket).is_err());
    }

    #[test]
    fn test_message_bytes_hex_or_utf8() {
        assert_eq!(message_bytes("0xdeadbeef"), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(message_bytes("deadbeef"), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(message_bytes("hello"), b"hello".to_vec());
    }
}
