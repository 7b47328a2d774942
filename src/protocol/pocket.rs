//! Pocket Network (Morse) protocol service: ed25519 keys, SHA-256-derived
//! addresses, flat base fee, REST query/broadcast endpoints.

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use hmac::{Hmac, Mac};
use num_bigint::BigUint;
use rand::rngs::OsRng;
use serde_json::json;
use sha2::{Digest, Sha256, Sha512};
use std::time::Duration;
use zeroize::Zeroize;

use crate::error::VaultError;
use crate::protocol::{
    ensure_network, http_client, message_bytes, now_ms, DerivedAccount, Fee, Network,
    NetworkStatus, PersonalSignRequest, ProtocolService, SupportedProtocols, TransferRequest,
};
use crate::recovery::mnemonic_to_seed;

/// Flat transaction fee on Morse, in upokt (0.01 POKT).
const BASE_FEE_UPOKT: u64 = 10_000;

/// BIP-44 coin type registered for POKT.
const COIN_TYPE: u32 = 635;

pub struct PocketService {
    client: reqwest::Client,
}

impl PocketService {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
        }
    }

    /// Pocket private keys are 64 bytes hex: seed followed by public key.
    fn signing_key(private_key: &str) -> Result<SigningKey, VaultError> {
        let bytes = hex::decode(private_key)
            .map_err(|_| VaultError::InvalidPrivateKey("expected hex".to_string()))?;
        if bytes.len() != 64 {
            return Err(VaultError::InvalidPrivateKey(
                "expected a 64-byte seed+pubkey hex key".to_string(),
            ));
        }

        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes[..32]);
        let key = SigningKey::from_bytes(&seed);
        seed.zeroize();

        // the trailing half must be the matching public key
        if key.verifying_key().to_bytes() != bytes[32..] {
            return Err(VaultError::InvalidPrivateKey(
                "embedded public key does not match the seed".to_string(),
            ));
        }
        Ok(key)
    }

    fn address_of(public_key: &VerifyingKey) -> String {
        let digest = Sha256::digest(public_key.to_bytes());
        hex::encode(&digest[..20])
    }

    fn account_from_key(key: &SigningKey) -> DerivedAccount {
        let public = key.verifying_key();
        let mut private = key.to_bytes().to_vec();
        private.extend_from_slice(&public.to_bytes());
        let account = DerivedAccount {
            address: Self::address_of(&public),
            public_key: hex::encode(public.to_bytes()),
            private_key: hex::encode(&private),
        };
        private.zeroize();
        account
    }

    async fn query(
        &self,
        network: &Network,
        path: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, VaultError> {
        let url = format!("{}{}", network.rpc_url.trim_end_matches('/'), path);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| VaultError::NetworkRequest(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VaultError::NetworkRequest(format!(
                "{} returned {}",
                path,
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| VaultError::NetworkRequest(e.to_string()))
    }
}

/// SLIP-0010 ed25519 derivation: hardened-only HMAC-SHA512 chain.
fn slip10_derive(seed: &[u8], path: &[u32]) -> [u8; 32] {
    let mut mac = Hmac::<Sha512>::new_from_slice(b"ed25519 seed")
        .expect("HMAC accepts keys of any length");
    mac.update(seed);
    let mut intermediate: [u8; 64] = mac.finalize().into_bytes().into();

    for segment in path {
        let hardened = segment | 0x8000_0000;
        let mut mac = Hmac::<Sha512>::new_from_slice(&intermediate[32..])
            .expect("HMAC accepts keys of any length");
        mac.update(&[0u8]);
        mac.update(&intermediate[..32]);
        mac.update(&hardened.to_be_bytes());
        intermediate = mac.finalize().into_bytes().into();
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&intermediate[..32]);
    intermediate.zeroize();
    key
}

#[async_trait]
impl ProtocolService for PocketService {
    fn protocol(&self) -> SupportedProtocols {
        SupportedProtocols::Pocket
    }

    fn create_account(&self) -> Result<DerivedAccount, VaultError> {
        let key = SigningKey::generate(&mut OsRng);
        Ok(Self::account_from_key(&key))
    }

    fn derive_account_from_private_key(
        &self,
        private_key: &str,
    ) -> Result<DerivedAccount, VaultError> {
        let key = Self::signing_key(private_key)?;
        Ok(Self::account_from_key(&key))
    }

    fn derive_hd_account(
        &self,
        phrase: &str,
        seed_passphrase: Option<&str>,
        index: u32,
    ) -> Result<DerivedAccount, VaultError> {
        let mut seed = mnemonic_to_seed(phrase, seed_passphrase)?;
        let mut child = slip10_derive(&seed, &[44, COIN_TYPE, index]);
        seed.zeroize();

        let key = SigningKey::from_bytes(&child);
        child.zeroize();
        Ok(Self::account_from_key(&key))
    }

    async fn get_balance(
        &self,
        address: &str,
        network: &Network,
        asset: Option<&crate::protocol::Asset>,
    ) -> Result<BigUint, VaultError> {
        ensure_network(network, SupportedProtocols::Pocket)?;
        if asset.and_then(|a| a.contract_address.as_ref()).is_some() {
            return Err(VaultError::Argument(
                "pocket does not support token contract balances".to_string(),
            ));
        }

        let result = self
            .query(network, "/v1/query/balance", json!({ "address": address, "height": 0 }))
            .await?;
        let balance = result
            .get("balance")
            .and_then(|b| b.as_u64())
            .ok_or_else(|| VaultError::NetworkRequest("malformed balance response".to_string()))?;
        Ok(BigUint::from(balance))
    }

    async fn get_fee(&self, network: &Network) -> Result<Fee, VaultError> {
        ensure_network(network, SupportedProtocols::Pocket)?;
        // Morse charges a flat base fee; nothing to ask the node.
        Ok(Fee {
            amount: BigUint::from(BASE_FEE_UPOKT),
            denom: "upokt".to_string(),
        })
    }

    async fn get_network_status(&self, network: &Network) -> Result<NetworkStatus, VaultError> {
        ensure_network(network, SupportedProtocols::Pocket)?;
        let mut status = NetworkStatus::default();

        status.can_provide_fee = true;
        status.fee_checked_at_ms = Some(now_ms());

        let zero = hex::encode([0u8; 20]);
        status.can_provide_balance = self
            .query(network, "/v1/query/balance", json!({ "address": zero, "height": 0 }))
            .await
            .is_ok();
        status.balance_checked_at_ms = Some(now_ms());

        status.can_send_transaction =
            self.query(network, "/v1/query/height", json!({})).await.is_ok();
        status.send_checked_at_ms = Some(now_ms());

        Ok(status)
    }

    async fn send_transaction(
        &self,
        network: &Network,
        request: &TransferRequest,
    ) -> Result<String, VaultError> {
        ensure_network(network, SupportedProtocols::Pocket)?;
        let key = Self::signing_key(&request.private_key)?;
        let from = Self::address_of(&key.verifying_key());

        // canonical sign doc: serde_json emits keys in sorted order
        let sign_doc = json!({
            "chain_id": network.chain_id,
            "entropy": rand::random::<i64>(),
            "fee": [{ "amount": BASE_FEE_UPOKT.to_string(), "denom": "upokt" }],
            "memo": request.memo.clone().unwrap_or_default(),
            "msg": {
                "type": "pos/Send",
                "value": {
                    "amount": request.amount.to_string(),
                    "from_address": from,
                    "to_address": request.to,
                }
            },
        });
        let sign_bytes = serde_json::to_vec(&sign_doc)?;
        let signature = key.sign(&sign_bytes);

        let tx = json!({
            "msg": sign_doc.get("msg"),
            "chain_id": network.chain_id,
            "entropy": sign_doc.get("entropy"),
            "fee": sign_doc.get("fee"),
            "memo": sign_doc.get("memo"),
            "signature": {
                "pub_key": hex::encode(key.verifying_key().to_bytes()),
                "signature": hex::encode(signature.to_bytes()),
            },
        });
        let raw = hex::encode(serde_json::to_vec(&tx)?);

        let result = self
            .query(
                network,
                "/v1/client/rawtx",
                json!({ "address": from, "raw_hex_bytes": raw }),
            )
            .await?;
        result
            .get("txhash")
            .and_then(|h| h.as_str())
            .map(|h| h.to_string())
            .ok_or_else(|| VaultError::NetworkRequest("broadcast returned no txhash".to_string()))
    }

    fn sign_personal_data(&self, request: &PersonalSignRequest) -> Result<String, VaultError> {
        let key = Self::signing_key(&request.private_key)?;
        let signature = key.sign(&message_bytes(&request.message));
        Ok(hex::encode(signature.to_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // seed f0f18c74... with its matching public key appended
    const KNOWN_PRIVATE_KEY: &str = "f0f18c7494262c805ddb2ce6dc2cc89970c22687872e8b514d133fafc260e43d49b7b82f1aec833f854da378d6658246475d3774bd323d70b098015c2b5ae6db";
    const KNOWN_ADDRESS: &str = "30fd308b3bf2126030aba7f0e342dcb8b4922a8b";

    fn service() -> PocketService {
        PocketService::new(Duration::from_secs(5))
    }

    #[test]
    fn test_known_private_key_derives_known_address() {
        let account = service().derive_account_from_private_key(KNOWN_PRIVATE_KEY).unwrap();
        assert_eq!(account.address, KNOWN_ADDRESS);
        assert_eq!(
            account.public_key,
            "49b7b82f1aec833f854da378d6658246475d3774bd323d70b098015c2b5ae6db"
        );
    }

    #[test]
    fn test_private_key_validation() {
        let svc = service();
        assert!(svc.is_valid_private_key(KNOWN_PRIVATE_KEY));
        assert!(!svc.is_valid_private_key("zzzz"));
        // seed alone is not a pocket key
        assert!(!svc.is_valid_private_key(&KNOWN_PRIVATE_KEY[..64]));

        // tampered public key half
        let mut tampered = KNOWN_PRIVATE_KEY.to_string();
        tampered.replace_range(64..66, "00");
        assert!(matches!(
            svc.derive_account_from_private_key(&tampered),
            Err(VaultError::InvalidPrivateKey(_))
        ));
    }

    #[test]
    fn test_create_account_round_trips() {
        let svc = service();
        let created = svc.create_account().unwrap();
        let derived = svc.derive_account_from_private_key(&created.private_key).unwrap();
        assert_eq!(derived.address, created.address);
        assert_eq!(created.address.len(), 40);
    }

    #[test]
    fn test_hd_derivation_is_deterministic_and_indexed() {
        let svc = service();
        let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

        let first = svc.derive_hd_account(phrase, None, 0).unwrap();
        let again = svc.derive_hd_account(phrase, None, 0).unwrap();
        assert_eq!(first.address, again.address);
        assert_eq!(first.private_key, again.private_key);

        let second = svc.derive_hd_account(phrase, None, 1).unwrap();
        assert_ne!(second.address, first.address);

        // the seed passphrase changes the whole subtree
        let salted = svc.derive_hd_account(phrase, Some("extra"), 0).unwrap();
        assert_ne!(salted.address, first.address);
    }

    #[test]
    fn test_personal_sign_produces_ed25519_signature() {
        let signature = service()
            .sign_personal_data(&PersonalSignRequest {
                private_key: KNOWN_PRIVATE_KEY.to_string(),
                message: "hello pocket".to_string(),
            })
            .unwrap();
        assert_eq!(signature.len(), 128);

        use ed25519_dalek::Verifier;
        let key = PocketService::signing_key(KNOWN_PRIVATE_KEY).unwrap();
        let sig_bytes: [u8; 64] = hex::decode(&signature).unwrap().try_into().unwrap();
        let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
        assert!(key.verifying_key().verify(b"hello pocket", &sig).is_ok());
    }

    #[test]
    fn test_typed_data_is_not_supported() {
        let err = service()
            .sign_typed_data(&crate::protocol::TypedSignRequest {
                private_key: KNOWN_PRIVATE_KEY.to_string(),
                domain_hash: String::new(),
                struct_hash: String::new(),
            })
            .unwrap_err();
        assert!(matches!(err, VaultError::ProtocolNotSupported(_)));
    }

    #[tokio::test]
    #[ignore] // Requires a reachable Pocket node
    async fn test_get_balance_against_node() {
        let network = Network {
            protocol: SupportedProtocols::Pocket,
            chain_id: "mainnet".to_string(),
            rpc_url: "http://localhost:8081".to_string(),
        };
        let balance = service().get_balance(KNOWN_ADDRESS, &network, None).await;
        assert!(balance.is_ok());
    }
}
