//! Pocket Shannon (Cosmos SDK) protocol service: secp256k1 keys, bech32
//! addresses, REST bank/auth queries and tx broadcast.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bech32::{ToBase32, Variant};
use k256::ecdsa::{signature::Signer, Signature, SigningKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use num_bigint::BigUint;
use rand::rngs::OsRng;
use ripemd::Ripemd160;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tiny_hderive::bip32::ExtendedPrivKey;
use zeroize::Zeroize;

use crate::error::VaultError;
use crate::protocol::{
    ensure_network, http_client, message_bytes, now_ms, Asset, DerivedAccount, Fee, Network,
    NetworkStatus, PersonalSignRequest, ProtocolService, SupportedProtocols, TransferRequest,
};
use crate::recovery::mnemonic_to_seed;

const ADDRESS_PREFIX: &str = "pokt";
const DENOM: &str = "upokt";
const BASE_FEE_UPOKT: u64 = 10_000;
const DEFAULT_GAS: &str = "200000";

pub struct ShannonService {
    client: reqwest::Client,
}

impl ShannonService {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
        }
    }

    fn signing_key(private_key: &str) -> Result<SigningKey, VaultError> {
        let stripped = private_key.strip_prefix("0x").unwrap_or(private_key);
        let bytes = hex::decode(stripped)
            .map_err(|_| VaultError::InvalidPrivateKey("expected hex".to_string()))?;
        let mut array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| VaultError::InvalidPrivateKey("expected a 32-byte key".to_string()))?;

        let key = SigningKey::from_bytes(&array.into())
            .map_err(|e| VaultError::InvalidPrivateKey(e.to_string()));
        array.zeroize();
        key
    }

    /// bech32(prefix, ripemd160(sha256(compressed pubkey)))
    fn address_of(key: &SigningKey) -> String {
        let compressed = key.verifying_key().to_encoded_point(true);
        let sha = Sha256::digest(compressed.as_bytes());
        let raw = Ripemd160::digest(sha);
        bech32::encode(ADDRESS_PREFIX, raw.as_slice().to_base32(), Variant::Bech32)
            .expect("prefix and payload are always encodable")
    }

    fn account_from_key(key: &SigningKey) -> DerivedAccount {
        DerivedAccount {
            address: Self::address_of(key),
            public_key: hex::encode(key.verifying_key().to_encoded_point(true).as_bytes()),
            private_key: hex::encode(key.to_bytes()),
        }
    }

    async fn rest_get(&self, network: &Network, path: &str) -> Result<serde_json::Value, VaultError> {
        let url = format!("{}{}", network.rpc_url.trim_end_matches('/'), path);
        let response = self
            .client
            .get(&url)
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

    /// account_number and sequence, both required to build a sign doc.
    async fn fetch_account(
        &self,
        network: &Network,
        address: &str,
    ) -> Result<(String, String), VaultError> {
        let body = self
            .rest_get(network, &format!("/cosmos/auth/v1beta1/accounts/{}", address))
            .await?;
        let account = body
            .get("account")
            .ok_or_else(|| VaultError::NetworkRequest("account query: missing account".to_string()))?;
        let number = account
            .get("account_number")
            .and_then(|v| v.as_str())
            .unwrap_or("0")
            .to_string();
        let sequence = account
            .get("sequence")
            .and_then(|v| v.as_str())
            .unwrap_or("0")
            .to_string();
        Ok((number, sequence))
    }
}

#[async_trait]
impl ProtocolService for ShannonService {
    fn protocol(&self) -> SupportedProtocols {
        SupportedProtocols::Shannon
    }

    fn create_account(&self) -> Result<DerivedAccount, VaultError> {
        let key = SigningKey::random(&mut OsRng);
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
        let path = format!("m/44'/635'/0'/0/{}", index);
        let ext_key = ExtendedPrivKey::derive(&seed, path.as_str())
            .map_err(|_| VaultError::RecoveryPhrase("hd derivation failed".to_string()))?;
        seed.zeroize();

        let key = Self::signing_key(&hex::encode(ext_key.secret()))?;
        Ok(Self::account_from_key(&key))
    }

    async fn get_balance(
        &self,
        address: &str,
        network: &Network,
        asset: Option<&Asset>,
    ) -> Result<BigUint, VaultError> {
        ensure_network(network, SupportedProtocols::Shannon)?;
        if asset.and_then(|a| a.contract_address.as_ref()).is_some() {
            return Err(VaultError::Argument(
                "shannon does not support token contract balances".to_string(),
            ));
        }
        if !address.starts_with(ADDRESS_PREFIX) {
            return Err(VaultError::Argument(format!("invalid shannon address: {}", address)));
        }

        let body = self
            .rest_get(
                network,
                &format!("/cosmos/bank/v1beta1/balances/{}/by_denom?denom={}", address, DENOM),
            )
            .await?;
        let amount = body
            .get("balance")
            .and_then(|b| b.get("amount"))
            .and_then(|a| a.as_str())
            .ok_or_else(|| VaultError::NetworkRequest("malformed balance response".to_string()))?;
        BigUint::parse_bytes(amount.as_bytes(), 10)
            .ok_or_else(|| VaultError::NetworkRequest("malformed balance amount".to_string()))
    }

    async fn get_fee(&self, network: &Network) -> Result<Fee, VaultError> {
        ensure_network(network, SupportedProtocols::Shannon)?;
        Ok(Fee {
            amount: BigUint::from(BASE_FEE_UPOKT),
            denom: DENOM.to_string(),
        })
    }

    async fn get_network_status(&self, network: &Network) -> Result<NetworkStatus, VaultError> {
        ensure_network(network, SupportedProtocols::Shannon)?;
        let mut status = NetworkStatus::default();

        status.can_provide_fee = true;
        status.fee_checked_at_ms = Some(now_ms());

        let node_reachable = self
            .rest_get(network, "/cosmos/base/tendermint/v1beta1/node_info")
            .await
            .is_ok();
        status.can_provide_balance = node_reachable;
        status.balance_checked_at_ms = Some(now_ms());
        status.can_send_transaction = node_reachable;
        status.send_checked_at_ms = Some(now_ms());

        Ok(status)
    }

    async fn send_transaction(
        &self,
        network: &Network,
        request: &TransferRequest,
    ) -> Result<String, VaultError> {
        ensure_network(network, SupportedProtocols::Shannon)?;
        if !request.to.starts_with(ADDRESS_PREFIX) {
            return Err(VaultError::Argument(format!("invalid shannon address: {}", request.to)));
        }

        let key = Self::signing_key(&request.private_key)?;
        let from = Self::address_of(&key);
        let (account_number, sequence) = self.fetch_account(network, &from).await?;

        // canonical sign doc: serde_json emits keys in sorted order
        let sign_doc = json!({
            "account_number": account_number,
            "chain_id": network.chain_id,
            "fee": {
                "amount": [{ "amount": BASE_FEE_UPOKT.to_string(), "denom": DENOM }],
                "gas": DEFAULT_GAS,
            },
            "memo": request.memo.clone().unwrap_or_default(),
            "msgs": [{
                "type": "cosmos-sdk/MsgSend",
                "value": {
                    "amount": [{ "amount": request.amount.to_string(), "denom": DENOM }],
                    "from_address": from,
                    "to_address": request.to,
                }
            }],
            "sequence": sequence,
        });
        let sign_bytes = serde_json::to_vec(&sign_doc)?;

        // Signer<Signature> digests with SHA-256, which is what the chain expects
        let signature: Signature = key.sign(&sign_bytes);
        let signature = signature.normalize_s().unwrap_or(signature);

        let tx = json!({
            "msg": sign_doc.get("msgs"),
            "fee": sign_doc.get("fee"),
            "memo": sign_doc.get("memo"),
            "signatures": [{
                "pub_key": {
                    "type": "tendermint/PubKeySecp256k1",
                    "value": STANDARD.encode(key.verifying_key().to_encoded_point(true).as_bytes()),
                },
                "signature": STANDARD.encode(signature.to_bytes()),
            }],
        });

        let body = json!({
            "tx_bytes": STANDARD.encode(serde_json::to_vec(&tx)?),
            "mode": "BROADCAST_MODE_SYNC",
        });
        let url = format!("{}/cosmos/tx/v1beta1/txs", network.rpc_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| VaultError::NetworkRequest(e.to_string()))?;
        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VaultError::NetworkRequest(e.to_string()))?;

        result
            .get("tx_response")
            .and_then(|r| r.get("txhash"))
            .and_then(|h| h.as_str())
            .map(|h| h.to_string())
            .ok_or_else(|| VaultError::NetworkRequest("broadcast returned no txhash".to_string()))
    }

    fn sign_personal_data(&self, request: &PersonalSignRequest) -> Result<String, VaultError> {
        let key = Self::signing_key(&request.private_key)?;
        let signature: Signature = key.sign(&message_bytes(&request.message));
        let signature = signature.normalize_s().unwrap_or(signature);
        Ok(hex::encode(signature.to_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN_PRIVATE_KEY: &str =
        "835112133dfb0af917b2effbde6e93a31567d5562833cd797aeca95b2b612913";
    const KNOWN_ADDRESS: &str = "pokt1kz36sw4cqytg240qnlq3ugsycumfm5y8z43ne3";

    fn service() -> ShannonService {
        ShannonService::new(Duration::from_secs(5))
    }

    #[test]
    fn test_known_private_key_derives_known_address() {
        let account = service().derive_account_from_private_key(KNOWN_PRIVATE_KEY).unwrap();
        assert_eq!(account.address, KNOWN_ADDRESS);
        assert_eq!(
            account.public_key,
            "03df93eae7b70a52da82dc72342df6bc3680c1abfd6009b2b6a472caab70e723a0"
        );
    }

    #[test]
    fn test_create_account_round_trips() {
        let svc = service();
        let created = svc.create_account().unwrap();
        let derived = svc.derive_account_from_private_key(&created.private_key).unwrap();
        assert_eq!(derived.address, created.address);
        assert!(created.address.starts_with("pokt1"));
    }

    #[test]
    fn test_hd_derivation_is_deterministic_and_indexed() {
        let svc = service();
        let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

        let first = svc.derive_hd_account(phrase, None, 0).unwrap();
        assert_eq!(first.address, svc.derive_hd_account(phrase, None, 0).unwrap().address);
        assert_ne!(first.address, svc.derive_hd_account(phrase, None, 1).unwrap().address);
    }

    #[test]
    fn test_personal_sign_verifies() {
        use k256::ecdsa::signature::Verifier;

        let svc = service();
        let signature_hex = svc
            .sign_personal_data(&PersonalSignRequest {
                private_key: KNOWN_PRIVATE_KEY.to_string(),
                message: "hello shannon".to_string(),
            })
            .unwrap();

        let key = ShannonService::signing_key(KNOWN_PRIVATE_KEY).unwrap();
        let signature = Signature::from_slice(&hex::decode(signature_hex).unwrap()).unwrap();
        assert!(key.verifying_key().verify(b"hello shannon", &signature).is_ok());
    }

    #[tokio::test]
    async fn test_balance_rejects_foreign_address_shape() {
        let network = Network {
            protocol: SupportedProtocols::Shannon,
            chain_id: "pocket".to_string(),
            rpc_url: "http://localhost:1317".to_string(),
        };
        let err = service()
            .get_balance("0x06d82113628d1b7db4ebbf78f9a85ac9d7fb7f4e", &network, None)
            .await;
        assert!(matches!(err, Err(VaultError::Argument(_))));
    }

    #[tokio::test]
    #[ignore] // Requires a reachable Shannon node
    async fn test_get_balance_against_node() {
        let network = Network {
            protocol: SupportedProtocols::Shannon,
            chain_id: "pocket".to_string(),
            rpc_url: "http://localhost:1317".to_string(),
        };
        assert!(service().get_balance(KNOWN_ADDRESS, &network, None).await.is_ok());
    }
}
