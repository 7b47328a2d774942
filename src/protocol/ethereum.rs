//! Ethereum protocol service: secp256k1 keys, keccak addresses, JSON-RPC
//! node access, legacy RLP transactions with EIP-155 replay protection.

use async_trait::async_trait;
use k256::ecdsa::{RecoveryId, Signature, SigningKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use rand::rngs::OsRng;
use serde_json::json;
use sha3::{Digest, Keccak256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tiny_hderive::bip32::ExtendedPrivKey;
use zeroize::Zeroize;

use crate::error::VaultError;
use crate::protocol::{
    ensure_asset, ensure_network, http_client, message_bytes, now_ms, Asset, DerivedAccount, Fee,
    Network, NetworkStatus, PersonalSignRequest, ProtocolService, SupportedProtocols,
    TransferRequest, TypedSignRequest,
};
use crate::recovery::mnemonic_to_seed;

const TRANSFER_GAS: u64 = 21_000;
const ERC20_TRANSFER_GAS: u64 = 65_000;

pub struct EthereumService {
    client: reqwest::Client,
    request_id: AtomicU64,
}

impl EthereumService {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            request_id: AtomicU64::new(1),
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

    fn address_of(key: &SigningKey) -> String {
        let point = key.verifying_key().to_encoded_point(false);
        let hash = Keccak256::digest(&point.as_bytes()[1..]);
        format!("0x{}", hex::encode(&hash[12..]))
    }

    fn account_from_key(key: &SigningKey) -> DerivedAccount {
        DerivedAccount {
            address: Self::address_of(key),
            public_key: hex::encode(key.verifying_key().to_encoded_point(true).as_bytes()),
            private_key: format!("0x{}", hex::encode(key.to_bytes())),
        }
    }

    fn parse_address(address: &str) -> Result<[u8; 20], VaultError> {
        let stripped = address.strip_prefix("0x").unwrap_or(address);
        hex::decode(stripped)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| VaultError::Argument(format!("invalid ethereum address: {}", address)))
    }

    fn parse_chain_id(network: &Network) -> Result<u64, VaultError> {
        network.chain_id.parse().map_err(|_| {
            VaultError::Argument(format!("chain_id must be numeric, got '{}'", network.chain_id))
        })
    }

    async fn rpc_call(
        &self,
        network: &Network,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, VaultError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let response = self
            .client
            .post(&network.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| VaultError::NetworkRequest(e.to_string()))?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VaultError::NetworkRequest(e.to_string()))?;

        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown rpc error");
            return Err(VaultError::NetworkRequest(format!("{}: {}", method, message)));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| VaultError::NetworkRequest(format!("{}: empty result", method)))
    }

    async fn rpc_quantity(
        &self,
        network: &Network,
        method: &str,
        params: serde_json::Value,
    ) -> Result<BigUint, VaultError> {
        let result = self.rpc_call(network, method, params).await?;
        let hex_str = result
            .as_str()
            .ok_or_else(|| VaultError::NetworkRequest(format!("{}: non-string result", method)))?;
        parse_quantity(hex_str)
            .ok_or_else(|| VaultError::NetworkRequest(format!("{}: malformed quantity", method)))
    }

    fn sign_digest(key: &SigningKey, digest: &[u8; 32]) -> Result<(Signature, RecoveryId), VaultError> {
        key.sign_prehash_recoverable(digest)
            .map_err(|e| VaultError::Encryption(e.to_string()))
    }

    /// 65-byte r || s || v signature over a 32-byte digest, v in {27, 28}.
    fn rsv_signature(key: &SigningKey, digest: &[u8; 32]) -> Result<String, VaultError> {
        let (signature, recovery_id) = Self::sign_digest(key, digest)?;
        let mut out = signature.to_bytes().to_vec();
        out.push(27 + recovery_id.to_byte());
        Ok(format!("0x{}", hex::encode(out)))
    }
}

fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

fn parse_quantity(hex_str: &str) -> Option<BigUint> {
    let stripped = hex_str.strip_prefix("0x")?;
    if stripped.is_empty() {
        return Some(BigUint::zero());
    }
    BigUint::parse_bytes(stripped.as_bytes(), 16)
}

/// Minimal big-endian integer bytes, as RLP expects.
fn quantity_bytes(value: &BigUint) -> Vec<u8> {
    if value.is_zero() {
        Vec::new()
    } else {
        value.to_bytes_be()
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

/// ERC-20 `transfer(address,uint256)` calldata.
fn erc20_transfer_data(to: &[u8; 20], amount: &BigUint) -> Vec<u8> {
    let mut data = vec![0xa9, 0x05, 0x9c, 0xbb];
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(to);
    let amount_bytes = amount.to_bytes_be();
    let mut padded = vec![0u8; 32 - amount_bytes.len().min(32)];
    padded.extend_from_slice(&amount_bytes);
    data.extend_from_slice(&padded);
    data
}

/// ERC-20 `balanceOf(address)` calldata.
fn erc20_balance_data(owner: &[u8; 20]) -> String {
    let mut data = vec![0x70, 0xa0, 0x82, 0x31];
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(owner);
    format!("0x{}", hex::encode(data))
}

struct LegacyTransaction {
    nonce: u64,
    gas_price: BigUint,
    gas: u64,
    to: [u8; 20],
    value: BigUint,
    data: Vec<u8>,
}

impl LegacyTransaction {
    fn signing_payload(&self, chain_id: u64) -> Vec<u8> {
        let mut stream = rlp::RlpStream::new_list(9);
        self.append_body(&mut stream);
        stream.append(&chain_id);
        stream.append(&Vec::<u8>::new());
        stream.append(&Vec::<u8>::new());
        stream.out().to_vec()
    }

    fn raw(&self, chain_id: u64, signature: &Signature, recovery_id: RecoveryId) -> Vec<u8> {
        let v = chain_id * 2 + 35 + recovery_id.to_byte() as u64;
        let bytes = signature.to_bytes();

        let mut stream = rlp::RlpStream::new_list(9);
        self.append_body(&mut stream);
        stream.append(&v);
        stream.append(&trim_leading_zeros(&bytes[..32]));
        stream.append(&trim_leading_zeros(&bytes[32..]));
        stream.out().to_vec()
    }

    fn append_body(&self, stream: &mut rlp::RlpStream) {
        stream.append(&self.nonce);
        stream.append(&quantity_bytes(&self.gas_price));
        stream.append(&self.gas);
        stream.append(&self.to.to_vec());
        stream.append(&quantity_bytes(&self.value));
        stream.append(&self.data);
    }
}

#[async_trait]
impl ProtocolService for EthereumService {
    fn protocol(&self) -> SupportedProtocols {
        SupportedProtocols::Ethereum
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
        let path = format!("m/44'/60'/0'/0/{}", index);
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
        ensure_network(network, SupportedProtocols::Ethereum)?;
        let owner = Self::parse_address(address)?;

        if let Some(asset) = asset {
            ensure_asset(asset, SupportedProtocols::Ethereum)?;
            if let Some(contract) = asset.contract_address.as_deref() {
                Self::parse_address(contract)?;
                let call = json!([{ "to": contract, "data": erc20_balance_data(&owner) }, "latest"]);
                return self.rpc_quantity(network, "eth_call", call).await;
            }
        }
        self.rpc_quantity(network, "eth_getBalance", json!([address, "latest"])).await
    }

    async fn get_fee(&self, network: &Network) -> Result<Fee, VaultError> {
        ensure_network(network, SupportedProtocols::Ethereum)?;
        let amount = self.rpc_quantity(network, "eth_gasPrice", json!([])).await?;
        Ok(Fee {
            amount,
            denom: "wei".to_string(),
        })
    }

    async fn get_network_status(&self, network: &Network) -> Result<NetworkStatus, VaultError> {
        ensure_network(network, SupportedProtocols::Ethereum)?;
        let mut status = NetworkStatus::default();

        status.can_provide_fee = self.rpc_quantity(network, "eth_gasPrice", json!([])).await.is_ok();
        status.fee_checked_at_ms = Some(now_ms());

        let zero = format!("0x{}", hex::encode([0u8; 20]));
        status.can_provide_balance = self
            .rpc_quantity(network, "eth_getBalance", json!([zero, "latest"]))
            .await
            .is_ok();
        status.balance_checked_at_ms = Some(now_ms());

        status.can_send_transaction =
            self.rpc_quantity(network, "eth_blockNumber", json!([])).await.is_ok();
        status.send_checked_at_ms = Some(now_ms());

        Ok(status)
    }

    async fn send_transaction(
        &self,
        network: &Network,
        request: &TransferRequest,
    ) -> Result<String, VaultError> {
        ensure_network(network, SupportedProtocols::Ethereum)?;
        let chain_id = Self::parse_chain_id(network)?;
        let key = Self::signing_key(&request.private_key)?;
        let from = Self::address_of(&key);
        let recipient = Self::parse_address(&request.to)?;

        let nonce = self
            .rpc_quantity(network, "eth_getTransactionCount", json!([from, "pending"]))
            .await?
            .to_u64()
            .ok_or_else(|| VaultError::NetworkRequest("nonce out of range".to_string()))?;
        let gas_price = self.rpc_quantity(network, "eth_gasPrice", json!([])).await?;

        let tx = match request.asset.as_ref().and_then(|a| a.contract_address.as_deref()) {
            Some(contract) => LegacyTransaction {
                nonce,
                gas_price,
                gas: ERC20_TRANSFER_GAS,
                to: Self::parse_address(contract)?,
                value: BigUint::zero(),
                data: erc20_transfer_data(&recipient, &request.amount),
            },
            None => LegacyTransaction {
                nonce,
                gas_price,
                gas: TRANSFER_GAS,
                to: recipient,
                value: request.amount.clone(),
                data: Vec::new(),
            },
        };

        let digest = keccak256(&tx.signing_payload(chain_id));
        let (signature, recovery_id) = Self::sign_digest(&key, &digest)?;
        let raw = format!("0x{}", hex::encode(tx.raw(chain_id, &signature, recovery_id)));

        let result = self.rpc_call(network, "eth_sendRawTransaction", json!([raw])).await?;
        result
            .as_str()
            .map(|h| h.to_string())
            .ok_or_else(|| VaultError::NetworkRequest("broadcast returned no hash".to_string()))
    }

    fn sign_personal_data(&self, request: &PersonalSignRequest) -> Result<String, VaultError> {
        let key = Self::signing_key(&request.private_key)?;
        let message = message_bytes(&request.message);

        let mut prefixed = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
        prefixed.extend_from_slice(&message);
        let digest = keccak256(&prefixed);

        Self::rsv_signature(&key, &digest)
    }

    fn sign_typed_data(&self, request: &TypedSignRequest) -> Result<String, VaultError> {
        let key = Self::signing_key(&request.private_key)?;
        let domain = decode_hash(&request.domain_hash, "domain_hash")?;
        let message = decode_hash(&request.struct_hash, "struct_hash")?;

        let mut payload = vec![0x19, 0x01];
        payload.extend_from_slice(&domain);
        payload.extend_from_slice(&message);
        let digest = keccak256(&payload);

        Self::rsv_signature(&key, &digest)
    }
}

fn decode_hash(value: &str, field: &str) -> Result<[u8; 32], VaultError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(stripped)
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| VaultError::Argument(format!("{} must be a 32-byte hex hash", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN_PRIVATE_KEY: &str =
        "835112133dfb0af917b2effbde6e93a31567d5562833cd797aeca95b2b612913";
    const KNOWN_ADDRESS: &str = "0x06d82113628d1b7db4ebbf78f9a85ac9d7fb7f4e";

    fn service() -> EthereumService {
        EthereumService::new(Duration::from_secs(5))
    }

    #[test]
    fn test_known_private_key_derives_known_address() {
        let account = service().derive_account_from_private_key(KNOWN_PRIVATE_KEY).unwrap();
        assert_eq!(account.address, KNOWN_ADDRESS);

        // the classic vector: private key 0x...01
        let one = format!("0x{}01", "00".repeat(31));
        let account = service().derive_account_from_private_key(&one).unwrap();
        assert_eq!(account.address, "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");
    }

    #[test]
    fn test_private_key_validation() {
        let svc = service();
        assert!(svc.is_valid_private_key(KNOWN_PRIVATE_KEY));
        assert!(svc.is_valid_private_key(&format!("0x{}", KNOWN_PRIVATE_KEY)));
        assert!(!svc.is_valid_private_key("abcd"));
        assert!(!svc.is_valid_private_key(&"00".repeat(32))); // zero scalar
    }

    #[test]
    fn test_create_account_round_trips() {
        let svc = service();
        let created = svc.create_account().unwrap();
        let derived = svc.derive_account_from_private_key(&created.private_key).unwrap();
        assert_eq!(derived.address, created.address);
        assert!(created.address.starts_with("0x"));
        assert_eq!(created.address.len(), 42);
    }

    #[test]
    fn test_hd_derivation_is_deterministic_and_indexed() {
        let svc = service();
        let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

        let first = svc.derive_hd_account(phrase, None, 0).unwrap();
        let again = svc.derive_hd_account(phrase, None, 0).unwrap();
        assert_eq!(first.address, again.address);

        let second = svc.derive_hd_account(phrase, None, 1).unwrap();
        assert_ne!(second.address, first.address);
    }

    #[test]
    fn test_personal_sign_recovers_to_signer() {
        let svc = service();
        let signature = svc
            .sign_personal_data(&PersonalSignRequest {
                private_key: KNOWN_PRIVATE_KEY.to_string(),
                message: "hello ethereum".to_string(),
            })
            .unwrap();
        let bytes = hex::decode(signature.strip_prefix("0x").unwrap()).unwrap();
        assert_eq!(bytes.len(), 65);
        assert!(bytes[64] == 27 || bytes[64] == 28);

        let message = b"hello ethereum";
        let mut prefixed = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
        prefixed.extend_from_slice(message);
        let digest = keccak256(&prefixed);

        let sig = Signature::from_slice(&bytes[..64]).unwrap();
        let recovery_id = RecoveryId::try_from(bytes[64] - 27).unwrap();
        let recovered =
            k256::ecdsa::VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id).unwrap();

        let key = EthereumService::signing_key(KNOWN_PRIVATE_KEY).unwrap();
        assert_eq!(recovered, *key.verifying_key());
    }

    #[test]
    fn test_typed_data_digest_signing() {
        let svc = service();
        let request = TypedSignRequest {
            private_key: KNOWN_PRIVATE_KEY.to_string(),
            domain_hash: format!("0x{}", "11".repeat(32)),
            struct_hash: format!("0x{}", "22".repeat(32)),
        };
        let signature = svc.sign_typed_data(&request).unwrap();
        assert_eq!(hex::decode(signature.strip_prefix("0x").unwrap()).unwrap().len(), 65);

        let short = TypedSignRequest {
            private_key: KNOWN_PRIVATE_KEY.to_string(),
            domain_hash: "0x1234".to_string(),
            struct_hash: format!("0x{}", "22".repeat(32)),
        };
        assert!(matches!(svc.sign_typed_data(&short), Err(VaultError::Argument(_))));
    }

    #[test]
    fn test_erc20_calldata_layout() {
        let to = [0x11u8; 20];
        let data = erc20_transfer_data(&to, &BigUint::from(1_000u32));
        assert_eq!(data.len(), 4 + 32 + 32);
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(&data[16..36], &to);
        assert_eq!(&data[66..], &[0x03, 0xe8]);
    }

    #[test]
    fn test_quantity_parsing() {
        assert_eq!(parse_quantity("0x0"), Some(BigUint::zero()));
        assert_eq!(parse_quantity("0x"), Some(BigUint::zero()));
        assert_eq!(parse_quantity("0xde0b6b3a7640000"), BigUint::parse_bytes(b"1000000000000000000", 10));
        assert_eq!(parse_quantity("nope"), None);
        assert!(quantity_bytes(&BigUint::zero()).is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires a reachable Ethereum node
    async fn test_gas_price_against_node() {
        let network = Network {
            protocol: SupportedProtocols::Ethereum,
            chain_id: "1".to_string(),
            rpc_url: "http://localhost:8545".to_string(),
        };
        assert!(service().get_fee(&network).await.is_ok());
    }
}
