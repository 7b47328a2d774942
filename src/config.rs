use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TellerConfig {
    pub encryption: EncryptionConfig,
    pub sessions: SessionConfig,
    pub networks: NetworkDefaults,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EncryptionConfig {
    /// PBKDF2-HMAC-SHA256 rounds used to stretch the vault passphrase.
    pub pbkdf2_iterations: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Lifetime for freshly minted sessions, in seconds. 0 = never expires.
    pub default_max_age_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NetworkDefaults {
    #[serde(default = "default_pocket_rpc")]
    pub pocket_rpc_url: String,
    #[serde(default = "default_ethereum_rpc")]
    pub ethereum_rpc_url: String,
    #[serde(default = "default_shannon_rpc")]
    pub shannon_rpc_url: String,
    /// Outbound RPC timeout applied by the bundled protocol services.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_pocket_rpc() -> String {
    "http://localhost:8081".to_string()
}

fn default_ethereum_rpc() -> String {
    "http://localhost:8545".to_string()
}

fn default_shannon_rpc() -> String {
    "http://localhost:1317".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for TellerConfig {
    fn default() -> Self {
        Self {
            encryption: EncryptionConfig {
                pbkdf2_iterations: 100_000,
            },
            sessions: SessionConfig {
                default_max_age_secs: 3600,
            },
            networks: NetworkDefaults {
                pocket_rpc_url: default_pocket_rpc(),
                ethereum_rpc_url: default_ethereum_rpc(),
                shannon_rpc_url: default_shannon_rpc(),
                request_timeout_secs: default_request_timeout(),
            },
        }
    }
}

impl TellerConfig {
    pub fn load_or_default(path: &str) -> Self {
        if std::path::Path::new(path).exists() {
            match std::fs::read_to_string(path) {
                Ok(s) => match toml::from_str(&s) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!("Error parsing config {}: {}. Using defaults.", path, e);
                        Self::default()
                    }
                },
                Err(e) => {
                    warn!("Error reading config {}: {}. Using defaults.", path, e);
                    Self::default()
                }
            }
        } else {
            let config = Self::default();
            if let Ok(s) = toml::to_string_pretty(&config) {
                let _ = std::fs::write(path, s);
            }
            config
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trip() {
        let config = TellerConfig::default();
        let s = toml::to_string_pretty(&config).unwrap();
        let parsed: TellerConfig = toml::from_str(&s).unwrap();

        assert_eq!(parsed.encryption.pbkdf2_iterations, 100_000);
        assert_eq!(parsed.sessions.default_max_age_secs, 3600);
        assert_eq!(parsed.networks.request_timeout_secs, 30);
    }
}
