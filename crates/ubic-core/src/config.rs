// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - NODE CONFIGURATION
//
// NodeConfig is the TOML file a node starts from. ProtocolParams is the pure,
// already-decoded projection of it that validation and scheduling consume:
// every node on a network must agree on these values.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::amount::CurrencyId;
use crate::ubi::UbiRates;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use ubic_crypto::PUBLIC_KEY_LEN;

/// Delegate seat count and rotation slot, pinned per network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    pub active_delegate_count: usize,
    pub slot_duration_secs: u64,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            active_delegate_count: 21,
            slot_duration_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolParams {
    pub network_id: u8,
    pub root_authority_public_key: Vec<u8>,
    pub ubi_rates: UbiRates,
    pub consensus: ConsensusParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UbiRateConfig {
    pub currency: CurrencyId,
    pub per_block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UbiConfig {
    #[serde(default)]
    pub rates: Vec<UbiRateConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_size: usize,
    /// Seconds after which an unconfirmed transaction releases its
    /// account's pending slot
    pub pending_expiry_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            pending_expiry_secs: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootCertificateConfig {
    /// Hex-encoded Ed25519 public key of the trust anchor
    pub public_key: String,
    pub currency: CurrencyId,
    #[serde(default)]
    pub expiration_date: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccountConfig {
    pub public_key: String,
    pub currency: CurrencyId,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub network_id: u8,
    pub data_dir: String,
    /// Hex key that signs certificate deactivations
    pub root_authority_public_key: String,
    /// Hex public keys seeded as delegates at genesis
    #[serde(default)]
    pub genesis_delegates: Vec<String>,
    #[serde(default)]
    pub consensus: ConsensusParams,
    #[serde(default)]
    pub ubi: UbiConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub genesis_accounts: Vec<GenesisAccountConfig>,
    #[serde(default)]
    pub root_certificates: Vec<RootCertificateConfig>,
}

fn decode_key(field: &str, value: &str) -> Result<Vec<u8>, String> {
    let bytes = hex::decode(value).map_err(|e| format!("{}: invalid hex ({})", field, e))?;
    if bytes.len() != PUBLIC_KEY_LEN {
        return Err(format!(
            "{}: expected {} byte key, got {}",
            field,
            PUBLIC_KEY_LEN,
            bytes.len()
        ));
    }
    Ok(bytes)
}

impl NodeConfig {
    /// Load node config from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config: NodeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load node config from `UBIC_*` environment variables.
    /// Genesis lists are file-only; the environment covers single-value knobs.
    pub fn load_from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let network_id: u8 = std::env::var("UBIC_NETWORK_ID")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let data_dir = std::env::var("UBIC_DATA_DIR").unwrap_or_else(|_| "./ubic-data".to_string());

        let root_authority_public_key = std::env::var("UBIC_ROOT_AUTHORITY_KEY")
            .map_err(|_| "UBIC_ROOT_AUTHORITY_KEY not set")?;

        let active_delegate_count: usize = std::env::var("UBIC_ACTIVE_DELEGATES")
            .unwrap_or_else(|_| "21".to_string())
            .parse()?;

        let slot_duration_secs: u64 = std::env::var("UBIC_SLOT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;

        let max_size: usize = std::env::var("UBIC_POOL_MAX_SIZE")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()?;

        let pending_expiry_secs: u64 = std::env::var("UBIC_POOL_EXPIRY_SECS")
            .unwrap_or_else(|_| "600".to_string())
            .parse()?;

        Ok(Self {
            network_id,
            data_dir,
            root_authority_public_key,
            genesis_delegates: Vec::new(),
            consensus: ConsensusParams {
                active_delegate_count,
                slot_duration_secs,
            },
            ubi: UbiConfig::default(),
            pool: PoolConfig {
                max_size,
                pending_expiry_secs,
            },
            genesis_accounts: Vec::new(),
            root_certificates: Vec::new(),
        })
    }

    /// Save node config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.data_dir.is_empty() {
            return Err("data_dir cannot be empty".to_string());
        }

        decode_key("root_authority_public_key", &self.root_authority_public_key)?;

        if self.consensus.active_delegate_count == 0 {
            return Err("consensus.active_delegate_count must be > 0".to_string());
        }
        if self.consensus.slot_duration_secs == 0 {
            return Err("consensus.slot_duration_secs must be > 0".to_string());
        }
        if self.pool.max_size == 0 {
            return Err("pool.max_size must be > 0".to_string());
        }

        let mut seen = std::collections::BTreeSet::new();
        for rate in &self.ubi.rates {
            if !seen.insert(rate.currency) {
                return Err(format!("ubi rate for currency {} listed twice", rate.currency));
            }
        }

        for key in &self.genesis_delegates {
            decode_key("genesis_delegates", key)?;
        }
        for account in &self.genesis_accounts {
            decode_key("genesis_accounts.public_key", &account.public_key)?;
        }
        for root in &self.root_certificates {
            decode_key("root_certificates.public_key", &root.public_key)?;
        }

        Ok(())
    }

    /// Decoded protocol parameters shared by every node on the network
    pub fn protocol_params(&self) -> Result<ProtocolParams, String> {
        Ok(ProtocolParams {
            network_id: self.network_id,
            root_authority_public_key: decode_key(
                "root_authority_public_key",
                &self.root_authority_public_key,
            )?,
            ubi_rates: UbiRates::new(self.ubi.rates.iter().map(|r| (r.currency, r.per_block))),
            consensus: self.consensus.clone(),
        })
    }

    pub fn genesis_delegate_keys(&self) -> Result<Vec<Vec<u8>>, String> {
        self.genesis_delegates
            .iter()
            .map(|k| decode_key("genesis_delegates", k))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> NodeConfig {
        NodeConfig {
            network_id: 7,
            data_dir: "/var/lib/ubic".to_string(),
            root_authority_public_key: hex::encode([1u8; 32]),
            genesis_delegates: vec![hex::encode([2u8; 32])],
            consensus: ConsensusParams {
                active_delegate_count: 3,
                slot_duration_secs: 5,
            },
            ubi: UbiConfig {
                rates: vec![UbiRateConfig {
                    currency: 0,
                    per_block: 100,
                }],
            },
            pool: PoolConfig::default(),
            genesis_accounts: vec![GenesisAccountConfig {
                public_key: hex::encode([3u8; 32]),
                currency: 0,
                amount: 1_000,
            }],
            root_certificates: vec![RootCertificateConfig {
                public_key: hex::encode([4u8; 32]),
                currency: 0,
                expiration_date: 0,
            }],
        }
    }

    #[test]
    fn test_sample_is_valid() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = sample();
        config.root_authority_public_key = "zz".to_string();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.consensus.active_delegate_count = 0;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.ubi.rates.push(UbiRateConfig {
            currency: 0,
            per_block: 1,
        });
        assert!(config.validate().is_err());

        let mut config = sample();
        config.genesis_delegates.push(hex::encode([9u8; 31]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("node.toml");
        let config = sample();
        config.save_to_file(&path).unwrap();
        let loaded = NodeConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let text = format!(
            "network_id = 1\ndata_dir = \"d\"\nroot_authority_public_key = \"{}\"\n",
            hex::encode([5u8; 32])
        );
        let config: NodeConfig = toml::from_str(&text).unwrap();
        assert_eq!(config.consensus, ConsensusParams::default());
        assert_eq!(config.pool, PoolConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_protocol_params_projection() {
        let params = sample().protocol_params().unwrap();
        assert_eq!(params.network_id, 7);
        assert_eq!(params.root_authority_public_key, vec![1u8; 32]);
        assert_eq!(params.ubi_rates.rate(0), 100);
        assert_eq!(params.ubi_rates.rate(1), 0);
        assert_eq!(params.consensus.active_delegate_count, 3);
    }
}
