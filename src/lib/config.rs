use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use alloy::primitives::{Address, B256, address};
use serde::Deserialize;

use crate::crypto::poseidon::u64_to_b256;

/// Top-level configuration loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscriptionConfig {
    pub contract: ContractConfig,
    pub issuer: IssuerConfig,
    pub membership: MembershipConfig,
    pub authorization: AuthorizationConfig,
}

/// Deployed contract addresses and the note storage slot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContractConfig {
    /// Subscription contract; the actor in every authorization witness.
    pub subscription_address: Address,
    /// Token contract the subscription price is paid in.
    pub token_address: Address,
    pub storage_slot: u64,
}

impl ContractConfig {
    /// Storage slot as the field element used in the note salt.
    pub fn storage_slot(&self) -> B256 {
        u64_to_b256(self.storage_slot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssuerConfig {
    /// Tiers the issuer accepts in a mint request.
    pub supported_tiers: Vec<u64>,
    /// Upper bound on each wait for transaction inclusion (e.g. "30s").
    #[serde(with = "humantime_serde")]
    pub inclusion_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MembershipConfig {
    /// Upper bound on each tree index / block lookup (e.g. "10s").
    #[serde(with = "humantime_serde")]
    pub lookup_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorizationConfig {
    pub nonce_mode: NonceMode,
}

/// Whether the authorized token transfer carries a replay nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NonceMode {
    /// `transfer(from, to, amount, nonce)`; a nonce is required.
    Explicit,
    /// `transfer(from, to, amount)`; any supplied nonce is ignored.
    Omitted,
}

impl std::fmt::Display for NonceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NonceMode::Explicit => write!(f, "explicit"),
            NonceMode::Omitted => write!(f, "omitted"),
        }
    }
}

/// Errors from config loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl Default for SubscriptionConfig {
    /// Local development addresses, tiers 10/20/30.
    fn default() -> Self {
        Self {
            contract: ContractConfig {
                subscription_address: address!("5FbDB2315678afecb367f032d93F642f64180aa3"),
                token_address: address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512"),
                storage_slot: 1,
            },
            issuer: IssuerConfig {
                supported_tiers: vec![10, 20, 30],
                inclusion_timeout: Duration::from_secs(30),
            },
            membership: MembershipConfig {
                lookup_timeout: Duration::from_secs(10),
            },
            authorization: AuthorizationConfig {
                nonce_mode: NonceMode::Explicit,
            },
        }
    }
}

impl SubscriptionConfig {
    /// Load and validate a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.contract.subscription_address == self.contract.token_address {
            return Err(ConfigError::Validation(
                "contract.subscription_address and contract.token_address must differ".into(),
            ));
        }

        let tiers = &self.issuer.supported_tiers;
        if tiers.is_empty() {
            return Err(ConfigError::Validation(
                "issuer.supported_tiers must not be empty".into(),
            ));
        }
        let mut seen = HashSet::with_capacity(tiers.len());
        if let Some(dup) = tiers.iter().find(|tier| !seen.insert(**tier)) {
            return Err(ConfigError::Validation(format!(
                "issuer.supported_tiers lists tier {dup} more than once"
            )));
        }

        if self.issuer.inclusion_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "issuer.inclusion_timeout must be non-zero".into(),
            ));
        }
        if self.membership.lookup_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "membership.lookup_timeout must be non-zero".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[contract]
subscription_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
token_address = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"
storage_slot = 3

[issuer]
supported_tiers = [10, 20]
inclusion_timeout = "1m 30s"

[membership]
lookup_timeout = "5s"

[authorization]
nonce_mode = "omitted"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = SubscriptionConfig::from_toml(FULL).unwrap();

        assert_eq!(config.contract.storage_slot, 3);
        assert_eq!(config.contract.storage_slot(), u64_to_b256(3));
        assert_eq!(config.issuer.supported_tiers, vec![10, 20]);
        assert_eq!(config.issuer.inclusion_timeout, Duration::from_secs(90));
        assert_eq!(config.membership.lookup_timeout, Duration::from_secs(5));
        assert_eq!(config.authorization.nonce_mode, NonceMode::Omitted);
    }

    #[test]
    fn test_default_is_valid() {
        SubscriptionConfig::default().validate().unwrap();
    }

    #[test]
    fn test_unknown_nonce_mode_rejected() {
        let toml = FULL.replace("\"omitted\"", "\"sometimes\"");
        assert!(matches!(
            SubscriptionConfig::from_toml(&toml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_duplicate_tier_rejected() {
        let mut config = SubscriptionConfig::default();
        config.issuer.supported_tiers = vec![10, 20, 10];

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tier 10"));
    }

    #[test]
    fn test_empty_tiers_rejected() {
        let mut config = SubscriptionConfig::default();
        config.issuer.supported_tiers.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = SubscriptionConfig::default();
        config.membership.lookup_timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_same_addresses_rejected() {
        let mut config = SubscriptionConfig::default();
        config.contract.token_address = config.contract.subscription_address;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subscription.toml");
        std::fs::write(&path, FULL).unwrap();

        let config = SubscriptionConfig::load(&path).unwrap();
        assert_eq!(config.authorization.nonce_mode, NonceMode::Omitted);

        let missing = SubscriptionConfig::load(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
