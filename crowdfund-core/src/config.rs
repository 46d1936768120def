//! Configuration for the crowdfunding engine

use crate::fee::{validate_fee_bps, FeePolicy, DEFAULT_PLATFORM_FEE_BPS};
use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Well-known accounts
    pub accounts: AccountsConfig,

    /// Initial fee policy (ignored once a policy is persisted)
    pub fees: FeeConfig,

    /// Single-writer actor configuration
    pub actor: ActorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/crowdfund"),
            service_name: "crowdfund-core".to_string(),
            storage: StorageConfig::default(),
            accounts: AccountsConfig::default(),
            fees: FeeConfig::default(),
            actor: ActorConfig::default(),
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Volatile, process-local
    Memory,
    /// Durable RocksDB under `data_dir`
    RocksDb,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend
    pub backend: StorageBackend,

    /// RocksDB tuning
    pub rocksdb: RocksDBConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::RocksDb,
            rocksdb: RocksDBConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// Well-known accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsConfig {
    /// Only account allowed to change the fee policy
    pub administrator: AccountId,

    /// Receives platform fees on claim
    pub platform: AccountId,

    /// Holds contributed funds until claim or refund
    pub escrow: AccountId,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            administrator: AccountId::new("deployer"),
            platform: AccountId::new("platform"),
            escrow: AccountId::new("crowdfund-escrow"),
        }
    }
}

/// Initial fee policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Platform fee in basis points
    pub platform_fee_bps: u32,

    /// Minimum contribution in base units
    pub minimum_contribution: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            platform_fee_bps: DEFAULT_PLATFORM_FEE_BPS,
            minimum_contribution: 0,
        }
    }
}

impl FeeConfig {
    /// Build the policy this config describes
    pub fn to_policy(&self) -> crate::Result<FeePolicy> {
        FeePolicy::new(self.platform_fee_bps, u128::from(self.minimum_contribution))
    }
}

/// Actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Bounded mailbox size
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1024,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("CROWDFUND_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(backend) = std::env::var("CROWDFUND_STORAGE_BACKEND") {
            config.storage.backend = match backend.to_ascii_lowercase().as_str() {
                "memory" => StorageBackend::Memory,
                "rocksdb" => StorageBackend::RocksDb,
                other => {
                    return Err(crate::Error::Config(format!(
                        "Unknown storage backend: {}",
                        other
                    )))
                }
            };
        }

        if let Ok(admin) = std::env::var("CROWDFUND_ADMIN") {
            config.accounts.administrator = AccountId::new(admin);
        }

        if let Ok(platform) = std::env::var("CROWDFUND_PLATFORM_ACCOUNT") {
            config.accounts.platform = AccountId::new(platform);
        }

        if let Ok(escrow) = std::env::var("CROWDFUND_ESCROW_ACCOUNT") {
            config.accounts.escrow = AccountId::new(escrow);
        }

        if let Ok(bps) = std::env::var("CROWDFUND_PLATFORM_FEE_BPS") {
            config.fees.platform_fee_bps = bps
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid platform fee: {}", e)))?;
        }

        if let Ok(minimum) = std::env::var("CROWDFUND_MIN_CONTRIBUTION") {
            config.fees.minimum_contribution = minimum
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid minimum contribution: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> crate::Result<()> {
        validate_fee_bps(self.fees.platform_fee_bps)
            .map_err(|e| crate::Error::Config(e.to_string()))?;

        for (name, account) in [
            ("administrator", &self.accounts.administrator),
            ("platform", &self.accounts.platform),
            ("escrow", &self.accounts.escrow),
        ] {
            if account.as_str().is_empty() {
                return Err(crate::Error::Config(format!("{} account is empty", name)));
            }
        }

        if self.accounts.escrow == self.accounts.platform {
            return Err(crate::Error::Config(
                "escrow and platform accounts must differ".to_string(),
            ));
        }

        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "actor mailbox capacity must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
