use std::fs;
use std::path::Path;
use std::time::Duration;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use smartnode_types::{
    SmartnodeError, SmartnodeResult,
    DEFAULT_AUTO_TX_GAS_THRESHOLD_ETH, DEFAULT_INCLUSION_TIMEOUT_SECS,
    DEFAULT_MAX_CONCURRENT_BATCHES, DEFAULT_MULTICALL_BATCH_SIZE,
    DEFAULT_PRIORITY_FEE_GWEI, DEFAULT_UPDATE_INTERVAL_SECS,
};

use crate::error::KeeperError;

/// Keeper configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct KeeperConfig {
    /// Nodes whose minipools are aggregated into each snapshot
    pub node_addresses: Vec<Address>,

    /// Seconds between keeper cycles
    pub update_interval_secs: u64,

    /// Minimum signer balance before the health check warns (ETH)
    pub min_balance_eth: f64,

    /// Snapshot aggregation settings
    pub snapshot: SnapshotConfig,

    /// Automatic transaction fee settings
    pub gas: GasConfig,

    /// Submission settings
    pub transactions: TransactionConfig,

    /// Which automated behaviours run
    pub tasks: TaskConfig,
}

/// Snapshot aggregation settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SnapshotConfig {
    /// Reads per aggregated call
    pub batch_size: usize,

    /// Aggregated calls in flight for one build phase
    pub max_concurrent_batches: usize,
}

/// Automatic transaction fee settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GasConfig {
    /// Max fee per gas in gwei; 0 derives it from the block base fee
    pub max_fee_gwei: f64,

    /// Max priority fee per gas in gwei
    pub priority_fee_gwei: f64,

    /// Ceiling on the estimated cost of one batch in ETH; 0 disables automation
    pub auto_tx_gas_threshold_eth: f64,
}

/// Submission settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TransactionConfig {
    /// Seconds to wait for a submitted batch to be included
    pub inclusion_timeout_secs: u64,
}

/// Automated behaviour toggles
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TaskConfig {
    pub reduce_bonds: bool,
    pub stake_minipools: bool,
    pub distribute_fees: bool,

    /// Distributor balance that triggers a standalone distribution (ETH); 0 disables it
    pub distribute_threshold_eth: f64,
}

impl KeeperConfig {
    /// Load configuration from TOML file
    pub fn load(path: impl AsRef<Path>) -> SmartnodeResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(KeeperError::from)?;
        let config: KeeperConfig = toml::from_str(&content).map_err(KeeperError::from)?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> SmartnodeResult<()> {
        let content = toml::to_string_pretty(self).map_err(KeeperError::from)?;
        fs::write(path.as_ref(), content).map_err(KeeperError::from)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SmartnodeResult<()> {
        if self.node_addresses.is_empty() {
            return Err(SmartnodeError::invalid_parameter("node_addresses", "empty", "at least one node"));
        }

        if self.update_interval_secs == 0 {
            return Err(SmartnodeError::invalid_parameter("update_interval_secs", "0", "greater than 0"));
        }

        if !self.min_balance_eth.is_finite() || self.min_balance_eth < 0.0 {
            return Err(SmartnodeError::invalid_parameter("min_balance_eth", &self.min_balance_eth.to_string(), "a finite value >= 0"));
        }

        self.snapshot.validate()?;
        self.gas.validate()?;

        if self.transactions.inclusion_timeout_secs == 0 {
            return Err(SmartnodeError::invalid_parameter("inclusion_timeout_secs", "0", "greater than 0"));
        }

        if !self.tasks.distribute_threshold_eth.is_finite() || self.tasks.distribute_threshold_eth < 0.0 {
            return Err(SmartnodeError::invalid_parameter("distribute_threshold_eth", &self.tasks.distribute_threshold_eth.to_string(), "a finite value >= 0"));
        }

        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn inclusion_timeout(&self) -> Duration {
        Duration::from_secs(self.transactions.inclusion_timeout_secs)
    }
}

impl SnapshotConfig {
    fn validate(&self) -> SmartnodeResult<()> {
        if self.batch_size == 0 {
            return Err(SmartnodeError::invalid_parameter("batch_size", "0", "greater than 0"));
        }

        if self.max_concurrent_batches == 0 {
            return Err(SmartnodeError::invalid_parameter("max_concurrent_batches", "0", "greater than 0"));
        }

        Ok(())
    }
}

impl GasConfig {
    fn validate(&self) -> SmartnodeResult<()> {
        let fields = [
            ("max_fee_gwei", self.max_fee_gwei),
            ("priority_fee_gwei", self.priority_fee_gwei),
            ("auto_tx_gas_threshold_eth", self.auto_tx_gas_threshold_eth),
        ];

        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(SmartnodeError::invalid_parameter(name, &value.to_string(), "a finite value >= 0"));
            }
        }

        if self.max_fee_gwei > 0.0 && self.priority_fee_gwei > self.max_fee_gwei {
            return Err(SmartnodeError::invalid_parameter(
                "priority_fee_gwei",
                &self.priority_fee_gwei.to_string(),
                &format!("at most max_fee_gwei ({})", self.max_fee_gwei),
            ));
        }

        Ok(())
    }
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            node_addresses: vec![],
            update_interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
            min_balance_eth: 0.05,
            snapshot: SnapshotConfig::default(),
            gas: GasConfig::default(),
            transactions: TransactionConfig::default(),
            tasks: TaskConfig::default(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_MULTICALL_BATCH_SIZE,
            max_concurrent_batches: DEFAULT_MAX_CONCURRENT_BATCHES,
        }
    }
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            max_fee_gwei: 0.0,
            priority_fee_gwei: DEFAULT_PRIORITY_FEE_GWEI,
            auto_tx_gas_threshold_eth: DEFAULT_AUTO_TX_GAS_THRESHOLD_ETH,
        }
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            inclusion_timeout_secs: DEFAULT_INCLUSION_TIMEOUT_SECS,
        }
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            reduce_bonds: true,
            stake_minipools: true,
            distribute_fees: false,
            distribute_threshold_eth: 1.0,
        }
    }
}

/// Create example configuration file
pub fn create_example_config(path: impl AsRef<Path>) -> SmartnodeResult<()> {
    let example_config = KeeperConfig {
        node_addresses: vec![Address::repeat_byte(0x11)],
        update_interval_secs: 300,
        min_balance_eth: 0.1,
        snapshot: SnapshotConfig {
            batch_size: 200,
            max_concurrent_batches: 4,
        },
        gas: GasConfig {
            max_fee_gwei: 0.0,
            priority_fee_gwei: 2.0,
            auto_tx_gas_threshold_eth: 0.02,
        },
        transactions: TransactionConfig::default(),
        tasks: TaskConfig::default(),
    };

    example_config.save(path)?;
    Ok(())
}
