/// Protocol constants used across the smartnode automation core

// ============================================================================
// Unit Constants
// ============================================================================

/// Wei per gwei
pub const WEI_PER_GWEI: u64 = 1_000_000_000;

/// Wei per ether
pub const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

/// Width of a single ABI word
pub const ABI_WORD_SIZE: usize = 32;

// ============================================================================
// Bond Constants
// ============================================================================

/// Node deposit of a minipool eligible for bond reduction (16 ETH)
pub const REDUCIBLE_BOND_WEI: u128 = 16 * WEI_PER_ETH;

// ============================================================================
// Batching Constants
// ============================================================================

/// Default reads per aggregated call, kept under the remote gas/response limits
pub const DEFAULT_MULTICALL_BATCH_SIZE: usize = 500;

/// Default number of aggregated calls in flight for one phase
pub const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 4;

// ============================================================================
// Gas Constants
// ============================================================================

/// Fee cap multiplier applied to the base fee when no max fee is configured
pub const BASE_FEE_MULTIPLIER: u64 = 2;

/// Default priority fee in gwei
pub const DEFAULT_PRIORITY_FEE_GWEI: f64 = 2.0;

/// Default automatic transaction cost ceiling in ETH
pub const DEFAULT_AUTO_TX_GAS_THRESHOLD_ETH: f64 = 0.05;

// ============================================================================
// Timing Constants
// ============================================================================

/// Default seconds between keeper cycles
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 300;

/// Default seconds to wait for a submitted batch to be included
pub const DEFAULT_INCLUSION_TIMEOUT_SECS: u64 = 600;
