/// Minipool (sub-account) records as read from chain

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

// ============================================================================
// Minipool Status
// ============================================================================

/// Lifecycle status reported by the minipool contract
///
/// Transitions are owned by the protocol; the keeper only reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MinipoolStatus {
    #[default]
    Initialised,
    Prelaunch,
    Staking,
    Withdrawable,
    Dissolved,
    /// Value outside the known enumeration
    Unknown(u8),
}

impl From<u8> for MinipoolStatus {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::Initialised,
            1 => Self::Prelaunch,
            2 => Self::Staking,
            3 => Self::Withdrawable,
            4 => Self::Dissolved,
            other => Self::Unknown(other),
        }
    }
}

// ============================================================================
// Minipool Fields
// ============================================================================

/// Per-minipool fields read in one snapshot build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MinipoolField {
    Status,
    StatusTime,
    NodeDepositBalance,
    ReduceBondTime,
    ReduceBondCancelled,
    Pubkey,
}

impl MinipoolField {
    /// Every field, in read order
    pub const ALL: [MinipoolField; 6] = [
        MinipoolField::Status,
        MinipoolField::StatusTime,
        MinipoolField::NodeDepositBalance,
        MinipoolField::ReduceBondTime,
        MinipoolField::ReduceBondCancelled,
        MinipoolField::Pubkey,
    ];
}

// ============================================================================
// Minipool Details
// ============================================================================

/// One managed minipool at the snapshot's pinned block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinipoolDetails {
    /// Minipool contract address
    pub address: Address,
    /// Owning node
    pub node: Address,
    pub status: MinipoolStatus,
    /// Unix time of the last status change
    pub status_time: u64,
    /// Node's bond in wei
    pub node_deposit_balance: U256,
    /// Unix time bond reduction was requested (0 when never requested)
    pub reduce_bond_time: u64,
    pub reduce_bond_cancelled: bool,
    /// Validator public key
    pub pubkey: Bytes,
    /// Fields whose read reverted; their values above are defaults
    pub failed_reads: Vec<MinipoolField>,
}

impl MinipoolDetails {
    /// Empty record for a minipool whose fields have not been read yet
    pub fn new(address: Address, node: Address) -> Self {
        Self {
            address,
            node,
            status: MinipoolStatus::default(),
            status_time: 0,
            node_deposit_balance: U256::ZERO,
            reduce_bond_time: 0,
            reduce_bond_cancelled: false,
            pubkey: Bytes::new(),
            failed_reads: Vec::new(),
        }
    }

    /// Whether every one of `fields` was read successfully
    pub fn has_fields(&self, fields: &[MinipoolField]) -> bool {
        fields.iter().all(|f| !self.failed_reads.contains(f))
    }
}
