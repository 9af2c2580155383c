/// Height-pinned network snapshot and its per-node contents

use std::collections::HashMap;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{call::BlockRef, minipool::MinipoolDetails};

// ============================================================================
// Network Details
// ============================================================================

/// Global protocol parameters valid at the snapshot's block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NetworkDetails {
    /// Delay after a bond reduction request before the window opens
    pub bond_reduction_window_start: Duration,
    /// How long the bond reduction window stays open
    pub bond_reduction_window_length: Duration,
    /// Prelaunch time before a minipool may stake
    pub scrub_period: Duration,
    /// Prelaunch time after which a minipool can be dissolved
    pub launch_timeout: Duration,
    /// Block base fee in wei
    pub base_fee: U256,
}

/// Global parameters read during a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkField {
    BondReductionWindowStart,
    BondReductionWindowLength,
    ScrubPeriod,
    LaunchTimeout,
    BaseFee,
}

impl NetworkField {
    pub const ALL: [NetworkField; 5] = [
        NetworkField::BondReductionWindowStart,
        NetworkField::BondReductionWindowLength,
        NetworkField::ScrubPeriod,
        NetworkField::LaunchTimeout,
        NetworkField::BaseFee,
    ];
}

// ============================================================================
// Node Details
// ============================================================================

/// Per-node fields read during a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeField {
    MinipoolCount,
    FeeDistributor,
    FeeDistributorInitialised,
    FeeDistributorBalance,
    FeeDistributorNodeShare,
}

impl NodeField {
    pub const ALL: [NodeField; 5] = [
        NodeField::MinipoolCount,
        NodeField::FeeDistributor,
        NodeField::FeeDistributorInitialised,
        NodeField::FeeDistributorBalance,
        NodeField::FeeDistributorNodeShare,
    ];

    /// Fields read before the fee distributor address is known
    pub const IDENTITY: [NodeField; 3] = [
        NodeField::MinipoolCount,
        NodeField::FeeDistributor,
        NodeField::FeeDistributorInitialised,
    ];

    /// Fields read against the fee distributor
    pub const DISTRIBUTOR: [NodeField; 2] = [
        NodeField::FeeDistributorBalance,
        NodeField::FeeDistributorNodeShare,
    ];
}

/// One owner's node-level state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDetails {
    pub address: Address,
    pub minipool_count: u64,
    pub fee_distributor: Address,
    pub fee_distributor_initialised: bool,
    /// Distributor ETH balance in wei
    pub fee_distributor_balance: U256,
    /// Node operator's share of the distributor balance in wei
    pub fee_distributor_node_share: U256,
    /// Fields whose read reverted
    pub failed_reads: Vec<NodeField>,
}

impl NodeDetails {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            minipool_count: 0,
            fee_distributor: Address::ZERO,
            fee_distributor_initialised: false,
            fee_distributor_balance: U256::ZERO,
            fee_distributor_node_share: U256::ZERO,
            failed_reads: Vec::new(),
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Immutable view of aggregated state, every field read at `block.number`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub block: BlockRef,
    pub network: NetworkDetails,
    pub nodes: HashMap<Address, NodeDetails>,
    /// Minipools per owner, in the order the node contract enumerates them
    pub minipools_by_node: HashMap<Address, Vec<MinipoolDetails>>,
}

impl NetworkSnapshot {
    /// Minipools owned by `node` (empty when the node is unknown)
    pub fn minipools(&self, node: &Address) -> &[MinipoolDetails] {
        self.minipools_by_node
            .get(node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Node-level details for `node`
    pub fn node(&self, node: &Address) -> Option<&NodeDetails> {
        self.nodes.get(node)
    }

    /// Total minipools across every node
    pub fn minipool_count(&self) -> usize {
        self.minipools_by_node.values().map(Vec::len).sum()
    }
}
