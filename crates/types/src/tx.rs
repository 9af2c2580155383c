/// Transaction candidates, simulation outcomes and gas settings

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

// ============================================================================
// Unsigned Transaction
// ============================================================================

/// Unsigned transaction payload produced by the protocol bindings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// Automated action a candidate performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxAction {
    ReduceBond,
    Stake,
    DistributeFees,
}

// ============================================================================
// Simulation
// ============================================================================

/// Result of dry-running a candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationOutcome {
    Ok {
        /// Estimated gas used
        gas_estimate: u64,
        /// Padded limit used for submission
        safe_gas_limit: u64,
    },
    Revert {
        reason: String,
    },
}

impl SimulationOutcome {
    pub fn is_revert(&self) -> bool {
        matches!(self, Self::Revert { .. })
    }

    pub fn gas_estimate(&self) -> Option<u64> {
        match self {
            Self::Ok { gas_estimate, .. } => Some(*gas_estimate),
            Self::Revert { .. } => None,
        }
    }
}

// ============================================================================
// Candidate
// ============================================================================

/// A transaction a task wants to send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxCandidate {
    /// Sub-account (or distributor) the transaction acts on
    pub subject: Address,
    /// Owner node
    pub node: Address,
    pub action: TxAction,
    pub request: TxRequest,
    /// Filled in by the orchestrator before gas gating
    pub simulation: Option<SimulationOutcome>,
}

impl TxCandidate {
    pub fn new(subject: Address, node: Address, action: TxAction, request: TxRequest) -> Self {
        Self {
            subject,
            node,
            action,
            request,
            simulation: None,
        }
    }

    /// Whether the candidate was simulated and is known to revert
    pub fn reverts(&self) -> bool {
        self.simulation.as_ref().map_or(false, SimulationOutcome::is_revert)
    }
}

// ============================================================================
// Gas Settings
// ============================================================================

/// Fee settings for one task run; never mutated mid-run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasSettings {
    /// Max fee per gas in wei
    pub max_fee: U256,
    /// Max priority fee per gas in wei
    pub priority_fee: U256,
    /// Total batch cost ceiling in wei; zero disables automation
    pub threshold: U256,
}

impl GasSettings {
    /// Automation is disabled for this behaviour
    pub fn is_disabled(&self) -> bool {
        self.threshold == U256::ZERO
    }
}

// ============================================================================
// Submission
// ============================================================================

/// A candidate priced and sequenced for one signer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTx {
    pub request: TxRequest,
    pub nonce: u64,
    pub gas_limit: u64,
    pub max_fee: U256,
    pub priority_fee: U256,
}

/// Inclusion receipt of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    /// False when the transaction reverted after inclusion
    pub success: bool,
}
