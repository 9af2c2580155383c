use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use smartnode_types::{
    wei_to_eth, MinipoolDetails, MinipoolField, MinipoolStatus, NetworkDetails, NetworkSnapshot,
    TxAction, TxCandidate, REDUCIBLE_BOND_WEI,
};
use tracing::{debug, info, warn};

use super::{distribute_candidate, elapsed, format_duration, AutomatedTask};
use crate::bindings::ProtocolWrites;

/// Fields a minipool needs before its bond reduction can be judged
const REQUIRED_FIELDS: [MinipoolField; 4] = [
    MinipoolField::Status,
    MinipoolField::NodeDepositBalance,
    MinipoolField::ReduceBondTime,
    MinipoolField::ReduceBondCancelled,
];

/// Where a minipool sits in its bond reduction window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondReductionState {
    NotRequested,
    WindowPending { opens_in: Duration },
    WindowOpen { closes_in: Duration },
    WindowExpired,
    Cancelled,
}

/// Bond reduction window state of `minipool` at chain time `now`.
///
/// The window opens at exactly `requested + window_start` and closes at
/// `requested + window_start + window_length`.
pub fn bond_reduction_state(minipool: &MinipoolDetails, network: &NetworkDetails, now: u64) -> BondReductionState {
    if minipool.reduce_bond_time == 0 {
        return BondReductionState::NotRequested;
    }
    if minipool.reduce_bond_cancelled {
        return BondReductionState::Cancelled;
    }

    let start = network.bond_reduction_window_start;
    let end = start.saturating_add(network.bond_reduction_window_length);

    // Chain time behind the request: the window cannot have opened yet
    let Some(since_request) = elapsed(now, minipool.reduce_bond_time) else {
        return BondReductionState::WindowPending {
            opens_in: start.saturating_add(Duration::from_secs(minipool.reduce_bond_time - now)),
        };
    };

    if since_request < start {
        BondReductionState::WindowPending { opens_in: start - since_request }
    } else if since_request < end {
        BondReductionState::WindowOpen { closes_in: end - since_request }
    } else {
        BondReductionState::WindowExpired
    }
}

/// Reduces 16 ETH bonds once the protocol's reduction window opens
pub struct ReduceBonds {
    writes: Arc<dyn ProtocolWrites>,
}

impl ReduceBonds {
    pub fn new(writes: Arc<dyn ProtocolWrites>) -> Self {
        Self { writes }
    }

    fn is_reducible(minipool: &MinipoolDetails) -> bool {
        minipool.has_fields(&REQUIRED_FIELDS)
            && minipool.status == MinipoolStatus::Staking
            && minipool.node_deposit_balance == U256::from(REDUCIBLE_BOND_WEI)
    }
}

impl AutomatedTask for ReduceBonds {
    fn name(&self) -> &'static str {
        "reduce-bonds"
    }

    fn scan(&self, snapshot: &NetworkSnapshot, node: Address, now: u64) -> Vec<TxCandidate> {
        let mut candidates = Vec::new();
        let mut pending = 0usize;

        for minipool in snapshot.minipools(&node) {
            match bond_reduction_state(minipool, &snapshot.network, now) {
                BondReductionState::WindowOpen { .. } if Self::is_reducible(minipool) => {
                    candidates.push(TxCandidate::new(
                        minipool.address,
                        node,
                        TxAction::ReduceBond,
                        self.writes.reduce_bond_amount(minipool.address),
                    ));
                }
                BondReductionState::WindowOpen { .. } => {
                    debug!(
                        minipool = %minipool.address,
                        status = ?minipool.status,
                        failed_reads = ?minipool.failed_reads,
                        "Bond reduction window open but minipool is not reducible"
                    );
                }
                BondReductionState::WindowPending { opens_in } => {
                    pending += 1;
                    debug!(
                        minipool = %minipool.address,
                        remaining = %format_duration(opens_in),
                        "Minipool has time left until it can have its bond reduced"
                    );
                }
                BondReductionState::WindowExpired => {
                    warn!(minipool = %minipool.address, "Bond reduction window was missed");
                }
                BondReductionState::NotRequested | BondReductionState::Cancelled => {}
            }
        }

        if !candidates.is_empty() || pending > 0 {
            info!(node = %node, ready = candidates.len(), pending, "Scanned minipools for bond reduction");
        }

        candidates
    }

    fn describe(&self, candidate: &TxCandidate) -> String {
        format!("reduce bond of minipool {} (node {})", candidate.subject, candidate.node)
    }

    /// Distributor balance must be distributed before any bond reduction
    fn prerequisites(&self, snapshot: &NetworkSnapshot, node: Address) -> Vec<TxCandidate> {
        let Some(details) = snapshot.node(&node) else {
            return Vec::new();
        };
        if !details.fee_distributor_initialised || details.fee_distributor_balance == U256::ZERO {
            return Vec::new();
        }

        info!(
            node = %node,
            balance_eth = wei_to_eth(details.fee_distributor_balance),
            node_share_eth = wei_to_eth(details.fee_distributor_node_share),
            "Fee distributor must be distributed prior to bond reduction"
        );
        vec![distribute_candidate(self.writes.as_ref(), details)]
    }

    fn on_deferred(&self, snapshot: &NetworkSnapshot, candidates: &[TxCandidate], now: u64) {
        for candidate in candidates {
            let Some(minipool) = snapshot.minipools(&candidate.node).iter().find(|m| m.address == candidate.subject) else {
                continue;
            };
            if let BondReductionState::WindowOpen { closes_in } = bond_reduction_state(minipool, &snapshot.network, now) {
                warn!(
                    minipool = %minipool.address,
                    remaining = %format_duration(closes_in),
                    "Bond reduction deferred; time until the window closes"
                );
            }
        }
    }
}
