use std::sync::Arc;

use alloy_primitives::{Address, U256};
use smartnode_types::{wei_to_eth, NetworkSnapshot, NodeDetails, NodeField, TxAction, TxCandidate};
use tracing::{debug, info};

use super::AutomatedTask;
use crate::bindings::ProtocolWrites;

/// Distribute-fees candidate acting on `node`'s fee distributor
pub fn distribute_candidate(writes: &dyn ProtocolWrites, node: &NodeDetails) -> TxCandidate {
    TxCandidate::new(
        node.fee_distributor,
        node.address,
        TxAction::DistributeFees,
        writes.distribute_fees(node.fee_distributor),
    )
}

/// Distributes a node's fee distributor once its balance reaches a threshold
pub struct DistributeFees {
    writes: Arc<dyn ProtocolWrites>,
    /// Zero disables the task
    threshold: U256,
}

impl DistributeFees {
    pub fn new(writes: Arc<dyn ProtocolWrites>, threshold: U256) -> Self {
        Self { writes, threshold }
    }
}

impl AutomatedTask for DistributeFees {
    fn name(&self) -> &'static str {
        "distribute-fees"
    }

    fn scan(&self, snapshot: &NetworkSnapshot, node: Address, _now: u64) -> Vec<TxCandidate> {
        if self.threshold == U256::ZERO {
            return Vec::new();
        }
        let Some(details) = snapshot.node(&node) else {
            return Vec::new();
        };
        if details.failed_reads.contains(&NodeField::FeeDistributorBalance) || !details.fee_distributor_initialised {
            debug!(node = %node, "Fee distributor not readable or not initialised");
            return Vec::new();
        }

        let balance = details.fee_distributor_balance;
        if balance < self.threshold {
            return Vec::new();
        }

        info!(
            node = %node,
            balance_eth = wei_to_eth(balance),
            node_share_eth = wei_to_eth(details.fee_distributor_node_share),
            "Fee distributor balance reached threshold"
        );
        vec![distribute_candidate(self.writes.as_ref(), details)]
    }

    fn describe(&self, candidate: &TxCandidate) -> String {
        format!("distribute fee distributor {} (node {})", candidate.subject, candidate.node)
    }
}
