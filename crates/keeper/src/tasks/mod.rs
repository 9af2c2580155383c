//! Automated behaviours that scan a snapshot for actionable work.
//!
//! A task is pure: given a snapshot, an owner and the latest chain time it
//! returns the transactions it wants sent. Simulation, gas gating and
//! submission belong to the orchestrator.

mod distribute_fees;
mod reduce_bonds;
mod stake_minipools;

pub use distribute_fees::{distribute_candidate, DistributeFees};
pub use reduce_bonds::{bond_reduction_state, BondReductionState, ReduceBonds};
pub use stake_minipools::{stake_state, StakeMinipools, StakeState};

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use smartnode_types::{eth_to_wei, NetworkSnapshot, TxCandidate};

use crate::bindings::ProtocolWrites;
use crate::config::TaskConfig;

/// One automated behaviour
pub trait AutomatedTask: Send + Sync {
    /// Short name used in logs and reports
    fn name(&self) -> &'static str;

    /// Candidates for `node` at chain time `now` (unix seconds)
    fn scan(&self, snapshot: &NetworkSnapshot, node: Address, now: u64) -> Vec<TxCandidate>;

    /// Human-readable summary of a candidate
    fn describe(&self, candidate: &TxCandidate) -> String;

    /// Actions that must succeed on chain before this task's candidates
    /// for `node` are submitted
    fn prerequisites(&self, _snapshot: &NetworkSnapshot, _node: Address) -> Vec<TxCandidate> {
        Vec::new()
    }

    /// Called when the gas gate defers this task's candidates
    fn on_deferred(&self, _snapshot: &NetworkSnapshot, _candidates: &[TxCandidate], _now: u64) {}
}

/// Build the enabled tasks in run order
pub fn build_tasks(config: &TaskConfig, writes: Arc<dyn ProtocolWrites>) -> Vec<Arc<dyn AutomatedTask>> {
    let mut tasks: Vec<Arc<dyn AutomatedTask>> = Vec::new();

    if config.distribute_fees {
        tasks.push(Arc::new(DistributeFees::new(writes.clone(), eth_to_wei(config.distribute_threshold_eth))));
    }
    if config.stake_minipools {
        tasks.push(Arc::new(StakeMinipools::new(writes.clone())));
    }
    if config.reduce_bonds {
        tasks.push(Arc::new(ReduceBonds::new(writes)));
    }

    tasks
}

/// `now - since`, or `None` when the chain clock is behind `since`
fn elapsed(now: u64, since: u64) -> Option<Duration> {
    now.checked_sub(since).map(Duration::from_secs)
}

/// Render a duration as `1d 2h 3m 4s`
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (days, hours, minutes, seconds) = (secs / 86_400, secs % 86_400 / 3_600, secs % 3_600 / 60, secs % 60);
    if days > 0 {
        format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else {
        format!("{}m {}s", minutes, seconds)
    }
}
