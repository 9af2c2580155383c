use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use smartnode_types::{
    MinipoolDetails, MinipoolField, MinipoolStatus, NetworkDetails, NetworkSnapshot, TxAction, TxCandidate,
};
use tracing::{debug, info, warn};

use super::{elapsed, format_duration, AutomatedTask};
use crate::bindings::ProtocolWrites;

/// Where a minipool sits relative to its scrub period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeState {
    /// Not in prelaunch, or its status could not be read
    NotPrelaunch,
    Waiting { remaining: Duration },
    Stakeable,
    /// Prelaunch longer than the launch timeout; can only be dissolved
    TimedOut,
}

pub fn stake_state(minipool: &MinipoolDetails, network: &NetworkDetails, now: u64) -> StakeState {
    if minipool.status != MinipoolStatus::Prelaunch
        || !minipool.has_fields(&[MinipoolField::Status, MinipoolField::StatusTime])
    {
        return StakeState::NotPrelaunch;
    }

    let since_status = elapsed(now, minipool.status_time).unwrap_or_default();
    if since_status < network.scrub_period {
        StakeState::Waiting { remaining: network.scrub_period - since_status }
    } else if since_status < network.launch_timeout {
        StakeState::Stakeable
    } else {
        StakeState::TimedOut
    }
}

/// Stakes prelaunch minipools once their scrub period has passed
pub struct StakeMinipools {
    writes: Arc<dyn ProtocolWrites>,
}

impl StakeMinipools {
    pub fn new(writes: Arc<dyn ProtocolWrites>) -> Self {
        Self { writes }
    }
}

impl AutomatedTask for StakeMinipools {
    fn name(&self) -> &'static str {
        "stake-minipools"
    }

    fn scan(&self, snapshot: &NetworkSnapshot, node: Address, now: u64) -> Vec<TxCandidate> {
        let mut candidates = Vec::new();

        for minipool in snapshot.minipools(&node) {
            match stake_state(minipool, &snapshot.network, now) {
                StakeState::Stakeable => candidates.push(TxCandidate::new(
                    minipool.address,
                    node,
                    TxAction::Stake,
                    self.writes.stake(minipool.address),
                )),
                StakeState::Waiting { remaining } => debug!(
                    minipool = %minipool.address,
                    remaining = %format_duration(remaining),
                    "Minipool is still in its scrub period"
                ),
                StakeState::TimedOut => warn!(
                    minipool = %minipool.address,
                    "Minipool exceeded the launch timeout and must be dissolved"
                ),
                StakeState::NotPrelaunch => {}
            }
        }

        if !candidates.is_empty() {
            info!(node = %node, ready = candidates.len(), "Minipools ready to stake");
        }

        candidates
    }

    fn describe(&self, candidate: &TxCandidate) -> String {
        format!("stake minipool {} (node {})", candidate.subject, candidate.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{prelaunch_minipool, snapshot_for, staking_minipool, test_network, FakeBindings};

    const NODE: Address = Address::new([0x11; 20]);
    const T: u64 = 1_700_000_000;
    const HOUR: u64 = 3_600;

    #[test]
    fn test_scrub_period_and_launch_timeout() {
        let network = test_network();
        let minipool = prelaunch_minipool(NODE, 1, T);

        assert_eq!(stake_state(&minipool, &network, T + 11 * HOUR), StakeState::Waiting { remaining: Duration::from_secs(HOUR) });
        assert_eq!(stake_state(&minipool, &network, T + 12 * HOUR), StakeState::Stakeable);
        assert_eq!(stake_state(&minipool, &network, T + 72 * HOUR - 1), StakeState::Stakeable);
        assert_eq!(stake_state(&minipool, &network, T + 72 * HOUR), StakeState::TimedOut);
        assert_eq!(stake_state(&staking_minipool(NODE, 2, 0), &network, T), StakeState::NotPrelaunch);
    }

    #[test]
    fn test_scan_emits_stake_candidates() {
        let now = T + 24 * HOUR;
        let ready = prelaunch_minipool(NODE, 1, T);
        let scrubbing = prelaunch_minipool(NODE, 2, now - HOUR);
        let mut unread = prelaunch_minipool(NODE, 3, T);
        unread.failed_reads.push(MinipoolField::StatusTime);

        let snapshot = snapshot_for(NODE, now, vec![ready.clone(), scrubbing, unread]);
        let candidates = StakeMinipools::new(Arc::new(FakeBindings)).scan(&snapshot, NODE, now);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].subject, ready.address);
        assert_eq!(candidates[0].action, TxAction::Stake);
    }
}
