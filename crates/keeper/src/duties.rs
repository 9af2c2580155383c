//! Beacon duty summary for a node's validators.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use serde::Serialize;
use smartnode_types::{SmartnodeError, SmartnodeResult};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::state_cache::StateCache;

/// Consensus-layer duty lookups
#[async_trait]
pub trait DutySource: Send + Sync {
    async fn head_epoch(&self) -> SmartnodeResult<u64>;

    /// Validator index per pubkey; `None` when not yet on the beacon chain
    async fn validator_indices(&self, pubkeys: &[Bytes]) -> SmartnodeResult<Vec<Option<u64>>>;

    /// Sync committee membership per index for the period containing `epoch`
    async fn sync_committee_duties(&self, indices: &[u64], epoch: u64) -> SmartnodeResult<Vec<bool>>;

    /// Proposals assigned per index in `epoch`
    async fn proposer_duties(&self, indices: &[u64], epoch: u64) -> SmartnodeResult<Vec<u64>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DutySummary {
    pub epoch: u64,
    /// Validators with a beacon index
    pub validators: usize,
    pub active_sync_committee: usize,
    pub upcoming_sync_committee: usize,
    pub upcoming_proposals: u64,
}

/// Summarises duties for the validators in the cached snapshot
pub struct DutyCollector {
    cache: Arc<StateCache>,
    source: Arc<dyn DutySource>,
    epochs_per_sync_committee_period: u64,
}

impl DutyCollector {
    pub fn new(cache: Arc<StateCache>, source: Arc<dyn DutySource>, epochs_per_sync_committee_period: u64) -> Self {
        Self {
            cache,
            source,
            epochs_per_sync_committee_period,
        }
    }

    /// Duty counts for `node`, or `None` before the first snapshot
    pub async fn collect(&self, node: Address, cancel: &CancellationToken) -> SmartnodeResult<Option<DutySummary>> {
        let Some(snapshot) = self.cache.get_snapshot() else {
            return Ok(None);
        };

        let pubkeys: Vec<Bytes> = snapshot
            .minipools(&node)
            .iter()
            .filter(|m| !m.pubkey.is_empty())
            .map(|m| m.pubkey.clone())
            .collect();

        let work = async {
            let epoch = self.source.head_epoch().await?;
            let mut summary = DutySummary { epoch, ..DutySummary::default() };
            if pubkeys.is_empty() {
                return Ok(summary);
            }

            let resolved = self.source.validator_indices(&pubkeys).await?;
            if resolved.len() != pubkeys.len() {
                return Err(SmartnodeError::length_mismatch("validator_indices", pubkeys.len(), resolved.len()));
            }
            let indices: Vec<u64> = resolved.into_iter().flatten().collect();
            summary.validators = indices.len();
            if indices.is_empty() {
                return Ok(summary);
            }

            let next_period = epoch.saturating_add(self.epochs_per_sync_committee_period);
            let (current, upcoming, proposals) = tokio::try_join!(
                self.source.sync_committee_duties(&indices, epoch),
                self.source.sync_committee_duties(&indices, next_period),
                self.source.proposer_duties(&indices, epoch),
            )?;

            summary.active_sync_committee = current.iter().filter(|d| **d).count();
            summary.upcoming_sync_committee = upcoming.iter().filter(|d| **d).count();
            summary.upcoming_proposals = proposals.iter().sum();
            Ok::<_, SmartnodeError>(summary)
        };

        let summary = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SmartnodeError::cancelled("collect_duties")),
            summary = work => summary?,
        };

        debug!(node = %node, block = snapshot.block.number, summary = ?summary, "Collected validator duties");
        Ok(Some(summary))
    }
}
