//! Shared holder of the latest network snapshot.

use std::sync::Arc;

use alloy_primitives::Address;
use parking_lot::RwLock;
use smartnode_types::{NetworkSnapshot, SmartnodeResult};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::snapshot::SnapshotSource;

/// Serves one consistent snapshot to many readers.
///
/// Readers get an `Arc` to an immutable snapshot; a refresh builds a new
/// one off to the side and swaps the pointer, so a reader holds either the
/// old snapshot or the new one and never a mixture. The guard is never
/// held across an await.
#[derive(Default)]
pub struct StateCache {
    current: RwLock<Option<Arc<NetworkSnapshot>>>,
    /// Serialises refreshes so concurrent callers do not build twice in parallel
    refresh_lock: Mutex<()>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest snapshot, or `None` before the first successful build
    pub fn get_snapshot(&self) -> Option<Arc<NetworkSnapshot>> {
        self.current.read().clone()
    }

    /// Block number of the current snapshot
    pub fn block_number(&self) -> Option<u64> {
        self.current.read().as_ref().map(|s| s.block.number)
    }

    /// Build a new snapshot and swap it in.
    ///
    /// On failure the previous snapshot stays current and the error is
    /// returned. A build pinned below the current block is discarded and the
    /// current snapshot returned instead.
    pub async fn refresh<S>(
        &self,
        source: &S,
        nodes: &[Address],
        cancel: &CancellationToken,
    ) -> SmartnodeResult<Arc<NetworkSnapshot>>
    where
        S: SnapshotSource + ?Sized,
    {
        let _refreshing = self.refresh_lock.lock().await;

        let snapshot = match source.build(nodes, cancel).await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                warn!(error = %e, current_block = ?self.block_number(), "Snapshot refresh failed, keeping previous snapshot");
                return Err(e);
            }
        };

        let mut current = self.current.write();
        if let Some(existing) = current.as_ref() {
            if existing.block.number > snapshot.block.number {
                debug!(
                    current_block = existing.block.number,
                    built_block = snapshot.block.number,
                    "Discarding snapshot older than the current one"
                );
                return Ok(existing.clone());
            }
        }

        info!(block = snapshot.block.number, minipools = snapshot.minipool_count(), "Swapped in new snapshot");
        *current = Some(snapshot.clone());
        Ok(snapshot)
    }
}
