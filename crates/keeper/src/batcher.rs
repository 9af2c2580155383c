//! Batched multicall execution pinned to one block height.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use smartnode_types::{
    BlockRef, CallOutcome, CallRequest, CallResult, SmartnodeError, SmartnodeResult,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Execution-layer read transport
#[async_trait]
pub trait ReadTransport: Send + Sync {
    /// Header of the latest block
    async fn latest_block(&self) -> SmartnodeResult<BlockRef>;

    /// Execute `calls` as one aggregated remote call at `block`.
    ///
    /// Must return one outcome per call, in call order. Target-level
    /// reverts are reported as unsuccessful outcomes; `Err` is reserved
    /// for the aggregated call itself failing.
    async fn aggregate(&self, calls: &[CallRequest], block: u64) -> SmartnodeResult<Vec<CallOutcome>>;
}

/// Splits independent reads into fixed-size aggregated calls
pub struct CallBatcher {
    transport: Arc<dyn ReadTransport>,
    /// Aggregated calls in flight at once
    max_concurrency: usize,
}

impl CallBatcher {
    pub fn new(transport: Arc<dyn ReadTransport>, max_concurrency: usize) -> Self {
        Self {
            transport,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn transport(&self) -> &Arc<dyn ReadTransport> {
        &self.transport
    }

    /// Execute `requests` in groups of at most `max_batch_size`, all pinned
    /// to `block`. `result[i]` always corresponds to `requests[i]`.
    ///
    /// A failed aggregated call fails the whole invocation and cancels the
    /// groups still in flight. Per-request reverts only clear `success`.
    pub async fn execute_batch(
        &self,
        requests: &[CallRequest],
        block: u64,
        max_batch_size: usize,
        cancel: &CancellationToken,
    ) -> SmartnodeResult<Vec<CallResult>> {
        if max_batch_size == 0 {
            return Err(SmartnodeError::invalid_parameter("max_batch_size", "0", "greater than 0"));
        }
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let group_count = requests.len().div_ceil(max_batch_size);
        debug!(requests = requests.len(), groups = group_count, block, "Executing batched reads");

        let groups = requests
            .chunks(max_batch_size)
            .enumerate()
            .map(|(index, group)| self.execute_group(index, group, block))
            .collect::<Vec<_>>();

        // `buffered` yields in submission order; dropping the stream on the
        // first error drops every group still in flight
        let work = stream::iter(groups)
            .buffered(self.max_concurrency)
            .try_collect::<Vec<_>>();

        let grouped = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SmartnodeError::cancelled("execute_batch")),
            grouped = work => grouped?,
        };

        let results: Vec<CallResult> = grouped.into_iter().flatten().collect();
        if results.len() != requests.len() {
            return Err(SmartnodeError::length_mismatch("execute_batch", requests.len(), results.len()));
        }

        Ok(results)
    }

    async fn execute_group(
        &self,
        index: usize,
        group: &[CallRequest],
        block: u64,
    ) -> SmartnodeResult<Vec<CallResult>> {
        let outcomes = self.transport.aggregate(group, block).await.map_err(|e| {
            warn!(group = index, block, error = %e, "Aggregated call failed");
            e
        })?;

        if outcomes.len() != group.len() {
            return Err(SmartnodeError::length_mismatch("aggregate", group.len(), outcomes.len()));
        }

        Ok(group
            .iter()
            .zip(outcomes)
            .map(|(request, outcome)| CallResult {
                slot: request.slot,
                success: outcome.success,
                value: outcome.return_data,
            })
            .collect())
    }
}
