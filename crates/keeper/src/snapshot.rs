//! Height-pinned snapshot assembly.
//!
//! A build runs in phases separated by a join point, because each phase
//! addresses its requests by index into the previous phase's output:
//!
//! 1. pin the latest block
//! 2. network parameters and node identity fields
//! 3. minipool addresses and fee distributor balances
//! 4. every per-minipool field group, one batched read per field
//!
//! Reads inside a phase run concurrently; the first transport error
//! cancels the rest of the phase and aborts the build.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use futures::future::try_join_all;
use smartnode_types::{
    decode_address, decode_bool, decode_bytes, decode_u64, decode_uint, BlockRef, CallRequest,
    CallResult, MinipoolDetails, MinipoolField, MinipoolStatus, NetworkDetails, NetworkField,
    NetworkSnapshot, NodeDetails, NodeField, SmartnodeError, SmartnodeResult,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batcher::{CallBatcher, ReadTransport};
use crate::bindings::ProtocolReads;
use crate::config::SnapshotConfig;

/// Anything that can produce a fresh snapshot for a set of nodes
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn build(&self, nodes: &[Address], cancel: &CancellationToken) -> SmartnodeResult<NetworkSnapshot>;
}

/// Builds snapshots from batched contract reads
pub struct SnapshotBuilder {
    batcher: CallBatcher,
    reads: Arc<dyn ProtocolReads>,
    batch_size: usize,
}

/// Minipool address resolved in phase 3, with its owner
struct MinipoolSlot {
    node: Address,
    address: Address,
}

impl SnapshotBuilder {
    pub fn new(batcher: CallBatcher, reads: Arc<dyn ProtocolReads>, batch_size: usize) -> Self {
        Self {
            batcher,
            reads,
            batch_size,
        }
    }

    pub fn from_config(
        transport: Arc<dyn ReadTransport>,
        reads: Arc<dyn ProtocolReads>,
        config: &SnapshotConfig,
    ) -> Self {
        Self::new(
            CallBatcher::new(transport, config.max_concurrent_batches),
            reads,
            config.batch_size,
        )
    }

    async fn pin_block(&self, cancel: &CancellationToken) -> SmartnodeResult<BlockRef> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SmartnodeError::cancelled("pin_block")),
            block = self.batcher.transport().latest_block() => block,
        }
    }

    async fn execute(
        &self,
        requests: &[CallRequest],
        block: u64,
        cancel: &CancellationToken,
    ) -> SmartnodeResult<Vec<CallResult>> {
        self.batcher.execute_batch(requests, block, self.batch_size, cancel).await
    }

    async fn read_network(&self, block: u64, cancel: &CancellationToken) -> SmartnodeResult<NetworkDetails> {
        let requests: Vec<CallRequest> = NetworkField::ALL
            .iter()
            .enumerate()
            .map(|(slot, field)| self.reads.network_field(*field).with_slot(slot))
            .collect();
        let results = self.execute(&requests, block, cancel).await?;

        let mut network = NetworkDetails::default();
        for ((field, request), result) in NetworkField::ALL.iter().zip(&requests).zip(&results) {
            // No legitimate zero state for protocol parameters
            let value = result
                .data()
                .and_then(decode_uint)
                .ok_or_else(|| SmartnodeError::reverted(request.target, &format!("{:?} read failed", field)))?;

            match field {
                NetworkField::BondReductionWindowStart => network.bond_reduction_window_start = seconds(value),
                NetworkField::BondReductionWindowLength => network.bond_reduction_window_length = seconds(value),
                NetworkField::ScrubPeriod => network.scrub_period = seconds(value),
                NetworkField::LaunchTimeout => network.launch_timeout = seconds(value),
                NetworkField::BaseFee => network.base_fee = value,
            }
        }

        Ok(network)
    }

    async fn read_node_identities(
        &self,
        nodes: &[Address],
        block: u64,
        cancel: &CancellationToken,
    ) -> SmartnodeResult<Vec<NodeDetails>> {
        let width = NodeField::IDENTITY.len();
        let requests: Vec<CallRequest> = nodes
            .iter()
            .enumerate()
            .flat_map(|(i, node)| {
                NodeField::IDENTITY
                    .iter()
                    .enumerate()
                    .map(move |(k, field)| self.reads.node_field(*node, None, *field).with_slot(i * width + k))
            })
            .collect();
        let results = self.execute(&requests, block, cancel).await?;

        let details = nodes
            .iter()
            .zip(results.chunks(width))
            .map(|(node, chunk)| {
                let mut details = NodeDetails::new(*node);
                for (field, result) in NodeField::IDENTITY.iter().zip(chunk) {
                    apply_node_field(&mut details, *field, result);
                }
                details
            })
            .collect();

        Ok(details)
    }

    async fn read_minipool_addresses(
        &self,
        nodes: &[NodeDetails],
        block: u64,
        cancel: &CancellationToken,
    ) -> SmartnodeResult<Vec<MinipoolSlot>> {
        let mut owners = Vec::new();
        let mut requests = Vec::new();
        for node in nodes {
            for index in 0..node.minipool_count {
                requests.push(self.reads.minipool_at(node.address, index).with_slot(requests.len()));
                owners.push(node.address);
            }
        }
        let results = self.execute(&requests, block, cancel).await?;

        let mut slots = Vec::with_capacity(results.len());
        for ((node, request), result) in owners.into_iter().zip(&requests).zip(&results) {
            match result.data().and_then(decode_address) {
                Some(address) => slots.push(MinipoolSlot { node, address }),
                None => warn!(
                    node = %node,
                    slot = request.slot,
                    "Could not resolve minipool address, skipping it for this snapshot"
                ),
            }
        }

        Ok(slots)
    }

    async fn read_distributors(
        &self,
        nodes: &mut [NodeDetails],
        block: u64,
        cancel: &CancellationToken,
    ) -> SmartnodeResult<()> {
        let width = NodeField::DISTRIBUTOR.len();
        let view: &[NodeDetails] = nodes;
        let readable: Vec<usize> = view
            .iter()
            .enumerate()
            .filter(|(_, node)| !node.failed_reads.contains(&NodeField::FeeDistributor))
            .map(|(i, _)| i)
            .collect();

        let requests: Vec<CallRequest> = readable
            .iter()
            .enumerate()
            .flat_map(|(n, i)| {
                let node = &view[*i];
                NodeField::DISTRIBUTOR.iter().enumerate().map(move |(k, field)| {
                    self.reads
                        .node_field(node.address, Some(node.fee_distributor), *field)
                        .with_slot(n * width + k)
                })
            })
            .collect();
        let results = self.execute(&requests, block, cancel).await?;

        for (i, chunk) in readable.iter().zip(results.chunks(width)) {
            for (field, result) in NodeField::DISTRIBUTOR.iter().zip(chunk) {
                apply_node_field(&mut nodes[*i], *field, result);
            }
        }

        Ok(())
    }

    async fn read_minipool_fields(
        &self,
        slots: &[MinipoolSlot],
        block: u64,
        cancel: &CancellationToken,
    ) -> SmartnodeResult<Vec<MinipoolDetails>> {
        let field_reads = MinipoolField::ALL.iter().map(|field| {
            let requests: Vec<CallRequest> = slots
                .iter()
                .enumerate()
                .map(|(i, slot)| self.reads.minipool_field(slot.address, *field).with_slot(i))
                .collect();
            async move { self.execute(&requests, block, cancel).await }
        });
        let by_field = try_join_all(field_reads).await?;

        let mut records: Vec<MinipoolDetails> = slots
            .iter()
            .map(|slot| MinipoolDetails::new(slot.address, slot.node))
            .collect();

        for (field, results) in MinipoolField::ALL.iter().zip(&by_field) {
            for (record, result) in records.iter_mut().zip(results) {
                apply_minipool_field(record, *field, result);
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl SnapshotSource for SnapshotBuilder {
    async fn build(&self, nodes: &[Address], cancel: &CancellationToken) -> SmartnodeResult<NetworkSnapshot> {
        let mut seen = HashSet::new();
        let nodes: Vec<Address> = nodes.iter().copied().filter(|n| seen.insert(*n)).collect();

        let block = self.pin_block(cancel).await?;
        debug!(block = block.number, timestamp = block.timestamp, nodes = nodes.len(), "Pinned snapshot block");

        let (network, mut node_details) = tokio::try_join!(
            self.read_network(block.number, cancel),
            self.read_node_identities(&nodes, block.number, cancel),
        )?;

        let identities = node_details.clone();
        let (slots, ()) = tokio::try_join!(
            self.read_minipool_addresses(&identities, block.number, cancel),
            self.read_distributors(&mut node_details, block.number, cancel),
        )?;

        let records = self.read_minipool_fields(&slots, block.number, cancel).await?;

        let failed_records = records.iter().filter(|r| !r.failed_reads.is_empty()).count();
        let mut minipools_by_node: HashMap<Address, Vec<MinipoolDetails>> =
            nodes.iter().map(|n| (*n, Vec::new())).collect();
        for record in records {
            minipools_by_node.entry(record.node).or_default().push(record);
        }

        let snapshot = NetworkSnapshot {
            block,
            network,
            nodes: node_details.into_iter().map(|n| (n.address, n)).collect(),
            minipools_by_node,
        };

        info!(
            block = block.number,
            nodes = snapshot.nodes.len(),
            minipools = snapshot.minipool_count(),
            records_with_failed_reads = failed_records,
            "Built network snapshot"
        );

        Ok(snapshot)
    }
}

fn seconds(value: U256) -> Duration {
    Duration::from_secs(u64::try_from(value).unwrap_or(u64::MAX))
}

fn apply_node_field(node: &mut NodeDetails, field: NodeField, result: &CallResult) {
    let data = result.data();
    let applied = match field {
        NodeField::MinipoolCount => data.and_then(decode_u64).map(|v| node.minipool_count = v),
        NodeField::FeeDistributor => data.and_then(decode_address).map(|v| node.fee_distributor = v),
        NodeField::FeeDistributorInitialised => data.and_then(decode_bool).map(|v| node.fee_distributor_initialised = v),
        NodeField::FeeDistributorBalance => data.and_then(decode_uint).map(|v| node.fee_distributor_balance = v),
        NodeField::FeeDistributorNodeShare => data.and_then(decode_uint).map(|v| node.fee_distributor_node_share = v),
    };

    if applied.is_none() {
        warn!(node = %node.address, field = ?field, "Node read reverted, recording on node");
        node.failed_reads.push(field);
    }
}

fn apply_minipool_field(record: &mut MinipoolDetails, field: MinipoolField, result: &CallResult) {
    let data = result.data();
    let applied = match field {
        MinipoolField::Status => data
            .and_then(decode_u64)
            .and_then(|v| u8::try_from(v).ok())
            .map(|v| record.status = MinipoolStatus::from(v)),
        MinipoolField::StatusTime => data.and_then(decode_u64).map(|v| record.status_time = v),
        MinipoolField::NodeDepositBalance => data.and_then(decode_uint).map(|v| record.node_deposit_balance = v),
        MinipoolField::ReduceBondTime => data.and_then(decode_u64).map(|v| record.reduce_bond_time = v),
        MinipoolField::ReduceBondCancelled => data.and_then(decode_bool).map(|v| record.reduce_bond_cancelled = v),
        MinipoolField::Pubkey => data.and_then(decode_bytes).map(|v| record.pubkey = v),
    };

    if applied.is_none() {
        debug!(minipool = %record.address, field = ?field, "Minipool read reverted, recording on record");
        record.failed_reads.push(field);
    }
}
