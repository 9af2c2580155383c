//! In-crate fakes for the read transport, bindings, transactor and duty source.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use smartnode_types::{
    decode_address, decode_u64, encode_address, encode_uint, eth_to_wei, gwei_to_wei, BlockRef,
    CallOutcome, CallRequest, MinipoolDetails, MinipoolField, MinipoolStatus, NetworkDetails,
    NetworkField, NetworkSnapshot, NodeDetails, NodeField, PreparedTx, SimulationOutcome,
    SmartnodeError, SmartnodeResult, TxReceipt, TxRequest, REDUCIBLE_BOND_WEI,
};

use crate::batcher::ReadTransport;
use crate::bindings::{ProtocolReads, ProtocolWrites};
use crate::duties::DutySource;
use crate::orchestrator::Transactor;

pub const NETWORK_CONTRACT: Address = Address::new([0xee; 20]);
pub const NODE_MANAGER: Address = Address::new([0xed; 20]);
pub const MINIPOOL_MANAGER: Address = Address::new([0xec; 20]);

const NETWORK_SELECTOR: u8 = 0x01;
const NODE_SELECTOR: u8 = 0x02;
const MINIPOOL_AT_SELECTOR: u8 = 0x03;
const MINIPOOL_SELECTOR: u8 = 0x04;

pub const REDUCE_BOND_CALL: u8 = 0xa1;
pub const STAKE_CALL: u8 = 0xa2;
pub const DISTRIBUTE_CALL: u8 = 0xa3;

fn selector(kind: u8, index: usize) -> [u8; 4] {
    [kind, index as u8, 0, 0]
}

fn field_index<T: PartialEq>(all: &[T], field: &T) -> usize {
    all.iter().position(|f| f == field).unwrap_or(usize::MAX)
}

fn status_raw(status: MinipoolStatus) -> u8 {
    match status {
        MinipoolStatus::Initialised => 0,
        MinipoolStatus::Prelaunch => 1,
        MinipoolStatus::Staking => 2,
        MinipoolStatus::Withdrawable => 3,
        MinipoolStatus::Dissolved => 4,
        MinipoolStatus::Unknown(raw) => raw,
    }
}

fn encode_bytes(payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&encode_uint(U256::from(32u8)));
    data.extend_from_slice(&encode_uint(U256::from(payload.len())));
    data.extend_from_slice(payload);
    let padding = (32 - payload.len() % 32) % 32;
    data.extend(std::iter::repeat(0u8).take(padding));
    data
}

/// Fee distributor address the fake chain assigns to `node`
pub fn distributor_of(node: Address) -> Address {
    let mut bytes = node.0 .0;
    bytes[0] ^= 0xd1;
    Address::new(bytes)
}

/// Staking minipool with a 16 ETH bond
pub fn staking_minipool(node: Address, byte: u8, reduce_bond_time: u64) -> MinipoolDetails {
    let mut minipool = MinipoolDetails::new(Address::new([byte; 20]), node);
    minipool.status = MinipoolStatus::Staking;
    minipool.node_deposit_balance = U256::from(REDUCIBLE_BOND_WEI);
    minipool.reduce_bond_time = reduce_bond_time;
    minipool.pubkey = Bytes::from(vec![byte; 48]);
    minipool
}

/// Prelaunch minipool whose status changed at `status_time`
pub fn prelaunch_minipool(node: Address, byte: u8, status_time: u64) -> MinipoolDetails {
    let mut minipool = staking_minipool(node, byte, 0);
    minipool.status = MinipoolStatus::Prelaunch;
    minipool.status_time = status_time;
    minipool
}

/// Network parameters the fake chain serves by default
pub fn test_network() -> NetworkDetails {
    NetworkDetails {
        bond_reduction_window_start: Duration::from_secs(7 * 86_400),
        bond_reduction_window_length: Duration::from_secs(2 * 86_400),
        scrub_period: Duration::from_secs(12 * 3_600),
        launch_timeout: Duration::from_secs(72 * 3_600),
        base_fee: gwei_to_wei(10.0),
    }
}

/// Snapshot of one node at `timestamp`, with an initialised empty distributor
pub fn snapshot_for(node: Address, timestamp: u64, minipools: Vec<MinipoolDetails>) -> NetworkSnapshot {
    let mut details = NodeDetails::new(node);
    details.minipool_count = minipools.len() as u64;
    details.fee_distributor = distributor_of(node);
    details.fee_distributor_initialised = true;

    NetworkSnapshot {
        block: BlockRef { number: 1, timestamp },
        network: test_network(),
        nodes: HashMap::from([(node, details)]),
        minipools_by_node: HashMap::from([(node, minipools)]),
    }
}

// ============================================================================
// Bindings
// ============================================================================

/// Bindings whose selectors the fake chain understands
pub struct FakeBindings;

impl ProtocolReads for FakeBindings {
    fn network_field(&self, field: NetworkField) -> CallRequest {
        CallRequest::new(NETWORK_CONTRACT, selector(NETWORK_SELECTOR, field_index(&NetworkField::ALL, &field)))
    }

    fn node_field(&self, node: Address, distributor: Option<Address>, field: NodeField) -> CallRequest {
        let target = distributor.unwrap_or(NODE_MANAGER);
        CallRequest::new(target, selector(NODE_SELECTOR, field_index(&NodeField::ALL, &field)))
            .with_args(encode_address(node).to_vec())
    }

    fn minipool_at(&self, node: Address, index: u64) -> CallRequest {
        let mut args = encode_address(node).to_vec();
        args.extend_from_slice(&encode_uint(U256::from(index)));
        CallRequest::new(MINIPOOL_MANAGER, selector(MINIPOOL_AT_SELECTOR, 0)).with_args(args)
    }

    fn minipool_field(&self, minipool: Address, field: MinipoolField) -> CallRequest {
        CallRequest::new(minipool, selector(MINIPOOL_SELECTOR, field_index(&MinipoolField::ALL, &field)))
    }
}

impl ProtocolWrites for FakeBindings {
    fn reduce_bond_amount(&self, minipool: Address) -> TxRequest {
        TxRequest { to: minipool, data: Bytes::from(vec![REDUCE_BOND_CALL]), value: U256::ZERO }
    }

    fn stake(&self, minipool: Address) -> TxRequest {
        TxRequest { to: minipool, data: Bytes::from(vec![STAKE_CALL]), value: U256::ZERO }
    }

    fn distribute_fees(&self, distributor: Address) -> TxRequest {
        TxRequest { to: distributor, data: Bytes::from(vec![DISTRIBUTE_CALL]), value: U256::ZERO }
    }
}

// ============================================================================
// Echo Transport
// ============================================================================

/// Returns each call's arguments as its return data
pub struct EchoTransport {
    block: u64,
    reverting_slots: HashSet<usize>,
    failing_call: Option<usize>,
    drop_last: bool,
    calls: AtomicUsize,
    observed: Mutex<Vec<u64>>,
}

impl EchoTransport {
    pub fn new(block: u64) -> Self {
        Self {
            block,
            reverting_slots: HashSet::new(),
            failing_call: None,
            drop_last: false,
            calls: AtomicUsize::new(0),
            observed: Mutex::new(Vec::new()),
        }
    }

    pub fn reverting_slot(mut self, slot: usize) -> Self {
        self.reverting_slots.insert(slot);
        self
    }

    /// Fail the `n`th aggregated call (1-based)
    pub fn failing_call(mut self, n: usize) -> Self {
        self.failing_call = Some(n);
        self
    }

    pub fn dropping_last(mut self) -> Self {
        self.drop_last = true;
        self
    }

    pub fn observed_blocks(&self) -> Vec<u64> {
        self.observed.lock().clone()
    }
}

#[async_trait]
impl ReadTransport for EchoTransport {
    async fn latest_block(&self) -> SmartnodeResult<BlockRef> {
        Ok(BlockRef { number: self.block, timestamp: 0 })
    }

    async fn aggregate(&self, calls: &[CallRequest], block: u64) -> SmartnodeResult<Vec<CallOutcome>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.observed.lock().push(block);
        if self.failing_call == Some(call) {
            return Err(SmartnodeError::transport("connection reset", None));
        }

        let mut outcomes: Vec<CallOutcome> = calls
            .iter()
            .map(|c| {
                if self.reverting_slots.contains(&c.slot) {
                    CallOutcome::reverted()
                } else {
                    CallOutcome::ok(c.args.clone())
                }
            })
            .collect();
        if self.drop_last {
            outcomes.pop();
        }
        Ok(outcomes)
    }
}

// ============================================================================
// Fake Chain
// ============================================================================

struct FakeNode {
    minipools: Vec<MinipoolDetails>,
    distributor: Address,
    distributor_balance: U256,
}

struct ChainState {
    block: BlockRef,
    network: NetworkDetails,
    nodes: HashMap<Address, FakeNode>,
    reverts: HashSet<(Address, [u8; 4])>,
    fail_on_call: Option<usize>,
    stamp_status_time: bool,
}

/// In-memory protocol state answering `FakeBindings` requests
pub struct FakeChain {
    state: Mutex<ChainState>,
    calls: AtomicUsize,
    observed: Mutex<Vec<u64>>,
}

impl FakeChain {
    pub fn new(block: u64, timestamp: u64) -> Self {
        Self {
            state: Mutex::new(ChainState {
                block: BlockRef { number: block, timestamp },
                network: test_network(),
                nodes: HashMap::new(),
                reverts: HashSet::new(),
                fail_on_call: None,
                stamp_status_time: false,
            }),
            calls: AtomicUsize::new(0),
            observed: Mutex::new(Vec::new()),
        }
    }

    /// Register `node`, replacing any minipools it already had
    pub fn add_node(&self, node: Address, minipools: Vec<MinipoolDetails>) {
        let mut state = self.state.lock();
        let entry = state.nodes.entry(node).or_insert_with(|| FakeNode {
            minipools: Vec::new(),
            distributor: distributor_of(node),
            distributor_balance: U256::ZERO,
        });
        entry.minipools = minipools;
    }

    pub fn set_distributor_balance(&self, node: Address, balance: U256) {
        if let Some(entry) = self.state.lock().nodes.get_mut(&node) {
            entry.distributor_balance = balance;
        }
    }

    pub fn set_block(&self, number: u64, timestamp: u64) {
        self.state.lock().block = BlockRef { number, timestamp };
    }

    pub fn revert_minipool_field(&self, minipool: Address, field: MinipoolField) {
        let sel = selector(MINIPOOL_SELECTOR, field_index(&MinipoolField::ALL, &field));
        self.state.lock().reverts.insert((minipool, sel));
    }

    pub fn revert_network_field(&self, field: NetworkField) {
        let sel = selector(NETWORK_SELECTOR, field_index(&NetworkField::ALL, &field));
        self.state.lock().reverts.insert((NETWORK_CONTRACT, sel));
    }

    /// Fail the `n`th aggregated call (1-based) counted since creation or the last reset
    pub fn fail_on_call(&self, n: usize) {
        self.state.lock().fail_on_call = Some(n);
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    /// Answer status time reads with the block number they were pinned to
    pub fn stamp_status_time_with_block(&self) {
        self.state.lock().stamp_status_time = true;
    }

    pub fn observed_blocks(&self) -> Vec<u64> {
        self.observed.lock().clone()
    }

    fn answer(state: &ChainState, call: &CallRequest, block: u64) -> Option<Vec<u8>> {
        if state.reverts.contains(&(call.target, call.selector)) {
            return None;
        }
        let index = call.selector[1] as usize;

        match call.selector[0] {
            NETWORK_SELECTOR => {
                let network = &state.network;
                let value = match NetworkField::ALL.get(index)? {
                    NetworkField::BondReductionWindowStart => U256::from(network.bond_reduction_window_start.as_secs()),
                    NetworkField::BondReductionWindowLength => U256::from(network.bond_reduction_window_length.as_secs()),
                    NetworkField::ScrubPeriod => U256::from(network.scrub_period.as_secs()),
                    NetworkField::LaunchTimeout => U256::from(network.launch_timeout.as_secs()),
                    NetworkField::BaseFee => network.base_fee,
                };
                Some(encode_uint(value).to_vec())
            }
            NODE_SELECTOR => {
                let owner = decode_address(&call.args)?;
                let node = state.nodes.get(&owner)?;
                let field = NodeField::ALL.get(index)?;
                if NodeField::DISTRIBUTOR.contains(field) && call.target != node.distributor {
                    return None;
                }
                let word = match field {
                    NodeField::MinipoolCount => encode_uint(U256::from(node.minipools.len())),
                    NodeField::FeeDistributor => encode_address(node.distributor),
                    NodeField::FeeDistributorInitialised => encode_uint(U256::from(1u8)),
                    NodeField::FeeDistributorBalance => encode_uint(node.distributor_balance),
                    NodeField::FeeDistributorNodeShare => encode_uint(node.distributor_balance / U256::from(2u8)),
                };
                Some(word.to_vec())
            }
            MINIPOOL_AT_SELECTOR => {
                let owner = decode_address(&call.args)?;
                let position = decode_u64(call.args.get(32..)?)?;
                let minipool = state.nodes.get(&owner)?.minipools.get(position as usize)?;
                Some(encode_address(minipool.address).to_vec())
            }
            MINIPOOL_SELECTOR => {
                let minipool = state
                    .nodes
                    .values()
                    .flat_map(|n| n.minipools.iter())
                    .find(|m| m.address == call.target)?;
                let data = match MinipoolField::ALL.get(index)? {
                    MinipoolField::Status => encode_uint(U256::from(status_raw(minipool.status))).to_vec(),
                    MinipoolField::StatusTime if state.stamp_status_time => encode_uint(U256::from(block)).to_vec(),
                    MinipoolField::StatusTime => encode_uint(U256::from(minipool.status_time)).to_vec(),
                    MinipoolField::NodeDepositBalance => encode_uint(minipool.node_deposit_balance).to_vec(),
                    MinipoolField::ReduceBondTime => encode_uint(U256::from(minipool.reduce_bond_time)).to_vec(),
                    MinipoolField::ReduceBondCancelled => encode_uint(U256::from(minipool.reduce_bond_cancelled as u8)).to_vec(),
                    MinipoolField::Pubkey => encode_bytes(&minipool.pubkey),
                };
                Some(data)
            }
            _ => None,
        }
    }
}

#[async_trait]
impl ReadTransport for FakeChain {
    async fn latest_block(&self) -> SmartnodeResult<BlockRef> {
        Ok(self.state.lock().block)
    }

    async fn aggregate(&self, calls: &[CallRequest], block: u64) -> SmartnodeResult<Vec<CallOutcome>> {
        tokio::task::yield_now().await;

        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.observed.lock().push(block);

        let state = self.state.lock();
        if state.fail_on_call == Some(call) {
            return Err(SmartnodeError::transport("aggregate call failed", Some(-32000)));
        }

        Ok(calls
            .iter()
            .map(|c| match Self::answer(&state, c, block) {
                Some(data) => CallOutcome::ok(data),
                None => CallOutcome::reverted(),
            })
            .collect())
    }
}

// ============================================================================
// Fake Transactor
// ============================================================================

/// Signer with scripted simulations and receipts
pub struct FakeTransactor {
    address: Address,
    simulations: Mutex<HashMap<Address, SimulationOutcome>>,
    failing_receipts: Mutex<HashSet<Address>>,
    fail_send: AtomicBool,
    fail_simulation: AtomicBool,
    hang_receipts: AtomicBool,
    nonce: AtomicU64,
    balance: Mutex<U256>,
    simulated: AtomicUsize,
    sent: Mutex<Vec<PreparedTx>>,
    hashes: Mutex<HashMap<B256, Address>>,
}

impl FakeTransactor {
    pub fn new() -> Self {
        Self {
            address: Address::new([0x99; 20]),
            simulations: Mutex::new(HashMap::new()),
            failing_receipts: Mutex::new(HashSet::new()),
            fail_send: AtomicBool::new(false),
            fail_simulation: AtomicBool::new(false),
            hang_receipts: AtomicBool::new(false),
            nonce: AtomicU64::new(0),
            balance: Mutex::new(eth_to_wei(1.0)),
            simulated: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            hashes: Mutex::new(HashMap::new()),
        }
    }

    pub fn reverting(&self, to: Address, reason: &str) {
        self.simulations.lock().insert(to, SimulationOutcome::Revert { reason: reason.to_string() });
    }

    pub fn estimating(&self, to: Address, gas_estimate: u64) {
        self.simulations.lock().insert(
            to,
            SimulationOutcome::Ok { gas_estimate, safe_gas_limit: gas_estimate * 3 / 2 },
        );
    }

    pub fn failing_receipt(&self, to: Address) {
        self.failing_receipts.lock().insert(to);
    }

    pub fn fail_send(&self) {
        self.fail_send.store(true, Ordering::SeqCst);
    }

    pub fn fail_simulation(&self) {
        self.fail_simulation.store(true, Ordering::SeqCst);
    }

    pub fn hang_receipts(&self) {
        self.hang_receipts.store(true, Ordering::SeqCst);
    }

    pub fn set_nonce(&self, nonce: u64) {
        self.nonce.store(nonce, Ordering::SeqCst);
    }

    pub fn set_balance(&self, balance: U256) {
        *self.balance.lock() = balance;
    }

    pub fn simulated(&self) -> usize {
        self.simulated.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<PreparedTx> {
        self.sent.lock().clone()
    }
}

fn hash_for(nonce: u64) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&nonce.to_be_bytes());
    B256::new(bytes)
}

#[async_trait]
impl Transactor for FakeTransactor {
    fn address(&self) -> Address {
        self.address
    }

    async fn simulate(&self, request: &TxRequest) -> SmartnodeResult<SimulationOutcome> {
        self.simulated.fetch_add(1, Ordering::SeqCst);
        if self.fail_simulation.load(Ordering::SeqCst) {
            return Err(SmartnodeError::transport("eth_estimateGas unavailable", None));
        }
        Ok(self
            .simulations
            .lock()
            .get(&request.to)
            .cloned()
            .unwrap_or(SimulationOutcome::Ok { gas_estimate: 100_000, safe_gas_limit: 150_000 }))
    }

    async fn pending_nonce(&self) -> SmartnodeResult<u64> {
        Ok(self.nonce.load(Ordering::SeqCst))
    }

    async fn send_batch(&self, txs: &[PreparedTx]) -> SmartnodeResult<Vec<B256>> {
        tokio::task::yield_now().await;
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(SmartnodeError::transport("signer unavailable", None));
        }

        let mut hashes = Vec::with_capacity(txs.len());
        for tx in txs {
            let hash = hash_for(tx.nonce);
            self.hashes.lock().insert(hash, tx.request.to);
            self.sent.lock().push(tx.clone());
            hashes.push(hash);
        }
        self.nonce.fetch_add(txs.len() as u64, Ordering::SeqCst);
        Ok(hashes)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> SmartnodeResult<TxReceipt> {
        if self.hang_receipts.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let to = self
            .hashes
            .lock()
            .get(&tx_hash)
            .copied()
            .ok_or_else(|| SmartnodeError::transport("unknown transaction", None))?;
        let success = !self.failing_receipts.lock().contains(&to);
        Ok(TxReceipt { tx_hash, block_number: 1, success })
    }

    async fn balance(&self) -> SmartnodeResult<U256> {
        Ok(*self.balance.lock())
    }
}

// ============================================================================
// Fake Duty Source
// ============================================================================

/// Beacon duties keyed by validator pubkey
pub struct FakeDuties {
    pub epoch: u64,
    /// pubkey -> validator index; unknown pubkeys are not yet on the beacon chain
    pub indices: HashMap<Bytes, u64>,
    pub current_sync: HashSet<u64>,
    pub next_sync: HashSet<u64>,
    pub proposals: HashMap<u64, u64>,
    pub fail_proposals: bool,
    pub requested_epochs: Mutex<Vec<u64>>,
}

impl FakeDuties {
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            indices: HashMap::new(),
            current_sync: HashSet::new(),
            next_sync: HashSet::new(),
            proposals: HashMap::new(),
            fail_proposals: false,
            requested_epochs: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DutySource for FakeDuties {
    async fn head_epoch(&self) -> SmartnodeResult<u64> {
        Ok(self.epoch)
    }

    async fn validator_indices(&self, pubkeys: &[Bytes]) -> SmartnodeResult<Vec<Option<u64>>> {
        Ok(pubkeys.iter().map(|p| self.indices.get(p).copied()).collect())
    }

    async fn sync_committee_duties(&self, indices: &[u64], epoch: u64) -> SmartnodeResult<Vec<bool>> {
        self.requested_epochs.lock().push(epoch);
        let members = if epoch == self.epoch { &self.current_sync } else { &self.next_sync };
        Ok(indices.iter().map(|i| members.contains(i)).collect())
    }

    async fn proposer_duties(&self, indices: &[u64], _epoch: u64) -> SmartnodeResult<Vec<u64>> {
        if self.fail_proposals {
            return Err(SmartnodeError::transport("beacon node timeout", None));
        }
        Ok(indices.iter().map(|i| self.proposals.get(i).copied().unwrap_or(0)).collect())
    }
}
