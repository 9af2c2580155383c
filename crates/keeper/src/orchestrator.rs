//! Simulate, gate, sequence, submit and track candidate transactions.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use smartnode_types::{
    GasSettings, PreparedTx, SimulationOutcome, SmartnodeError, SmartnodeResult, TxCandidate,
    TxReceipt, TxRequest,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::gas::GasPolicy;

/// Signer and submitter for one account
#[async_trait]
pub trait Transactor: Send + Sync {
    /// Account that signs every transaction
    fn address(&self) -> Address;

    /// Dry-run `request` from the signer's account
    async fn simulate(&self, request: &TxRequest) -> SmartnodeResult<SimulationOutcome>;

    /// Next nonce including pending transactions
    async fn pending_nonce(&self) -> SmartnodeResult<u64>;

    /// Sign and broadcast `txs` in order, returning one hash per transaction
    async fn send_batch(&self, txs: &[PreparedTx]) -> SmartnodeResult<Vec<B256>>;

    /// Resolves once `tx_hash` is included
    async fn wait_for_receipt(&self, tx_hash: B256) -> SmartnodeResult<TxReceipt>;

    /// Signer balance in wei
    async fn balance(&self) -> SmartnodeResult<U256>;
}

/// Receives exactly one outcome per approved or reverted candidate
pub trait ResultSink: Send + Sync {
    /// `error` is `None` when the candidate's transaction succeeded
    fn on_result(&self, candidate: &TxCandidate, error: Option<&SmartnodeError>);
}

impl<F> ResultSink for F
where
    F: Fn(&TxCandidate, Option<&SmartnodeError>) + Send + Sync,
{
    fn on_result(&self, candidate: &TxCandidate, error: Option<&SmartnodeError>) {
        (self)(candidate, error)
    }
}

/// Logs every outcome
pub struct LoggingSink;

impl ResultSink for LoggingSink {
    fn on_result(&self, candidate: &TxCandidate, error: Option<&SmartnodeError>) {
        match error {
            None => info!(subject = %candidate.subject, action = ?candidate.action, "Transaction succeeded"),
            Some(e) => warn!(subject = %candidate.subject, action = ?candidate.action, error = %e, "Transaction did not succeed"),
        }
    }
}

/// What happened to each candidate passed to `submit`
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubmissionReport {
    /// Simulation reported a guaranteed revert
    pub reverted: Vec<Address>,
    /// Held back by the gas gate, retried next cycle
    pub deferred: Vec<TxCandidate>,
    pub succeeded: Vec<Address>,
    pub failed: Vec<Address>,
    /// Broadcast (or possibly broadcast) without a confirmed outcome
    pub unknown: Vec<Address>,
}

impl SubmissionReport {
    /// Every candidate was included and succeeded
    pub fn all_succeeded(&self) -> bool {
        self.reverted.is_empty() && self.deferred.is_empty() && self.failed.is_empty() && self.unknown.is_empty()
    }
}

/// Submits candidates for one signer
pub struct TransactionOrchestrator {
    transactor: Arc<dyn Transactor>,
    inclusion_timeout: Duration,
    /// Nonce assignment and broadcast are not reentrant for one signer
    submission_lock: Mutex<()>,
}

impl TransactionOrchestrator {
    pub fn new(transactor: Arc<dyn Transactor>, inclusion_timeout: Duration) -> Self {
        Self {
            transactor,
            inclusion_timeout,
            submission_lock: Mutex::new(()),
        }
    }

    pub fn transactor(&self) -> &Arc<dyn Transactor> {
        &self.transactor
    }

    /// Simulate, gate and submit `candidates` with one set of fee settings.
    ///
    /// Reverting candidates are reported to `sink` immediately and never sent.
    /// Deferred candidates are returned in the report without a notification.
    /// Every approved candidate gets exactly one `sink` call. `Err` means the
    /// attempt as a whole failed; candidates already approved have been
    /// reported failed.
    pub async fn submit(
        &self,
        candidates: Vec<TxCandidate>,
        settings: &GasSettings,
        sink: &dyn ResultSink,
        cancel: &CancellationToken,
    ) -> SmartnodeResult<SubmissionReport> {
        let mut report = SubmissionReport::default();
        if candidates.is_empty() {
            return Ok(report);
        }
        if settings.is_disabled() {
            report.deferred = GasPolicy::evaluate(candidates, settings).deferred;
            return Ok(report);
        }

        let simulated = self.simulate_all(candidates, cancel).await?;

        let mut survivors = Vec::with_capacity(simulated.len());
        for candidate in simulated {
            match &candidate.simulation {
                Some(SimulationOutcome::Revert { reason }) => {
                    warn!(subject = %candidate.subject, reason = %reason, "Simulation reverted, not submitting");
                    sink.on_result(&candidate, Some(&SmartnodeError::simulation_reverted(reason)));
                    report.reverted.push(candidate.subject);
                }
                _ => survivors.push(candidate),
            }
        }

        let decision = GasPolicy::evaluate(survivors, settings);
        report.deferred = decision.deferred;
        let approved = decision.approved;
        if approved.is_empty() {
            return Ok(report);
        }

        let hashes = match self.broadcast(&approved, settings, cancel).await {
            Ok(hashes) => hashes,
            Err(e) => {
                error!(candidates = approved.len(), error = %e, "Batch submission failed");
                for candidate in &approved {
                    sink.on_result(candidate, Some(&e));
                    if matches!(e, SmartnodeError::Cancelled { .. }) {
                        report.unknown.push(candidate.subject);
                    } else {
                        report.failed.push(candidate.subject);
                    }
                }
                return Err(e);
            }
        };

        let outcomes = join_all(hashes.iter().map(|hash| self.await_inclusion(*hash, cancel))).await;
        for (candidate, outcome) in approved.iter().zip(outcomes) {
            match outcome {
                Ok(receipt) => {
                    debug!(subject = %candidate.subject, tx_hash = %receipt.tx_hash, block = receipt.block_number, "Transaction included");
                    sink.on_result(candidate, None);
                    report.succeeded.push(candidate.subject);
                }
                Err(e) => {
                    sink.on_result(candidate, Some(&e));
                    if matches!(e, SmartnodeError::OutcomeUnknown { .. }) {
                        report.unknown.push(candidate.subject);
                    } else {
                        report.failed.push(candidate.subject);
                    }
                }
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            unknown = report.unknown.len(),
            reverted = report.reverted.len(),
            deferred = report.deferred.len(),
            "Submission complete"
        );

        Ok(report)
    }

    async fn simulate_all(
        &self,
        mut candidates: Vec<TxCandidate>,
        cancel: &CancellationToken,
    ) -> SmartnodeResult<Vec<TxCandidate>> {
        let simulations = join_all(candidates.iter().map(|c| self.transactor.simulate(&c.request)));
        let outcomes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SmartnodeError::cancelled("simulate")),
            outcomes = simulations => outcomes,
        };

        for (candidate, outcome) in candidates.iter_mut().zip(outcomes) {
            candidate.simulation = Some(outcome?);
        }
        Ok(candidates)
    }

    /// Assign nonces in submission order and broadcast the batch
    async fn broadcast(
        &self,
        approved: &[TxCandidate],
        settings: &GasSettings,
        cancel: &CancellationToken,
    ) -> SmartnodeResult<Vec<B256>> {
        let _submitting = self.submission_lock.lock().await;

        let send = async {
            let first_nonce = self.transactor.pending_nonce().await?;
            let txs: Vec<PreparedTx> = approved
                .iter()
                .zip(first_nonce..)
                .map(|(candidate, nonce)| PreparedTx {
                    request: candidate.request.clone(),
                    nonce,
                    gas_limit: safe_gas_limit(candidate),
                    max_fee: settings.max_fee,
                    priority_fee: settings.priority_fee,
                })
                .collect();

            info!(
                signer = %self.transactor.address(),
                transactions = txs.len(),
                first_nonce,
                "Submitting transaction batch"
            );
            self.transactor.send_batch(&txs).await
        };

        let hashes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SmartnodeError::cancelled("send_batch")),
            hashes = send => hashes?,
        };

        if hashes.len() != approved.len() {
            return Err(SmartnodeError::length_mismatch("send_batch", approved.len(), hashes.len()));
        }
        Ok(hashes)
    }

    async fn await_inclusion(&self, tx_hash: B256, cancel: &CancellationToken) -> SmartnodeResult<TxReceipt> {
        let wait = tokio::time::timeout(self.inclusion_timeout, self.transactor.wait_for_receipt(tx_hash));

        let receipt = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(SmartnodeError::outcome_unknown(tx_hash, "cancelled while waiting for inclusion"));
            }
            waited = wait => match waited {
                Err(_) => {
                    warn!(tx_hash = %tx_hash, timeout_secs = self.inclusion_timeout.as_secs(), "Timed out waiting for inclusion");
                    return Err(SmartnodeError::outcome_unknown(tx_hash, "inclusion timeout"));
                }
                Ok(Err(e)) => return Err(SmartnodeError::outcome_unknown(tx_hash, &e.to_string())),
                Ok(Ok(receipt)) => receipt,
            },
        };

        if !receipt.success {
            warn!(tx_hash = %tx_hash, block = receipt.block_number, "Transaction reverted after inclusion");
            return Err(SmartnodeError::transaction_failed("reverted after inclusion", Some(tx_hash)));
        }
        Ok(receipt)
    }
}

fn safe_gas_limit(candidate: &TxCandidate) -> u64 {
    match candidate.simulation {
        Some(SimulationOutcome::Ok { safe_gas_limit, .. }) => safe_gas_limit,
        _ => 0,
    }
}
