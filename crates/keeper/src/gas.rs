//! Fee derivation and the batch cost gate.

use alloy_primitives::U256;
use smartnode_types::{
    eth_to_wei, gwei_to_wei, wei_to_eth, wei_to_gwei, GasSettings, TxCandidate, BASE_FEE_MULTIPLIER,
};
use tracing::{debug, info, warn};

use crate::config::GasConfig;

/// Candidates split by the cost gate
#[derive(Debug, Default)]
pub struct GasDecision {
    pub approved: Vec<TxCandidate>,
    pub deferred: Vec<TxCandidate>,
    /// Estimated cost of the whole batch in wei (zero when not estimated)
    pub estimated_cost: U256,
}

/// Static fee configuration for automatic transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasPolicy {
    /// Configured fee cap; `None` derives it from the base fee
    max_fee: Option<U256>,
    priority_fee: U256,
    threshold: U256,
}

impl GasPolicy {
    pub fn new(max_fee: Option<U256>, priority_fee: U256, threshold: U256) -> Self {
        Self {
            max_fee: max_fee.filter(|fee| *fee > U256::ZERO),
            priority_fee,
            threshold,
        }
    }

    pub fn from_config(config: &GasConfig) -> Self {
        Self::new(
            Some(gwei_to_wei(config.max_fee_gwei)),
            gwei_to_wei(config.priority_fee_gwei),
            eth_to_wei(config.auto_tx_gas_threshold_eth),
        )
    }

    /// Fee settings for one task run at the given block base fee
    pub fn settings(&self, base_fee: U256) -> GasSettings {
        let max_fee = self.max_fee.unwrap_or_else(|| {
            base_fee
                .saturating_mul(U256::from(BASE_FEE_MULTIPLIER))
                .saturating_add(self.priority_fee)
        });

        debug!(
            max_fee_gwei = wei_to_gwei(max_fee),
            priority_fee_gwei = wei_to_gwei(self.priority_fee),
            threshold_eth = wei_to_eth(self.threshold),
            "Computed gas settings"
        );

        GasSettings {
            max_fee,
            priority_fee: self.priority_fee,
            threshold: self.threshold,
        }
    }

    /// Gate a batch of simulated candidates on its total estimated cost.
    ///
    /// A zero threshold defers everything without estimating. Candidates
    /// that revert or were never simulated are never approved.
    pub fn evaluate(candidates: Vec<TxCandidate>, settings: &GasSettings) -> GasDecision {
        if settings.is_disabled() {
            info!(candidates = candidates.len(), "Automatic transactions disabled (threshold is 0), deferring all");
            return GasDecision {
                deferred: candidates,
                ..GasDecision::default()
            };
        }

        let (priced, mut deferred): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|c| c.simulation.as_ref().and_then(|s| s.gas_estimate()).is_some());

        if !deferred.is_empty() {
            debug!(count = deferred.len(), "Unpriced candidates never approved");
        }

        let estimated_cost = estimate_cost(&priced, settings);
        if estimated_cost > settings.threshold {
            warn!(
                candidates = priced.len(),
                estimated_cost_eth = wei_to_eth(estimated_cost),
                threshold_eth = wei_to_eth(settings.threshold),
                max_fee_gwei = wei_to_gwei(settings.max_fee),
                "Estimated batch cost exceeds threshold, deferring"
            );
            deferred.extend(priced);
            return GasDecision {
                approved: Vec::new(),
                deferred,
                estimated_cost,
            };
        }

        GasDecision {
            approved: priced,
            deferred,
            estimated_cost,
        }
    }
}

/// Sum of gas estimate x fee cap over the candidates
pub fn estimate_cost(candidates: &[TxCandidate], settings: &GasSettings) -> U256 {
    candidates
        .iter()
        .filter_map(|c| c.simulation.as_ref().and_then(|s| s.gas_estimate()))
        .fold(U256::ZERO, |total, gas| {
            total.saturating_add(U256::from(gas).saturating_mul(settings.max_fee))
        })
}
