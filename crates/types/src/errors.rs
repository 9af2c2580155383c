use alloy_primitives::{Address, B256, U256};
use thiserror::Error;

// ============================================================================
// Main Error Enum
// ============================================================================

/// Error taxonomy for the aggregation and automation core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SmartnodeError {
    // ========================================================================
    // Transport Errors
    // ========================================================================

    /// Remote node unreachable or the aggregated call itself failed
    #[error("Transport error (code {code:?}): {message}")]
    Transport { message: String, code: Option<i64> },

    /// Operation aborted by the external cancellation signal
    #[error("Cancelled during '{operation}'")]
    Cancelled { operation: String },

    // ========================================================================
    // Contract Errors
    // ========================================================================

    /// A read against a contract reverted where no zero state is legitimate
    #[error("Read reverted on {target}: {reason}")]
    Reverted { target: Address, reason: String },

    /// Dry-run of a write reported a guaranteed revert
    #[error("Simulation reverted: {reason}")]
    SimulationReverted { reason: String },

    /// Transaction was included but failed on-chain
    #[error("Transaction failed ({tx_hash:?}): {error}")]
    TransactionFailed { error: String, tx_hash: Option<B256> },

    /// Transaction was broadcast but inclusion could not be confirmed
    #[error("Outcome unknown for transaction {tx_hash}: {reason}")]
    OutcomeUnknown { tx_hash: B256, reason: String },

    /// Signer balance below the configured minimum
    #[error("Insufficient balance: have {available} wei, need {required} wei")]
    InsufficientBalance { available: U256, required: U256 },

    // ========================================================================
    // Precondition Errors
    // ========================================================================

    /// Invalid parameter
    #[error("Invalid parameter '{parameter}': got '{value}', expected '{expected}'")]
    InvalidParameter { parameter: String, value: String, expected: String },

    /// A collaborator returned a different number of items than requested
    #[error("Length mismatch in '{context}': expected {expected}, got {received}")]
    LengthMismatch { context: String, expected: usize, received: usize },

    // ========================================================================
    // Configuration Errors
    // ========================================================================

    /// Invalid configuration
    #[error("Invalid configuration for '{component}': {reason}")]
    InvalidConfiguration { component: String, reason: String },

    // ========================================================================
    // General Errors
    // ========================================================================

    /// Internal error
    #[error("Internal error in '{component}': {details}")]
    Internal { component: String, details: String },
}

impl SmartnodeError {
    /// Create a transport error
    pub fn transport(message: &str, code: Option<i64>) -> Self {
        Self::Transport {
            message: message.to_string(),
            code,
        }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: &str) -> Self {
        Self::Cancelled {
            operation: operation.to_string(),
        }
    }

    /// Create a read revert error
    pub fn reverted(target: Address, reason: &str) -> Self {
        Self::Reverted {
            target,
            reason: reason.to_string(),
        }
    }

    /// Create a simulation revert error
    pub fn simulation_reverted(reason: &str) -> Self {
        Self::SimulationReverted {
            reason: reason.to_string(),
        }
    }

    /// Create an on-chain failure error
    pub fn transaction_failed(error: &str, tx_hash: Option<B256>) -> Self {
        Self::TransactionFailed {
            error: error.to_string(),
            tx_hash,
        }
    }

    /// Create an outcome unknown error
    pub fn outcome_unknown(tx_hash: B256, reason: &str) -> Self {
        Self::OutcomeUnknown {
            tx_hash,
            reason: reason.to_string(),
        }
    }

    /// Create an insufficient balance error
    pub fn insufficient_balance(available: U256, required: U256) -> Self {
        Self::InsufficientBalance { available, required }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: &str, value: &str, expected: &str) -> Self {
        Self::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Create a length mismatch error
    pub fn length_mismatch(context: &str, expected: usize, received: usize) -> Self {
        Self::LengthMismatch {
            context: context.to_string(),
            expected,
            received,
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(component: &str, reason: &str) -> Self {
        Self::InvalidConfiguration {
            component: component.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an internal error
    pub fn internal(component: &str, details: &str) -> Self {
        Self::Internal {
            component: component.to_string(),
            details: details.to_string(),
        }
    }

    /// Network-level failure; the scheduler retries on its next cycle
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Cancelled { .. })
    }

    /// Programmer or configuration error that must halt automation
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameter { .. }
                | Self::LengthMismatch { .. }
                | Self::InvalidConfiguration { .. }
                | Self::Internal { .. }
        )
    }
}

/// Result type alias using the shared error type
pub type SmartnodeResult<T> = std::result::Result<T, SmartnodeError>;
