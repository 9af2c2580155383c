/// Read request/result shapes for aggregated contract calls

use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

// ============================================================================
// Block Reference
// ============================================================================

/// A pinned execution-layer block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    /// Block height every read in one snapshot is pinned to
    pub number: u64,
    /// Block timestamp (unix seconds), the latest observed chain time
    pub timestamp: u64,
}

// ============================================================================
// Call Request / Result
// ============================================================================

/// One independent contract read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    /// Contract to call
    pub target: Address,
    /// Four-byte method selector
    pub selector: [u8; 4],
    /// ABI-encoded arguments
    pub args: Bytes,
    /// Caller-defined destination slot, echoed back on the result
    pub slot: usize,
}

impl CallRequest {
    /// Create a request with no arguments
    pub fn new(target: Address, selector: [u8; 4]) -> Self {
        Self {
            target,
            selector,
            args: Bytes::new(),
            slot: 0,
        }
    }

    /// Attach ABI-encoded arguments
    pub fn with_args(mut self, args: impl Into<Bytes>) -> Self {
        self.args = args.into();
        self
    }

    /// Set the destination slot
    pub fn with_slot(mut self, slot: usize) -> Self {
        self.slot = slot;
        self
    }

    /// Full call data (selector followed by arguments)
    pub fn call_data(&self) -> Bytes {
        let mut data = Vec::with_capacity(4 + self.args.len());
        data.extend_from_slice(&self.selector);
        data.extend_from_slice(&self.args);
        data.into()
    }
}

/// Raw per-call outcome returned by the read transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    /// Whether the target executed without reverting
    pub success: bool,
    /// Raw return (or revert) data
    pub return_data: Bytes,
}

impl CallOutcome {
    pub fn ok(return_data: impl Into<Bytes>) -> Self {
        Self { success: true, return_data: return_data.into() }
    }

    pub fn reverted() -> Self {
        Self { success: false, return_data: Bytes::new() }
    }
}

/// Result of one read, in the same position as its request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResult {
    /// Destination slot copied from the request
    pub slot: usize,
    /// Whether the target executed without reverting
    pub success: bool,
    /// Raw return data
    pub value: Bytes,
}

impl CallResult {
    /// Return data when the call succeeded
    pub fn data(&self) -> Option<&[u8]> {
        self.success.then_some(self.value.as_ref())
    }
}
