/// Shared types for the smartnode automation core
/// 
/// This crate provides the snapshot data model, call/transaction shapes,
/// constants and the error taxonomy used by the keeper and its consumers.

pub mod call;
pub mod constants;
pub mod errors;
pub mod math;
pub mod minipool;
pub mod network;
pub mod tx;

// Re-export all public types
pub use call::*;
pub use constants::*;
pub use errors::*;
pub use math::*;
pub use minipool::*;
pub use network::*;
pub use tx::*;

pub use alloy_primitives::{Address, Bytes, B256, U256};
