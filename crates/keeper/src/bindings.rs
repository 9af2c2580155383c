//! Contract binding seam.
//!
//! The keeper never encodes method calls itself. A `ProtocolReads` builds
//! the opaque read requests a snapshot needs and a `ProtocolWrites` builds
//! the unsigned transactions tasks emit. Results are decoded as plain ABI
//! words, so the bindings only have to know targets and selectors.

use alloy_primitives::Address;
use smartnode_types::{CallRequest, MinipoolField, NetworkField, NodeField, TxRequest};

/// Read requests for every field a snapshot contains
pub trait ProtocolReads: Send + Sync {
    /// Global protocol parameter (durations in seconds, base fee in wei)
    fn network_field(&self, field: NetworkField) -> CallRequest;

    /// Node-level field. `distributor` is `None` until the node's fee
    /// distributor address is known.
    fn node_field(&self, node: Address, distributor: Option<Address>, field: NodeField) -> CallRequest;

    /// Address of the `index`th minipool owned by `node`
    fn minipool_at(&self, node: Address, index: u64) -> CallRequest;

    /// Per-minipool field
    fn minipool_field(&self, minipool: Address, field: MinipoolField) -> CallRequest;
}

/// Unsigned transactions for the automated behaviours
pub trait ProtocolWrites: Send + Sync {
    fn reduce_bond_amount(&self, minipool: Address) -> TxRequest;

    fn stake(&self, minipool: Address) -> TxRequest;

    fn distribute_fees(&self, distributor: Address) -> TxRequest;
}
