pub mod batcher;
pub mod bindings;
pub mod config;
pub mod duties;
pub mod error;
pub mod gas;
pub mod keeper;
pub mod orchestrator;
pub mod snapshot;
pub mod state_cache;
pub mod tasks;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use batcher::{CallBatcher, ReadTransport};
pub use bindings::{ProtocolReads, ProtocolWrites};
pub use config::{create_example_config, GasConfig, KeeperConfig, SnapshotConfig, TaskConfig, TransactionConfig};
pub use duties::{DutyCollector, DutySource, DutySummary};
pub use error::KeeperError;
pub use gas::{GasDecision, GasPolicy};
pub use keeper::{CycleReport, Keeper, TaskRun};
pub use orchestrator::{LoggingSink, ResultSink, SubmissionReport, TransactionOrchestrator, Transactor};
pub use snapshot::{SnapshotBuilder, SnapshotSource};
pub use state_cache::StateCache;
pub use tasks::{AutomatedTask, BondReductionState, DistributeFees, ReduceBonds, StakeMinipools, StakeState};
