use std::collections::HashSet;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use smartnode_types::{eth_to_wei, wei_to_eth, GasSettings, NetworkSnapshot, SmartnodeError, SmartnodeResult};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::batcher::ReadTransport;
use crate::bindings::{ProtocolReads, ProtocolWrites};
use crate::config::KeeperConfig;
use crate::gas::GasPolicy;
use crate::orchestrator::{LoggingSink, ResultSink, SubmissionReport, TransactionOrchestrator, Transactor};
use crate::snapshot::{SnapshotBuilder, SnapshotSource};
use crate::state_cache::StateCache;
use crate::tasks::{build_tasks, AutomatedTask};

/// Cycles between signer balance checks in `run`
const HEALTH_CHECK_EVERY: u64 = 100;

/// One task's work for one node in a cycle
#[derive(Debug, Clone, Serialize)]
pub struct TaskRun {
    pub task: &'static str,
    pub node: Address,
    pub candidates: usize,
    /// Outcome of the prerequisite actions, when the task declared any
    pub prerequisites: Option<SubmissionReport>,
    /// `None` when submission was skipped or failed outright
    pub submission: Option<SubmissionReport>,
    pub error: Option<String>,
}

/// Summary of one keeper cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub block: u64,
    pub minipools: usize,
    pub runs: Vec<TaskRun>,
}

impl CycleReport {
    pub fn submitted(&self) -> usize {
        self.runs
            .iter()
            .filter_map(|r| r.submission.as_ref())
            .map(|s| s.succeeded.len() + s.failed.len() + s.unknown.len())
            .sum()
    }
}

/// Subjects already sent earlier in the current cycle
#[derive(Debug, Default)]
struct CycleOutcomes {
    succeeded: HashSet<Address>,
    /// Sent without a confirmed success; not resent until the next cycle
    unsettled: HashSet<Address>,
}

impl CycleOutcomes {
    fn record(&mut self, report: &SubmissionReport) {
        self.succeeded.extend(report.succeeded.iter().copied());
        self.unsettled.extend(report.failed.iter().chain(&report.unknown).copied());
    }
}

/// Main keeper service: refreshes the snapshot and runs every task against it
pub struct Keeper {
    /// Keeper configuration
    config: KeeperConfig,

    /// Latest snapshot, shared with read-only consumers
    cache: Arc<StateCache>,

    /// Snapshot producer
    source: Arc<dyn SnapshotSource>,

    /// Enabled tasks in run order
    tasks: Vec<Arc<dyn AutomatedTask>>,

    gas_policy: GasPolicy,

    /// Submission for the keeper's signer
    orchestrator: TransactionOrchestrator,

    /// Outcome notifications
    sink: Arc<dyn ResultSink>,
}

impl Keeper {
    /// Create a new keeper instance
    pub fn new(
        config: KeeperConfig,
        transport: Arc<dyn ReadTransport>,
        reads: Arc<dyn ProtocolReads>,
        writes: Arc<dyn ProtocolWrites>,
        transactor: Arc<dyn Transactor>,
    ) -> SmartnodeResult<Self> {
        config.validate()?;

        let source = Arc::new(SnapshotBuilder::from_config(transport, reads, &config.snapshot));
        let tasks = build_tasks(&config.tasks, writes);
        let gas_policy = GasPolicy::from_config(&config.gas);
        let orchestrator = TransactionOrchestrator::new(transactor, config.inclusion_timeout());

        info!(
            nodes = config.node_addresses.len(),
            tasks = ?tasks.iter().map(|t| t.name()).collect::<Vec<_>>(),
            "Keeper initialized"
        );

        Ok(Self {
            config,
            cache: Arc::new(StateCache::new()),
            source,
            tasks,
            gas_policy,
            orchestrator,
            sink: Arc::new(LoggingSink),
        })
    }

    /// Replace the outcome sink (logging by default)
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn cache(&self) -> Arc<StateCache> {
        self.cache.clone()
    }

    pub fn config(&self) -> &KeeperConfig {
        &self.config
    }

    /// Refresh the snapshot and run every task against it.
    ///
    /// A failed refresh leaves the previous snapshot in place and returns the
    /// error. Per-node submission errors are recorded and the cycle
    /// continues; precondition errors abort it.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> SmartnodeResult<CycleReport> {
        let started_at = Utc::now();
        let snapshot = self
            .cache
            .refresh(self.source.as_ref(), &self.config.node_addresses, cancel)
            .await?;

        let mut runs = Vec::new();
        let mut outcomes = CycleOutcomes::default();
        for task in &self.tasks {
            // Fixed for the whole task run
            let settings = self.gas_policy.settings(snapshot.network.base_fee);

            for node in &self.config.node_addresses {
                if let Some(run) = self
                    .run_task(task.as_ref(), &snapshot, *node, &settings, &mut outcomes, cancel)
                    .await?
                {
                    runs.push(run);
                }
            }
        }

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            block: snapshot.block.number,
            minipools: snapshot.minipool_count(),
            runs,
        };

        info!(
            block = report.block,
            task_runs = report.runs.len(),
            submitted = report.submitted(),
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "Keeper cycle complete"
        );
        if let Ok(json) = serde_json::to_string(&report) {
            debug!(report = %json, "Cycle report");
        }

        Ok(report)
    }

    async fn run_task(
        &self,
        task: &dyn AutomatedTask,
        snapshot: &NetworkSnapshot,
        node: Address,
        settings: &GasSettings,
        outcomes: &mut CycleOutcomes,
        cancel: &CancellationToken,
    ) -> SmartnodeResult<Option<TaskRun>> {
        let now = snapshot.block.timestamp;
        let candidates = task.scan(snapshot, node, now);
        if candidates.is_empty() {
            return Ok(None);
        }

        for candidate in &candidates {
            debug!(task = task.name(), "Candidate: {}", task.describe(candidate));
        }

        let mut run = TaskRun {
            task: task.name(),
            node,
            candidates: candidates.len(),
            prerequisites: None,
            submission: None,
            error: None,
        };

        // The snapshot predates this cycle's submissions
        let mut prerequisites = task.prerequisites(snapshot, node);
        if prerequisites.iter().any(|p| outcomes.unsettled.contains(&p.subject)) {
            warn!(task = task.name(), node = %node, "Prerequisite already sent this cycle without success, skipping");
            return Ok(Some(run));
        }
        prerequisites.retain(|p| !outcomes.succeeded.contains(&p.subject));

        if !prerequisites.is_empty() {
            let outcome = self.orchestrator.submit(prerequisites, settings, self.sink.as_ref(), cancel).await;
            let ready = match outcome {
                Ok(report) => {
                    let ready = report.all_succeeded();
                    outcomes.record(&report);
                    run.prerequisites = Some(report);
                    ready
                }
                Err(e) if e.is_precondition() => return Err(e),
                Err(e) => {
                    run.error = Some(e.to_string());
                    false
                }
            };

            if !ready {
                warn!(task = task.name(), node = %node, "Prerequisites did not complete, skipping this cycle");
                return Ok(Some(run));
            }
        }

        match self.orchestrator.submit(candidates, settings, self.sink.as_ref(), cancel).await {
            Ok(report) => {
                if !report.deferred.is_empty() {
                    task.on_deferred(snapshot, &report.deferred, now);
                }
                outcomes.record(&report);
                run.submission = Some(report);
            }
            Err(e) if e.is_precondition() => return Err(e),
            Err(e) => {
                error!(task = task.name(), node = %node, error = %e, "Submission failed");
                run.error = Some(e.to_string());
            }
        }

        Ok(Some(run))
    }

    /// Run cycles every `update_interval_secs` until cancelled.
    ///
    /// Transport and submission errors are logged and retried next cycle;
    /// precondition errors stop the loop.
    pub async fn run(&self, cancel: CancellationToken) -> SmartnodeResult<()> {
        let mut interval_timer = time::interval(self.config.update_interval());
        interval_timer.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        let mut iteration = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval_timer.tick() => {}
            }
            iteration += 1;
            debug!(iteration, "Starting keeper iteration");

            match self.run_cycle(&cancel).await {
                Ok(report) => {
                    if report.submitted() > 0 {
                        info!(iteration, submitted = report.submitted(), "Iteration submitted transactions");
                    } else {
                        debug!(iteration, "Iteration had nothing to submit");
                    }
                }
                Err(SmartnodeError::Cancelled { .. }) => break,
                Err(e) if e.is_precondition() => {
                    error!(iteration, error = %e, "Halting keeper");
                    return Err(e);
                }
                Err(e) => {
                    // Continue running even if individual iterations fail
                    error!(iteration, error = %e, "Error in keeper iteration");
                }
            }

            if iteration % HEALTH_CHECK_EVERY == 0 {
                if let Err(e) = self.health_check().await {
                    warn!(error = %e, "Health check warning");
                }
            }
        }

        info!(iterations = iteration, "Keeper stopped");
        Ok(())
    }

    /// Check the signer balance against `min_balance_eth`
    pub async fn health_check(&self) -> SmartnodeResult<U256> {
        let transactor = self.orchestrator.transactor();
        let balance = transactor.balance().await?;
        let required = eth_to_wei(self.config.min_balance_eth);
        if balance < required {
            return Err(SmartnodeError::insufficient_balance(balance, required));
        }

        debug!(signer = %transactor.address(), balance_eth = wei_to_eth(balance), "Health check passed");
        Ok(balance)
    }
}
