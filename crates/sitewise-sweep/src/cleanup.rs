//! Cleanup driver
//!
//! Scans, builds the dependency graph, schedules batches and then, batch by
//! batch, unwinds hierarchy associations and deletes. Per-resource failures
//! are collected in the [`CleanupReport`]; resources depending on a failed
//! one are skipped.

use crate::api::{AssociationRecord, ResourceApi, ResourceNode};
use crate::associations::AssociationLedger;
use crate::error::CleanupError;
use crate::executor::{DeleteError, DeletionExecutor, DeletionOutcome};
use crate::graph::DependencyGraph;
use crate::scanner::{CleanupScope, Inventory, ResourceScanner};
use crate::schedule::{DeletionBatch, schedule};
use crate::state::RecordStore;
use crate::wait::{PollConfig, Sleeper};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sitewise_sweep_common::ResourceKind;
use sitewise_sweep_common::defaults::DEFAULT_CONCURRENCY;
use std::collections::HashSet;
use std::fmt;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Why a resource was not deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    TimedOut { last_status: String, attempts: u32 },
    Failed { message: String },
    AssociationFailed { association: String, message: String },
    BlockedByDependency { blocker: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::TimedOut {
                last_status,
                attempts,
            } => write!(f, "timed out after {attempts} polls (last status {last_status})"),
            FailureReason::Failed { message } => write!(f, "{message}"),
            FailureReason::AssociationFailed {
                association,
                message,
            } => write!(f, "could not disassociate {association}: {message}"),
            FailureReason::BlockedByDependency { blocker } => {
                write!(f, "blocked by failed {blocker}")
            }
        }
    }
}

/// A resource left in place by the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceFailure {
    pub id: String,
    pub kind: ResourceKind,
    pub name: String,
    #[serde(flatten)]
    pub reason: FailureReason,
}

impl ResourceFailure {
    fn new(node: &ResourceNode, reason: FailureReason) -> Self {
        Self {
            id: node.id.clone(),
            kind: node.kind,
            name: node.name.clone(),
            reason,
        }
    }
}

/// Result of one cleanup run
#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub run_id: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub batches: Vec<DeletionBatch>,
    pub deleted: Vec<ResourceNode>,
    pub already_deleted: Vec<ResourceNode>,
    pub disassociated: Vec<AssociationRecord>,
    pub failures: Vec<ResourceFailure>,
}

impl CleanupReport {
    /// True when no resource failed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure(&self, id: &str) -> Option<&ResourceFailure> {
        self.failures.iter().find(|f| f.id == id)
    }

    /// Record store key for this run's summary
    pub fn store_key(&self) -> String {
        format!("run/{}", self.run_id)
    }
}

/// Scanned inventory, its graph and the deletion order
#[derive(Debug, Clone)]
pub struct Plan {
    pub inventory: Inventory,
    pub graph: DependencyGraph,
    pub batches: Vec<DeletionBatch>,
}

/// Knobs for a run
#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub poll: PollConfig,
    /// Deletions in flight at once within a batch
    pub concurrency: usize,
    /// Plan only; delete nothing
    pub dry_run: bool,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            concurrency: DEFAULT_CONCURRENCY,
            dry_run: false,
        }
    }
}

/// Runs dependency-ordered cleanups against a [`ResourceApi`]
pub struct Sweeper<A, S, R> {
    api: A,
    sleeper: S,
    store: R,
    options: SweepOptions,
}

impl<A: ResourceApi, S: Sleeper, R: RecordStore> Sweeper<A, S, R> {
    pub fn new(api: A, sleeper: S, store: R, options: SweepOptions) -> Self {
        Self {
            api,
            sleeper,
            store,
            options,
        }
    }

    pub fn options(&self) -> &SweepOptions {
        &self.options
    }

    /// Scan `scope` and compute the deletion batches without deleting
    pub async fn plan(&self, scope: &CleanupScope) -> Result<Plan, CleanupError> {
        let inventory = ResourceScanner::new(&self.api)
            .scan(scope)
            .await
            .map_err(CleanupError::Enumeration)?;
        let graph = DependencyGraph::from_inventory(&inventory);
        let batches = schedule(&graph)?;

        info!(
            resources = graph.len(),
            batches = batches.len(),
            "Planned deletion order"
        );
        Ok(Plan {
            inventory,
            graph,
            batches,
        })
    }

    /// Delete every in-scope resource in dependency order.
    ///
    /// Returns `Err` only for run-level failures (enumeration, cycles,
    /// transport). Per-resource failures are in [`CleanupReport::failures`].
    pub async fn run_cleanup(&self, scope: &CleanupScope) -> Result<CleanupReport, CleanupError> {
        let started_at = Utc::now();
        let plan = self.plan(scope).await?;

        let mut report = CleanupReport {
            run_id: Uuid::new_v4().to_string(),
            dry_run: self.options.dry_run,
            started_at,
            finished_at: started_at,
            batches: plan.batches.clone(),
            deleted: Vec::new(),
            already_deleted: Vec::new(),
            disassociated: Vec::new(),
            failures: Vec::new(),
        };

        if self.options.dry_run {
            info!(run_id = %report.run_id, "Dry run, nothing deleted");
            report.finished_at = Utc::now();
            return Ok(report);
        }

        self.execute(&plan, &mut report).await?;
        report.finished_at = Utc::now();

        info!(
            run_id = %report.run_id,
            deleted = report.deleted.len(),
            already_deleted = report.already_deleted.len(),
            disassociated = report.disassociated.len(),
            failed = report.failures.len(),
            "Cleanup finished"
        );
        self.save_summary(&report).await;

        Ok(report)
    }

    async fn execute(&self, plan: &Plan, report: &mut CleanupReport) -> Result<(), CleanupError> {
        let executor = DeletionExecutor::new(&self.api, &self.sleeper, self.options.poll.clone());
        let mut ledger = AssociationLedger::new(
            &self.api,
            &self.store,
            plan.inventory.associations.clone(),
        );
        let mut failed: HashSet<String> = HashSet::new();

        for batch in &plan.batches {
            let mut runnable = Vec::with_capacity(batch.nodes.len());
            for node in &batch.nodes {
                let blocker = plan
                    .graph
                    .blockers_of(&node.id)
                    .into_iter()
                    .find(|b| failed.contains(*b));
                match blocker {
                    Some(blocker) => {
                        warn!(node = %node, blocker, "Skipping resource blocked by a failure");
                        report.failures.push(ResourceFailure::new(
                            node,
                            FailureReason::BlockedByDependency {
                                blocker: blocker.to_string(),
                            },
                        ));
                        failed.insert(node.id.clone());
                    }
                    None => runnable.push(node.clone()),
                }
            }

            let runnable_batch = DeletionBatch {
                index: batch.index,
                nodes: runnable,
            };
            let unwind = ledger
                .unwind_for(&runnable_batch)
                .await
                .map_err(CleanupError::Transport)?;
            report.disassociated.extend(unwind.removed.iter().cloned());

            let mut to_delete = Vec::with_capacity(runnable_batch.nodes.len());
            for node in runnable_batch.nodes {
                match unwind.failure_for(&node.id) {
                    Some((record, err)) if node.kind == ResourceKind::Asset => {
                        report.failures.push(ResourceFailure::new(
                            &node,
                            FailureReason::AssociationFailed {
                                association: record.to_string(),
                                message: err.to_string(),
                            },
                        ));
                        failed.insert(node.id);
                    }
                    _ => to_delete.push(node),
                }
            }

            info!(
                batch = batch.index,
                resources = to_delete.len(),
                "Deleting batch"
            );
            let results = executor
                .delete_batch(&to_delete, self.options.concurrency)
                .await;

            let mut fatal = None;
            for (node, result) in to_delete.into_iter().zip(results) {
                match result {
                    Ok(DeletionOutcome::Deleted) => report.deleted.push(node),
                    Ok(DeletionOutcome::AlreadyDeleted) => report.already_deleted.push(node),
                    Err(DeleteError::Failed { source, .. }) if source.is_fatal() => {
                        failed.insert(node.id.clone());
                        fatal.get_or_insert(source);
                    }
                    Err(DeleteError::Timeout(timeout)) => {
                        report.failures.push(ResourceFailure::new(
                            &node,
                            FailureReason::TimedOut {
                                last_status: timeout.last_status,
                                attempts: timeout.attempts,
                            },
                        ));
                        failed.insert(node.id);
                    }
                    Err(DeleteError::Failed { source, .. }) => {
                        report.failures.push(ResourceFailure::new(
                            &node,
                            FailureReason::Failed {
                                message: source.to_string(),
                            },
                        ));
                        failed.insert(node.id);
                    }
                }
            }

            if let Some(source) = fatal {
                error!(batch = batch.index, error = %source, "Aborting cleanup");
                return Err(CleanupError::Transport(source));
            }
        }

        Ok(())
    }

    async fn save_summary(&self, report: &CleanupReport) {
        let value = match serde_json::to_string(report) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to serialize run summary");
                return;
            }
        };
        if let Err(e) = self.store.put(&report.store_key(), &value).await {
            warn!(run_id = %report.run_id, error = %e, "Failed to record run summary");
        }
    }
}
