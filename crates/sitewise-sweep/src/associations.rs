//! Hierarchy association unwinding
//!
//! An asset linked into a parent's hierarchy cannot be deleted, and neither
//! can the parent. Before a batch runs, every pending link touching one of its
//! assets is removed.

use crate::api::{AssociationRecord, ResourceApi};
use crate::error::ApiError;
use crate::schedule::DeletionBatch;
use crate::state::RecordStore;
use chrono::Utc;
use serde_json::json;
use sitewise_sweep_common::ResourceKind;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Outcome of unwinding the associations of one batch
#[derive(Debug, Default)]
pub struct UnwindReport {
    /// Disassociated now, or already gone on the service side
    pub removed: Vec<AssociationRecord>,
    pub failed: Vec<(AssociationRecord, ApiError)>,
}

impl UnwindReport {
    /// The failed disassociation involving `asset_id`, if any
    pub fn failure_for(&self, asset_id: &str) -> Option<&(AssociationRecord, ApiError)> {
        self.failed.iter().find(|(record, _)| record.involves(asset_id))
    }
}

/// Associations still to be removed during a run
pub struct AssociationLedger<'a, A, R> {
    api: &'a A,
    store: &'a R,
    pending: Vec<AssociationRecord>,
}

impl<'a, A: ResourceApi, R: RecordStore> AssociationLedger<'a, A, R> {
    pub fn new(api: &'a A, store: &'a R, mut pending: Vec<AssociationRecord>) -> Self {
        pending.sort();
        pending.dedup();
        Self {
            api,
            store,
            pending,
        }
    }

    pub fn pending(&self) -> &[AssociationRecord] {
        &self.pending
    }

    /// Remove every pending association touching an asset of `batch`.
    ///
    /// Each record is attempted at most once per run, whatever earlier runs
    /// recorded. A transport failure aborts and is returned as `Err`; other
    /// failures are reported per record.
    pub async fn unwind_for(&mut self, batch: &DeletionBatch) -> Result<UnwindReport, ApiError> {
        let assets: HashSet<&str> = batch
            .nodes
            .iter()
            .filter(|n| n.kind == ResourceKind::Asset)
            .map(|n| n.id.as_str())
            .collect();

        let (due, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|r| assets.contains(r.parent_id.as_str()) || assets.contains(r.child_id.as_str()));
        self.pending = rest;

        let mut report = UnwindReport::default();
        for record in due {
            match self.api.disassociate(&record).await {
                Ok(()) => info!(association = %record, "Disassociated"),
                Err(e) if e.is_not_found() => {
                    debug!(association = %record, "Association already gone");
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(association = %record, error = %e, "Failed to disassociate");
                    report.failed.push((record, e));
                    continue;
                }
            }

            let value = json!({ "removed_at": Utc::now().to_rfc3339() }).to_string();
            if let Err(e) = self.store.put(&record.store_key(), &value).await {
                warn!(association = %record, error = %e, "Failed to record removed association");
            }
            report.removed.push(record);
        }

        Ok(report)
    }
}
