//! Per-run outcome record

use crate::types::{ApplyResult, RefreshOutcome, RefreshRecord, ResourceId};
use serde::Serialize;
use std::collections::HashMap;

/// Overall status of a run that was not rejected up front
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every resource unchanged or changed, every refresh succeeded
    Converged,
    /// Some resources or refreshes failed; the rest converged
    PartialFailure,
}

/// One resource's recorded outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryEntry {
    pub id: ResourceId,
    #[serde(flatten)]
    pub result: ApplyResult,
}

/// Counters over a run summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryCounts {
    pub unchanged: usize,
    pub changed: usize,
    pub failed: usize,
    pub refreshed: usize,
    pub refresh_failed: usize,
}

impl SummaryCounts {
    /// Total number of resources processed
    pub fn total(&self) -> usize {
        self.unchanged + self.changed + self.failed
    }
}

/// Outcome of every resource in one run, in apply order
///
/// Each resource id is recorded at most once.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub dry_run: bool,
    entries: Vec<SummaryEntry>,
    refreshes: Vec<RefreshRecord>,
    #[serde(skip)]
    index: HashMap<ResourceId, usize>,
}

impl RunSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    /// Record a resource's result; a second record for the same id is ignored
    pub fn record(&mut self, id: ResourceId, result: ApplyResult) -> bool {
        if self.index.contains_key(&id) {
            log::warn!("result for {} already recorded; ignoring", id);
            return false;
        }
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push(SummaryEntry { id, result });
        true
    }

    pub fn push_refresh(&mut self, record: RefreshRecord) {
        self.refreshes.push(record);
    }

    /// Result of a resource, if it was recorded
    pub fn get(&self, id: &ResourceId) -> Option<&ApplyResult> {
        self.index.get(id).map(|&i| &self.entries[i].result)
    }

    /// Entries in apply order
    pub fn entries(&self) -> &[SummaryEntry] {
        &self.entries
    }

    pub fn refreshes(&self) -> &[RefreshRecord] {
        &self.refreshes
    }

    /// Ids in apply order
    pub fn ids(&self) -> impl Iterator<Item = &ResourceId> {
        self.entries.iter().map(|e| &e.id)
    }

    /// Failed entries in apply order
    pub fn failures(&self) -> impl Iterator<Item = &SummaryEntry> {
        self.entries.iter().filter(|e| e.result.is_failure())
    }

    pub fn counts(&self) -> SummaryCounts {
        let mut counts = SummaryCounts::default();
        for entry in &self.entries {
            match entry.result {
                ApplyResult::Unchanged => counts.unchanged += 1,
                ApplyResult::Changed => counts.changed += 1,
                ApplyResult::Failed { .. } => counts.failed += 1,
            }
        }
        for record in &self.refreshes {
            match record.outcome {
                RefreshOutcome::Refreshed => counts.refreshed += 1,
                RefreshOutcome::Failed(_) => counts.refresh_failed += 1,
                RefreshOutcome::Pending => {}
            }
        }
        counts
    }

    pub fn status(&self) -> RunStatus {
        let counts = self.counts();
        if counts.failed == 0 && counts.refresh_failed == 0 {
            RunStatus::Converged
        } else {
            RunStatus::PartialFailure
        }
    }

    /// Check if the run converged without failures
    pub fn is_success(&self) -> bool {
        self.status() == RunStatus::Converged
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
