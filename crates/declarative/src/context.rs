//! Progress reporting hooks
//!
//! These traits allow the declarative crate to be used without
//! depending on a specific terminal UI.

use crate::diff::ResourceDiff;
use crate::resource::Resource;
use crate::types::{ApplyResult, RefreshRecord, ResourceId};

/// Progress callback for convergence runs
///
/// Implement this trait to receive progress updates during a run. With
/// parallel jobs, `on_resource_start` is not called for resources applied
/// concurrently; their completions are reported once their wave finishes.
pub trait ProgressCallback: Send {
    /// Called before the apply pass with the number of resources
    fn on_pass_start(&mut self, total: usize);

    /// Called when starting to apply a single resource
    fn on_resource_start(&mut self, resource: &Resource);

    /// Called when a resource was found out of sync
    fn on_resource_diff(&mut self, diff: &ResourceDiff);

    /// Called when a resource's apply step completes
    fn on_resource_complete(&mut self, id: &ResourceId, result: &ApplyResult);

    /// Called after a notification-triggered refresh
    fn on_refresh(&mut self, record: &RefreshRecord);

    /// Called when the apply pass completes
    fn on_pass_complete(&mut self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_pass_start(&mut self, _total: usize) {}
    fn on_resource_start(&mut self, _resource: &Resource) {}
    fn on_resource_diff(&mut self, _diff: &ResourceDiff) {}
    fn on_resource_complete(&mut self, _id: &ResourceId, _result: &ApplyResult) {}
    fn on_refresh(&mut self, _record: &RefreshRecord) {}
    fn on_pass_complete(&mut self) {}
}
