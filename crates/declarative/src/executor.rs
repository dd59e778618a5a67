//! Convergence engine - walks the graph and applies resources
//!
//! A run has two phases:
//! 1. [`prepare`] - query facts once, gate the platform, build the graph.
//!    Nothing touches the host; any error rejects the whole run.
//! 2. [`Engine::converge`] - apply every resource in topological order,
//!    then let the [`NotificationRouter`] fire refreshes.

use crate::context::ProgressCallback;
use crate::declaration::Declaration;
use crate::diff::ResourceDiff;
use crate::error::RunError;
use crate::graph::DependencyGraph;
use crate::notify::NotificationRouter;
use crate::platform::{FactsProvider, Platform, PlatformGate};
use crate::resource::{Providers, Resource, ResourceProvider};
use crate::summary::RunSummary;
use crate::types::{ApplyResult, ExecuteOptions, Failure};
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

/// A validated run, ready to apply
#[derive(Debug)]
pub struct Prepared {
    pub platform: Platform,
    pub graph: DependencyGraph,
}

/// Gate the platform and build the graph
///
/// Facts are queried exactly once. The gate runs before the graph is built,
/// so an unsupported host is reported even when the declaration is invalid.
pub fn prepare(
    declaration: &Declaration,
    facts: &dyn FactsProvider,
    gate: &PlatformGate,
) -> Result<Prepared, RunError> {
    let facts = facts.facts().map_err(RunError::Facts)?;
    let platform = gate.validate(&facts)?;
    log::info!("platform {} accepted", platform.name());

    let graph = DependencyGraph::build(declaration)?;
    Ok(Prepared { platform, graph })
}

/// Applies a graph through the providers
pub struct Engine<'a> {
    providers: &'a Providers,
    options: ExecuteOptions,
}

impl<'a> Engine<'a> {
    pub fn new(providers: &'a Providers, options: ExecuteOptions) -> Self {
        Self { providers, options }
    }

    pub fn options(&self) -> &ExecuteOptions {
        &self.options
    }

    /// Apply pass followed by notification routing
    pub fn converge<P: ProgressCallback>(
        &self,
        graph: &DependencyGraph,
        progress: &mut P,
    ) -> RunSummary {
        let mut summary = self.apply(graph, progress);
        NotificationRouter::new(graph).route(
            &mut summary,
            self.providers,
            self.options.dry_run,
            progress,
        );
        summary
    }

    /// Apply every resource once, in the graph's order
    ///
    /// A resource whose dependency failed is marked failed without being
    /// observed or materialized. Independent resources carry on.
    pub fn apply<P: ProgressCallback>(
        &self,
        graph: &DependencyGraph,
        progress: &mut P,
    ) -> RunSummary {
        let mut slots: Vec<Option<ApplyResult>> = vec![None; graph.len()];
        progress.on_pass_start(graph.len());

        if self.options.jobs <= 1 {
            for &idx in graph.order() {
                let result = self.step(graph, idx, &slots, progress);
                slots[idx] = Some(result);
            }
        } else {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.jobs)
                .build()
            {
                Ok(pool) => {
                    for wave in graph.waves() {
                        self.apply_wave(graph, &wave, &pool, &mut slots, progress);
                    }
                }
                Err(e) => {
                    log::warn!("failed to create apply thread pool ({}); applying sequentially", e);
                    for &idx in graph.order() {
                        let result = self.step(graph, idx, &slots, progress);
                        slots[idx] = Some(result);
                    }
                }
            }
        }

        progress.on_pass_complete();

        let mut summary = RunSummary::new(self.options.dry_run);
        for &idx in graph.order() {
            let result = slots[idx].take().unwrap_or_else(|| {
                ApplyResult::failed(Failure::Apply("resource was not applied".to_string()))
            });
            summary.record(graph.resource(idx).id.clone(), result);
        }
        summary
    }

    /// Apply one resource sequentially, reporting progress
    fn step<P: ProgressCallback>(
        &self,
        graph: &DependencyGraph,
        idx: usize,
        slots: &[Option<ApplyResult>],
        progress: &mut P,
    ) -> ApplyResult {
        let resource = graph.resource(idx);

        if let Some(result) = failed_dependency(graph, idx, slots) {
            progress.on_resource_complete(&resource.id, &result);
            return result;
        }

        progress.on_resource_start(resource);
        let (result, diff) = apply_resource(
            self.providers.for_resource(resource),
            resource,
            self.options.dry_run,
        );
        if let Some(diff) = &diff {
            progress.on_resource_diff(diff);
        }
        progress.on_resource_complete(&resource.id, &result);
        result
    }

    /// Apply one wave of independent resources in parallel
    fn apply_wave<P: ProgressCallback>(
        &self,
        graph: &DependencyGraph,
        wave: &[usize],
        pool: &rayon::ThreadPool,
        slots: &mut [Option<ApplyResult>],
        progress: &mut P,
    ) {
        let mut runnable = Vec::with_capacity(wave.len());
        for &idx in wave {
            match failed_dependency(graph, idx, slots) {
                Some(result) => {
                    progress.on_resource_complete(&graph.resource(idx).id, &result);
                    slots[idx] = Some(result);
                }
                None => runnable.push(idx),
            }
        }

        // Progress callbacks are not thread-safe; collect and report after.
        let results: Arc<Mutex<Vec<WaveResult>>> = Arc::new(Mutex::new(Vec::new()));
        let dry_run = self.options.dry_run;

        pool.install(|| {
            runnable.par_iter().for_each(|&idx| {
                let resource = graph.resource(idx);
                let (result, diff) =
                    apply_resource(self.providers.for_resource(resource), resource, dry_run);
                push_wave_result(&results, (idx, result, diff));
            });
        });

        let mut collected = into_wave_results(results);
        collected.sort_by_key(|(idx, _, _)| wave.iter().position(|w| w == idx));

        for (idx, result, diff) in collected {
            if let Some(diff) = &diff {
                progress.on_resource_diff(diff);
            }
            progress.on_resource_complete(&graph.resource(idx).id, &result);
            slots[idx] = Some(result);
        }
    }
}

type WaveResult = (usize, ApplyResult, Option<ResourceDiff>);

fn push_wave_result(results: &Arc<Mutex<Vec<WaveResult>>>, result: WaveResult) {
    match results.lock() {
        Ok(mut locked) => locked.push(result),
        Err(poisoned) => poisoned.into_inner().push(result),
    }
}

fn into_wave_results(results: Arc<Mutex<Vec<WaveResult>>>) -> Vec<WaveResult> {
    let mutex = match Arc::try_unwrap(results) {
        Ok(mutex) => mutex,
        Err(shared) => {
            return match shared.lock() {
                Ok(mut locked) => std::mem::take(&mut *locked),
                Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
            };
        }
    };

    match mutex.into_inner() {
        Ok(collected) => collected,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Failure caused by the first failed direct dependency, if any
fn failed_dependency(
    graph: &DependencyGraph,
    idx: usize,
    slots: &[Option<ApplyResult>],
) -> Option<ApplyResult> {
    let failed = graph
        .dependencies(idx)
        .map(|edge| edge.from)
        .find(|&from| slots[from].as_ref().is_some_and(ApplyResult::is_failure))?;

    let dependency = graph.resource(failed).id.clone();
    log::warn!(
        "skipping {}: dependency {} failed",
        graph.resource(idx).id,
        dependency
    );
    Some(ApplyResult::failed(Failure::Dependency(dependency)))
}

/// Observe, compare and, if needed, materialize one resource
fn apply_resource(
    provider: &dyn ResourceProvider,
    resource: &Resource,
    dry_run: bool,
) -> (ApplyResult, Option<ResourceDiff>) {
    let diff = match ResourceDiff::observe(provider, resource) {
        Ok(diff) => diff,
        Err(e) => {
            log::warn!("{}: failed to read observed state: {:#}", resource.id, e);
            let failure = Failure::Apply(format!("failed to read observed state: {:#}", e));
            return (ApplyResult::failed(failure), None);
        }
    };

    if diff.is_in_sync() {
        log::debug!("{} is in sync", resource.id);
        return (ApplyResult::Unchanged, None);
    }

    if dry_run {
        log::info!("{} would change (dry run)", resource.id);
        return (ApplyResult::Changed, Some(diff));
    }

    match provider.materialize(resource) {
        Ok(()) => {
            log::info!("{} changed", resource.id);
            (ApplyResult::Changed, Some(diff))
        }
        Err(e) => {
            log::warn!("{}: {:#}", resource.id, e);
            (ApplyResult::failed(Failure::Apply(format!("{:#}", e))), Some(diff))
        }
    }
}
