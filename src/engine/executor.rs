//! Execution engine - converge runs with terminal UI integration

use anyhow::{Result, bail};
use colored::Colorize;
use declarative::{
    ApplyResult, DependencyGraph, Engine, ExecuteOptions, NoProgress, ProgressCallback,
    Providers, RefreshRecord, Resource, ResourceDiff, ResourceId, RunSummary,
};
use indicatif::{ProgressBar, ProgressStyle};

use super::differ::{display_diff, display_summary};
use crate::ui;

/// Options for one apply (adds UI concerns to the engine's options)
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of parallel jobs
    pub jobs: usize,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Machine-readable output only
    pub json: bool,
    /// Print every resource outcome
    pub verbose: bool,
    pub quiet: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 1,
            yes: false,
            json: false,
            verbose: false,
            quiet: false,
        }
    }
}

impl ApplyOptions {
    fn engine_options(&self, dry_run: bool) -> ExecuteOptions {
        ExecuteOptions {
            dry_run,
            jobs: self.jobs.max(1),
        }
    }

    fn interactive(&self) -> bool {
        !self.json && !self.quiet
    }
}

/// Converge a validated graph, previewing and confirming first
pub fn execute(
    graph: &DependencyGraph,
    providers: &Providers,
    opts: &ApplyOptions,
) -> Result<RunSummary> {
    // 1. Preview (dry pass) unless the run itself is dry or unattended
    if opts.interactive() && !opts.dry_run && !opts.yes {
        let mut collector = DiffCollector::default();
        let preview = Engine::new(providers, opts.engine_options(true)).apply(graph, &mut collector);
        display_diff(&collector.diffs);

        let would_change = preview.counts().changed > 0;
        if would_change && !confirm_proceed()? {
            println!();
            println!("  {} Aborted", "✗".red());
            bail!("Aborted by user");
        }
    }

    // 2. Converge
    let engine = Engine::new(providers, opts.engine_options(opts.dry_run));
    let summary = if opts.interactive() {
        let mut progress = BarProgress::new(opts.dry_run, opts.verbose);
        engine.converge(graph, &mut progress)
    } else {
        engine.converge(graph, &mut NoProgress)
    };

    // 3. Summary
    if opts.interactive() {
        display_summary(&summary);
    }

    Ok(summary)
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

/// Collects out-of-sync diffs during a preview pass
#[derive(Debug, Default)]
struct DiffCollector {
    diffs: Vec<ResourceDiff>,
}

impl ProgressCallback for DiffCollector {
    fn on_pass_start(&mut self, _total: usize) {}
    fn on_resource_start(&mut self, _resource: &Resource) {}

    fn on_resource_diff(&mut self, diff: &ResourceDiff) {
        self.diffs.push(diff.clone());
    }

    fn on_resource_complete(&mut self, id: &ResourceId, result: &ApplyResult) {
        if let ApplyResult::Failed { failure } = result {
            log::warn!("{} cannot be previewed: {}", id, failure);
        }
    }

    fn on_refresh(&mut self, _record: &RefreshRecord) {}
    fn on_pass_complete(&mut self) {}
}

/// Progress bar over the apply pass
struct BarProgress {
    bar: ProgressBar,
    dry_run: bool,
    verbose: bool,
}

impl BarProgress {
    fn new(dry_run: bool, verbose: bool) -> Self {
        Self {
            bar: ProgressBar::hidden(),
            dry_run,
            verbose,
        }
    }
}

impl ProgressCallback for BarProgress {
    fn on_pass_start(&mut self, total: usize) {
        println!();
        println!(
            "  {} {} {} resources...",
            "→".cyan(),
            if self.dry_run { "Checking" } else { "Applying" },
            total
        );

        self.bar = ProgressBar::new(total as u64);
        self.bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
    }

    fn on_resource_start(&mut self, resource: &Resource) {
        self.bar
            .set_message(ui::truncate_path(&resource.id.to_string(), 40));
    }

    fn on_resource_diff(&mut self, diff: &ResourceDiff) {
        log::debug!("{}: {} attributes out of sync", diff.resource_id, diff.changes.len());
    }

    fn on_resource_complete(&mut self, id: &ResourceId, result: &ApplyResult) {
        let symbol = ui::result_symbol(result, self.dry_run);
        match result {
            ApplyResult::Failed { failure } => {
                self.bar.println(format!("  {} {}: {}", symbol, id, failure));
            }
            ApplyResult::Changed => self.bar.println(format!("  {} {}", symbol, id)),
            ApplyResult::Unchanged if self.verbose => {
                self.bar.println(format!("  {} {}", symbol, id));
            }
            ApplyResult::Unchanged => {}
        }
        self.bar.inc(1);
    }

    fn on_refresh(&mut self, record: &RefreshRecord) {
        println!(
            "  {} {} {}",
            ui::refresh_symbol(&record.outcome),
            record.id,
            "(notified)".dimmed()
        );
    }

    fn on_pass_complete(&mut self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::testing::Host;
    use declarative::{Declaration, Relationship, ResourceKind};

    fn scenario() -> DependencyGraph {
        let package = Resource::new(ResourceKind::Package, "burp").with("ensure", "present");
        let dir = Resource::new(ResourceKind::File, "/etc/burp").with("ensure", "directory");
        let service = Resource::new(ResourceKind::Service, "burp").with("ensure", "running");
        let decl = Declaration::new()
            .resource(package.clone())
            .resource(dir.clone())
            .resource(service.clone())
            .relationship(Relationship::before(package.id, dir.id.clone()))
            .relationship(Relationship::notifies(dir.id, service.id));
        DependencyGraph::build(&decl).unwrap()
    }

    fn unattended() -> ApplyOptions {
        ApplyOptions {
            yes: true,
            json: true,
            ..ApplyOptions::default()
        }
    }

    #[test]
    fn test_execute_unattended() {
        let host = Host::new();
        let summary = execute(&scenario(), &host.providers(), &unattended()).unwrap();
        assert!(summary.is_success());
        assert_eq!(summary.counts().changed, 3);
        assert_eq!(host.refresh_count("service:burp"), 1);
    }

    #[test]
    fn test_execute_dry_run_touches_nothing() {
        let host = Host::new();
        let opts = ApplyOptions {
            dry_run: true,
            ..unattended()
        };
        let summary = execute(&scenario(), &host.providers(), &opts).unwrap();
        assert!(summary.dry_run);
        assert_eq!(host.materialize_count(), 0);
        assert_eq!(host.total_refreshes(), 0);
    }

    #[test]
    fn test_diff_collector_keeps_out_of_sync_resources() {
        let host = Host::new();
        host.set(
            &ResourceId::new(ResourceKind::Package, "burp"),
            "ensure",
            "present",
        );
        let mut collector = DiffCollector::default();
        let preview = Engine::new(
            &host.providers(),
            ExecuteOptions {
                dry_run: true,
                jobs: 1,
            },
        )
        .apply(&scenario(), &mut collector);

        assert_eq!(preview.counts().changed, 2);
        let ids: Vec<String> = collector
            .diffs
            .iter()
            .map(|d| d.resource_id.to_string())
            .collect();
        assert_eq!(ids, vec!["file:/etc/burp", "service:burp"]);
    }
}
