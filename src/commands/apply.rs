//! `converge apply` - bring the host to a manifest's desired state

use anyhow::{Context as AnyhowContext, Result};
use declarative::{RunStatus, RunSummary};
use std::process::ExitCode;
use std::sync::Arc;

use super::EXIT_PARTIAL_FAILURE;
use crate::Context;
use crate::cli::ApplyArgs;
use crate::engine::{self, ApplyOptions};
use crate::runner::SystemRunner;
use crate::state::RunReport;
use crate::{privilege, resource, ui};

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<ExitCode> {
    let prepared = super::load(&args.manifest, &args.host)?;
    privilege::check(&args.host.root, args.dry_run)?;

    let opts = ApplyOptions {
        dry_run: args.dry_run,
        jobs: usize::from(args.jobs),
        yes: args.yes,
        json: args.json,
        verbose: ctx.verbose > 0,
        quiet: ctx.quiet,
    };

    if !opts.json && !opts.quiet {
        ui::header(&format!("Apply: {}", args.manifest));
        ui::kv("platform", prepared.platform.name());
        ui::kv("resources", &prepared.graph.len().to_string());
        if !resource::is_live_root(&args.host.root) {
            ui::kv("root", &args.host.root.display().to_string());
        }
    }

    let providers = resource::providers(
        &prepared.platform,
        &args.host.root,
        Arc::new(SystemRunner),
    );
    let summary = engine::execute(&prepared.graph, &providers, &opts)?;

    let report = RunReport::new(
        &args.manifest,
        &args.host.root,
        &prepared.platform,
        &summary,
    );
    if opts.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize run report")?;
        println!("{}", json);
    }
    if !opts.dry_run {
        match report.save() {
            Ok(path) => log::debug!("Run report written to {}", path.display()),
            Err(e) => log::warn!("Could not save run report: {:#}", e),
        }
    }

    Ok(ExitCode::from(exit_status(&summary)))
}

fn exit_status(summary: &RunSummary) -> u8 {
    match summary.status() {
        RunStatus::Converged => 0,
        RunStatus::PartialFailure => EXIT_PARTIAL_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{ApplyResult, Failure, ResourceId, ResourceKind};

    #[test]
    fn test_exit_status() {
        let mut summary = RunSummary::new(false);
        summary.record(ResourceId::new(ResourceKind::Package, "burp"), ApplyResult::Changed);
        assert_eq!(exit_status(&summary), 0);

        summary.record(
            ResourceId::new(ResourceKind::Service, "burp"),
            ApplyResult::failed(Failure::Apply("unit not found".into())),
        );
        assert_eq!(exit_status(&summary), EXIT_PARTIAL_FAILURE);
    }
}
