//! Plan, diff and summary display

use colored::Colorize;
use declarative::{
    ApplyResult, DependencyGraph, EdgeKind, RefreshOutcome, ResourceDiff, RunSummary,
};

use crate::ui;

/// Display the apply order with each resource's incoming edges
pub fn display_plan(graph: &DependencyGraph) {
    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Apply Order".bold()
    );
    println!("│");

    for (step, &idx) in graph.order().iter().enumerate() {
        let resource = graph.resource(idx);
        let group = resource
            .group
            .as_deref()
            .map(|g| format!(" [{}]", g).dimmed().to_string())
            .unwrap_or_default();
        println!("│ {:>3}. {}{}", step + 1, resource.id, group);

        let mut after = Vec::new();
        let mut notified_by = Vec::new();
        for edge in graph.dependencies(idx) {
            let from = graph.resource(edge.from).id.to_string();
            match edge.kind {
                EdgeKind::Order => after.push(from),
                EdgeKind::Notify => notified_by.push(from),
            }
        }
        if !after.is_empty() {
            println!("│        {} {}", "after".dimmed(), after.join(", "));
        }
        if !notified_by.is_empty() {
            println!(
                "│        {} {}",
                "refreshed by".cyan(),
                notified_by.join(", ")
            );
        }
    }

    println!("│");
    println!("├─────────────────────────────────────────────────────┤");
    let notify = graph
        .edges()
        .iter()
        .filter(|e| e.kind == EdgeKind::Notify)
        .count();
    println!(
        "│ {} resources, {} edges ({} notify)",
        graph.len().to_string().bold(),
        graph.edges().len(),
        notify
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Display what a run would change
pub fn display_diff(diffs: &[ResourceDiff]) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Configuration Diff".bold()
    );
    println!("│");

    for diff in diffs {
        println!("│ {} {}", "~".yellow(), diff.resource_id);
        for change in &diff.changes {
            let observed = change.observed.as_deref().unwrap_or("(unset)");
            println!(
                "│     {:<12} {} → {}",
                change.name,
                ui::truncate_path(observed, 40).dimmed(),
                ui::truncate_path(&change.desired, 40)
            );
        }
    }

    println!("│");
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} resources to change",
        diffs.len().to_string().bold()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Print the outcome of a run
pub fn display_summary(summary: &RunSummary) {
    let counts = summary.counts();

    println!();
    match (summary.is_success(), summary.dry_run) {
        (true, true) => println!("  {} Dry run - no changes made", "ℹ".blue()),
        (true, false) => println!("  {} Converged", "✓".green().bold()),
        (false, _) => println!("  {} Converged with errors", "⚠".yellow().bold()),
    }

    let verb = if summary.dry_run { "would change" } else { "changed" };
    if counts.changed > 0 {
        println!("    • {} resources {}", counts.changed, verb);
    }
    if counts.unchanged > 0 {
        println!("    • {} resources unchanged", counts.unchanged);
    }
    if counts.refreshed > 0 {
        println!("    • {} resources refreshed", counts.refreshed);
    }
    if counts.failed > 0 {
        println!("    • {} {} failed", counts.failed, "resources".red());
    }
    if counts.refresh_failed > 0 {
        println!("    • {} {} failed", counts.refresh_failed, "refreshes".red());
    }

    for entry in summary.failures() {
        if let ApplyResult::Failed { failure } = &entry.result {
            println!("    {} {}: {}", "✗".red(), entry.id, failure);
        }
    }

    for record in summary.refreshes() {
        let triggered_by = record
            .triggered_by
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let detail = match &record.outcome {
            RefreshOutcome::Failed(error) => format!(": {}", error.red()),
            RefreshOutcome::Pending => " (pending)".dimmed().to_string(),
            RefreshOutcome::Refreshed => String::new(),
        };
        println!(
            "    {} {} {}{}",
            ui::refresh_symbol(&record.outcome),
            record.id,
            format!("(notified by {})", triggered_by).dimmed(),
            detail
        );
    }
}
