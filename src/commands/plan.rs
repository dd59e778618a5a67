//! `converge plan` - validate a manifest and show the apply order

use anyhow::Result;

use crate::Context;
use crate::cli::PlanArgs;
use crate::engine::differ::display_plan;
use crate::ui;

pub fn run(ctx: &Context, args: PlanArgs) -> Result<()> {
    let prepared = super::load(&args.manifest, &args.host)?;

    if !ctx.quiet {
        ui::header(&format!("Plan: {}", args.manifest));
        ui::kv("platform", prepared.platform.name());
        ui::kv("root", &args.host.root.display().to_string());
    }
    display_plan(&prepared.graph);
    Ok(())
}
