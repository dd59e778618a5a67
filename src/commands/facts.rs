//! `converge facts` - show what the platform gate sees

use anyhow::{Context as AnyhowContext, Result};

use crate::Context;
use crate::cli::FactsArgs;
use crate::ui;

pub fn run(ctx: &Context, args: FactsArgs) -> Result<()> {
    let facts = crate::facts::provider(&args.host).facts()?;

    if args.json {
        let json = serde_json::to_string_pretty(&facts).context("Failed to serialize facts")?;
        println!("{}", json);
        return Ok(());
    }

    if !ctx.quiet {
        ui::header("Host facts");
    }
    ui::kv("os family", facts.os_family.as_deref().unwrap_or("(unknown)"));
    ui::kv(
        "operating system",
        facts.operating_system.as_deref().unwrap_or("(unknown)"),
    );
    Ok(())
}
