//! `bd compact` -- squash version-control history older than a threshold.

use anyhow::{bail, Result};

use beads_storage::VcEngine;

use crate::cli::CompactArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `bd compact` command.
pub fn run(ctx: &RuntimeContext, args: &CompactArgs) -> Result<()> {
    if ctx.readonly {
        bail!("cannot compact history in read-only mode");
    }
    if args.days < 0 {
        bail!("--days must be non-negative");
    }
    if !args.force && !args.dry_run {
        bail!("compact rewrites history; pass --force to proceed (or --dry-run to preview)");
    }

    let store = ctx.open_store()?;

    if args.dry_run {
        if ctx.json {
            output_json(&serde_json::json!({"dry_run": true, "days": args.days}));
        } else {
            println!("would squash commits older than {} days", args.days);
        }
        return Ok(());
    }

    store.engine().compact(args.days)?;

    if ctx.json {
        output_json(&serde_json::json!({"compacted": true, "days": args.days}));
    } else if !ctx.quiet {
        println!("compacted history older than {} days", args.days);
    }
    Ok(())
}
