//! `bd flatten` -- squash all version-control history into a single commit.

use anyhow::{bail, Result};

use beads_storage::{Storage, VcEngine};

use crate::cli::FlattenArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `bd flatten` command.
pub fn run(ctx: &RuntimeContext, args: &FlattenArgs) -> Result<()> {
    if ctx.readonly {
        bail!("cannot flatten history in read-only mode");
    }
    if !args.force && !args.dry_run {
        bail!("flatten is irreversible; pass --force to proceed (or --dry-run to preview)");
    }

    let store = ctx.open_store()?;
    let before = store.get_current_commit().ok();

    if args.dry_run {
        if ctx.json {
            output_json(&serde_json::json!({"dry_run": true, "current_commit": before}));
        } else {
            println!("would squash all history into a single commit (currently at {})", before.as_deref().unwrap_or("unknown"));
        }
        return Ok(());
    }

    store.engine().flatten()?;
    let after = store.get_current_commit().ok();

    if ctx.json {
        output_json(&serde_json::json!({"before": before, "after": after}));
    } else if !ctx.quiet {
        println!("flattened history: {} -> {}", before.as_deref().unwrap_or("?"), after.as_deref().unwrap_or("?"));
    }
    Ok(())
}
