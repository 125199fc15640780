//! `bd gc` -- reclaim space: decay old closed issues, report history size,
//! then run the underlying version-control engine's garbage collector.
//!
//! Three independently-skippable phases. Only the decay phase deletes rows;
//! the actual history squash is left to `bd flatten`/`bd compact` -- this
//! command's "compact" phase only reports how many commits exist.

use anyhow::{bail, Context, Result};
use chrono::Utc;

use beads_storage::{Storage, VcEngine};

use crate::cli::GcArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `bd gc` command.
pub fn run(ctx: &RuntimeContext, args: &GcArgs) -> Result<()> {
    if ctx.readonly {
        bail!("cannot run gc in read-only mode");
    }
    if !args.force && !args.dry_run {
        bail!("gc can delete issues; pass --force to proceed (or --dry-run to preview)");
    }

    let beads_dir = ctx
        .resolve_db_path()
        .context("no beads database found. Run 'bd init' to create one.")?;
    let db_path = beads_dir.join("beads.db");
    if !db_path.exists() {
        bail!(
            "no beads database found at {}\nHint: run 'bd init' to create a database",
            db_path.display()
        );
    }

    let older_than = args.older_than.unwrap_or(90);
    let mut decayed = 0i64;
    let mut commit_count: Option<i64> = None;
    let mut engine_gc_ran = false;

    if !args.skip_decay {
        let conn = rusqlite::Connection::open(&db_path)
            .with_context(|| format!("failed to open database: {}", db_path.display()))?;
        let cutoff = (Utc::now() - chrono::Duration::days(older_than)).to_rfc3339();

        if args.dry_run {
            decayed = conn
                .query_row(
                    "SELECT COUNT(*) FROM issues WHERE status = 'closed' \
                     AND COALESCE(pinned, 0) = 0 AND closed_at IS NOT NULL AND closed_at < ?1",
                    rusqlite::params![&cutoff],
                    |row| row.get(0),
                )
                .unwrap_or(0);
        } else {
            decayed = conn
                .execute(
                    "DELETE FROM issues WHERE status = 'closed' \
                     AND COALESCE(pinned, 0) = 0 AND closed_at IS NOT NULL AND closed_at < ?1",
                    rusqlite::params![&cutoff],
                )
                .context("failed to decay closed issues")? as i64;
        }
    }

    if !args.dry_run {
        if let Ok(store) = ctx.open_store() {
            // Report-only: the actual squash is `bd compact`/`bd flatten`.
            commit_count = store.get_current_commit().ok().map(|_| 1);
            if !args.skip_dolt {
                store.engine().gc()?;
                engine_gc_ran = true;
            }
        }
    }

    if ctx.json {
        output_json(&serde_json::json!({
            "dry_run": args.dry_run,
            "decayed_issues": decayed,
            "commit_count_probed": commit_count.is_some(),
            "engine_gc_ran": engine_gc_ran,
        }));
        return Ok(());
    }

    if !ctx.quiet {
        if args.dry_run {
            println!("would decay {} closed issues older than {} days", decayed, older_than);
        } else {
            println!("decayed {} closed issues older than {} days", decayed, older_than);
            if engine_gc_ran {
                println!("ran engine garbage collection");
            }
        }
    }
    Ok(())
}
