//! `bd import` -- load issues from a JSONL bundle, upserting by id.

use std::fs;
use std::io::BufReader;

use anyhow::{Context, Result, bail};

use beads_core::issue::Issue;
use beads_core::jsonl::read_jsonl;

use crate::cli::ImportArgs;
use crate::context::RuntimeContext;

/// Execute the `bd import` command.
pub fn run(ctx: &RuntimeContext, args: &ImportArgs) -> Result<()> {
    if ctx.readonly {
        bail!("cannot import issues in read-only mode");
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

    let source = args
        .source
        .clone()
        .unwrap_or_else(|| beads_dir.join("issues.jsonl").to_string_lossy().into_owned());

    let file = fs::File::open(&source).with_context(|| format!("failed to open {source}"))?;
    let reader = BufReader::with_capacity(1 << 20, file);

    let mut conn = rusqlite::Connection::open(&db_path)
        .with_context(|| format!("failed to open database: {}", db_path.display()))?;

    let mut created = 0usize;
    let mut updated = 0usize;
    let mut warnings = 0usize;

    // Import is authoritative: auto-detect issue_prefix from the first
    // record if the database doesn't have one configured yet.
    let has_prefix: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM config WHERE key = 'issue_prefix')",
            [],
            |row| row.get(0),
        )
        .unwrap_or(false);
    let mut prefix_set = has_prefix;

    let tx = conn.transaction()?;
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

    for (line_no, result) in read_jsonl::<_, Issue>(reader).enumerate() {
        let mut issue = match result {
            Ok(issue) => issue,
            Err(e) => {
                eprintln!("line {}: skipping invalid record: {e}", line_no + 1);
                warnings += 1;
                continue;
            }
        };
        issue.set_defaults();
        seen.insert(issue.id.clone());

        if !prefix_set {
            if let Some((prefix, _)) = issue.id.rsplit_once('-') {
                tx.execute(
                    "INSERT OR REPLACE INTO config (key, value) VALUES ('issue_prefix', ?1)",
                    rusqlite::params![prefix],
                )?;
                prefix_set = true;
            }
        }

        if super::repo_cmd::upsert_issue(&tx, &issue, &ctx.actor)? {
            updated += 1;
        } else {
            created += 1;
        }
    }
    tx.commit()?;

    if !ctx.quiet {
        println!(
            "imported {} issues from {} ({} created, {} updated, {} warnings)",
            created + updated,
            source,
            created,
            updated,
            warnings
        );
    }

    Ok(())
}
