//! `bd label` -- manage labels on an issue, or list every label in use.

use anyhow::{bail, Context, Result};

use crate::cli::{LabelArgs, LabelCommands};
use crate::context::RuntimeContext;
use crate::output::{load_labels, output_json};

/// Execute the `bd label` command.
pub fn run(ctx: &RuntimeContext, args: &LabelArgs) -> Result<()> {
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

    let conn = rusqlite::Connection::open(&db_path)
        .with_context(|| format!("failed to open database: {}", db_path.display()))?;

    if matches!(args.command, LabelCommands::ListAll) {
        let mut stmt = conn.prepare("SELECT DISTINCT label FROM labels ORDER BY label")?;
        let labels: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();

        if ctx.json {
            output_json(&labels);
        } else if labels.is_empty() {
            println!("No labels in use");
        } else {
            for label in &labels {
                println!("{label}");
            }
        }
        return Ok(());
    }

    let id = args
        .id
        .as_ref()
        .context("an issue ID is required for this label subcommand")?;

    let exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM issues WHERE id = ?1)",
            rusqlite::params![id],
            |row| row.get(0),
        )
        .unwrap_or(false);

    if !exists {
        bail!("issue '{}' not found", id);
    }

    match &args.command {
        LabelCommands::Add(add_args) => {
            if ctx.readonly {
                bail!("cannot add labels in read-only mode");
            }

            conn.execute(
                "INSERT OR IGNORE INTO labels (issue_id, label) VALUES (?1, ?2)",
                rusqlite::params![id, &add_args.label],
            )
            .with_context(|| format!("failed to add label '{}' to {}", add_args.label, id))?;

            if ctx.json {
                output_json(&serde_json::json!({
                    "status": "added",
                    "issue_id": id,
                    "label": add_args.label,
                }));
            } else if !ctx.quiet {
                println!("Added label '{}' to {}", add_args.label, id);
            }
        }

        LabelCommands::Remove(remove_args) => {
            if ctx.readonly {
                bail!("cannot remove labels in read-only mode");
            }

            let changes = conn.execute(
                "DELETE FROM labels WHERE issue_id = ?1 AND label = ?2",
                rusqlite::params![id, &remove_args.label],
            )?;

            if ctx.json {
                output_json(&serde_json::json!({
                    "status": "removed",
                    "issue_id": id,
                    "label": remove_args.label,
                    "removed": changes > 0,
                }));
            } else if changes > 0 {
                if !ctx.quiet {
                    println!("Removed label '{}' from {}", remove_args.label, id);
                }
            } else {
                eprintln!("Label '{}' not found on {}", remove_args.label, id);
            }
        }

        LabelCommands::List => {
            let labels = load_labels(&conn, id);

            if ctx.json {
                output_json(&labels);
            } else if labels.is_empty() {
                println!("{id} has no labels");
            } else {
                println!("Labels for {id}:");
                for label in &labels {
                    println!("  - {label}");
                }
            }
        }

        LabelCommands::ListAll => unreachable!("handled above"),
    }

    Ok(())
}
