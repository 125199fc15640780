//! `bd dep` -- dependency management (add/remove/tree).

use anyhow::{bail, Context, Result};
use chrono::Utc;

use beads_core::enums::DependencyType;

use crate::cli::{DepArgs, DepCommands, DepTreeArgs};
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `bd dep` command.
pub fn run(ctx: &RuntimeContext, args: &DepArgs) -> Result<()> {
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

    match &args.command {
        DepCommands::Add(add_args) => {
            if ctx.readonly {
                bail!("cannot add dependencies in read-only mode");
            }

            let conn = rusqlite::Connection::open(&db_path)
                .with_context(|| format!("failed to open database: {}", db_path.display()))?;

            let dep_type = DependencyType::from(add_args.dep_type.as_str());
            if !dep_type.is_valid() {
                bail!(
                    "invalid dependency type '{}' (valid: blocks, related, parent-child, discovered-from)",
                    add_args.dep_type
                );
            }

            for id in [&add_args.from, &add_args.to] {
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
            }

            let now_str = Utc::now().to_rfc3339();

            conn.execute(
                "INSERT OR IGNORE INTO dependencies (issue_id, depends_on_id, type, created_at, created_by) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    &add_args.from,
                    &add_args.to,
                    dep_type.as_str(),
                    &now_str,
                    &ctx.actor,
                ],
            )
            .with_context(|| {
                format!(
                    "failed to add dependency {} -> {}",
                    add_args.from, add_args.to
                )
            })?;

            conn.execute(
                "INSERT INTO events (issue_id, event_type, actor, new_value, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    &add_args.from,
                    "dependency_added",
                    &ctx.actor,
                    format!("{}:{}", dep_type.as_str(), add_args.to),
                    &now_str,
                ],
            )?;

            if ctx.json {
                output_json(&serde_json::json!({
                    "from": add_args.from,
                    "to": add_args.to,
                    "type": dep_type.as_str(),
                }));
            } else if !ctx.quiet {
                println!(
                    "Added dependency: {} --[{}]--> {}",
                    add_args.from, dep_type, add_args.to
                );
            }
        }

        DepCommands::Remove(remove_args) => {
            if ctx.readonly {
                bail!("cannot remove dependencies in read-only mode");
            }

            let conn = rusqlite::Connection::open(&db_path)
                .with_context(|| format!("failed to open database: {}", db_path.display()))?;

            let now_str = Utc::now().to_rfc3339();

            let changes = conn.execute(
                "DELETE FROM dependencies WHERE issue_id = ?1 AND depends_on_id = ?2",
                rusqlite::params![&remove_args.from, &remove_args.to],
            )?;

            if changes > 0 {
                conn.execute(
                    "INSERT INTO events (issue_id, event_type, actor, old_value, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![
                        &remove_args.from,
                        "dependency_removed",
                        &ctx.actor,
                        &remove_args.to,
                        &now_str,
                    ],
                )?;
            }

            if ctx.json {
                output_json(&serde_json::json!({
                    "from": remove_args.from,
                    "to": remove_args.to,
                    "removed": changes > 0,
                }));
            } else if changes > 0 {
                if !ctx.quiet {
                    println!(
                        "Removed dependency: {} -> {}",
                        remove_args.from, remove_args.to
                    );
                }
            } else {
                eprintln!(
                    "No dependency found: {} -> {}",
                    remove_args.from, remove_args.to
                );
            }
        }

        DepCommands::Tree(tree_args) => {
            let conn = rusqlite::Connection::open_with_flags(
                &db_path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .with_context(|| format!("failed to open database: {}", db_path.display()))?;

            run_tree(ctx, &conn, tree_args)?;
        }
    }

    Ok(())
}

struct TreeRow {
    id: String,
    title: String,
    status: String,
    priority: i32,
    depth: i32,
}

/// `dep tree`: walk the dependency graph breadth-first from `id`, in either
/// the "depends on" or (with `--reverse`) "depended on by" direction.
fn run_tree(ctx: &RuntimeContext, conn: &rusqlite::Connection, args: &DepTreeArgs) -> Result<()> {
    use std::collections::{HashSet, VecDeque};

    let (from_col, to_col) = if args.reverse {
        ("depends_on_id", "issue_id")
    } else {
        ("issue_id", "depends_on_id")
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT {to_col} FROM dependencies WHERE {from_col} = ?1 ORDER BY {to_col}"
    ))?;

    let mut rows = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, i32)> = VecDeque::new();
    queue.push_back((args.id.clone(), 0));
    seen.insert(args.id.clone());

    while let Some((current, depth)) = queue.pop_front() {
        if depth > args.max_depth {
            continue;
        }

        let (title, status, priority): (String, String, i32) = conn
            .query_row(
                "SELECT title, status, priority FROM issues WHERE id = ?1",
                rusqlite::params![&current],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap_or_else(|_| ("(unknown)".to_string(), "unknown".to_string(), 2));

        rows.push(TreeRow {
            id: current.clone(),
            title,
            status,
            priority,
            depth,
        });

        if depth == args.max_depth {
            continue;
        }

        let children: Vec<String> = stmt
            .query_map(rusqlite::params![&current], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();

        for child in children {
            if args.all_paths || seen.insert(child.clone()) {
                queue.push_back((child, depth + 1));
            }
        }
    }

    if ctx.json {
        let json_rows: Vec<serde_json::Value> = rows
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "title": r.title,
                    "status": r.status,
                    "priority": r.priority,
                    "depth": r.depth,
                })
            })
            .collect();
        output_json(&serde_json::json!({ "root": args.id, "nodes": json_rows }));
        return Ok(());
    }

    for row in &rows {
        println!(
            "{}{} [{}] P{} {}",
            "  ".repeat(row.depth as usize),
            row.id,
            row.status,
            row.priority,
            row.title
        );
    }

    Ok(())
}
