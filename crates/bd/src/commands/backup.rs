//! `bd backup` -- export the full database to a recoverable bundle, and restore from one.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use beads_core::comment::{Comment, Event, Label};
use beads_core::dependency::Dependency;
use beads_core::enums::EventType;
use beads_core::issue::Issue;
use beads_core::jsonl::{read_jsonl, write_jsonl};
use beads_storage::Storage;

use super::export::{load_comments, load_dependencies, load_labels};
use crate::cli::{BackupArgs, BackupCommands, RestoreArgs};
use crate::context::RuntimeContext;
use crate::output::output_json;

/// State persisted alongside a backup bundle so re-running `bd backup` is a
/// no-op when nothing has changed since the last export.
#[derive(Debug, Default, Serialize, Deserialize)]
struct BackupState {
    last_commit: Option<String>,
    last_event_id: i64,
    timestamp: Option<DateTime<Utc>>,
    counts: BackupCounts,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BackupCounts {
    issues: usize,
    dependencies: usize,
    labels: usize,
    events: usize,
    comments: usize,
    config: usize,
}

fn backup_dir(beads_dir: &Path) -> PathBuf {
    beads_dir.join("backup")
}

/// Execute the `bd backup` command.
pub fn run(ctx: &RuntimeContext, args: &BackupArgs) -> Result<()> {
    match &args.command {
        Some(BackupCommands::Restore(restore)) => run_restore(ctx, restore),
        None => run_export(ctx),
    }
}

fn run_export(ctx: &RuntimeContext) -> Result<()> {
    if ctx.readonly {
        bail!("cannot write a backup in read-only mode");
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

    let dir = backup_dir(&beads_dir);
    std::fs::create_dir_all(&dir)?;

    let state_path = dir.join("backup_state.json");
    let previous: BackupState = std::fs::read_to_string(&state_path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default();

    let store = ctx.open_store()?;
    let current_commit = store.get_current_commit().ok();
    if current_commit.is_some() && current_commit == previous.last_commit {
        if !ctx.quiet {
            println!("backup is already up to date at commit {}", current_commit.unwrap());
        }
        return Ok(());
    }
    drop(store);

    let conn = rusqlite::Connection::open_with_flags(
        &db_path,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open database: {}", db_path.display()))?;

    let mut issues = super::export::load_issues_for_backup(&conn)?;
    for issue in &mut issues {
        issue.labels = load_labels(&conn, &issue.id);
        issue.dependencies = load_dependencies(&conn, &issue.id);
        issue.comments = load_comments(&conn, &issue.id);
    }

    let all_deps: Vec<Dependency> = issues.iter().flat_map(|i| i.dependencies.clone()).collect();
    let all_labels: Vec<Label> = issues
        .iter()
        .flat_map(|i| {
            i.labels.iter().map(|l| Label {
                issue_id: i.id.clone(),
                label: l.clone(),
            })
        })
        .collect();
    let all_comments: Vec<Comment> = issues.iter().flat_map(|i| i.comments.clone()).collect();
    let events = load_events(&conn)?;
    let config_rows = load_config_rows(&conn)?;

    write_table(&dir, "issues.jsonl", &issues)?;
    write_table(&dir, "dependencies.jsonl", &all_deps)?;
    write_table(&dir, "labels.jsonl", &all_labels)?;
    write_table(&dir, "events.jsonl", &events)?;
    write_table(&dir, "comments.jsonl", &all_comments)?;
    write_table(&dir, "config.jsonl", &config_rows)?;

    let state = BackupState {
        last_commit: current_commit,
        last_event_id: events.iter().map(|e| e.id).max().unwrap_or(0),
        timestamp: Some(Utc::now()),
        counts: BackupCounts {
            issues: issues.len(),
            dependencies: all_deps.len(),
            labels: all_labels.len(),
            events: events.len(),
            comments: all_comments.len(),
            config: config_rows.len(),
        },
    };
    let state_json = serde_json::to_vec_pretty(&state)?;
    beads_lockfile::atomic_write(&state_path, &state_json)?;

    if ctx.json {
        output_json(&state);
    } else if !ctx.quiet {
        println!(
            "backed up {} issues, {} dependencies, {} labels, {} events, {} comments to {}",
            state.counts.issues,
            state.counts.dependencies,
            state.counts.labels,
            state.counts.events,
            state.counts.comments,
            dir.display()
        );
    }

    Ok(())
}

fn write_table<T: Serialize>(dir: &Path, name: &str, rows: &[T]) -> Result<()> {
    let mut buf: Vec<u8> = Vec::new();
    write_jsonl(&mut buf, rows).with_context(|| format!("failed to encode {name}"))?;
    beads_lockfile::atomic_write(&dir.join(name), &buf)
        .with_context(|| format!("failed to write {name}"))
}

fn load_events(conn: &rusqlite::Connection) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT id, issue_id, event_type, actor, old_value, new_value, comment, created_at \
         FROM events ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let event_type: String = row.get(2)?;
            let created_at: String = row.get(7)?;
            Ok(Event {
                id: row.get(0)?,
                issue_id: row.get(1)?,
                event_type: EventType::from(event_type.as_str()),
                actor: row.get(3)?,
                old_value: row.get(4)?,
                new_value: row.get(5)?,
                comment: row.get(6)?,
                created_at: parse_datetime(&created_at),
            })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

fn load_config_rows(conn: &rusqlite::Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare("SELECT key, value FROM config ORDER BY key")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

fn run_restore(ctx: &RuntimeContext, args: &RestoreArgs) -> Result<()> {
    if ctx.readonly && !args.dry_run {
        bail!("cannot restore a backup in read-only mode");
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

    let dir = args
        .path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| backup_dir(&beads_dir));

    let issues_path = dir.join("issues.jsonl");
    if !issues_path.exists() {
        bail!("no issues.jsonl found in backup bundle at {}", dir.display());
    }

    let mut warnings: Vec<String> = Vec::new();
    let config_rows = read_table::<(String, String)>(&dir.join("config.jsonl"), &mut warnings)?;
    let mut issues = read_table::<Issue>(&issues_path, &mut warnings)?;
    let comments = read_table::<Comment>(&dir.join("comments.jsonl"), &mut warnings)?;
    let deps = read_table::<Dependency>(&dir.join("dependencies.jsonl"), &mut warnings)?;
    let labels = read_table::<Label>(&dir.join("labels.jsonl"), &mut warnings)?;
    let events = read_table::<Event>(&dir.join("events.jsonl"), &mut warnings)?;

    for issue in &mut issues {
        issue.set_defaults();
    }

    if args.dry_run {
        if ctx.json {
            output_json(&serde_json::json!({
                "dry_run": true,
                "issues": issues.len(),
                "comments": comments.len(),
                "dependencies": deps.len(),
                "labels": labels.len(),
                "events": events.len(),
                "config": config_rows.len(),
                "warnings": warnings,
            }));
        } else if !ctx.quiet {
            println!(
                "would restore {} issues, {} comments, {} dependencies, {} labels, {} events ({} warnings)",
                issues.len(),
                comments.len(),
                deps.len(),
                labels.len(),
                events.len(),
                warnings.len()
            );
        }
        return Ok(());
    }

    let mut conn = rusqlite::Connection::open(&db_path)
        .with_context(|| format!("failed to open database: {}", db_path.display()))?;
    let tx = conn.transaction()?;

    let has_prefix: bool = tx
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM config WHERE key = 'issue_prefix')",
            [],
            |row| row.get(0),
        )
        .unwrap_or(false);

    for (key, value) in &config_rows {
        tx.execute(
            "INSERT OR REPLACE INTO config (key, value) VALUES (?1, ?2)",
            rusqlite::params![key, value],
        )?;
    }

    if !has_prefix && !config_rows.iter().any(|(k, _)| k == "issue_prefix") {
        if let Some(first) = issues.first() {
            if let Some((prefix, _)) = first.id.rsplit_once('-') {
                tx.execute(
                    "INSERT OR REPLACE INTO config (key, value) VALUES ('issue_prefix', ?1)",
                    rusqlite::params![prefix],
                )?;
            }
        }
    }

    for issue in &issues {
        insert_issue_ignore(&tx, issue)?;
    }
    for comment in &comments {
        tx.execute(
            "INSERT OR IGNORE INTO comments (id, issue_id, author, text, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                comment.id,
                comment.issue_id,
                comment.author,
                comment.text,
                comment.created_at.to_rfc3339()
            ],
        )?;
    }
    for dep in &deps {
        tx.execute(
            "INSERT OR IGNORE INTO dependencies (issue_id, depends_on_id, type, created_at, created_by, metadata, thread_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                dep.issue_id,
                dep.depends_on_id,
                dep.dep_type.as_str(),
                dep.created_at.to_rfc3339(),
                dep.created_by,
                dep.metadata,
                dep.thread_id
            ],
        )?;
    }
    for label in &labels {
        tx.execute(
            "INSERT OR IGNORE INTO labels (issue_id, label) VALUES (?1, ?2)",
            rusqlite::params![label.issue_id, label.label],
        )?;
    }
    for event in &events {
        tx.execute(
            "INSERT OR IGNORE INTO events (id, issue_id, event_type, actor, old_value, new_value, comment, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                event.id,
                event.issue_id,
                event.event_type.as_str(),
                event.actor,
                event.old_value,
                event.new_value,
                event.comment,
                event.created_at.to_rfc3339()
            ],
        )?;
    }
    tx.commit()?;

    let store = ctx.open_store()?;
    let committed = store.commit(Some("bd backup restore")).unwrap_or(false);

    if ctx.json {
        output_json(&serde_json::json!({
            "issues": issues.len(),
            "comments": comments.len(),
            "dependencies": deps.len(),
            "labels": labels.len(),
            "events": events.len(),
            "config": config_rows.len(),
            "warnings": warnings,
            "committed": committed,
        }));
    } else if !ctx.quiet {
        println!(
            "restored {} issues, {} comments, {} dependencies, {} labels, {} events ({} warnings)",
            issues.len(),
            comments.len(),
            deps.len(),
            labels.len(),
            events.len(),
            warnings.len()
        );
        for w in &warnings {
            eprintln!("warning: {w}");
        }
    }

    Ok(())
}

fn insert_issue_ignore(tx: &rusqlite::Transaction, issue: &Issue) -> Result<()> {
    tx.execute(
        "INSERT OR IGNORE INTO issues (id, title, description, design, acceptance_criteria, notes, \
         status, priority, issue_type, assignee, owner, created_at, created_by, updated_at, \
         closed_at, due_at, defer_until, external_ref, source_repo) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        rusqlite::params![
            issue.id,
            issue.title,
            issue.description,
            issue.design,
            issue.acceptance_criteria,
            issue.notes,
            issue.status.as_str(),
            issue.priority,
            issue.issue_type.as_str(),
            issue.assignee,
            issue.owner,
            issue.created_at.to_rfc3339(),
            issue.created_by,
            issue.updated_at.to_rfc3339(),
            issue.closed_at.map(|t| t.to_rfc3339()),
            issue.due_at.map(|t| t.to_rfc3339()),
            issue.defer_until.map(|t| t.to_rfc3339()),
            issue.external_ref,
            issue.source_repo,
        ],
    )?;
    Ok(())
}

fn read_table<T: serde::de::DeserializeOwned>(
    path: &Path,
    warnings: &mut Vec<String>,
) -> Result<Vec<T>> {
    let Ok(file) = std::fs::File::open(path) else {
        return Ok(Vec::new());
    };
    let reader = std::io::BufReader::with_capacity(1 << 20, file);
    let mut rows = Vec::new();
    for (line_no, result) in read_jsonl::<_, T>(reader).enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => warnings.push(format!("{}:{}: {e}", path.display(), line_no + 1)),
        }
    }
    Ok(rows)
}

/// Parse a datetime string (RFC3339) into a `DateTime<Utc>`.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
