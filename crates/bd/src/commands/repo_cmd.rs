//! `bd repo` -- manage and sync additional repos hydrated into this database.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use beads_config::config::{load_config, save_config};
use beads_core::issue::Issue;

use crate::cli::{RepoArgs, RepoCommands};
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `bd repo` command.
pub fn run(ctx: &RuntimeContext, args: &RepoArgs) -> Result<()> {
    let beads_dir = ctx
        .resolve_db_path()
        .context("no beads database found. Run 'bd init' to create one.")?;

    match &args.command {
        RepoCommands::Add(add) => add_repo(ctx, &beads_dir, &add.path),
        RepoCommands::Remove(rm) => remove_repo(ctx, &beads_dir, &rm.path),
        RepoCommands::List => list_repos(ctx, &beads_dir),
        RepoCommands::Sync(sync) => sync_repos(ctx, &beads_dir, sync.verbose),
    }
}

fn add_repo(ctx: &RuntimeContext, beads_dir: &Path, path: &str) -> Result<()> {
    if ctx.readonly {
        bail!("cannot modify repo list in read-only mode");
    }
    let mut config = load_config(beads_dir)?;
    if config.repos.primary.is_empty() {
        config.repos.primary = ".".to_string();
    }
    if !config.repos.additional.iter().any(|p| p == path) {
        config.repos.additional.push(path.to_string());
    }
    save_config(beads_dir, &config)?;
    if !ctx.quiet {
        println!("added repo: {path}");
    }
    Ok(())
}

fn remove_repo(ctx: &RuntimeContext, beads_dir: &Path, path: &str) -> Result<()> {
    if ctx.readonly {
        bail!("cannot modify repo list in read-only mode");
    }
    let mut config = load_config(beads_dir)?;
    let before = config.repos.additional.len();
    config.repos.additional.retain(|p| p != path);
    save_config(beads_dir, &config)?;
    if !ctx.quiet {
        if config.repos.additional.len() < before {
            println!("removed repo: {path}");
        } else {
            println!("repo not found in list: {path}");
        }
    }
    Ok(())
}

fn list_repos(ctx: &RuntimeContext, beads_dir: &Path) -> Result<()> {
    let config = load_config(beads_dir)?;
    if ctx.json {
        output_json(&serde_json::json!({
            "primary": config.repos.primary,
            "additional": config.repos.additional,
        }));
        return Ok(());
    }
    println!("primary: {}", if config.repos.primary.is_empty() { "." } else { &config.repos.primary });
    if config.repos.additional.is_empty() {
        println!("additional: (none)");
    } else {
        println!("additional:");
        for repo in &config.repos.additional {
            println!("  {repo}");
        }
    }
    Ok(())
}

/// Cache of per-repo issues.jsonl mtimes, to skip unchanged repos on sync.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SyncCache {
    #[serde(default)]
    mtimes: HashMap<String, i64>,
}

fn sync_cache_path(beads_dir: &Path) -> std::path::PathBuf {
    beads_dir.join("sync_cache.json")
}

fn load_sync_cache(beads_dir: &Path) -> SyncCache {
    std::fs::read_to_string(sync_cache_path(beads_dir))
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn save_sync_cache(beads_dir: &Path, cache: &SyncCache) -> Result<()> {
    let json = serde_json::to_vec_pretty(cache)?;
    beads_lockfile::atomic_write(&sync_cache_path(beads_dir), &json)?;
    Ok(())
}

/// Hydrates issues from `repos.additional` into the primary database.
///
/// For each additional repo: locate its `.beads/issues.jsonl`, skip it if
/// its mtime hasn't changed since the last sync, otherwise read every
/// issue, stamp `source_repo`, and upsert it into the primary store.
fn sync_repos(ctx: &RuntimeContext, beads_dir: &Path, verbose: bool) -> Result<()> {
    if ctx.readonly {
        bail!("cannot sync repos in read-only mode");
    }
    let config = load_config(beads_dir)?;
    if config.repos.additional.is_empty() {
        if !ctx.quiet {
            println!("no additional repos configured");
        }
        return Ok(());
    }

    let db_path = beads_dir.join("beads.db");
    if !db_path.exists() {
        bail!(
            "no beads database found at {}\nHint: run 'bd init' to create a database",
            db_path.display()
        );
    }

    let mut cache = load_sync_cache(beads_dir);
    let mut conn = rusqlite::Connection::open(&db_path)
        .with_context(|| format!("failed to open database: {}", db_path.display()))?;

    let mut synced = 0usize;
    let mut skipped = 0usize;
    let mut errors: Vec<String> = Vec::new();

    for repo in &config.repos.additional {
        let repo_path = Path::new(repo);
        let source_file = repo_path.join(".beads").join("issues.jsonl");
        let mtime = std::fs::metadata(&source_file)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64);

        let Some(mtime) = mtime else {
            errors.push(format!("{repo}: no issues.jsonl found"));
            continue;
        };

        if cache.mtimes.get(repo) == Some(&mtime) {
            skipped += 1;
            if verbose && !ctx.quiet {
                println!("skip {repo}: unchanged");
            }
            continue;
        }

        let file = std::fs::File::open(&source_file)
            .with_context(|| format!("failed to open {}", source_file.display()))?;
        let reader = std::io::BufReader::new(file);

        let tx = conn.transaction()?;
        let mut repo_count = 0usize;
        for result in beads_core::jsonl::read_jsonl::<_, Issue>(reader) {
            let mut issue = match result {
                Ok(issue) => issue,
                Err(e) => {
                    errors.push(format!("{repo}: {e}"));
                    continue;
                }
            };
            issue.set_defaults();
            issue.source_repo = repo.clone();
            // Multi-repo hydration does not enforce this database's own
            // issue_prefix convention on foreign ids.
            upsert_issue(&tx, &issue, &ctx.actor)?;
            repo_count += 1;
        }
        tx.commit()?;

        cache.mtimes.insert(repo.clone(), mtime);
        synced += repo_count;
        if verbose && !ctx.quiet {
            println!("synced {repo}: {repo_count} issues");
        }
    }

    save_sync_cache(beads_dir, &cache)?;

    if ctx.json {
        output_json(&serde_json::json!({
            "synced": synced,
            "skipped": skipped,
            "errors": errors,
        }));
    } else if !ctx.quiet {
        println!("synced {synced} issues from additional repos ({skipped} repos unchanged)");
        for e in &errors {
            eprintln!("warning: {e}");
        }
    }

    Ok(())
}

/// Upserts a single issue row plus its labels/dependencies/comments.
///
/// Returns `true` if an existing row was updated, `false` if a new row was
/// created. Used by both `bd import` and `bd repo sync`, which share the
/// same "re-applying the same bundle is a no-op" upsert contract.
pub(crate) fn upsert_issue(
    tx: &rusqlite::Transaction,
    issue: &Issue,
    actor: &str,
) -> Result<bool> {
    let exists: bool = tx
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM issues WHERE id = ?1)",
            rusqlite::params![issue.id],
            |row| row.get(0),
        )
        .unwrap_or(false);

    if exists {
        tx.execute(
            "UPDATE issues SET title = ?2, description = ?3, design = ?4, \
             acceptance_criteria = ?5, notes = ?6, status = ?7, priority = ?8, \
             issue_type = ?9, assignee = ?10, owner = ?11, updated_at = ?12, \
             closed_at = ?13, due_at = ?14, defer_until = ?15, external_ref = ?16, \
             source_repo = ?17 \
             WHERE id = ?1",
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
                issue.updated_at.to_rfc3339(),
                issue.closed_at.map(|t| t.to_rfc3339()),
                issue.due_at.map(|t| t.to_rfc3339()),
                issue.defer_until.map(|t| t.to_rfc3339()),
                issue.external_ref,
                issue.source_repo,
            ],
        )?;
        tx.execute(
            "INSERT INTO events (issue_id, event_type, actor, created_at) VALUES (?1, 'updated', ?2, ?3)",
            rusqlite::params![issue.id, actor, chrono::Utc::now().to_rfc3339()],
        )?;
    } else {
        tx.execute(
            "INSERT INTO issues (id, title, description, design, acceptance_criteria, notes, \
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
                if issue.created_by.is_empty() { actor } else { &issue.created_by },
                issue.updated_at.to_rfc3339(),
                issue.closed_at.map(|t| t.to_rfc3339()),
                issue.due_at.map(|t| t.to_rfc3339()),
                issue.defer_until.map(|t| t.to_rfc3339()),
                issue.external_ref,
                issue.source_repo,
            ],
        )?;
        tx.execute(
            "INSERT INTO events (issue_id, event_type, actor, created_at) VALUES (?1, 'created', ?2, ?3)",
            rusqlite::params![issue.id, actor, chrono::Utc::now().to_rfc3339()],
        )?;
    }

    tx.execute("DELETE FROM labels WHERE issue_id = ?1", rusqlite::params![issue.id])?;
    for label in &issue.labels {
        tx.execute(
            "INSERT OR IGNORE INTO labels (issue_id, label) VALUES (?1, ?2)",
            rusqlite::params![issue.id, label],
        )?;
    }

    tx.execute(
        "DELETE FROM dependencies WHERE issue_id = ?1",
        rusqlite::params![issue.id],
    )?;
    for dep in &issue.dependencies {
        tx.execute(
            "INSERT OR IGNORE INTO dependencies (issue_id, depends_on_id, type, created_at, created_by, metadata, thread_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                issue.id,
                dep.depends_on_id,
                dep.dep_type.as_str(),
                dep.created_at.to_rfc3339(),
                dep.created_by,
                dep.metadata,
                dep.thread_id,
            ],
        )?;
    }

    if !issue.comments.is_empty() {
        let existing: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM comments WHERE issue_id = ?1",
                rusqlite::params![issue.id],
                |row| row.get(0),
            )
            .unwrap_or(0);
        if existing == 0 {
            for comment in &issue.comments {
                tx.execute(
                    "INSERT INTO comments (issue_id, author, text, created_at) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![
                        issue.id,
                        comment.author,
                        comment.text,
                        comment.created_at.to_rfc3339(),
                    ],
                )?;
            }
        }
    }

    Ok(exists)
}
