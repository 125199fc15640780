//! `bd export` -- write the issue database to a JSONL bundle.

use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use regex::Regex;

use beads_core::dependency::Dependency;
use beads_core::enums::{DependencyType, IssueType, Status};
use beads_core::issue::Issue;

use crate::cli::ExportArgs;
use crate::context::RuntimeContext;

/// Execute the `bd export` command.
pub fn run(ctx: &RuntimeContext, args: &ExportArgs) -> Result<()> {
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

    let conn = rusqlite::Connection::open_with_flags(
        &db_path,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open database: {}", db_path.display()))?;

    let mut issues = load_all_issues(&conn, args.all)?;

    if !args.all && !args.include_infra {
        // Infrastructure issues (messages) are excluded from ordinary exports.
        issues.retain(|i| !matches!(i.issue_type, IssueType::Message));
    }

    if args.scrub {
        let pollution = Regex::new(r"(?i)^(test|benchmark|bench)[-_]").expect("valid regex");
        issues.retain(|i| !pollution.is_match(&i.title));
        for issue in &mut issues {
            issue.assignee.clear();
            issue.owner.clear();
            issue.notes.clear();
        }
    }

    for issue in &mut issues {
        issue.labels = load_labels(&conn, &issue.id);
        issue.dependencies = load_dependencies(&conn, &issue.id);
        issue.comments = load_comments(&conn, &issue.id);
    }

    let mut buf: Vec<u8> = Vec::new();
    beads_core::jsonl::write_jsonl(&mut buf, &issues).context("failed to encode issues as JSONL")?;

    match &args.output {
        Some(path) => {
            beads_lockfile::atomic_write(std::path::Path::new(path), &buf)
                .with_context(|| format!("failed to write {path}"))?;
            if !ctx.quiet {
                println!("exported {} issues to {}", issues.len(), path);
            }
        }
        None => {
            std::io::stdout().write_all(&buf)?;
        }
    }

    Ok(())
}

fn load_all_issues(conn: &rusqlite::Connection, all: bool) -> Result<Vec<Issue>> {
    let where_clause = if all { "" } else { "WHERE status != 'closed'" };
    let sql = format!(
        "SELECT id, title, description, design, acceptance_criteria, notes, \
         status, priority, issue_type, assignee, owner, \
         created_at, created_by, updated_at, closed_at, \
         due_at, defer_until, external_ref \
         FROM issues {} ORDER BY id",
        where_clause
    );

    let mut stmt = conn.prepare(&sql)?;
    let issues = stmt
        .query_map([], |row| {
            let status_str: String = row.get(6)?;
            let type_str: String = row.get(8)?;
            let created_at_str: String = row.get(11)?;
            let updated_at_str: String = row.get(13)?;
            let closed_at_str: Option<String> = row.get(14)?;
            let due_at_str: Option<String> = row.get(15)?;
            let defer_until_str: Option<String> = row.get(16)?;

            Ok(Issue {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get::<_, String>(2).unwrap_or_default(),
                design: row.get::<_, String>(3).unwrap_or_default(),
                acceptance_criteria: row.get::<_, String>(4).unwrap_or_default(),
                notes: row.get::<_, String>(5).unwrap_or_default(),
                status: Status::from(status_str.as_str()),
                priority: row.get(7)?,
                issue_type: IssueType::from(type_str.as_str()),
                assignee: row.get::<_, String>(9).unwrap_or_default(),
                owner: row.get::<_, String>(10).unwrap_or_default(),
                created_at: parse_datetime(&created_at_str),
                created_by: row.get::<_, String>(12).unwrap_or_default(),
                updated_at: parse_datetime(&updated_at_str),
                closed_at: closed_at_str.as_deref().map(parse_datetime),
                due_at: due_at_str.as_deref().map(parse_datetime),
                defer_until: defer_until_str.as_deref().map(parse_datetime),
                external_ref: row.get(17)?,
                ..Issue::default()
            })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(issues)
}

/// Loads every issue row (regardless of status) with its `source_repo`,
/// for use by `bd backup` which exports the full database unconditionally.
pub(crate) fn load_issues_for_backup(conn: &rusqlite::Connection) -> Result<Vec<Issue>> {
    let sql = "SELECT id, title, description, design, acceptance_criteria, notes, \
         status, priority, issue_type, assignee, owner, \
         created_at, created_by, updated_at, closed_at, \
         due_at, defer_until, external_ref, source_repo \
         FROM issues ORDER BY id";

    let mut stmt = conn.prepare(sql)?;
    let issues = stmt
        .query_map([], |row| {
            let status_str: String = row.get(6)?;
            let type_str: String = row.get(8)?;
            let created_at_str: String = row.get(11)?;
            let updated_at_str: String = row.get(13)?;
            let closed_at_str: Option<String> = row.get(14)?;
            let due_at_str: Option<String> = row.get(15)?;
            let defer_until_str: Option<String> = row.get(16)?;

            Ok(Issue {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get::<_, String>(2).unwrap_or_default(),
                design: row.get::<_, String>(3).unwrap_or_default(),
                acceptance_criteria: row.get::<_, String>(4).unwrap_or_default(),
                notes: row.get::<_, String>(5).unwrap_or_default(),
                status: Status::from(status_str.as_str()),
                priority: row.get(7)?,
                issue_type: IssueType::from(type_str.as_str()),
                assignee: row.get::<_, String>(9).unwrap_or_default(),
                owner: row.get::<_, String>(10).unwrap_or_default(),
                created_at: parse_datetime(&created_at_str),
                created_by: row.get::<_, String>(12).unwrap_or_default(),
                updated_at: parse_datetime(&updated_at_str),
                closed_at: closed_at_str.as_deref().map(parse_datetime),
                due_at: due_at_str.as_deref().map(parse_datetime),
                defer_until: defer_until_str.as_deref().map(parse_datetime),
                external_ref: row.get(17)?,
                source_repo: row.get::<_, String>(18).unwrap_or_default(),
                ..Issue::default()
            })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(issues)
}

pub(crate) fn load_labels(conn: &rusqlite::Connection, issue_id: &str) -> Vec<String> {
    conn.prepare("SELECT label FROM labels WHERE issue_id = ?1 ORDER BY label")
        .and_then(|mut stmt| {
            stmt.query_map(rusqlite::params![issue_id], |row| row.get(0))
                .map(|rows| rows.filter_map(|r| r.ok()).collect())
        })
        .unwrap_or_default()
}

pub(crate) fn load_dependencies(conn: &rusqlite::Connection, issue_id: &str) -> Vec<Dependency> {
    conn.prepare(
        "SELECT issue_id, depends_on_id, type, created_at, created_by, metadata, thread_id \
         FROM dependencies WHERE issue_id = ?1",
    )
    .and_then(|mut stmt| {
        stmt.query_map(rusqlite::params![issue_id], |row| {
            let dep_type: String = row.get(2)?;
            let created_at: String = row.get(3)?;
            Ok(Dependency {
                issue_id: row.get(0)?,
                depends_on_id: row.get(1)?,
                dep_type: DependencyType::from(dep_type.as_str()),
                created_at: parse_datetime(&created_at),
                created_by: row.get::<_, String>(4).unwrap_or_default(),
                metadata: row.get::<_, String>(5).unwrap_or_default(),
                thread_id: row.get::<_, String>(6).unwrap_or_default(),
            })
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
    })
    .unwrap_or_default()
}

pub(crate) fn load_comments(
    conn: &rusqlite::Connection,
    issue_id: &str,
) -> Vec<beads_core::comment::Comment> {
    conn.prepare("SELECT id, issue_id, author, text, created_at FROM comments WHERE issue_id = ?1 ORDER BY id")
        .and_then(|mut stmt| {
            stmt.query_map(rusqlite::params![issue_id], |row| {
                let created_at: String = row.get(4)?;
                Ok(beads_core::comment::Comment {
                    id: row.get(0)?,
                    issue_id: row.get(1)?,
                    author: row.get(2)?,
                    text: row.get(3)?,
                    created_at: parse_datetime(&created_at),
                })
            })
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
        })
        .unwrap_or_default()
}

/// Parse a datetime string (RFC3339) into a `DateTime<Utc>`.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
