//! `bd init` -- initialize a beads database in the current directory.

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use beads_storage::metadata::{save_metadata, Backend, Metadata};
use beads_storage::{SqliteStore, Storage};

use crate::cli::InitArgs;
use crate::context::RuntimeContext;

/// Default gitignore content for the `.beads` directory.
const GITIGNORE_CONTENT: &str = r#"# Beads database files
*.db
*.db-journal
*.db-wal
*.db-shm
dolt/

# Local state
.local_version
interactions.jsonl
"#;

/// Execute the `bd init` command.
pub fn run(ctx: &RuntimeContext, args: &InitArgs) -> Result<()> {
    let cwd = env::current_dir().context("failed to get current directory")?;

    let beads_dir = cwd.join(".beads");

    // Safety guard: check for existing data unless --force
    if !args.force && beads_dir.is_dir() {
        // Check for existing database file
        let db_path = beads_dir.join("beads.db");
        let dolt_path = beads_dir.join("dolt");
        if db_path.exists() || dolt_path.exists() {
            bail!(
                "Found existing database in {}\n\n\
                This workspace is already initialized.\n\n\
                To use the existing database:\n  \
                Just run bd commands normally (e.g., bd list)\n\n\
                To completely reinitialize (data loss warning):\n  \
                rm -rf {} && bd init\n\n\
                Or use --force to re-initialize.",
                beads_dir.display(),
                beads_dir.display()
            );
        }
    }

    // Determine prefix
    let prefix = match &args.prefix {
        Some(p) => p.trim_end_matches('-').to_string(),
        None => {
            // Auto-detect from directory name
            let dir_name = cwd
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "bd".to_string());
            dir_name.trim_end_matches('-').to_string()
        }
    };

    // Create .beads directory
    fs::create_dir_all(&beads_dir)
        .with_context(|| format!("failed to create directory: {}", beads_dir.display()))?;

    // Create .gitignore
    let gitignore_path = beads_dir.join(".gitignore");
    if !gitignore_path.exists() {
        fs::write(&gitignore_path, GITIGNORE_CONTENT).with_context(|| {
            format!("failed to create .gitignore: {}", gitignore_path.display())
        })?;
    }

    // Create metadata.json
    let metadata_path = beads_dir.join("metadata.json");
    if !metadata_path.exists() {
        let backend = match args.backend.as_str() {
            "dolt" => Backend::Dolt,
            "sqlite" => Backend::Sqlite,
            other => bail!("unknown backend '{}': expected 'sqlite' or 'dolt'", other),
        };
        let metadata = Metadata {
            backend,
            database: "beads.db".to_string(),
            jsonl_export: Some("issues.jsonl".to_string()),
            ..Default::default()
        };
        save_metadata(&beads_dir, &metadata).context("failed to create metadata.json")?;

        if matches!(backend, Backend::Dolt) {
            let dolt_dir = beads_dir.join("dolt");
            fs::create_dir_all(&dolt_dir)
                .with_context(|| format!("failed to create directory: {}", dolt_dir.display()))?;
        }
    }

    // Create the SQLite database
    let db_path = beads_dir.join("beads.db");
    create_database(&db_path, &prefix, &ctx.actor)?;

    // Create empty issues.jsonl
    let jsonl_path = beads_dir.join("issues.jsonl");
    if !jsonl_path.exists() {
        fs::write(&jsonl_path, "")
            .with_context(|| format!("failed to create issues.jsonl: {}", jsonl_path.display()))?;
    }

    if !args.quiet {
        println!();
        println!("bd initialized successfully!");
        println!();
        println!("  Database: {}", db_path.display());
        println!("  Issue prefix: {}", prefix);
        println!(
            "  Issues will be named: {}-<hash> (e.g., {}-a3f2dd)",
            prefix, prefix
        );
        println!();
        println!("Run `bd create \"My first issue\"` to get started.");
        println!();
    }

    Ok(())
}

/// Create and initialize the SQLite database with schema and config.
///
/// Schema creation itself is [`SqliteStore::open`]'s job -- it runs the DDL
/// in `beads_storage::sqlite::schema` the first time it sees a fresh file.
/// This just seeds the config/metadata rows specific to a new workspace.
fn create_database(db_path: &PathBuf, prefix: &str, actor: &str) -> Result<()> {
    let store = SqliteStore::open(db_path)
        .with_context(|| format!("failed to create database: {}", db_path.display()))?;

    store.set_config("issue_prefix", prefix)?;

    let conn = rusqlite::Connection::open(db_path)
        .with_context(|| format!("failed to open database: {}", db_path.display()))?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        rusqlite::params!["bd_version", env!("CARGO_PKG_VERSION")],
    )?;

    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        rusqlite::params!["last_import_time", &now],
    )?;

    if !actor.is_empty() {
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            rusqlite::params!["init_actor", actor],
        )?;
    }

    Ok(())
}
