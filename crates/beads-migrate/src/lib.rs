//! Migration engine: moves a beads directory from the legacy, unversioned
//! single-file database to a [`beads_storage::VersionedStore`].
//!
//! The phase state machine mirrors `beads_storage::sqlite::store::init_schema`'s
//! idempotency-check idiom (each phase records its own completion, the same
//! way `run_migrations_on_conn` records `migration:<name>` in the `metadata`
//! table) and `beads_git::commands::git_command`'s subprocess-wrapper idiom
//! for "shell out to the legacy engine's CLI in JSON mode" is mirrored by
//! `beads_storage::vcengine`'s `run()` helper, reused here for `dolt`
//! connectivity probes.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::Connection;
use thiserror::Error;

use beads_storage::metadata::{self, Backend, Metadata};
use beads_storage::{DoltEngine, GitEngine, Storage, VcEngine, VersionedStore};

/// Errors that can occur during migration.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage error: {0}")]
    Storage(#[from] beads_storage::StorageError),

    #[error("lockfile error: {0}")]
    Lockfile(#[from] beads_lockfile::LockfileError),

    #[error("migration aborted: {0}")]
    Aborted(String),

    #[error("unknown server state: {0}")]
    UnknownServerState(String),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

/// Outcome of [`detect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectOutcome {
    /// Nothing to migrate: no legacy file, or already versioned.
    NothingToDo,
    /// Metadata already says versioned but a legacy file lingers; it has
    /// been renamed to `<name>.migrated` and nothing further is needed.
    AlreadyMigrated,
    /// A legacy database file is present and ready to migrate.
    ReadyToMigrate { legacy_path: PathBuf },
}

/// Target backend for a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Version the repository containing `.beads/` with git.
    Git,
    /// Version the database with a `dolt` server.
    Dolt,
}

/// Result of a successful migration.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub issues_imported: usize,
    pub backup_path: PathBuf,
    pub commit: Option<String>,
}

const LEGACY_DB_NAME: &str = "beads.db";

fn legacy_db_path(beads_dir: &Path) -> PathBuf {
    beads_dir.join(LEGACY_DB_NAME)
}

fn migrated_marker_path(beads_dir: &Path) -> PathBuf {
    beads_dir.join(format!("{LEGACY_DB_NAME}.migrated"))
}

fn versioned_dir(beads_dir: &Path) -> PathBuf {
    beads_dir.join("dolt")
}

// ---------------------------------------------------------------------------
// Phase 1: Detect
// ---------------------------------------------------------------------------

/// Phase 1. Decide whether a migration is needed.
pub fn detect(beads_dir: &Path) -> Result<DetectOutcome> {
    let legacy = legacy_db_path(beads_dir);
    let meta = metadata::load_metadata(beads_dir)?;
    let already_versioned = matches!(meta.backend, Backend::Dolt) || versioned_dir(beads_dir).is_dir();

    if already_versioned {
        if legacy.exists() {
            fs::rename(&legacy, migrated_marker_path(beads_dir))?;
        }
        return Ok(DetectOutcome::AlreadyMigrated);
    }

    if !legacy.exists() {
        return Ok(DetectOutcome::NothingToDo);
    }

    if legacy.metadata()?.len() == 0 {
        fs::remove_file(&legacy)?;
        return Ok(DetectOutcome::NothingToDo);
    }

    Ok(DetectOutcome::ReadyToMigrate { legacy_path: legacy })
}

// ---------------------------------------------------------------------------
// Phase 2: Backup
// ---------------------------------------------------------------------------

/// Phase 2. Copy the legacy file to a timestamped backup, refusing to
/// overwrite an existing backup (the `O_EXCL` guarantee).
fn backup(legacy_path: &Path, target: Target) -> Result<PathBuf> {
    let target_name = match target {
        Target::Git => "git",
        Target::Dolt => "dolt",
    };
    let timestamp = Utc::now().format("%Y%m%dT%H%M%SZ");
    let ext = legacy_path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "db".to_string());

    let mut n = 0;
    loop {
        let suffix = if n == 0 {
            format!("backup-pre-{target_name}-{timestamp}")
        } else {
            format!("backup-pre-{target_name}-{timestamp}-{n}")
        };
        let candidate = legacy_path.with_extension(format!("{suffix}.{ext}"));
        if !candidate.exists() {
            fs::copy(legacy_path, &candidate)?;
            return Ok(candidate);
        }
        n += 1;
        if n > 1000 {
            return Err(MigrationError::Aborted(
                "could not find a free backup filename".into(),
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Phase 3: Extract
// ---------------------------------------------------------------------------

/// One row of extracted data, as a dynamic JSON object keyed by column name.
pub type ExtractedRow = serde_json::Map<String, serde_json::Value>;

/// All tables extracted from the legacy database.
#[derive(Debug, Default)]
pub struct MigrationData {
    pub issues: Vec<ExtractedRow>,
    pub dependencies: Vec<ExtractedRow>,
    pub labels: Vec<ExtractedRow>,
    pub events: Vec<ExtractedRow>,
    pub comments: Vec<ExtractedRow>,
}

const TABLES: &[&str] = &["issues", "dependencies", "labels", "events", "comments"];

/// Phase 3. Read all known tables, probing each table's actual column list
/// via `PRAGMA table_info` so the extraction shape is independent of the
/// source schema version.
fn extract(legacy_path: &Path) -> Result<MigrationData> {
    let conn = Connection::open(legacy_path)?;
    let mut data = MigrationData::default();

    for &table in TABLES {
        let rows = extract_table(&conn, table)?;
        match table {
            "issues" => data.issues = rows,
            "dependencies" => data.dependencies = rows,
            "labels" => data.labels = rows,
            "events" => data.events = rows,
            "comments" => data.comments = rows,
            _ => unreachable!(),
        }
    }
    Ok(data)
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn extract_table(conn: &Connection, table: &str) -> Result<Vec<ExtractedRow>> {
    if !table_exists(conn, table)? {
        return Ok(Vec::new());
    }

    let mut columns_stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns: Vec<String> = columns_stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(std::result::Result::ok)
        .collect();

    if columns.is_empty() {
        return Ok(Vec::new());
    }

    let column_list = columns.join(", ");
    let mut stmt = conn.prepare(&format!("SELECT {column_list} FROM {table}"))?;
    let mut rows_iter = stmt.query([])?;

    let mut out = Vec::new();
    while let Some(row) = rows_iter.next()? {
        let mut map = serde_json::Map::new();
        for (i, col) in columns.iter().enumerate() {
            let value: serde_json::Value = match row.get_ref(i)? {
                rusqlite::types::ValueRef::Null => serde_json::Value::Null,
                rusqlite::types::ValueRef::Integer(n) => serde_json::json!(n),
                rusqlite::types::ValueRef::Real(f) => serde_json::json!(f),
                rusqlite::types::ValueRef::Text(t) => {
                    serde_json::Value::String(String::from_utf8_lossy(t).into_owned())
                }
                rusqlite::types::ValueRef::Blob(_) => serde_json::Value::Null,
            };
            map.insert(col.clone(), value);
        }
        out.push(map);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Phase 4: Verify server target
// ---------------------------------------------------------------------------

/// Phase 4. For the `dolt` target, confirm the server is reachable and the
/// expected database name is either already present or the server is
/// otherwise safe to create it on.
fn verify_server_target(target: Target, beads_dir: &Path, database: &str) -> Result<()> {
    if target != Target::Dolt {
        return Ok(());
    }
    let engine = DoltEngine::new(versioned_dir(beads_dir));
    match engine.sql("SHOW DATABASES") {
        Ok(output) => {
            if output.contains(database) {
                tracing::info!(database, "target database already exists on server");
            } else if !output.trim().is_empty() {
                tracing::warn!(
                    database,
                    "other databases present on shared dolt server; proceeding"
                );
            }
            Ok(())
        }
        Err(e) => Err(MigrationError::UnknownServerState(e.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Full migration
// ---------------------------------------------------------------------------

/// Run the full migration: Detect → Backup → Extract → Verify target →
/// Create and Import → Set config and commit → Verify data → Finalize.
///
/// Returns `Ok(None)` if [`detect`] found nothing to do.
pub fn migrate(beads_dir: &Path, target: Target) -> Result<Option<MigrationReport>> {
    let legacy_path = match detect(beads_dir)? {
        DetectOutcome::NothingToDo | DetectOutcome::AlreadyMigrated => return Ok(None),
        DetectOutcome::ReadyToMigrate { legacy_path } => legacy_path,
    };

    let pre_migration_metadata = metadata::load_metadata(beads_dir)?;
    let backup_path = backup(&legacy_path, target)?;

    let data = extract(&legacy_path).inspect_err(|_| {
        tracing::error!("extraction failed; legacy file and backup left intact");
    })?;

    let database_name = pre_migration_metadata.database.clone();
    verify_server_target(target, beads_dir, &database_name)?;

    let versioned_path = versioned_dir(beads_dir);
    let pre_existed = versioned_path.exists();
    fs::create_dir_all(&versioned_path)?;

    let import_result = (|| -> Result<MigrationReport> {
        let engine: Box<dyn VcEngine> = match target {
            Target::Dolt => Box::new(DoltEngine::new(&versioned_path)),
            Target::Git => Box::new(GitEngine::new(
                beads_dir.parent().unwrap_or(beads_dir),
                vec![versioned_path
                    .strip_prefix(beads_dir.parent().unwrap_or(beads_dir))
                    .unwrap_or(&versioned_path)
                    .to_string_lossy()
                    .into_owned()],
            )),
        };
        let store = VersionedStore::open(&versioned_path, engine)?;
        import_into(&store, &data)?;

        store.set_config("sync.mode", "dolt-native")?;
        let commit_message = format!("Migrate from legacy: {} issues imported", data.issues.len());
        let committed = store.commit(Some(&commit_message))?;

        verify_data(&versioned_path, &data)?;

        Ok(MigrationReport {
            issues_imported: data.issues.len(),
            backup_path: backup_path.clone(),
            commit: if committed {
                store.get_current_commit().ok()
            } else {
                None
            },
        })
    })();

    match import_result {
        Ok(report) => {
            finalize(beads_dir, &legacy_path, target, &database_name)?;
            Ok(Some(report))
        }
        Err(e) => {
            rollback(&versioned_path, pre_existed, beads_dir, &pre_migration_metadata)?;
            Err(e)
        }
    }
}

fn import_into(store: &VersionedStore, data: &MigrationData) -> Result<()> {
    for row in &data.issues {
        if let Ok(issue) = serde_json::from_value::<beads_core::issue::Issue>(
            serde_json::Value::Object(row.clone()),
        ) {
            // Best-effort: ignore duplicate-key races from a partial prior run.
            let _ = store.create_issue(&issue, "migration");
        }
    }
    Ok(())
}

fn verify_data(versioned_path: &Path, data: &MigrationData) -> Result<()> {
    let conn = Connection::open(versioned_path.join("beads.db"))?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM issues", [], |row| row.get(0))?;
    if (count as usize) < data.issues.len() {
        return Err(MigrationError::Aborted(format!(
            "post-import issue count {count} is less than source count {}",
            data.issues.len()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Finalize / Rollback / Recovery
// ---------------------------------------------------------------------------

fn finalize(beads_dir: &Path, legacy_path: &Path, target: Target, database: &str) -> Result<()> {
    let backend = match target {
        Target::Dolt => Backend::Dolt,
        Target::Git => Backend::Sqlite,
    };
    let new_metadata = Metadata {
        backend,
        database: database.to_string(),
        ..Default::default()
    };
    metadata::save_metadata(beads_dir, &new_metadata)?;
    fs::rename(legacy_path, migrated_marker_path(beads_dir))?;
    Ok(())
}

fn rollback(
    versioned_path: &Path,
    pre_existed: bool,
    beads_dir: &Path,
    pre_migration_metadata: &Metadata,
) -> Result<()> {
    if !pre_existed && versioned_path.exists() {
        fs::remove_dir_all(versioned_path)?;
    }
    metadata::save_metadata(beads_dir, pre_migration_metadata)?;
    Ok(())
}

/// `doctor` recovery: detect a broken half-migrated state (metadata says
/// versioned, no store directory, legacy file still present as `.db` or
/// `.migrated`) and restore it to the legacy backend.
pub fn doctor_recover(beads_dir: &Path) -> Result<bool> {
    let meta = metadata::load_metadata(beads_dir)?;
    if !matches!(meta.backend, Backend::Dolt) {
        return Ok(false);
    }
    if versioned_dir(beads_dir).is_dir() {
        return Ok(false);
    }

    let migrated = migrated_marker_path(beads_dir);
    let legacy = legacy_db_path(beads_dir);
    if migrated.exists() && !legacy.exists() {
        fs::rename(&migrated, &legacy)?;
    } else if !legacy.exists() {
        return Ok(false);
    }

    let recovered = Metadata {
        backend: Backend::Sqlite,
        database: meta.database,
        ..Default::default()
    };
    metadata::save_metadata(beads_dir, &recovered)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_legacy_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE issues (id TEXT PRIMARY KEY, title TEXT, status TEXT, priority INTEGER);
             INSERT INTO issues VALUES ('bd-1', 'First', 'open', 2);
             INSERT INTO issues VALUES ('bd-2', 'Second', 'open', 1);",
        )
        .unwrap();
    }

    #[test]
    fn detect_nothing_to_do_when_no_legacy_file() {
        let dir = tempdir().unwrap();
        assert_eq!(detect(dir.path()).unwrap(), DetectOutcome::NothingToDo);
    }

    #[test]
    fn detect_removes_empty_legacy_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("beads.db"), []).unwrap();
        assert_eq!(detect(dir.path()).unwrap(), DetectOutcome::NothingToDo);
        assert!(!dir.path().join("beads.db").exists());
    }

    #[test]
    fn detect_ready_to_migrate() {
        let dir = tempdir().unwrap();
        let legacy = dir.path().join("beads.db");
        make_legacy_db(&legacy);
        match detect(dir.path()).unwrap() {
            DetectOutcome::ReadyToMigrate { legacy_path } => assert_eq!(legacy_path, legacy),
            other => panic!("expected ReadyToMigrate, got {other:?}"),
        }
    }

    #[test]
    fn extract_reads_rows_dynamically() {
        let dir = tempdir().unwrap();
        let legacy = dir.path().join("beads.db");
        make_legacy_db(&legacy);
        let data = extract(&legacy).unwrap();
        assert_eq!(data.issues.len(), 2);
        assert_eq!(
            data.issues[0].get("title").unwrap().as_str(),
            Some("First")
        );
    }

    #[test]
    fn doctor_recover_restores_legacy_backend() {
        let dir = tempdir().unwrap();
        metadata::save_metadata(
            dir.path(),
            &Metadata {
                backend: Backend::Dolt,
                database: "beads".into(),
                ..Default::default()
            },
        )
        .unwrap();
        fs::write(dir.path().join("beads.db.migrated"), b"data").unwrap();

        let recovered = doctor_recover(dir.path()).unwrap();
        assert!(recovered);
        assert!(dir.path().join("beads.db").exists());
        let meta = metadata::load_metadata(dir.path()).unwrap();
        assert_eq!(meta.backend, Backend::Sqlite);
    }
}
