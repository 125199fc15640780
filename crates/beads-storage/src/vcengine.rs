//! Version-control engines backing the `commit`/`push`/`pull`/`flatten`/
//! `compact`/`gc` surface.
//!
//! Two engines are provided: [`GitEngine`] wraps the surrounding git
//! repository (the default for the `sqlite` backend, since the database
//! file itself is versioned inside the repo) and [`DoltEngine`] shells out
//! to the `dolt` CLI for the `dolt` backend. Both are grounded on
//! `beads_git::commands::git_command`'s `Command::new(...).args(...).output()`
//! + stderr-on-failure idiom, with `dolt` substituted for `git`.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Result, StorageError};

/// Operations common to both version-control engines.
pub trait VcEngine: Send + Sync {
    /// Commits pending changes. Returns `false` if nothing changed.
    fn commit(&self, message: Option<&str>) -> Result<bool>;

    /// Pushes to the configured remote.
    fn push(&self, force: bool) -> Result<()>;

    /// Pulls from the configured remote.
    fn pull(&self) -> Result<()>;

    /// Returns the current commit identifier (short hash or equivalent).
    fn get_current_commit(&self) -> Result<String>;

    /// Returns whether a remote is configured.
    fn has_remote(&self) -> Result<bool>;

    /// Squashes all history into a single commit. Irreversible.
    fn flatten(&self) -> Result<()>;

    /// Squashes commits older than `days` while preserving recent ones.
    fn compact(&self, days: i64) -> Result<()>;

    /// Runs the engine's own garbage collector.
    fn gc(&self) -> Result<()>;
}

fn run(binary: &str, args: &[&str], cwd: &Path) -> Result<String> {
    let output = Command::new(binary)
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|e| StorageError::Transient(format!("failed to execute {binary}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(StorageError::Transient(format!(
            "{binary} {} failed: {stderr}",
            args.join(" ")
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

// ---------------------------------------------------------------------------
// GitEngine -- versions the surrounding repository (sqlite backend).
// ---------------------------------------------------------------------------

/// Wraps the git repository that contains the `.beads/` directory.
///
/// Used when `metadata.json` selects the `sqlite` backend: the database
/// lives inside the repository, and "commit"/"push"/"pull" operate on the
/// repository itself via `beads_git::commands::git_command`.
pub struct GitEngine {
    repo_root: PathBuf,
    paths_to_commit: Vec<String>,
}

impl GitEngine {
    /// `repo_root` is the git working directory; `paths_to_commit` are the
    /// paths (relative to `repo_root`) staged on `commit()`.
    pub fn new(repo_root: impl Into<PathBuf>, paths_to_commit: Vec<String>) -> Self {
        Self {
            repo_root: repo_root.into(),
            paths_to_commit,
        }
    }
}

impl VcEngine for GitEngine {
    fn commit(&self, message: Option<&str>) -> Result<bool> {
        let mut args: Vec<&str> = vec!["add"];
        for p in &self.paths_to_commit {
            args.push(p.as_str());
        }
        run("git", &args, &self.repo_root)?;

        let status = run("git", &["status", "--porcelain"], &self.repo_root)?;
        if status.is_empty() {
            return Ok(false);
        }

        let msg = message
            .map(str::to_string)
            .unwrap_or_else(|| "bd: commit pending changes".to_string());
        run("git", &["commit", "-m", &msg], &self.repo_root)?;
        Ok(true)
    }

    fn push(&self, force: bool) -> Result<()> {
        let mut args = vec!["push"];
        if force {
            args.push("--force");
        }
        run("git", &args, &self.repo_root)?;
        Ok(())
    }

    fn pull(&self) -> Result<()> {
        run("git", &["pull"], &self.repo_root)?;
        Ok(())
    }

    fn get_current_commit(&self) -> Result<String> {
        run("git", &["rev-parse", "HEAD"], &self.repo_root)
    }

    fn has_remote(&self) -> Result<bool> {
        let remotes = run("git", &["remote"], &self.repo_root)?;
        Ok(!remotes.trim().is_empty())
    }

    fn flatten(&self) -> Result<()> {
        let root_commit = run("git", &["rev-list", "--max-parents=0", "HEAD"], &self.repo_root)?;
        let root_commit = root_commit.lines().next().unwrap_or_default();
        run(
            "git",
            &["checkout", "-b", "bd-flatten-tmp"],
            &self.repo_root,
        )?;
        run("git", &["reset", "--soft", root_commit], &self.repo_root)?;
        run("git", &["add", "-A"], &self.repo_root)?;
        run(
            "git",
            &[
                "commit",
                "-m",
                "flatten: squash all history into single commit",
            ],
            &self.repo_root,
        )?;
        run(
            "git",
            &["branch", "-M", "bd-flatten-tmp", "main"],
            &self.repo_root,
        )?;
        run("git", &["gc", "--aggressive"], &self.repo_root)?;
        Ok(())
    }

    fn compact(&self, days: i64) -> Result<()> {
        let boundary = run(
            "git",
            &[
                "log",
                "--before",
                &format!("{days} days ago"),
                "-1",
                "--format=%H",
            ],
            &self.repo_root,
        )?;
        if boundary.is_empty() {
            return Ok(());
        }
        // Cherry-pick everything after `boundary` onto a squashed base.
        let commits = run(
            "git",
            &[
                "log",
                "--reverse",
                "--format=%H",
                &format!("{boundary}..HEAD"),
            ],
            &self.repo_root,
        )?;
        run(
            "git",
            &["checkout", "-b", "bd-compact-tmp", &boundary],
            &self.repo_root,
        )?;
        let root_commit = run("git", &["rev-list", "--max-parents=0", "HEAD"], &self.repo_root)?;
        let root_commit = root_commit.lines().next().unwrap_or_default();
        run("git", &["reset", "--soft", root_commit], &self.repo_root)?;
        run(
            "git",
            &["commit", "-m", "compact: squash history older than N days"],
            &self.repo_root,
        )?;
        for commit in commits.lines() {
            run("git", &["cherry-pick", commit], &self.repo_root)?;
        }
        run(
            "git",
            &["branch", "-M", "bd-compact-tmp", "main"],
            &self.repo_root,
        )?;
        run("git", &["gc"], &self.repo_root)?;
        Ok(())
    }

    fn gc(&self) -> Result<()> {
        run("git", &["gc"], &self.repo_root)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DoltEngine -- shells out to the `dolt` CLI (dolt backend).
// ---------------------------------------------------------------------------

/// Wraps a `dolt` database directory, shelling out to the `dolt` binary.
pub struct DoltEngine {
    dolt_dir: PathBuf,
}

impl DoltEngine {
    pub fn new(dolt_dir: impl Into<PathBuf>) -> Self {
        Self {
            dolt_dir: dolt_dir.into(),
        }
    }

    /// Runs a SQL query against the dolt database, returning JSON rows.
    pub fn sql(&self, query: &str) -> Result<String> {
        run(
            "dolt",
            &["sql", "-q", query, "--result-format", "json"],
            &self.dolt_dir,
        )
    }
}

impl VcEngine for DoltEngine {
    fn commit(&self, message: Option<&str>) -> Result<bool> {
        run("dolt", &["add", "-A"], &self.dolt_dir)?;
        let status = run("dolt", &["status", "--porcelain"], &self.dolt_dir)?;
        if status.is_empty() {
            return Ok(false);
        }
        let msg = message
            .map(str::to_string)
            .unwrap_or_else(|| "bd: commit pending changes".to_string());
        run("dolt", &["commit", "-m", &msg], &self.dolt_dir)?;
        Ok(true)
    }

    fn push(&self, force: bool) -> Result<()> {
        let mut args = vec!["push"];
        if force {
            args.push("--force");
        }
        run("dolt", &args, &self.dolt_dir)?;
        Ok(())
    }

    fn pull(&self) -> Result<()> {
        run("dolt", &["pull"], &self.dolt_dir)?;
        Ok(())
    }

    fn get_current_commit(&self) -> Result<String> {
        run(
            "dolt",
            &["sql", "-q", "SELECT hash FROM dolt_log LIMIT 1", "-r", "csv"],
            &self.dolt_dir,
        )
    }

    fn has_remote(&self) -> Result<bool> {
        let remotes = run("dolt", &["remote", "-v"], &self.dolt_dir)?;
        Ok(!remotes.trim().is_empty())
    }

    fn flatten(&self) -> Result<()> {
        run(
            "dolt",
            &["gc"],
            &self.dolt_dir,
        )?;
        Ok(())
    }

    fn compact(&self, _days: i64) -> Result<()> {
        run("dolt", &["gc"], &self.dolt_dir)?;
        Ok(())
    }

    fn gc(&self) -> Result<()> {
        run("dolt", &["gc"], &self.dolt_dir)?;
        Ok(())
    }
}
