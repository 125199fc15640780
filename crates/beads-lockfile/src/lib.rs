//! File locking and crash-safe writes for the beads system.
//!
//! Provides an atomic write primitive (temp file + fsync + rename) used by
//! backup, migration finalization, and hook installation, plus advisory
//! file locking and PID/port sidecar helpers used by the Dolt server
//! supervisor.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

/// Errors that can occur during locking or atomic-write operations.
#[derive(Debug, Error)]
pub enum LockfileError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The lock is already held by another process.
    #[error("lock already held: {0}")]
    AlreadyLocked(String),
}

/// A specialized `Result` type for lockfile operations.
pub type Result<T> = std::result::Result<T, LockfileError>;

/// Write `contents` to `path` atomically.
///
/// Writes to a sibling temp file in the same directory, fsyncs it, then
/// renames it over `path`. The rename is atomic on the same filesystem, so
/// readers never observe a partially-written file.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let tmp_path = tmp_path_for(path);
    {
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(contents)?;
        tmp_file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tmp".to_string());
    path.with_file_name(format!(".{file_name}.tmp"))
}

/// An advisory, exclusive file lock held for the lifetime of the guard.
///
/// Backed by `fs2`'s cross-platform advisory locking. The lock is released
/// automatically when the guard is dropped.
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquire an exclusive lock on `path`, creating the file if needed.
    ///
    /// Blocks until the lock is available.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Try to acquire an exclusive lock on `path` without blocking.
    ///
    /// Returns [`LockfileError::AlreadyLocked`] if another process holds it.
    pub fn try_acquire(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(path)?;
        file.try_lock_exclusive()
            .map_err(|_| LockfileError::AlreadyLocked(path.display().to_string()))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// The path this lock guards.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Write the current process's PID to `path`, atomically.
pub fn write_pid_file(path: &Path) -> Result<()> {
    let pid = std::process::id();
    atomic_write(path, pid.to_string().as_bytes())
}

/// Read a PID previously written by [`write_pid_file`].
pub fn read_pid_file(path: &Path) -> Result<Option<u32>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents.trim().parse().ok()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Returns `true` if the process recorded in `pid_path` is still alive.
///
/// On Unix, liveness is checked with `kill(pid, 0)`. If no PID file exists,
/// or the PID cannot be parsed, the process is considered not alive.
pub fn pid_file_is_live(pid_path: &Path) -> bool {
    let Ok(Some(pid)) = read_pid_file(pid_path) else {
        return false;
    };
    process_is_alive(pid)
}

#[cfg(unix)]
fn process_is_alive(pid: u32) -> bool {
    // Signal 0 performs no-op validity/permission checks only.
    unsafe { libc_kill(pid as i32, 0) == 0 }
}

#[cfg(not(unix))]
fn process_is_alive(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
extern "C" {
    #[link_name = "kill"]
    fn libc_kill(pid: i32, sig: i32) -> i32;
}

/// Write a port number to `path`, atomically.
pub fn write_port_file(path: &Path, port: u16) -> Result<()> {
    atomic_write(path, port.to_string().as_bytes())
}

/// Read a port number previously written by [`write_port_file`].
pub fn read_port_file(path: &Path) -> Result<Option<u16>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents.trim().parse().ok()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn atomic_write_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");
        atomic_write(&path, b"hello").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn atomic_write_overwrites_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");
        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn file_lock_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lock");
        let lock = FileLock::acquire(&path).unwrap();
        drop(lock);
        // Lock should be re-acquirable after drop.
        let _lock2 = FileLock::try_acquire(&path).unwrap();
    }

    #[test]
    fn pid_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("server.pid");
        write_pid_file(&path).unwrap();
        let pid = read_pid_file(&path).unwrap().unwrap();
        assert_eq!(pid, std::process::id());
        assert!(pid_file_is_live(&path));
    }

    #[test]
    fn port_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("server.port");
        write_port_file(&path, 4201).unwrap();
        assert_eq!(read_port_file(&path).unwrap(), Some(4201));
    }
}
