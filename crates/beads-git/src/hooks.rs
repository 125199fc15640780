//! Managed-block installation for git hooks.
//!
//! Writes a marker-delimited block into each hook script that beads cares
//! about, leaving any surrounding user content untouched. Mirrors the
//! worktree-aware "common dir" lookup used elsewhere in this crate.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::commands::{git_command, GitError};
use crate::gitdir::find_git_root;

/// The current managed-block version. Bumping this causes `list` to report
/// previously-installed blocks as outdated until `install` is re-run.
pub const HOOK_BLOCK_VERSION: u32 = 1;

const BEGIN_PREFIX: &str = "# --- BEGIN BEADS INTEGRATION v";
const BEGIN_SUFFIX: &str = " ---";
const END_MARKER: &str = "# --- END BEADS INTEGRATION ---";

/// Hooks beads installs an integration block into.
pub const MANAGED_HOOKS: &[&str] = &[
    "pre-commit",
    "post-merge",
    "pre-push",
    "post-checkout",
    "prepare-commit-msg",
];

/// Errors that can occur while installing or inspecting hooks.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("not inside a git repository")]
    NotARepo,

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HookError>;

/// How a hook file relates to beads' managed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookState {
    /// No hook file at all.
    Absent,
    /// Contains a versioned managed block.
    Managed { version: u32 },
    /// Contains the pre-versioning inline shim beads used to install.
    LegacyShim,
    /// A hook file beads did not write.
    Foreign,
}

/// One row of `bd hooks list`.
#[derive(Debug, Clone)]
pub struct HookStatus {
    pub name: String,
    pub state: HookState,
    pub outdated: bool,
}

/// Resolve the directory hooks should be installed into.
///
/// Uses `git rev-parse --git-common-dir` so that git worktrees all manage
/// the single shared set of hooks, falling back to a plain filesystem walk
/// if `git` itself is unavailable.
pub fn hooks_dir(start: &Path) -> Result<PathBuf> {
    let repo_root = find_git_root(start).ok_or(HookError::NotARepo)?;
    match git_command(&["rev-parse", "--git-common-dir"], &repo_root) {
        Ok(common_dir) => {
            let common_dir = PathBuf::from(common_dir);
            let common_dir = if common_dir.is_absolute() {
                common_dir
            } else {
                repo_root.join(common_dir)
            };
            Ok(common_dir.join("hooks"))
        }
        Err(e) => Err(e.into()),
    }
}

fn managed_block(hook_name: &str) -> String {
    format!(
        "{BEGIN_PREFIX}{HOOK_BLOCK_VERSION}{BEGIN_SUFFIX}\n\
# This section is managed by beads. Do not remove these markers.\n\
if command -v bd >/dev/null 2>&1; then\n  \
export BD_GIT_HOOK=1\n  \
bd hooks run {hook_name} \"$@\"\n  \
_bd_exit=$?; if [ $_bd_exit -ne 0 ]; then exit $_bd_exit; fi\nfi\n\
{END_MARKER}\n"
    )
}

fn find_block(content: &str) -> Option<(usize, usize, u32)> {
    let begin_idx = content.find(BEGIN_PREFIX)?;
    let after_prefix = &content[begin_idx + BEGIN_PREFIX.len()..];
    let suffix_idx = after_prefix.find(BEGIN_SUFFIX)?;
    let version: u32 = after_prefix[..suffix_idx].trim().parse().ok()?;
    let end_idx = content.find(END_MARKER)?;
    let end = end_idx + END_MARKER.len();
    Some((begin_idx, end, version))
}

/// Classify a hook file's current content.
pub fn classify(content: &str) -> HookState {
    if let Some((_, _, version)) = find_block(content) {
        return HookState::Managed { version };
    }
    if content.contains("bd hooks run") || content.contains("BD_GIT_HOOK") {
        return HookState::LegacyShim;
    }
    HookState::Foreign
}

fn normalize_newlines(content: &str) -> String {
    content.replace("\r\n", "\n")
}

fn chmod_executable(path: &Path) -> Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    let mode = perms.mode();
    perms.set_mode(mode | 0o111);
    fs::set_permissions(path, perms)?;
    Ok(())
}

/// Install the managed block for one hook.
///
/// If `chain` is set and the existing content looks foreign (not absent,
/// not already managed, not a legacy shim), the existing file is renamed to
/// `<name>.old` and the managed block is made to invoke it first.
pub fn install_hook(hooks_dir: &Path, hook_name: &str, chain: bool) -> Result<()> {
    fs::create_dir_all(hooks_dir)?;
    let hook_path = hooks_dir.join(hook_name);
    let existing = fs::read_to_string(&hook_path).unwrap_or_default();
    let existing = normalize_newlines(&existing);

    let new_content = if let Some((start, end, _)) = find_block(&existing) {
        format!("{}{}{}", &existing[..start], managed_block(hook_name), &existing[end..])
    } else if existing.contains("bd hooks run") {
        format!("#!/bin/sh\n{}", managed_block(hook_name))
    } else if existing.trim().is_empty() {
        format!("#!/bin/sh\n{}", managed_block(hook_name))
    } else if chain {
        let old_path = hooks_dir.join(format!("{hook_name}.old"));
        let already_chained = fs::read_to_string(&old_path)
            .map(|c| find_block(&c).is_some())
            .unwrap_or(false);
        if !already_chained {
            fs::write(&old_path, existing.as_bytes())?;
            chmod_executable(&old_path)?;
        }
        format!(
            "#!/bin/sh\nif [ -x \"$(dirname \"$0\")/{hook_name}.old\" ]; then\n  \"$(dirname \"$0\")/{hook_name}.old\" \"$@\" || exit $?\nfi\n{}",
            managed_block(hook_name)
        )
    } else {
        format!("{existing}\n{}", managed_block(hook_name))
    };

    fs::write(&hook_path, new_content.as_bytes())?;
    chmod_executable(&hook_path)?;
    Ok(())
}

/// Strip the managed block from a hook, deleting the file if only a shebang
/// remains.
pub fn uninstall_hook(hooks_dir: &Path, hook_name: &str) -> Result<()> {
    let hook_path = hooks_dir.join(hook_name);
    let Ok(existing) = fs::read_to_string(&hook_path) else {
        return Ok(());
    };
    let existing = normalize_newlines(&existing);

    let Some((start, end, _)) = find_block(&existing) else {
        return Ok(());
    };

    let remainder = format!("{}{}", &existing[..start], &existing[end..]);
    let remainder_trimmed = remainder.trim();
    if remainder_trimmed.is_empty() || remainder_trimmed == "#!/bin/sh" {
        fs::remove_file(&hook_path)?;
    } else {
        fs::write(&hook_path, remainder.as_bytes())?;
    }
    Ok(())
}

/// List the status of every managed hook.
pub fn list_status(hooks_dir: &Path) -> Vec<HookStatus> {
    MANAGED_HOOKS
        .iter()
        .map(|&name| {
            let path = hooks_dir.join(name);
            let state = match fs::read_to_string(&path) {
                Ok(content) => classify(&content),
                Err(_) => HookState::Absent,
            };
            let outdated = matches!(state, HookState::Managed { version } if version != HOOK_BLOCK_VERSION);
            HookStatus {
                name: name.to_string(),
                state,
                outdated,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn install_then_install_is_idempotent() {
        let dir = tempdir().unwrap();
        install_hook(dir.path(), "pre-commit", false).unwrap();
        let first = fs::read_to_string(dir.path().join("pre-commit")).unwrap();
        install_hook(dir.path(), "pre-commit", false).unwrap();
        let second = fs::read_to_string(dir.path().join("pre-commit")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn install_preserves_existing_shebang_content() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("pre-commit"), "#!/bin/sh\necho my-linter\n").unwrap();
        install_hook(dir.path(), "pre-commit", false).unwrap();
        let content = fs::read_to_string(dir.path().join("pre-commit")).unwrap();
        assert!(content.contains("echo my-linter"));
        assert!(content.contains(BEGIN_PREFIX));
    }

    #[test]
    fn uninstall_removes_file_when_only_managed_block_present() {
        let dir = tempdir().unwrap();
        install_hook(dir.path(), "pre-commit", false).unwrap();
        uninstall_hook(dir.path(), "pre-commit").unwrap();
        assert!(!dir.path().join("pre-commit").exists());
    }

    #[test]
    fn uninstall_keeps_user_content() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("pre-commit"), "#!/bin/sh\necho my-linter\n").unwrap();
        install_hook(dir.path(), "pre-commit", false).unwrap();
        uninstall_hook(dir.path(), "pre-commit").unwrap();
        let content = fs::read_to_string(dir.path().join("pre-commit")).unwrap();
        assert!(content.contains("echo my-linter"));
        assert!(!content.contains(BEGIN_PREFIX));
    }

    #[test]
    fn classify_detects_managed_block() {
        let dir = tempdir().unwrap();
        install_hook(dir.path(), "post-merge", false).unwrap();
        let content = fs::read_to_string(dir.path().join("post-merge")).unwrap();
        assert_eq!(classify(&content), HookState::Managed { version: HOOK_BLOCK_VERSION });
    }

    #[test]
    fn list_status_reports_absent_hooks() {
        let dir = tempdir().unwrap();
        let statuses = list_status(dir.path());
        assert_eq!(statuses.len(), MANAGED_HOOKS.len());
        assert!(statuses.iter().all(|s| s.state == HookState::Absent));
    }
}
