//! `.beads/metadata.json` -- selects the storage backend and, for the
//! versioned backend, server connection details.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

/// Which storage backend a beads directory is configured to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Sqlite,
    Dolt,
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Sqlite
    }
}

/// Contents of `.beads/metadata.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub tls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonl_export: Option<String>,
}

fn default_database() -> String {
    "beads.db".to_string()
}

/// Load `metadata.json` from a `.beads/` directory. Missing file yields a
/// default (sqlite) metadata.
pub fn load_metadata(beads_dir: &Path) -> Result<Metadata> {
    let path = beads_dir.join("metadata.json");
    if !path.exists() {
        return Ok(Metadata {
            database: default_database(),
            ..Default::default()
        });
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| StorageError::Internal(format!("failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| StorageError::Internal(format!("failed to parse {}: {e}", path.display())))
}

/// Save `metadata.json` atomically into a `.beads/` directory.
pub fn save_metadata(beads_dir: &Path, metadata: &Metadata) -> Result<()> {
    let path = beads_dir.join("metadata.json");
    let content = serde_json::to_string_pretty(metadata)
        .map_err(|e| StorageError::Internal(format!("failed to serialize metadata.json: {e}")))?;
    beads_lockfile::atomic_write(&path, content.as_bytes())
        .map_err(|e| StorageError::Internal(format!("failed to write {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_metadata_defaults_to_sqlite() {
        let dir = tempdir().unwrap();
        let meta = load_metadata(dir.path()).unwrap();
        assert_eq!(meta.backend, Backend::Sqlite);
        assert_eq!(meta.database, "beads.db");
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let meta = Metadata {
            backend: Backend::Dolt,
            database: "beads".to_string(),
            host: Some("localhost".to_string()),
            port: Some(3306),
            ..Default::default()
        };
        save_metadata(dir.path(), &meta).unwrap();
        let loaded = load_metadata(dir.path()).unwrap();
        assert_eq!(loaded.backend, Backend::Dolt);
        assert_eq!(loaded.host.as_deref(), Some("localhost"));
    }
}
