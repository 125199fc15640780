//! Command handlers for the `bd` CLI, one module per top-level subcommand.

pub mod backup;
pub mod blocked;
pub mod close;
pub mod compact;
pub mod create;
pub mod dep;
pub mod dolt;
pub mod export;
pub mod flatten;
pub mod gc;
pub mod graph;
pub mod hooks_cmd;
pub mod import;
pub mod init;
pub mod label;
pub mod list;
pub mod migrate;
pub mod ready;
pub mod repo_cmd;
pub mod search;
pub mod show;
pub mod stats;
pub mod update;
