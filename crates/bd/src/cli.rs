//! Clap CLI definitions for the `bd` command.
//!
//! This module defines the complete CLI structure using clap 4 derive macros.

use clap::{Args, Parser, Subcommand};

/// bd -- Dependency-aware issue tracker.
///
/// Issues chained together like beads. A lightweight issue tracker
/// with first-class dependency support. The database lives inside the
/// repository it tracks.
#[derive(Parser, Debug)]
#[command(
    name = "bd",
    about = "Dependency-aware issue tracker",
    long_about = "Issues chained together like beads. A lightweight issue tracker with first-class dependency support.",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Global flags available to all subcommands.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Database path (default: auto-discover .beads/*.db).
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Actor name for audit trail (default: $BD_ACTOR, git user.name, $USER).
    #[arg(long, global = true, env = "BD_ACTOR")]
    pub actor: Option<String>,

    /// Output in JSON format.
    #[arg(long, global = true)]
    pub json: bool,

    /// Sandbox mode: disable auto-sync.
    #[arg(long, global = true)]
    pub sandbox: bool,

    /// Allow operations on potentially stale data (skip staleness check).
    #[arg(long, global = true)]
    pub allow_stale: bool,

    /// Read-only mode: block write operations (for worker sandboxes).
    #[arg(long, global = true)]
    pub readonly: bool,

    /// Enable verbose/debug output.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output (errors only).
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,
}

/// All available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    // ===== Working With Issues =====
    /// Create a new issue (or multiple issues from markdown file).
    #[command(alias = "new")]
    Create(CreateArgs),

    /// Update issue fields.
    Update(UpdateArgs),

    /// Close one or more issues.
    Close(CloseArgs),

    /// Show issue details.
    #[command(alias = "view")]
    Show(ShowArgs),

    /// List issues.
    List(ListArgs),

    // ===== Views & Reports =====
    /// Show ready work (open, no active blockers).
    Ready(ReadyArgs),

    /// Show blocked issues and what blocks them.
    Blocked(BlockedArgs),

    /// Full-text search across issues.
    Search(SearchArgs),

    /// Show project statistics.
    Stats(StatsArgs),

    /// Display issue dependency graph.
    Graph(GraphArgs),

    // ===== Dependencies & Labels =====
    /// Manage labels on an issue.
    Label(LabelArgs),

    /// Manage dependencies between issues.
    Dep(DepArgs),

    // ===== Setup =====
    /// Initialize bd in the current directory.
    Init(InitArgs),

    // ===== Import / Export / Backup =====
    /// Import issues from a JSONL export.
    Import(ImportArgs),

    /// Export issues to a JSONL bundle.
    Export(ExportArgs),

    /// Back up the beads directory (alias for `export` to the backup location).
    Backup(BackupArgs),

    // ===== Repository Aggregation =====
    /// Manage additional repositories aggregated into this one.
    Repo(RepoArgs),

    // ===== Version Control =====
    /// Dolt-backed version control operations.
    Dolt(DoltArgs),

    /// Remove old version-control history, keeping only the working state.
    Gc(GcArgs),

    /// Squash all version-control history into a single commit.
    Flatten(FlattenArgs),

    /// Squash history older than a threshold while preserving recent commits.
    Compact(CompactArgs),

    // ===== Migration & Hooks =====
    /// Migrate a legacy database to the versioned backend.
    Migrate(MigrateArgs),

    /// Manage git hook integration.
    Hooks(HooksArgs),
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Arguments for `bd create`.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Issue title (positional argument).
    pub title: Option<String>,

    /// Issue title (alternative to positional argument).
    #[arg(long)]
    pub title_flag: Option<String>,

    /// Issue description.
    #[arg(short = 'd', long)]
    pub description: Option<String>,

    /// Issue type (bug|feature|task|epic|chore|decision).
    #[arg(short = 't', long = "type", default_value = "task")]
    pub issue_type: String,

    /// Priority (0-4 or P0-P4).
    #[arg(short = 'p', long, default_value = "2")]
    pub priority: String,

    /// Assignee.
    #[arg(short = 'a', long)]
    pub assignee: Option<String>,

    /// Labels (comma-separated, repeatable).
    #[arg(short = 'l', long = "label", num_args = 1..)]
    pub labels: Vec<String>,

    /// Explicit issue ID (e.g., 'bd-42' for partitioning).
    #[arg(long)]
    pub id: Option<String>,

    /// Parent issue ID for hierarchical child.
    #[arg(long)]
    pub parent: Option<String>,

    /// Preview what would be created without actually creating.
    #[arg(long)]
    pub dry_run: bool,

    /// Output only the issue ID (for scripting).
    #[arg(long)]
    pub silent: bool,

    /// Force creation even if prefix doesn't match.
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// Arguments for `bd update`.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Issue ID to update.
    pub id: String,

    /// New title.
    #[arg(long)]
    pub title: Option<String>,

    /// New description.
    #[arg(short = 'd', long)]
    pub description: Option<String>,

    /// New issue type.
    #[arg(short = 't', long = "type")]
    pub issue_type: Option<String>,

    /// New priority (0-4 or P0-P4).
    #[arg(short = 'p', long)]
    pub priority: Option<String>,

    /// New assignee.
    #[arg(short = 'a', long)]
    pub assignee: Option<String>,

    /// New status.
    #[arg(short = 's', long)]
    pub status: Option<String>,

    /// Add labels.
    #[arg(long = "add-label", num_args = 1..)]
    pub add_labels: Vec<String>,

    /// Remove labels.
    #[arg(long = "remove-label", num_args = 1..)]
    pub remove_labels: Vec<String>,
}

// ---------------------------------------------------------------------------
// Close
// ---------------------------------------------------------------------------

/// Arguments for `bd close`.
#[derive(Args, Debug)]
pub struct CloseArgs {
    /// Issue IDs to close.
    pub ids: Vec<String>,

    /// Reason for closing.
    #[arg(short = 'r', long)]
    pub reason: Option<String>,

    /// Force close pinned issues or unsatisfied gates.
    #[arg(short = 'f', long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Show
// ---------------------------------------------------------------------------

/// Arguments for `bd show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Issue IDs to display.
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Show compact one-line output per issue.
    #[arg(long)]
    pub short: bool,
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// Arguments for `bd list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Filter by status (open, in_progress, blocked, deferred, closed).
    #[arg(short = 's', long)]
    pub status: Option<String>,

    /// Filter by issue type.
    #[arg(short = 't', long = "type")]
    pub issue_type: Option<String>,

    /// Filter by assignee.
    #[arg(short = 'a', long)]
    pub assignee: Option<String>,

    /// Filter by labels (AND: must have ALL).
    #[arg(short = 'l', long = "label", num_args = 1..)]
    pub labels: Vec<String>,

    /// Filter by labels (OR: must have ANY). Comma-separated.
    #[arg(long = "label-any", num_args = 1..)]
    pub label_any: Vec<String>,

    /// Filter by priority (0-4 or P0-P4).
    #[arg(short = 'p', long)]
    pub priority: Option<String>,

    /// Sort by field: priority, created, updated, closed, status, id, title, type, assignee.
    #[arg(long)]
    pub sort: Option<String>,

    /// Reverse sort order.
    #[arg(short = 'r', long)]
    pub reverse: bool,

    /// Limit results (default 50, use 0 for unlimited).
    #[arg(short = 'n', long, default_value = "50")]
    pub limit: i32,

    /// Show all issues including closed.
    #[arg(long)]
    pub all: bool,

    /// Show detailed multi-line output for each issue.
    #[arg(long)]
    pub long: bool,

    /// Display issues in a tree format with status/priority symbols.
    #[arg(long)]
    pub tree: bool,
}

// ---------------------------------------------------------------------------
// Ready
// ---------------------------------------------------------------------------

/// Arguments for `bd ready`.
#[derive(Args, Debug)]
pub struct ReadyArgs {
    /// Sort policy: priority (default), hybrid, oldest.
    #[arg(short = 's', long, default_value = "priority")]
    pub sort: String,

    /// Maximum issues to show.
    #[arg(short = 'n', long, default_value = "10")]
    pub limit: i32,

    /// Filter by assignee.
    #[arg(short = 'a', long)]
    pub assignee: Option<String>,

    /// Filter by labels (AND: must have ALL).
    #[arg(short = 'l', long = "label", num_args = 1..)]
    pub labels: Vec<String>,

    /// Filter by issue type.
    #[arg(short = 't', long = "type")]
    pub issue_type: Option<String>,

    /// Filter by priority.
    #[arg(short = 'p', long)]
    pub priority: Option<i32>,

    /// Show only unassigned issues.
    #[arg(short = 'u', long)]
    pub unassigned: bool,
}

// ---------------------------------------------------------------------------
// Blocked
// ---------------------------------------------------------------------------

/// Arguments for `bd blocked`.
#[derive(Args, Debug)]
pub struct BlockedArgs {
    /// Filter by assignee.
    #[arg(short = 'a', long)]
    pub assignee: Option<String>,

    /// Filter by labels (AND: must have ALL).
    #[arg(short = 'l', long = "label", num_args = 1..)]
    pub labels: Vec<String>,

    /// Maximum issues to show.
    #[arg(short = 'n', long, default_value = "50")]
    pub limit: i32,
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Arguments for `bd search`.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query.
    pub query: String,

    /// Filter by status.
    #[arg(short = 's', long)]
    pub status: Option<String>,

    /// Filter by issue type.
    #[arg(short = 't', long = "type")]
    pub issue_type: Option<String>,

    /// Filter by assignee.
    #[arg(short = 'a', long)]
    pub assignee: Option<String>,

    /// Filter by labels.
    #[arg(short = 'l', long = "label", num_args = 1..)]
    pub labels: Vec<String>,

    /// Limit results.
    #[arg(short = 'n', long, default_value = "50")]
    pub limit: i32,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Arguments for `bd stats`.
#[derive(Args, Debug)]
pub struct StatsArgs {
    // No additional arguments beyond global --json.
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// Arguments for `bd graph`.
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Issue ID to graph (show its dependency subgraph).
    pub id: Option<String>,

    /// Graph all open issues (finds connected components).
    #[arg(long)]
    pub all: bool,
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------

/// Arguments for `bd init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Issue prefix (default: current directory name).
    #[arg(short = 'p', long)]
    pub prefix: Option<String>,

    /// Suppress output.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Backend to use (sqlite or dolt).
    #[arg(long, default_value = "sqlite")]
    pub backend: String,

    /// Re-initialize even if `.beads/` already exists.
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Label
// ---------------------------------------------------------------------------

/// Arguments for `bd label`.
#[derive(Args, Debug)]
pub struct LabelArgs {
    /// Issue ID. Omitted for `list-all`.
    pub id: Option<String>,
    #[command(subcommand)]
    pub command: LabelCommands,
}

/// Label subcommands.
#[derive(Subcommand, Debug)]
pub enum LabelCommands {
    /// Add a label to an issue.
    Add(LabelAddArgs),
    /// Remove a label from an issue.
    Remove(LabelRemoveArgs),
    /// List labels on an issue.
    List,
    /// List every label used across all issues.
    ListAll,
}

/// Arguments for `bd label <id> add`.
#[derive(Args, Debug)]
pub struct LabelAddArgs {
    /// Label to add.
    pub label: String,
}

/// Arguments for `bd label <id> remove`.
#[derive(Args, Debug)]
pub struct LabelRemoveArgs {
    /// Label to remove.
    pub label: String,
}

// ---------------------------------------------------------------------------
// Dep
// ---------------------------------------------------------------------------

/// Arguments for `bd dep`.
#[derive(Args, Debug)]
pub struct DepArgs {
    #[command(subcommand)]
    pub command: DepCommands,
}

/// Dependency subcommands.
#[derive(Subcommand, Debug)]
pub enum DepCommands {
    /// Add a dependency between issues.
    Add(DepAddArgs),
    /// Remove a dependency between issues.
    Remove(DepRemoveArgs),
    /// Show the dependency tree rooted at an issue.
    Tree(DepTreeArgs),
}

/// Arguments for `bd dep add`.
#[derive(Args, Debug)]
pub struct DepAddArgs {
    /// Source issue ID.
    pub from: String,
    /// Target issue ID.
    pub to: String,
    /// Dependency type (blocks, related, parent-child, discovered-from).
    #[arg(short = 't', long = "type", default_value = "blocks")]
    pub dep_type: String,
}

/// Arguments for `bd dep remove`.
#[derive(Args, Debug)]
pub struct DepRemoveArgs {
    /// Source issue ID.
    pub from: String,
    /// Target issue ID.
    pub to: String,
}

/// Arguments for `bd dep tree`.
#[derive(Args, Debug)]
pub struct DepTreeArgs {
    /// Issue ID to root the tree at.
    pub id: String,

    /// Maximum depth to traverse.
    #[arg(long, default_value = "10")]
    pub max_depth: i32,

    /// Show all paths rather than a spanning tree.
    #[arg(long)]
    pub all_paths: bool,

    /// Traverse dependents instead of dependencies.
    #[arg(long)]
    pub reverse: bool,
}

// ---------------------------------------------------------------------------
// Import / Export / Backup
// ---------------------------------------------------------------------------

/// Arguments for `bd import`.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Source JSONL file to import from (default: `.beads/issues.jsonl`).
    pub source: Option<String>,
}

/// Arguments for `bd export`.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output file path (default: `.beads/issues.jsonl`).
    #[arg(short = 'o', long)]
    pub output: Option<String>,

    /// Export every issue, including closed ones.
    #[arg(long)]
    pub all: bool,

    /// Include infrastructure issues normally filtered out of exports.
    #[arg(long)]
    pub include_infra: bool,

    /// Scrub sensitive fields (assignee, owner, notes) from the export.
    #[arg(long)]
    pub scrub: bool,
}

/// Arguments for `bd backup`.
#[derive(Args, Debug)]
pub struct BackupArgs {
    #[command(subcommand)]
    pub command: Option<BackupCommands>,
}

/// Backup subcommands.
#[derive(Subcommand, Debug)]
pub enum BackupCommands {
    /// Restore from a backup bundle.
    Restore(RestoreArgs),
}

/// Arguments for `bd backup restore`.
#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Backup bundle to restore from (default: most recent under `.beads/backup/`).
    pub path: Option<String>,

    /// Show what would be restored without changing anything.
    #[arg(long)]
    pub dry_run: bool,
}

// ---------------------------------------------------------------------------
// Repo
// ---------------------------------------------------------------------------

/// Arguments for `bd repo`.
#[derive(Args, Debug)]
pub struct RepoArgs {
    #[command(subcommand)]
    pub command: RepoCommands,
}

/// Repo subcommands.
#[derive(Subcommand, Debug)]
pub enum RepoCommands {
    /// Add an additional repository to aggregate.
    Add(RepoAddArgs),
    /// Remove an aggregated repository.
    Remove(RepoRemoveArgs),
    /// List aggregated repositories.
    List,
    /// Refresh the aggregated view of all repositories.
    Sync(RepoSyncArgs),
}

/// Arguments for `bd repo add`.
#[derive(Args, Debug)]
pub struct RepoAddArgs {
    /// Path to the repository's beads directory.
    pub path: String,
}

/// Arguments for `bd repo remove`.
#[derive(Args, Debug)]
pub struct RepoRemoveArgs {
    /// Path of the repository to remove.
    pub path: String,
}

/// Arguments for `bd repo sync`.
#[derive(Args, Debug)]
pub struct RepoSyncArgs {
    /// Print per-repository detail while syncing.
    #[arg(long)]
    pub verbose: bool,
}

// ---------------------------------------------------------------------------
// Dolt
// ---------------------------------------------------------------------------

/// Arguments for `bd dolt`.
#[derive(Args, Debug)]
pub struct DoltArgs {
    #[command(subcommand)]
    pub command: DoltCommands,
}

/// Dolt subcommands.
#[derive(Subcommand, Debug)]
pub enum DoltCommands {
    /// Start the local dolt sql-server.
    Start,
    /// Stop the local dolt sql-server.
    Stop,
    /// Show server and database status.
    Status,
    /// Show effective dolt configuration.
    Show,
    /// Set a dolt configuration key.
    Set(DoltSetArgs),
    /// Test connectivity to the configured server.
    Test,
    /// Commit current state.
    Commit(DoltCommitArgs),
    /// Push changes to remote.
    Push(DoltPushArgs),
    /// Pull changes from remote.
    Pull,
}

/// Arguments for `bd dolt set`.
#[derive(Args, Debug)]
pub struct DoltSetArgs {
    /// Configuration key.
    pub key: String,
    /// Configuration value.
    pub value: String,
    /// Also persist the change into the YAML config file.
    #[arg(long)]
    pub update_config: bool,
}

/// Arguments for `bd dolt commit`.
#[derive(Args, Debug)]
pub struct DoltCommitArgs {
    /// Commit message.
    #[arg(short = 'm', long)]
    pub message: Option<String>,
}

/// Arguments for `bd dolt push`.
#[derive(Args, Debug)]
pub struct DoltPushArgs {
    /// Force-push, overwriting the remote's history.
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Gc / Flatten / Compact
// ---------------------------------------------------------------------------

/// Arguments for `bd gc`.
#[derive(Args, Debug)]
pub struct GcArgs {
    /// Show what would be collected without doing it.
    #[arg(long)]
    pub dry_run: bool,

    /// Only collect objects older than this many days.
    #[arg(long)]
    pub older_than: Option<i64>,

    /// Skip priority decay bookkeeping.
    #[arg(long)]
    pub skip_decay: bool,

    /// Skip the underlying dolt/git garbage collector.
    #[arg(long)]
    pub skip_dolt: bool,

    /// Proceed without confirmation.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for `bd flatten`.
#[derive(Args, Debug)]
pub struct FlattenArgs {
    /// Show what would happen without doing it.
    #[arg(long)]
    pub dry_run: bool,

    /// Proceed without confirmation.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for `bd compact`.
#[derive(Args, Debug)]
pub struct CompactArgs {
    /// Show what would happen without doing it.
    #[arg(long)]
    pub dry_run: bool,

    /// Proceed without confirmation.
    #[arg(long)]
    pub force: bool,

    /// Keep commits from the last N days uncompacted.
    #[arg(long, default_value = "30")]
    pub days: i64,
}

// ---------------------------------------------------------------------------
// Migrate
// ---------------------------------------------------------------------------

/// Arguments for `bd migrate`.
///
/// With no subcommand, runs the legacy-database-to-versioned-backend
/// migration engine. `bd migrate hooks` instead reinstalls git hooks to the
/// binary's current version -- an unrelated, lighter-weight operation that
/// happens to share the same verb.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    #[command(subcommand)]
    pub command: Option<MigrateCommands>,

    /// Target backend for the versioned store (sqlite or dolt).
    #[arg(long, default_value = "sqlite")]
    pub target: String,

    /// Show what would happen without writing anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Migrate subcommands.
#[derive(Subcommand, Debug)]
pub enum MigrateCommands {
    /// Reinstall git hooks to the current version.
    Hooks(MigrateHooksArgs),
}

/// Arguments for `bd migrate hooks`.
#[derive(Args, Debug)]
pub struct MigrateHooksArgs {
    /// Git repository to migrate hooks in (default: current repository).
    pub path: Option<String>,

    /// Show what would change without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Output machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// Arguments for `bd hooks`.
#[derive(Args, Debug)]
pub struct HooksArgs {
    #[command(subcommand)]
    pub command: HooksCommands,
}

/// Hooks subcommands.
#[derive(Subcommand, Debug)]
pub enum HooksCommands {
    /// Install beads' managed block into the repository's git hooks.
    Install(HooksInstallArgs),
    /// Remove beads' managed block from the repository's git hooks.
    Uninstall,
    /// List installed hooks and whether beads manages them.
    List,
    /// Run a specific hook's beads-managed logic directly.
    Run(HooksRunArgs),
}

/// Arguments for `bd hooks install`.
#[derive(Args, Debug)]
pub struct HooksInstallArgs {
    /// Overwrite an existing non-beads hook.
    #[arg(long)]
    pub force: bool,

    /// Install into `.git/hooks` even when `core.hooksPath` is shared.
    #[arg(long)]
    pub shared: bool,

    /// Chain onto an existing hook script rather than replacing it.
    #[arg(long)]
    pub chain: bool,

    /// Which hook to install (default: all beads-relevant hooks).
    #[arg(long)]
    pub beads: Option<String>,
}

/// Arguments for `bd hooks run`.
#[derive(Args, Debug)]
pub struct HooksRunArgs {
    /// Hook name to run (e.g. `pre-commit`, `post-merge`).
    pub hook: String,

    /// Arguments forwarded to the hook.
    pub args: Vec<String>,
}
