//! [`VersionedStore`] -- composes a row store with a [`VcEngine`] to
//! implement the full [`Storage`] trait, including the version-control
//! surface the plain [`SqliteStore`] declines by default.

use std::collections::HashMap;
use std::path::Path;

use beads_core::comment::{Comment, Event};
use beads_core::dependency::Dependency;
use beads_core::filter::{IssueFilter, WorkFilter};
use beads_core::issue::Issue;

use crate::error::Result;
use crate::sqlite::SqliteStore;
use crate::traits::{
    BlockedIssue, EpicStatus, IssueUpdates, IssueWithDependencyMetadata, Statistics, Storage,
    Transaction, TreeNode,
};
use crate::vcengine::{GitEngine, VcEngine};

/// A [`Storage`] implementation that pairs row persistence (currently always
/// [`SqliteStore`]) with a pluggable [`VcEngine`] for the version-control
/// surface (`commit`/`push`/`pull`/`flatten`/`compact`/`gc`).
pub struct VersionedStore {
    rows: SqliteStore,
    engine: Box<dyn VcEngine>,
}

impl VersionedStore {
    /// Opens the row store at `<beads_dir>/beads.db` and wraps it with
    /// `engine` for version control.
    pub fn open(beads_dir: &Path, engine: Box<dyn VcEngine>) -> Result<Self> {
        let rows = SqliteStore::open(beads_dir.join("beads.db"))?;
        Ok(Self { rows, engine })
    }

    /// Convenience constructor for the default (`sqlite` backend) case: a
    /// [`GitEngine`] that versions the repository containing `beads_dir`.
    pub fn open_with_git(beads_dir: &Path, repo_root: &Path) -> Result<Self> {
        let relative = beads_dir
            .strip_prefix(repo_root)
            .unwrap_or(beads_dir)
            .to_string_lossy()
            .into_owned();
        let engine = GitEngine::new(repo_root, vec![relative]);
        Self::open(beads_dir, Box::new(engine))
    }

    /// Runs an arbitrary engine operation, useful for `flatten`/`compact`/`gc`
    /// which have no `Storage` trait counterpart beyond `commit`/`push`/`pull`.
    pub fn engine(&self) -> &dyn VcEngine {
        self.engine.as_ref()
    }
}

impl Storage for VersionedStore {
    fn create_issue(&self, issue: &Issue, actor: &str) -> Result<()> {
        self.rows.create_issue(issue, actor)
    }

    fn create_issues(&self, issues: &[Issue], actor: &str) -> Result<()> {
        self.rows.create_issues(issues, actor)
    }

    fn get_issue(&self, id: &str) -> Result<Issue> {
        self.rows.get_issue(id)
    }

    fn get_issue_by_external_ref(&self, external_ref: &str) -> Result<Issue> {
        self.rows.get_issue_by_external_ref(external_ref)
    }

    fn get_issues_by_ids(&self, ids: &[String]) -> Result<Vec<Issue>> {
        self.rows.get_issues_by_ids(ids)
    }

    fn update_issue(&self, id: &str, updates: &IssueUpdates, actor: &str) -> Result<()> {
        self.rows.update_issue(id, updates, actor)
    }

    fn close_issue(&self, id: &str, reason: &str, actor: &str, session: &str) -> Result<()> {
        self.rows.close_issue(id, reason, actor, session)
    }

    fn delete_issue(&self, id: &str) -> Result<()> {
        self.rows.delete_issue(id)
    }

    fn search_issues(&self, query: &str, filter: &IssueFilter) -> Result<Vec<Issue>> {
        self.rows.search_issues(query, filter)
    }

    fn add_dependency(&self, dep: &Dependency, actor: &str) -> Result<()> {
        self.rows.add_dependency(dep, actor)
    }

    fn remove_dependency(&self, issue_id: &str, depends_on_id: &str, actor: &str) -> Result<()> {
        self.rows.remove_dependency(issue_id, depends_on_id, actor)
    }

    fn get_dependencies(&self, issue_id: &str) -> Result<Vec<Issue>> {
        self.rows.get_dependencies(issue_id)
    }

    fn get_dependents(&self, issue_id: &str) -> Result<Vec<Issue>> {
        self.rows.get_dependents(issue_id)
    }

    fn get_dependencies_with_metadata(
        &self,
        issue_id: &str,
    ) -> Result<Vec<IssueWithDependencyMetadata>> {
        self.rows.get_dependencies_with_metadata(issue_id)
    }

    fn get_dependents_with_metadata(
        &self,
        issue_id: &str,
    ) -> Result<Vec<IssueWithDependencyMetadata>> {
        self.rows.get_dependents_with_metadata(issue_id)
    }

    fn get_dependency_tree(
        &self,
        issue_id: &str,
        max_depth: i32,
        show_all_paths: bool,
        reverse: bool,
    ) -> Result<Vec<TreeNode>> {
        self.rows
            .get_dependency_tree(issue_id, max_depth, show_all_paths, reverse)
    }

    fn add_label(&self, issue_id: &str, label: &str, actor: &str) -> Result<()> {
        self.rows.add_label(issue_id, label, actor)
    }

    fn remove_label(&self, issue_id: &str, label: &str, actor: &str) -> Result<()> {
        self.rows.remove_label(issue_id, label, actor)
    }

    fn get_labels(&self, issue_id: &str) -> Result<Vec<String>> {
        self.rows.get_labels(issue_id)
    }

    fn get_issues_by_label(&self, label: &str) -> Result<Vec<Issue>> {
        self.rows.get_issues_by_label(label)
    }

    fn get_ready_work(&self, filter: &WorkFilter) -> Result<Vec<Issue>> {
        self.rows.get_ready_work(filter)
    }

    fn get_blocked_issues(&self, filter: &WorkFilter) -> Result<Vec<BlockedIssue>> {
        self.rows.get_blocked_issues(filter)
    }

    fn get_epics_eligible_for_closure(&self) -> Result<Vec<EpicStatus>> {
        self.rows.get_epics_eligible_for_closure()
    }

    fn add_comment(&self, issue_id: &str, author: &str, text: &str) -> Result<Comment> {
        self.rows.add_comment(issue_id, author, text)
    }

    fn get_comments(&self, issue_id: &str) -> Result<Vec<Comment>> {
        self.rows.get_comments(issue_id)
    }

    fn get_events(&self, issue_id: &str, limit: i32) -> Result<Vec<Event>> {
        self.rows.get_events(issue_id, limit)
    }

    fn get_all_events_since(&self, since_id: i64) -> Result<Vec<Event>> {
        self.rows.get_all_events_since(since_id)
    }

    fn get_statistics(&self) -> Result<Statistics> {
        self.rows.get_statistics()
    }

    fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.rows.set_config(key, value)
    }

    fn get_config(&self, key: &str) -> Result<String> {
        self.rows.get_config(key)
    }

    fn get_all_config(&self) -> Result<HashMap<String, String>> {
        self.rows.get_all_config()
    }

    fn commit(&self, message: Option<&str>) -> Result<bool> {
        self.engine.commit(message)
    }

    fn push(&self, force: bool) -> Result<()> {
        self.engine.push(force)
    }

    fn pull(&self) -> Result<()> {
        self.engine.pull()
    }

    fn get_current_commit(&self) -> Result<String> {
        self.engine.get_current_commit()
    }

    fn has_remote(&self) -> Result<bool> {
        self.engine.has_remote()
    }

    fn run_in_transaction(&self, f: &dyn Fn(&dyn Transaction) -> Result<()>) -> Result<()> {
        self.rows.run_in_transaction(f)
    }

    fn close(&self) -> Result<()> {
        self.rows.close()
    }
}
