//! # contract: the remote hosting capability boundary
//!
//! This module defines a single trait ([`GitHost`]) and the supporting value
//! types for the narrow set of remote operations the publisher needs:
//! repository lookup, reference reads and writes, tree and commit creation,
//! pull-request creation, the owner check, merge, and reference deletion.
//!
//! ## Interface & Extensibility
//! - Implement [`GitHost`] to target a hosting provider (the CLI crate ships
//!   a GitHub REST implementation).
//! - All methods are async and return [`HostError`], which separates
//!   credential rejection, missing resources, conflict-class rejections, and
//!   timeouts so callers can give distinct user guidance.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`, so consumers can generate
//!   deterministic mocks for unit and integration tests.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use mockall::automock;

/// Repository coordinates in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Repository metadata returned by the host.
#[derive(Debug, Clone)]
pub struct RepoInfo {
    /// Canonical `owner/name` as the host reports it.
    pub full_name: String,
    /// Name of the branch new work is based on and merged back into.
    pub default_branch: String,
}

/// One file to be written at commit time. Entries become regular files; the
/// wire-level mode is a provider detail supplied by the client layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub content: String,
}

/// The minimal data needed to open a pull request.
pub struct NewPullRequest<'a> {
    pub title: &'a str,
    pub body: &'a str,
    /// Branch carrying the new commit.
    pub head: &'a str,
    /// Branch the pull request targets.
    pub base: &'a str,
}

/// A created pull request.
#[derive(Debug, Clone)]
pub struct PullRequestRecord {
    pub number: u64,
    pub url: String,
    pub head_branch: String,
    pub base_branch: String,
}

/// Outcome of a merge attempt. A conflict is an expected result the caller
/// reports and stops on, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged,
    NotMergeable(String),
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Authentication failed: the access token was rejected")]
    AuthenticationFailed,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rejected by host: {0}")]
    Conflict(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Host API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

/// The remote operations the publisher is allowed to perform.
///
/// Implementations connect to a real hosting API; tests use the generated
/// `MockGitHost`. Calls are strictly sequential from the publisher's side:
/// each step's output is required input to the next.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait GitHost: Send + Sync {
    /// Fetch repository metadata (canonical name, default branch).
    async fn get_repository(&self, repo: &RepoId) -> Result<RepoInfo, HostError>;

    /// Read the commit SHA a branch currently points at.
    async fn get_branch_sha(&self, repo: &RepoId, branch: &str) -> Result<String, HostError>;

    /// Create `refs/heads/<branch>` pointing at `sha`.
    async fn create_branch_ref(
        &self,
        repo: &RepoId,
        branch: &str,
        sha: &str,
    ) -> Result<(), HostError>;

    /// Read the tree SHA of a commit.
    async fn get_commit_tree(&self, repo: &RepoId, commit_sha: &str) -> Result<String, HostError>;

    /// Create a tree layered on `base_tree_sha`, carrying unmodified entries
    /// forward. Returns the new tree SHA.
    async fn create_tree(
        &self,
        repo: &RepoId,
        base_tree_sha: &str,
        entries: &[TreeEntry],
    ) -> Result<String, HostError>;

    /// Create a commit for `tree_sha` with a single parent. Returns the new
    /// commit SHA.
    async fn create_commit(
        &self,
        repo: &RepoId,
        message: &str,
        tree_sha: &str,
        parent_sha: &str,
    ) -> Result<String, HostError>;

    /// Repoint `refs/heads/<branch>` at `sha`.
    async fn update_branch_ref(
        &self,
        repo: &RepoId,
        branch: &str,
        sha: &str,
    ) -> Result<(), HostError>;

    /// Open a pull request.
    async fn create_pull_request<'a>(
        &self,
        repo: &RepoId,
        req: NewPullRequest<'a>,
    ) -> Result<PullRequestRecord, HostError>;

    /// Login of the user the credential authenticates as.
    async fn authenticated_user(&self) -> Result<String, HostError>;

    /// Merge a pull request. Conflicts come back as
    /// [`MergeOutcome::NotMergeable`], not as an error.
    async fn merge_pull_request(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<MergeOutcome, HostError>;

    /// Delete `refs/heads/<branch>`.
    async fn delete_branch_ref(&self, repo: &RepoId, branch: &str) -> Result<(), HostError>;
}
