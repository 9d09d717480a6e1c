//! High-level pipeline: branch → tree → commit → ref update → pull request.
//!
//! This module drives one pull-request lifecycle against a [`GitHost`]. The
//! remote multi-step sequence has no native atomicity, so it is modelled as
//! an explicit phase trail; every transition is traced and recorded in the
//! report so a failed run can be diagnosed without replaying remote calls.
//!
//! Failure policy: a failed step aborts the run; earlier remote mutations
//! are left in place rather than rolled back. Merge and branch-deletion
//! problems after a successful pull-request creation are reported as
//! warnings, not errors.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{info, warn};

use crate::content::CollectedFile;
use crate::contract::{
    GitHost, HostError, MergeOutcome, NewPullRequest, PullRequestRecord, RepoId, TreeEntry,
};

/// Name the tool signs commits and pull-request bodies with.
pub const TOOL_NAME: &str = "pr-cannon";

/// Namespace prefix for generated branch names.
pub const BRANCH_NAMESPACE: &str = "pr-cannon";

/// Pull-request bodies enumerate at most this many files before truncating.
const BODY_LIST_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Invalid repository format: {0}. Expected format: owner/repo")]
    InvalidRepoFormat(String),

    #[error("Authentication failed. Please check your GITHUB_TOKEN.")]
    AuthenticationFailed,

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Failed to create branch {branch}: {source}")]
    BranchCreationFailed {
        branch: String,
        #[source]
        source: HostError,
    },

    #[error("Failed to commit files at step '{stage}': {source}")]
    CommitFailed {
        stage: CommitStage,
        #[source]
        source: HostError,
    },

    #[error("Failed to open pull request: {0}")]
    PullRequestCreationFailed(#[source] HostError),

    #[error("Request timed out: {0}")]
    NetworkTimeout(String),

    #[error(transparent)]
    Host(HostError),
}

/// Sub-step of the commit transaction that failed. The branch is still
/// pointed at its base commit in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStage {
    ReadBaseTree,
    CreateTree,
    CreateCommit,
    UpdateRef,
}

impl fmt::Display for CommitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommitStage::ReadBaseTree => "read base tree",
            CommitStage::CreateTree => "create tree",
            CommitStage::CreateCommit => "create commit",
            CommitStage::UpdateRef => "update ref",
        };
        f.write_str(name)
    }
}

/// States one publication run moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    RepoResolved,
    BranchCreated,
    TreeBuilt,
    CommitCreated,
    RefUpdated,
    PrCreated,
    MergeAttempted,
    BranchDeleted,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::RepoResolved => "repo-resolved",
            Phase::BranchCreated => "branch-created",
            Phase::TreeBuilt => "tree-built",
            Phase::CommitCreated => "commit-created",
            Phase::RefUpdated => "ref-updated",
            Phase::PrCreated => "pr-created",
            Phase::MergeAttempted => "merge-attempted",
            Phase::BranchDeleted => "branch-deleted",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// What the caller wants published and how.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Target repository in `owner/name` form.
    pub repo: String,
    /// The loaded file batch; destination paths are assumed validated.
    pub files: Vec<CollectedFile>,
    /// Label woven into generated branch names.
    pub source_label: String,
    /// Explicit branch name; a timestamped one is generated when absent.
    pub branch: Option<String>,
    pub auto_merge: bool,
    pub keep_branch: bool,
}

/// How the optional merge step concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeStatus {
    NotRequested,
    SkippedNotOwner,
    Merged,
    NotMergeable(String),
    Failed(String),
}

/// Everything a run produced, for reporting and audit.
#[derive(Debug)]
pub struct PublishReport {
    pub repo: String,
    pub branch: String,
    pub base_sha: String,
    pub tree_sha: String,
    pub commit_sha: String,
    pub pull_request: PullRequestRecord,
    pub merge: MergeStatus,
    pub branch_deleted: bool,
    pub trail: Vec<Phase>,
}

struct Trail(Vec<Phase>);

impl Trail {
    fn new() -> Self {
        Trail(vec![Phase::Idle])
    }

    fn advance(&mut self, next: Phase) {
        info!(phase = %next, "publish state advanced");
        self.0.push(next);
    }
}

/// Entrypoint: publish the batch as a new branch plus pull request.
pub async fn publish<H>(host: &H, request: &PublishRequest) -> Result<PublishReport, PublishError>
where
    H: GitHost,
{
    let repo_id = parse_repo(&request.repo)?;
    let mut trail = Trail::new();

    info!(repo = %repo_id, files = request.files.len(), "starting publication");
    let repo_info = host
        .get_repository(&repo_id)
        .await
        .map_err(|e| resolve_error(e, &repo_id))?;
    trail.advance(Phase::RepoResolved);

    let branch = match &request.branch {
        Some(name) => name.clone(),
        None => generated_branch_name(&request.source_label, unix_millis()),
    };

    let base_sha = host
        .get_branch_sha(&repo_id, &repo_info.default_branch)
        .await
        .map_err(|e| branch_error(e, &branch))?;
    host.create_branch_ref(&repo_id, &branch, &base_sha)
        .await
        .map_err(|e| branch_error(e, &branch))?;
    trail.advance(Phase::BranchCreated);
    info!(%branch, %base_sha, "created branch at base commit");

    // The tree/commit/ref group is one transaction from the caller's view:
    // any sub-step failure aborts the run with the branch still at base.
    let entries: Vec<TreeEntry> = request
        .files
        .iter()
        .map(|f| TreeEntry {
            path: f.dest_path.clone(),
            content: String::from_utf8_lossy(&f.bytes).into_owned(),
        })
        .collect();

    let base_tree = host
        .get_commit_tree(&repo_id, &base_sha)
        .await
        .map_err(|e| commit_error(e, CommitStage::ReadBaseTree))?;
    let tree_sha = host
        .create_tree(&repo_id, &base_tree, &entries)
        .await
        .map_err(|e| commit_error(e, CommitStage::CreateTree))?;
    trail.advance(Phase::TreeBuilt);

    let dests: Vec<&str> = request.files.iter().map(|f| f.dest_path.as_str()).collect();
    let message = commit_message(&dests);
    let commit_sha = host
        .create_commit(&repo_id, &message, &tree_sha, &base_sha)
        .await
        .map_err(|e| commit_error(e, CommitStage::CreateCommit))?;
    trail.advance(Phase::CommitCreated);

    host.update_branch_ref(&repo_id, &branch, &commit_sha)
        .await
        .map_err(|e| commit_error(e, CommitStage::UpdateRef))?;
    trail.advance(Phase::RefUpdated);
    info!(%branch, %commit_sha, "branch now points at the new commit");

    let body = pull_request_body(&dests);
    let pull_request = host
        .create_pull_request(
            &repo_id,
            NewPullRequest {
                title: &message,
                body: &body,
                head: &branch,
                base: &repo_info.default_branch,
            },
        )
        .await
        .map_err(|e| lift(e, PublishError::PullRequestCreationFailed))?;
    trail.advance(Phase::PrCreated);
    info!(number = pull_request.number, url = %pull_request.url, "pull request opened");

    let mut merge = MergeStatus::NotRequested;
    let mut branch_deleted = false;
    if request.auto_merge {
        merge = attempt_merge(host, &repo_id, &pull_request, &mut trail).await;
        if merge == MergeStatus::Merged && !request.keep_branch {
            match host.delete_branch_ref(&repo_id, &branch).await {
                Ok(()) => {
                    branch_deleted = true;
                    trail.advance(Phase::BranchDeleted);
                    info!(%branch, "deleted merged branch");
                }
                Err(e) => {
                    warn!(%branch, error = %e, "merged, but could not delete branch");
                }
            }
        }
    }

    trail.advance(Phase::Done);
    Ok(PublishReport {
        repo: repo_info.full_name,
        branch,
        base_sha,
        tree_sha,
        commit_sha,
        pull_request,
        merge,
        branch_deleted,
        trail: trail.0,
    })
}

/// The merge step is gated on the authenticated user owning the repository;
/// anything short of a verified owner skips the merge with a warning.
async fn attempt_merge<H>(
    host: &H,
    repo_id: &RepoId,
    pull_request: &PullRequestRecord,
    trail: &mut Trail,
) -> MergeStatus
where
    H: GitHost,
{
    let login = match host.authenticated_user().await {
        Ok(login) => login,
        Err(e) => {
            warn!(error = %e, "auto-merge skipped: could not verify repository ownership");
            return MergeStatus::SkippedNotOwner;
        }
    };
    if !login.eq_ignore_ascii_case(&repo_id.owner) {
        warn!(
            %login,
            owner = %repo_id.owner,
            "auto-merge skipped: authenticated user does not own the repository"
        );
        return MergeStatus::SkippedNotOwner;
    }

    trail.advance(Phase::MergeAttempted);
    match host.merge_pull_request(repo_id, pull_request.number).await {
        Ok(MergeOutcome::Merged) => {
            info!(number = pull_request.number, "pull request merged");
            MergeStatus::Merged
        }
        Ok(MergeOutcome::NotMergeable(reason)) => {
            warn!(
                number = pull_request.number,
                %reason,
                "pull request is not mergeable; leaving it open for manual merge"
            );
            MergeStatus::NotMergeable(reason)
        }
        Err(e) => {
            warn!(number = pull_request.number, error = %e, "merge attempt failed; pull request left open");
            MergeStatus::Failed(e.to_string())
        }
    }
}

/// Parse `owner/name`, rejecting anything else.
pub fn parse_repo(identifier: &str) -> Result<RepoId, PublishError> {
    match identifier.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(RepoId {
                owner: owner.to_owned(),
                name: name.to_owned(),
            })
        }
        _ => Err(PublishError::InvalidRepoFormat(identifier.to_owned())),
    }
}

/// Generated branch names are unique per invocation thanks to the
/// millisecond timestamp; a collision is surfaced, never silently retried.
pub fn generated_branch_name(source_label: &str, timestamp_ms: u128) -> String {
    format!(
        "{}/add-{}-{}",
        BRANCH_NAMESPACE,
        sanitize_ref_component(source_label),
        timestamp_ms
    )
}

/// Keep only characters valid in a git ref-name component.
fn sanitize_ref_component(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    while out.starts_with('.') {
        out.remove(0);
    }
    if out.is_empty() {
        out.push_str("files");
    }
    out
}

/// `Add <name> via pr-cannon` for one file, `Add <N> files via pr-cannon`
/// otherwise. Also used as the pull-request title.
pub fn commit_message(dest_paths: &[&str]) -> String {
    match dest_paths {
        [single] => format!("Add {} via {}", single, TOOL_NAME),
        many => format!("Add {} files via {}", many.len(), TOOL_NAME),
    }
}

/// Fixed Markdown body: singular phrasing for one file, a full enumeration
/// up to ten files, and a truncated enumeration beyond that.
pub fn pull_request_body(dest_paths: &[&str]) -> String {
    let mut body = String::from("## Changes\n\n");
    match dest_paths {
        [single] => {
            body.push_str(&format!("Added `{}`.\n", single));
        }
        many => {
            body.push_str(&format!("Added {} files:\n\n", many.len()));
            for path in many.iter().take(BODY_LIST_LIMIT) {
                body.push_str(&format!("- `{}`\n", path));
            }
            if many.len() > BODY_LIST_LIMIT {
                body.push_str(&format!(
                    "- ... and {} more files\n",
                    many.len() - BODY_LIST_LIMIT
                ));
            }
        }
    }
    body.push_str(&format!("\n---\nDelivered by {}\n", TOOL_NAME));
    body
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Credential rejection and timeouts mean the same thing at every step;
/// everything else is wrapped by the step that observed it.
fn lift<F>(error: HostError, wrap: F) -> PublishError
where
    F: FnOnce(HostError) -> PublishError,
{
    match error {
        HostError::AuthenticationFailed => PublishError::AuthenticationFailed,
        HostError::Timeout(message) => PublishError::NetworkTimeout(message),
        other => wrap(other),
    }
}

fn resolve_error(error: HostError, repo: &RepoId) -> PublishError {
    let full_name = repo.full_name();
    lift(error, move |e| match e {
        HostError::NotFound(_) => PublishError::RepositoryNotFound(full_name),
        other => PublishError::Host(other),
    })
}

fn branch_error(error: HostError, branch: &str) -> PublishError {
    let branch = branch.to_owned();
    lift(error, move |source| PublishError::BranchCreationFailed {
        branch,
        source,
    })
}

fn commit_error(error: HostError, stage: CommitStage) -> PublishError {
    lift(error, move |source| PublishError::CommitFailed {
        stage,
        source,
    })
}
