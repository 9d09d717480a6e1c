//! GitHub REST implementation of the core [`GitHost`] trait.
//!
//! Transport, serialization, and status-to-error mapping are all
//! encapsulated here; the orchestration layer never sees HTTP. The access
//! token and API base URL are constructor inputs, so tests can supply a fake
//! credential or point the client elsewhere.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};

use pr_cannon_core::contract::{
    GitHost, HostError, MergeOutcome, NewPullRequest, PullRequestRecord, RepoId, RepoInfo,
    TreeEntry,
};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("pr-cannon/", env!("CARGO_PKG_VERSION"));

/// Git mode for a regular (non-executable) file blob.
const REGULAR_FILE_MODE: &str = "100644";

pub struct GitHubClient {
    http: Client,
    token: String,
    api_base: String,
}

impl GitHubClient {
    /// Build a client from `GITHUB_TOKEN`. The missing-token failure happens
    /// here, before any file or network work.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN").map_err(|_| {
            anyhow!("GitHub token not found. Please set GITHUB_TOKEN environment variable.")
        })?;
        let client = Self::with_api_base(token, DEFAULT_API_BASE)?;
        info!("initialized GitHub client from environment");
        Ok(client)
    }

    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Explicit token and API base, for tests and GitHub Enterprise hosts.
    pub fn with_api_base(token: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| anyhow!("failed to build HTTP client: {e}"))?;
        Ok(GitHubClient {
            http,
            token: token.into(),
            api_base: api_base.into().trim_end_matches('/').to_owned(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_base, path))
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }

    /// Send a request and map non-success statuses onto [`HostError`].
    async fn execute(&self, rb: RequestBuilder, what: &str) -> Result<Response, HostError> {
        debug!(what, "sending GitHub API request");
        let response = rb.send().await.map_err(|e| transport_error(e, what))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = error_message(response).await;
        error!(what, status = %status, %message, "GitHub API call failed");
        Err(status_error(status, what, message))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        what: &str,
    ) -> Result<T, HostError> {
        let response = self.execute(self.request(Method::GET, path), what).await?;
        decode(response, what).await
    }
}

fn transport_error(e: reqwest::Error, what: &str) -> HostError {
    if e.is_timeout() {
        HostError::Timeout(format!("{what}: {e}"))
    } else {
        HostError::Transport(format!("{what}: {e}"))
    }
}

fn status_error(status: StatusCode, what: &str, message: String) -> HostError {
    match status {
        StatusCode::UNAUTHORIZED => HostError::AuthenticationFailed,
        StatusCode::NOT_FOUND => HostError::NotFound(format!("{what}: {message}")),
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => HostError::Conflict(message),
        other => HostError::Api {
            status: other.as_u16(),
            message,
        },
    }
}

/// GitHub error bodies carry a human-readable `message` field.
async fn error_message(response: Response) -> String {
    response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned))
        .unwrap_or_else(|| "<no error message>".to_owned())
}

async fn decode<T: for<'de> Deserialize<'de>>(
    response: Response,
    what: &str,
) -> Result<T, HostError> {
    response
        .json::<T>()
        .await
        .map_err(|e| HostError::Transport(format!("{what}: invalid response body: {e}")))
}

#[derive(Deserialize)]
struct RepoResponse {
    full_name: String,
    default_branch: String,
}

#[derive(Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Deserialize)]
struct CommitResponse {
    tree: ShaRef,
}

#[derive(Deserialize)]
struct ShaRef {
    sha: String,
}

#[derive(Deserialize)]
struct CreatedSha {
    sha: String,
}

#[derive(Deserialize)]
struct PullResponse {
    number: u64,
    html_url: String,
}

#[derive(Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Deserialize)]
struct MergeResponse {
    merged: bool,
    message: Option<String>,
}

#[async_trait]
impl GitHost for GitHubClient {
    async fn get_repository(&self, repo: &RepoId) -> Result<RepoInfo, HostError> {
        info!(repo = %repo, "fetching repository metadata");
        let path = format!("/repos/{}/{}", repo.owner, repo.name);
        let resp: RepoResponse = self
            .get_json(&path, "get repository")
            .await
            .map_err(|e| match e {
                HostError::NotFound(_) => {
                    HostError::NotFound(format!("Repository not found: {}", repo.full_name()))
                }
                other => other,
            })?;
        Ok(RepoInfo {
            full_name: resp.full_name,
            default_branch: resp.default_branch,
        })
    }

    async fn get_branch_sha(&self, repo: &RepoId, branch: &str) -> Result<String, HostError> {
        let path = format!("/repos/{}/{}/git/ref/heads/{}", repo.owner, repo.name, branch);
        let resp: RefResponse = self.get_json(&path, "get branch ref").await?;
        debug!(branch, sha = %resp.object.sha, "resolved branch ref");
        Ok(resp.object.sha)
    }

    async fn create_branch_ref(
        &self,
        repo: &RepoId,
        branch: &str,
        sha: &str,
    ) -> Result<(), HostError> {
        info!(repo = %repo, branch, sha, "creating branch ref");
        let path = format!("/repos/{}/{}/git/refs", repo.owner, repo.name);
        let body = json!({
            "ref": format!("refs/heads/{branch}"),
            "sha": sha,
        });
        self.execute(
            self.request(Method::POST, &path).json(&body),
            "create branch ref",
        )
        .await?;
        Ok(())
    }

    async fn get_commit_tree(&self, repo: &RepoId, commit_sha: &str) -> Result<String, HostError> {
        let path = format!(
            "/repos/{}/{}/git/commits/{}",
            repo.owner, repo.name, commit_sha
        );
        let resp: CommitResponse = self.get_json(&path, "get commit").await?;
        Ok(resp.tree.sha)
    }

    async fn create_tree(
        &self,
        repo: &RepoId,
        base_tree_sha: &str,
        entries: &[TreeEntry],
    ) -> Result<String, HostError> {
        info!(repo = %repo, entries = entries.len(), "creating tree");
        let path = format!("/repos/{}/{}/git/trees", repo.owner, repo.name);
        let tree: Vec<serde_json::Value> = entries
            .iter()
            .map(|entry| {
                json!({
                    "path": entry.path,
                    "mode": REGULAR_FILE_MODE,
                    "type": "blob",
                    "content": entry.content,
                })
            })
            .collect();
        let body = json!({ "base_tree": base_tree_sha, "tree": tree });
        let response = self
            .execute(self.request(Method::POST, &path).json(&body), "create tree")
            .await?;
        let created: CreatedSha = decode(response, "create tree").await?;
        Ok(created.sha)
    }

    async fn create_commit(
        &self,
        repo: &RepoId,
        message: &str,
        tree_sha: &str,
        parent_sha: &str,
    ) -> Result<String, HostError> {
        info!(repo = %repo, tree_sha, parent_sha, "creating commit");
        let path = format!("/repos/{}/{}/git/commits", repo.owner, repo.name);
        let body = json!({
            "message": message,
            "tree": tree_sha,
            "parents": [parent_sha],
        });
        let response = self
            .execute(
                self.request(Method::POST, &path).json(&body),
                "create commit",
            )
            .await?;
        let created: CreatedSha = decode(response, "create commit").await?;
        Ok(created.sha)
    }

    async fn update_branch_ref(
        &self,
        repo: &RepoId,
        branch: &str,
        sha: &str,
    ) -> Result<(), HostError> {
        info!(repo = %repo, branch, sha, "updating branch ref");
        let path = format!(
            "/repos/{}/{}/git/refs/heads/{}",
            repo.owner, repo.name, branch
        );
        let body = json!({ "sha": sha });
        self.execute(
            self.request(Method::PATCH, &path).json(&body),
            "update branch ref",
        )
        .await?;
        Ok(())
    }

    async fn create_pull_request<'a>(
        &self,
        repo: &RepoId,
        req: NewPullRequest<'a>,
    ) -> Result<PullRequestRecord, HostError> {
        info!(repo = %repo, head = req.head, base = req.base, "opening pull request");
        let path = format!("/repos/{}/{}/pulls", repo.owner, repo.name);
        let body = json!({
            "title": req.title,
            "body": req.body,
            "head": req.head,
            "base": req.base,
        });
        let response = self
            .execute(
                self.request(Method::POST, &path).json(&body),
                "create pull request",
            )
            .await?;
        let pull: PullResponse = decode(response, "create pull request").await?;
        Ok(PullRequestRecord {
            number: pull.number,
            url: pull.html_url,
            head_branch: req.head.to_owned(),
            base_branch: req.base.to_owned(),
        })
    }

    async fn authenticated_user(&self) -> Result<String, HostError> {
        let resp: UserResponse = self.get_json("/user", "get authenticated user").await?;
        debug!(login = %resp.login, "resolved authenticated user");
        Ok(resp.login)
    }

    async fn merge_pull_request(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<MergeOutcome, HostError> {
        info!(repo = %repo, number, "merging pull request");
        let path = format!("/repos/{}/{}/pulls/{}/merge", repo.owner, repo.name, number);
        let rb = self.request(Method::PUT, &path).json(&json!({}));
        let response = rb
            .send()
            .await
            .map_err(|e| transport_error(e, "merge pull request"))?;
        let status = response.status();

        // 405/409 mean the pull request cannot be merged as-is (conflicts,
        // branch protection); that is an expected outcome, not an error.
        if status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::CONFLICT {
            let message = error_message(response).await;
            return Ok(MergeOutcome::NotMergeable(message));
        }
        if !status.is_success() {
            let message = error_message(response).await;
            error!(number, status = %status, %message, "merge request failed");
            return Err(status_error(status, "merge pull request", message));
        }

        let merged: MergeResponse = decode(response, "merge pull request").await?;
        if merged.merged {
            Ok(MergeOutcome::Merged)
        } else {
            Ok(MergeOutcome::NotMergeable(
                merged.message.unwrap_or_else(|| "not merged".to_owned()),
            ))
        }
    }

    async fn delete_branch_ref(&self, repo: &RepoId, branch: &str) -> Result<(), HostError> {
        info!(repo = %repo, branch, "deleting branch ref");
        let path = format!(
            "/repos/{}/{}/git/refs/heads/{}",
            repo.owner, repo.name, branch
        );
        self.execute(self.request(Method::DELETE, &path), "delete branch ref")
            .await?;
        Ok(())
    }
}
