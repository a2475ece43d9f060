//! GitHub git data API client implementing [`ObjectStore`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::classify_response;
use super::types::{
    BlobResponse, CompareResponse, CreateBlobRequest, CreateCommitRequest, CreateTreeItem,
    CreateTreeRequest, GitCommitResponse, MergeRequest, RefResponse, ShaRef, TreeResponse,
    UpdateRefRequest,
};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::store::{
    Blob, BlobEncoding, Comparison, Commit, MergeOutcome, ObjectStore, Result, StoreError,
    TreeListing, TreeUpdate,
};

/// Default GitHub REST API base URL.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// REST API version sent with every request.
pub const GITHUB_API_VERSION: &str = "2022-11-28";

/// Commits requested per compare page.
const COMPARE_PAGE_SIZE: usize = 100;

fn compare_path(base: &str, head: &str, page: usize) -> String {
    format!("compare/{base}...{head}?per_page={COMPARE_PAGE_SIZE}&page={page}")
}

/// One GitHub repository, accessed through the git data API.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct GitHubStore {
    transport: Arc<dyn HttpTransport>,
    api_url: String,
    token: String,
    full_name: String,
}

impl GitHubStore {
    /// Create a store for `owner/repo` authenticated with `token`.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api_url: &str,
        token: impl Into<String>,
        owner: &str,
        repo: &str,
    ) -> Self {
        Self {
            transport,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.into(),
            full_name: format!("{owner}/{repo}"),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}", self.api_url, self.full_name, path)
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(method, self.url(path))
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = request.method;
        let url = request.url.clone();
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| StoreError::network(e.to_string()))?;

        tracing::trace!(
            method = method.as_str(),
            url = %url,
            status = response.status,
            remaining = response.header("x-ratelimit-remaining").unwrap_or("-"),
            "GitHub request"
        );

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, resource: &str) -> Result<T> {
        let response = self.send(self.request(HttpMethod::Get, path)).await?;
        decode(&response, resource)
    }

    async fn send_json<B, T>(&self, method: HttpMethod, path: &str, body: &B, resource: &str) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let request = self
            .request(method, path)
            .json(body)
            .map_err(|e| StoreError::internal(e.to_string()))?;
        let response = self.send(request).await?;
        decode(&response, resource)
    }
}

fn decode<T: DeserializeOwned>(response: &HttpResponse, resource: &str) -> Result<T> {
    if !response.is_success() {
        return Err(classify_response(response, resource));
    }
    serde_json::from_slice(&response.body)
        .map_err(|e| StoreError::decode(format!("{resource}: {e}")))
}

#[async_trait]
impl ObjectStore for GitHubStore {
    fn repository(&self) -> &str {
        &self.full_name
    }

    async fn get_ref(&self, branch: &str) -> Result<String> {
        let response: RefResponse = self
            .get_json(&format!("git/ref/heads/{branch}"), &format!("ref heads/{branch}"))
            .await?;
        Ok(response.object.sha)
    }

    async fn get_commit(&self, sha: &str) -> Result<Commit> {
        let response: GitCommitResponse = self
            .get_json(&format!("git/commits/{sha}"), &format!("commit {sha}"))
            .await?;
        Ok(response.into())
    }

    async fn get_tree(&self, sha: &str, recursive: bool) -> Result<TreeListing> {
        let path = if recursive {
            format!("git/trees/{sha}?recursive=1")
        } else {
            format!("git/trees/{sha}")
        };
        let response: TreeResponse = self.get_json(&path, &format!("tree {sha}")).await?;
        Ok(response.into())
    }

    async fn get_blob(&self, sha: &str) -> Result<Blob> {
        let response: BlobResponse = self
            .get_json(&format!("git/blobs/{sha}"), &format!("blob {sha}"))
            .await?;
        Ok(response.into())
    }

    async fn create_blob(&self, content: &str, encoding: BlobEncoding) -> Result<String> {
        let response: ShaRef = self
            .send_json(
                HttpMethod::Post,
                "git/blobs",
                &CreateBlobRequest { content, encoding },
                "blob",
            )
            .await?;
        Ok(response.sha)
    }

    async fn create_tree(&self, base_tree: Option<&str>, entries: &[TreeUpdate]) -> Result<String> {
        let body = CreateTreeRequest {
            base_tree,
            tree: entries
                .iter()
                .map(|entry| CreateTreeItem {
                    path: &entry.path,
                    mode: &entry.mode,
                    kind: "blob",
                    sha: entry.sha.as_deref(),
                })
                .collect(),
        };
        let response: ShaRef = self
            .send_json(HttpMethod::Post, "git/trees", &body, "tree")
            .await?;
        Ok(response.sha)
    }

    async fn create_commit(&self, message: &str, tree: &str, parents: &[String]) -> Result<String> {
        let body = CreateCommitRequest {
            message,
            tree,
            parents,
        };
        let response: ShaRef = self
            .send_json(HttpMethod::Post, "git/commits", &body, "commit")
            .await?;
        Ok(response.sha)
    }

    async fn update_ref(&self, branch: &str, sha: &str, force: bool) -> Result<()> {
        let _: serde_json::Value = self
            .send_json(
                HttpMethod::Patch,
                &format!("git/refs/heads/{branch}"),
                &UpdateRefRequest { sha, force },
                &format!("ref heads/{branch}"),
            )
            .await?;
        Ok(())
    }

    /// Pages through the comparison until all `total_commits` are listed.
    async fn compare(&self, base: &str, head: &str) -> Result<Comparison> {
        let resource = format!("comparison {base}...{head}");
        let mut page = 1;
        let mut response: CompareResponse =
            self.get_json(&compare_path(base, head, page), &resource).await?;

        while response.commits.len() < response.total_commits {
            page += 1;
            let next: CompareResponse =
                self.get_json(&compare_path(base, head, page), &resource).await?;
            if next.commits.is_empty() {
                break;
            }
            response.commits.extend(next.commits);
        }

        // Callers replay these commits; never hand back a partial list.
        if response.commits.len() < response.total_commits {
            return Err(StoreError::internal(format!(
                "{resource} listed {} of {} commits",
                response.commits.len(),
                response.total_commits
            )));
        }
        Ok(response.into())
    }

    async fn create_merge(&self, base: &str, head: &str, message: &str) -> Result<MergeOutcome> {
        let request = self
            .request(HttpMethod::Post, "merges")
            .json(&MergeRequest {
                base,
                head,
                commit_message: message,
            })
            .map_err(|e| StoreError::internal(e.to_string()))?;
        let response = self.send(request).await?;

        match response.status {
            204 => Ok(MergeOutcome::NothingToMerge),
            409 => Ok(MergeOutcome::Conflict),
            _ => {
                let merged: ShaRef = decode(&response, &format!("merge {head} into {base}"))?;
                Ok(MergeOutcome::Merged { sha: merged.sha })
            }
        }
    }
}
