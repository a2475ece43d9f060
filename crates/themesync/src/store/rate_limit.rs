use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::retry::RequestExecutor;

use super::errors::Result;
use super::types::{
    Blob, BlobEncoding, Comparison, Commit, MergeOutcome, ObjectStore, TreeListing, TreeUpdate,
};

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default proactive limits (requests per second).
pub mod rate_limits {
    /// GitHub content-creation endpoints tolerate roughly 80 writes/minute
    /// before secondary limits kick in.
    pub const GITHUB_DEFAULT_RPS: u32 = 1;
    /// Shopify Admin REST: 2 requests/second leaky bucket.
    pub const SHOPIFY_DEFAULT_RPS: u32 = 2;
}

/// A standalone API rate limiter using the governor crate.
///
/// # Example
///
/// ```ignore
/// use themesync::store::ApiRateLimiter;
///
/// let limiter = ApiRateLimiter::new(2);
/// limiter.wait().await;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// Create a new rate limiter with the specified requests per second.
    ///
    /// A value of 0 is treated as 1.
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rps));

        Self {
            inner: Arc::new(rate_limiter),
        }
    }

    /// Wait until a request is allowed by the rate limiter.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

/// An `ObjectStore` decorator that runs every call through a
/// [`RequestExecutor`] and, optionally, a proactive [`ApiRateLimiter`].
///
/// # Example
///
/// ```ignore
/// use themesync::retry::{RequestExecutor, RetryConfig};
/// use themesync::store::RateLimitedStore;
///
/// let store = RateLimitedStore::new(github_store, RequestExecutor::new(RetryConfig::default()));
/// let sha = store.get_ref("production").await?;
/// ```
pub struct RateLimitedStore<S> {
    inner: S,
    executor: RequestExecutor,
    limiter: Option<ApiRateLimiter>,
}

impl<S> RateLimitedStore<S> {
    pub fn new(inner: S, executor: RequestExecutor) -> Self {
        Self {
            inner,
            executor,
            limiter: None,
        }
    }

    #[must_use]
    pub fn with_limiter(mut self, limiter: ApiRateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Get a reference to the inner store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn wait(&self) {
        if let Some(ref limiter) = self.limiter {
            limiter.wait().await;
        }
    }
}

impl<S: Clone> Clone for RateLimitedStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            executor: self.executor.clone(),
            limiter: self.limiter.clone(),
        }
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for RateLimitedStore<S> {
    fn repository(&self) -> &str {
        self.inner.repository()
    }

    async fn get_ref(&self, branch: &str) -> Result<String> {
        self.wait().await;
        self.executor
            .execute("get_ref", || self.inner.get_ref(branch))
            .await
    }

    async fn get_commit(&self, sha: &str) -> Result<Commit> {
        self.wait().await;
        self.executor
            .execute("get_commit", || self.inner.get_commit(sha))
            .await
    }

    async fn get_tree(&self, sha: &str, recursive: bool) -> Result<TreeListing> {
        self.wait().await;
        self.executor
            .execute("get_tree", || self.inner.get_tree(sha, recursive))
            .await
    }

    async fn get_blob(&self, sha: &str) -> Result<Blob> {
        self.wait().await;
        self.executor
            .execute("get_blob", || self.inner.get_blob(sha))
            .await
    }

    async fn create_blob(&self, content: &str, encoding: BlobEncoding) -> Result<String> {
        self.wait().await;
        self.executor
            .execute("create_blob", || self.inner.create_blob(content, encoding))
            .await
    }

    async fn create_tree(&self, base_tree: Option<&str>, entries: &[TreeUpdate]) -> Result<String> {
        self.wait().await;
        self.executor
            .execute("create_tree", || self.inner.create_tree(base_tree, entries))
            .await
    }

    async fn create_commit(&self, message: &str, tree: &str, parents: &[String]) -> Result<String> {
        self.wait().await;
        self.executor
            .execute("create_commit", || {
                self.inner.create_commit(message, tree, parents)
            })
            .await
    }

    async fn update_ref(&self, branch: &str, sha: &str, force: bool) -> Result<()> {
        self.wait().await;
        self.executor
            .execute("update_ref", || self.inner.update_ref(branch, sha, force))
            .await
    }

    async fn compare(&self, base: &str, head: &str) -> Result<Comparison> {
        self.wait().await;
        self.executor
            .execute("compare", || self.inner.compare(base, head))
            .await
    }

    async fn create_merge(&self, base: &str, head: &str, message: &str) -> Result<MergeOutcome> {
        self.wait().await;
        self.executor
            .execute("create_merge", || self.inner.create_merge(base, head, message))
            .await
    }
}
