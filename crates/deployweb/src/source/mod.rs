//! Repository fetching.
//!
//! Clones the caller's repository into a request workspace. The production
//! fetcher shells out to `git`; tests substitute their own implementation of
//! [`RepositoryFetcher`].

mod git;

pub use git::{ssh_to_https, GitError, GitFetcher};

use std::path::Path;

use async_trait::async_trait;

use crate::error::DeployResult;

/// Clones a remote repository into a directory.
#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    /// Clone `url` so that the repository root is `into`.
    ///
    /// Every failure is reported as
    /// [`DeployError::RepositoryUnavailable`](crate::error::DeployError::RepositoryUnavailable)
    /// or [`DeployError::FetchTimeout`](crate::error::DeployError::FetchTimeout).
    async fn fetch(&self, url: &str, into: &Path) -> DeployResult<()>;
}
