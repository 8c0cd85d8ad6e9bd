//! Git clone via the `git` binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::RepositoryFetcher;
use crate::config::GitConfig;
use crate::error::{DeployError, DeployResult};

/// Schemes accepted for repository URLs.
const ALLOWED_SCHEMES: &[&str] = &["https", "http"];

/// Reported by git when a dumb HTTP server is asked for a shallow clone.
const SHALLOW_UNSUPPORTED: &str = "does not support shallow";

/// Error type for git operations.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("invalid repository url: {0}")]
    InvalidUrl(String),

    #[error("unsupported url scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("git clone failed: {0}")]
    CloneFailed(String),

    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Convert SSH-style git URLs to HTTPS URLs.
///
/// Examples:
/// - `git@github.com:user/repo.git` -> `https://github.com/user/repo.git`
/// - `ssh://git@github.com/user/repo.git` -> `https://github.com/user/repo.git`
/// - `https://github.com/user/repo.git` -> unchanged
#[must_use]
pub fn ssh_to_https(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("git@") {
        if let Some(colon_pos) = rest.find(':') {
            let host = &rest[..colon_pos];
            let path = &rest[colon_pos + 1..];
            return format!("https://{host}/{path}");
        }
    }

    if let Some(rest) = url.strip_prefix("ssh://git@") {
        return format!("https://{rest}");
    }

    url.to_owned()
}

/// Parse and check a caller-supplied repository URL.
fn parse_repository_url(raw: &str) -> Result<Url, GitError> {
    let candidate = ssh_to_https(raw.trim());
    if candidate.starts_with('-') {
        return Err(GitError::InvalidUrl(candidate));
    }

    let url = Url::parse(&candidate)
        .map_err(|e| GitError::InvalidUrl(format!("{candidate}: {e}")))?;
    if !ALLOWED_SCHEMES.contains(&url.scheme()) {
        return Err(GitError::UnsupportedScheme(url.scheme().to_owned()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(GitError::InvalidUrl(format!("{candidate}: missing host")));
    }

    Ok(url)
}

/// URL safe to log: credentials stripped.
fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    let _ = url.set_password(None);
    let _ = url.set_username("");
    url.to_string()
}

/// Clones repositories with the `git` command line tool.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    binary: PathBuf,
    depth: u32,
    timeout: Duration,
}

impl GitFetcher {
    /// Create a fetcher from configuration.
    #[must_use]
    pub fn new(config: &GitConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            depth: config.depth,
            timeout: config.timeout(),
        }
    }

    /// Clone at the configured depth, falling back to full history when the
    /// server cannot serve shallow clones.
    async fn clone_into(&self, url: &Url, target_dir: &Path) -> Result<(), GitError> {
        match self.run_clone(url, target_dir, self.depth).await {
            Err(GitError::CloneFailed(stderr))
                if self.depth > 0 && stderr.contains(SHALLOW_UNSUPPORTED) =>
            {
                debug!("server cannot serve shallow clones, retrying with full history");
                clear_dir(target_dir).await.map_err(|e| {
                    GitError::CloneFailed(format!("failed to reset clone directory: {e}"))
                })?;
                self.run_clone(url, target_dir, 0).await
            }
            other => other,
        }
    }

    async fn run_clone(&self, url: &Url, target_dir: &Path, depth: u32) -> Result<(), GitError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-c")
            .arg(format!("safe.directory={}", target_dir.display()))
            .arg("clone")
            .arg("--quiet")
            .arg("--no-tags");
        if depth > 0 {
            cmd.arg("--depth").arg(depth.to_string()).arg("--single-branch");
        }
        cmd.arg("--")
            .arg(url.as_str())
            .arg(target_dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(binary = %self.binary.display(), depth, "running git clone");

        let output = cmd.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::CloneFailed(stderr.trim().to_owned()));
        }

        Ok(())
    }
}

/// Remove whatever a failed clone left in `dir`, keeping `dir` itself.
async fn clear_dir(dir: &Path) -> std::io::Result<()> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(entry.path()).await?;
        } else {
            tokio::fs::remove_file(entry.path()).await?;
        }
    }
    Ok(())
}

#[async_trait]
impl RepositoryFetcher for GitFetcher {
    #[instrument(skip(self, url, into), fields(path = %into.display()))]
    async fn fetch(&self, url: &str, into: &Path) -> DeployResult<()> {
        let parsed = parse_repository_url(url).map_err(|e| DeployError::RepositoryUnavailable {
            url: url.to_owned(),
            message: e.to_string(),
        })?;
        let display_url = redacted(&parsed);
        info!(repo = %display_url, "cloning repository");

        match tokio::time::timeout(self.timeout, self.clone_into(&parsed, into)).await {
            Ok(Ok(())) => {
                info!(repo = %display_url, "repository cloned");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(repo = %display_url, error = %e, "clone failed");
                Err(DeployError::RepositoryUnavailable {
                    url: display_url,
                    message: e.to_string(),
                })
            }
            Err(_) => {
                warn!(repo = %display_url, limit = ?self.timeout, "clone timed out");
                Err(DeployError::FetchTimeout {
                    url: display_url,
                    limit: self.timeout,
                })
            }
        }
    }
}
