//! Service configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::DeployResult;

/// Deployment service configuration.
///
/// Configuration is loaded in the following order (later sources override earlier):
/// 1. Default values
/// 2. `deployweb.toml` in the current directory (if present)
/// 3. Environment variables with `DEPLOYWEB_` prefix (`__` separates sections)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Workspace allocation.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Repository fetching.
    #[serde(default)]
    pub git: GitConfig,

    /// Target platform client.
    #[serde(default)]
    pub deploy: DeployConfig,
}

impl ServiceConfig {
    /// Load configuration from file and environment.
    pub fn load() -> DeployResult<Self> {
        Ok(Self::figment("deployweb.toml").extract()?)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &str) -> DeployResult<Self> {
        Ok(Self::figment(path).extract()?)
    }

    fn figment(path: &str) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("DEPLOYWEB_").split("__"))
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address for the HTTP API.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 7870))
}

const fn default_body_limit() -> usize {
    256 * 1024
}

/// Workspace configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory under which per-request workspaces are created.
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,

    /// Prefix for workspace directory names.
    #[serde(default = "default_workspace_prefix")]
    pub prefix: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            prefix: default_workspace_prefix(),
        }
    }
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("deployweb")
}

fn default_workspace_prefix() -> String {
    "deploy-".to_owned()
}

/// Repository fetching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Path or name of the git binary.
    #[serde(default = "default_git_binary")]
    pub binary: PathBuf,

    /// Clone depth; `0` clones full history. Servers without shallow
    /// support (dumb HTTP) are retried with full history.
    #[serde(default = "default_clone_depth")]
    pub depth: u32,

    /// Clone timeout in seconds.
    #[serde(default = "default_clone_timeout_secs")]
    pub timeout_secs: u64,
}

impl GitConfig {
    /// Get the clone timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: default_git_binary(),
            depth: default_clone_depth(),
            timeout_secs: default_clone_timeout_secs(),
        }
    }
}

fn default_git_binary() -> PathBuf {
    PathBuf::from("git")
}

const fn default_clone_depth() -> u32 {
    1
}

const fn default_clone_timeout_secs() -> u64 {
    120
}

/// Target platform client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Per-call timeout in seconds.
    #[serde(default = "default_deploy_timeout_secs")]
    pub timeout_secs: u64,

    /// Namespace entities are deployed into; `_` is the credential's default.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Accept self-signed certificates from the platform.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl DeployConfig {
    /// Get the per-call timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_deploy_timeout_secs(),
            namespace: default_namespace(),
            accept_invalid_certs: false,
        }
    }
}

const fn default_deploy_timeout_secs() -> u64 {
    30
}

fn default_namespace() -> String {
    "_".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::DeployError;

    #[test]
    fn default_config_is_valid() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.listen_addr.port(), 7870);
        assert_eq!(config.git.depth, 1);
        assert_eq!(config.git.timeout(), Duration::from_secs(120));
        assert_eq!(config.deploy.namespace, "_");
        assert!(!config.deploy.accept_invalid_certs);
    }

    #[test]
    fn load_from_file_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("deployweb.toml");
        std::fs::write(
            &path,
            r#"
            [server]
            listen_addr = "127.0.0.1:9000"

            [git]
            depth = 0
            timeout_secs = 5

            [deploy]
            namespace = "guest"
            accept_invalid_certs = true
        "#,
        )
        .unwrap();

        let config = ServiceConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.listen_addr.port(), 9000);
        assert_eq!(config.git.depth, 0);
        assert_eq!(config.git.timeout(), Duration::from_secs(5));
        assert_eq!(config.deploy.namespace, "guest");
        assert!(config.deploy.accept_invalid_certs);
        assert_eq!(config.workspace.prefix, "deploy-");
    }

    #[test]
    fn invalid_file_is_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("deployweb.toml");
        std::fs::write(&path, "[git]\ndepth = \"deep\"\n").unwrap();

        let err = ServiceConfig::load_from(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, DeployError::Config(_)));
    }
}
