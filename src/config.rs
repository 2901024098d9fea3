use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Directory clone directories are created under
    pub data_directory: PathBuf,
    /// Path of the JSON repository list
    pub repo_config: Option<PathBuf>,
    /// Shared secret for webhook signature verification; webhook endpoint is
    /// disabled when unset
    pub webhook_secret: Option<String>,
    /// Secret the access gate signs bearer tokens with
    pub token_secret: Option<String>,
    /// Bearer token lifetime in seconds (default: 3600)
    pub token_ttl_secs: u64,
    /// Sign-in username for the public token endpoint
    pub signin_username: Option<String>,
    /// SHA256 hash of the sign-in password (hex-encoded)
    pub signin_password_hash: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("GITSERVE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("GITSERVE_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("GITSERVE_PORT"))?;

        let data_directory = env::var("GITSERVE_DATA_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir());

        let token_ttl_secs = env::var("GITSERVE_TOKEN_TTL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("GITSERVE_TOKEN_TTL_SECS"))?;

        Ok(Self {
            host,
            port,
            data_directory,
            repo_config: env::var("GITSERVE_REPO_CONFIG").map(PathBuf::from).ok(),
            webhook_secret: env::var("GITSERVE_GITHUB_WEBHOOK_SECRET").ok(),
            token_secret: env::var("GITSERVE_TOKEN_SECRET").ok(),
            token_ttl_secs,
            signin_username: env::var("GITSERVE_SIGNIN_USERNAME").ok(),
            signin_password_hash: env::var("GITSERVE_SIGNIN_PASSWORD_HASH").ok(),
        })
    }

    /// Load the configured repository list. An absent repo config file means
    /// an empty repository list, matching a server started with nothing to
    /// serve.
    pub fn load_repositories(&self) -> Result<Vec<RepositoryConfig>, ConfigError> {
        match &self.repo_config {
            None => Ok(Vec::new()),
            Some(path) => load_repository_file(path),
        }
    }
}

/// Parse a JSON repository list of the form
/// `{"repositories": [{"url": ..., ...}]}`.
pub fn load_repository_file(path: &Path) -> Result<Vec<RepositoryConfig>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: RepositoryFile =
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(parsed.repositories)
}

#[derive(Debug, Deserialize)]
struct RepositoryFile {
    #[serde(default)]
    repositories: Vec<RepositoryConfig>,
}

/// One configured repository. Immutable after load.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    /// Remote URL the repository is cloned from
    pub url: String,
    /// Externally visible alias; derived from the URL when unset
    #[serde(default)]
    pub name: Option<String>,
    /// Path of an SSH private key used to authenticate against the remote
    #[serde(default)]
    pub private_key: Option<PathBuf>,
    /// Passphrase for the private key
    #[serde(default)]
    pub passphrase: Option<String>,
    /// Whether the repository is reachable through the token-gated public
    /// routes
    #[serde(default)]
    pub public: bool,
    /// Shallow-fetch depth; full history when unset
    #[serde(default)]
    pub depth: Option<i32>,
}

impl RepositoryConfig {
    /// The alias this repository is addressed by.
    pub fn alias(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => derive_alias(&self.url),
        }
    }
}

/// Derive a repository alias from its remote URL: the final path segment
/// with a trailing `.git` removed. URLs without a usable segment fall back
/// to the full URL string.
pub fn derive_alias(url: &str) -> String {
    let last = url.trim_end_matches('/').rsplit('/').next().unwrap_or(url);
    let trimmed = last.trim_end_matches(".git");
    if trimmed.is_empty() {
        url.to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
    #[error("unable to read repository config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse repository config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
