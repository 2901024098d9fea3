//! Repository directory.
//!
//! Alias-keyed and remote-URL-keyed lookup over the configured checkouts.
//! Built once at startup by cloning every configured repository; the maps are
//! immutable afterwards — no runtime add or remove.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::config::RepositoryConfig;
use crate::services::checkout::{CheckoutError, GitCheckout, RemoteCredential};

/// Errors reported by directory-level operations
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No configured repository has this alias.
    #[error("unknown repository {0}")]
    UnknownRepository(String),

    /// Two configured repositories resolved to the same alias.
    #[error("duplicate repository alias {0}")]
    DuplicateAlias(String),

    /// Refreshing one repository failed.
    #[error("unable to refresh {alias}: {source}")]
    Refresh {
        alias: String,
        #[source]
        source: CheckoutError,
    },

    /// Creating a clone directory failed.
    #[error("unable to create clone directory: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

#[derive(Debug)]
struct DirectoryEntry {
    checkout: GitCheckout,
    public: bool,
}

/// The alias → checkout map, with a derived remote-URL index for the
/// webhook trigger.
#[derive(Debug)]
pub struct CheckoutDirectory {
    // BTreeMap keeps cross-repository iteration (refresh_all) deterministic.
    checkouts: BTreeMap<String, DirectoryEntry>,
    by_remote_url: HashMap<String, GitCheckout>,
}

impl CheckoutDirectory {
    /// Clone every configured repository into a fresh uniquely-named
    /// directory under `data_dir` and build the lookup maps. Any clone
    /// failure is fatal for startup.
    pub fn open(data_dir: &Path, repos: &[RepositoryConfig]) -> Result<Self, DirectoryError> {
        let mut checkouts = BTreeMap::new();
        let mut by_remote_url = HashMap::new();
        for repo in repos {
            let alias = repo.alias();
            if checkouts.contains_key(&alias) {
                return Err(DirectoryError::DuplicateAlias(alias));
            }
            let clone_dir = tempfile::Builder::new()
                .prefix(&format!("gitserve_repo_{}", sanitize_dir(&repo.url)))
                .tempdir_in(data_dir)?
                .keep();
            let checkout = GitCheckout::clone_into(
                &clone_dir,
                &repo.url,
                credential_for(repo),
                repo.depth,
            )?;
            info!(repo = %repo.url, alias = %alias, path = %clone_dir.display(), "setup checkout");
            by_remote_url.insert(repo.url.clone(), checkout.clone());
            checkouts.insert(
                alias,
                DirectoryEntry {
                    checkout,
                    public: repo.public,
                },
            );
        }
        Ok(Self {
            checkouts,
            by_remote_url,
        })
    }

    /// Resolve an alias to its checkout.
    pub fn get(&self, alias: &str) -> Result<&GitCheckout, DirectoryError> {
        self.checkouts
            .get(alias)
            .map(|entry| &entry.checkout)
            .ok_or_else(|| DirectoryError::UnknownRepository(alias.to_string()))
    }

    /// Whether the aliased repository carries the public visibility flag.
    /// Unknown aliases are not public.
    pub fn is_public(&self, alias: &str) -> bool {
        self.checkouts
            .get(alias)
            .map(|entry| entry.public)
            .unwrap_or(false)
    }

    /// Look up a checkout by the remote URL it was cloned from. Used by the
    /// webhook trigger, which identifies repositories by URL, not alias.
    pub fn by_remote_url(&self, url: &str) -> Option<&GitCheckout> {
        self.by_remote_url.get(url)
    }

    /// Configured aliases, in iteration order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.checkouts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.checkouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkouts.is_empty()
    }

    /// Refresh one repository by alias.
    pub fn refresh(&self, alias: &str) -> Result<(), DirectoryError> {
        self.get(alias)?
            .refresh()
            .map_err(|source| DirectoryError::Refresh {
                alias: alias.to_string(),
                source,
            })
    }

    /// Refresh every repository sequentially, stopping at the first failure.
    ///
    /// Not transactional: repositories refreshed before the failing one keep
    /// their new state, repositories after it are untouched for this call.
    pub fn refresh_all(&self) -> Result<(), DirectoryError> {
        for (alias, entry) in &self.checkouts {
            entry
                .checkout
                .refresh()
                .map_err(|source| DirectoryError::Refresh {
                    alias: alias.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}

fn credential_for(repo: &RepositoryConfig) -> RemoteCredential {
    match &repo.private_key {
        None => RemoteCredential::None,
        Some(private_key) => RemoteCredential::SshKey {
            username: "git".to_string(),
            private_key: private_key.clone(),
            passphrase: repo.passphrase.clone(),
        },
    }
}

/// Clone directory prefixes keep only `[A-Za-z0-9-]`; everything else maps
/// to `_`.
fn sanitize_dir(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
