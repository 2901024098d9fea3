//! Git checkout service.
//!
//! A [`GitCheckout`] is the exclusive owner of one local bare clone of one
//! remote repository. It serializes refresh (network fetch) against the many
//! concurrent readers of the same on-disk object store: readers hold the
//! checkout lock shared for their whole operation, a refresh holds it
//! exclusively, so a reader observes either the pre-fetch or the fully
//! post-fetch object graph and never a mixture.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::{
    Cred, ErrorCode, FetchOptions, FetchPrune, ObjectType, RemoteCallbacks, Repository,
    TreeWalkMode, TreeWalkResult,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;

/// The remote every checkout fetches from.
pub const ORIGIN_REMOTE: &str = "origin";

/// Refspec configured on the origin remote at clone time. Keeping every
/// remote branch under `refs/remotes/origin/` is what branch resolution
/// relies on.
const FETCH_REFSPEC: &str = "+refs/heads/*:refs/remotes/origin/*";

/// Errors that can occur while operating on a checkout
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Initial clone failed: remote unreachable, auth rejected, or a
    /// malformed remote URL. Fatal at startup for that repository.
    #[error("unable to clone {url}: {source}")]
    Clone {
        url: String,
        #[source]
        source: git2::Error,
    },

    /// A refresh fetch failed. The checkout is left in its last-good state.
    #[error("unable to refresh repository: {0}")]
    Fetch(#[source] git2::Error),

    /// No tracking reference exists for the requested branch.
    #[error("unknown branch {0}")]
    UnknownBranch(String),

    /// The branch exists but the requested path does not name a tracked file.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// The branch exists but the requested path does not name a directory.
    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    /// Unexpected failure from the underlying object store.
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// Archive packaging failed.
    #[error("unable to build archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Writing archive entry content failed.
    #[error("unable to write archive entry: {0}")]
    ArchiveIo(#[from] std::io::Error),
}

/// One entry of a directory listing.
///
/// Serialized as `{Name, Mode, Hash}`, which is the wire format of the
/// `/ls` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileStat {
    pub name: String,
    pub mode: u32,
    pub hash: String,
}

/// How a checkout authenticates against its remote.
#[derive(Debug, Clone, Default)]
pub enum RemoteCredential {
    /// Unauthenticated: public HTTPS remotes and local path remotes.
    #[default]
    None,
    /// SSH private key on disk.
    SshKey {
        username: String,
        private_key: PathBuf,
        passphrase: Option<String>,
    },
}

impl RemoteCredential {
    /// Fetch options carrying this credential, with pruning enabled so a
    /// refresh also drops tracking refs for branches deleted on the remote.
    fn fetch_options(&self) -> FetchOptions<'static> {
        let mut callbacks = RemoteCallbacks::new();
        if let RemoteCredential::SshKey {
            username,
            private_key,
            passphrase,
        } = self
        {
            let username = username.clone();
            let private_key = private_key.clone();
            let passphrase = passphrase.clone();
            callbacks.credentials(move |_url, username_from_url, _allowed| {
                Cred::ssh_key(
                    username_from_url.unwrap_or(&username),
                    None,
                    &private_key,
                    passphrase.as_deref(),
                )
            });
        }
        let mut opts = FetchOptions::new();
        opts.remote_callbacks(callbacks);
        opts.prune(FetchPrune::On);
        opts
    }
}

/// A local bare clone of one remote repository.
///
/// Cheap to clone: shares one inner state across threads. All operations are
/// synchronous; callers on an async executor should run them on a blocking
/// pool.
#[derive(Debug, Clone)]
pub struct GitCheckout {
    inner: Arc<CheckoutInner>,
}

#[derive(Debug)]
struct CheckoutInner {
    /// Absolute path of the clone. Exclusively owned by this checkout, never
    /// shared with another one.
    path: PathBuf,
    remote_url: String,
    credential: RemoteCredential,
    /// Optional shallow-fetch depth. `None` fetches full history.
    depth: Option<i32>,
    /// Guards the on-disk object store. The `git2::Repository` handle itself
    /// is opened per operation under this lock (it is `Send` but not `Sync`).
    lock: RwLock<()>,
}

impl GitCheckout {
    /// Perform a bare clone of `remote_url` into `path`.
    ///
    /// `path` must be a fresh directory that no other checkout uses. The
    /// origin remote is configured with an explicit refspec so every remote
    /// branch is tracked under `refs/remotes/origin/`.
    pub fn clone_into(
        path: &Path,
        remote_url: &str,
        credential: RemoteCredential,
        depth: Option<i32>,
    ) -> Result<Self, CheckoutError> {
        let clone_err = |source: git2::Error| CheckoutError::Clone {
            url: remote_url.to_string(),
            source,
        };
        let repo = Repository::init_bare(path).map_err(clone_err)?;
        let mut remote = repo
            .remote_with_fetch(ORIGIN_REMOTE, remote_url, FETCH_REFSPEC)
            .map_err(clone_err)?;
        let mut opts = credential.fetch_options();
        if let Some(depth) = depth {
            opts.depth(depth);
        }
        if let Err(source) = remote.fetch(&[] as &[&str], Some(&mut opts), None) {
            warn!(remote_url, error = %source, "unable to clone");
            return Err(clone_err(source));
        }
        debug!(remote_url, path = %path.display(), "clone finished");
        Ok(Self {
            inner: Arc::new(CheckoutInner {
                path: path.to_path_buf(),
                remote_url: remote_url.to_string(),
                credential,
                depth,
                lock: RwLock::new(()),
            }),
        })
    }

    /// Remote URL this checkout was cloned from.
    pub fn remote_url(&self) -> &str {
        &self.inner.remote_url
    }

    /// Absolute path of the local clone.
    pub fn abs_path(&self) -> &Path {
        &self.inner.path
    }

    /// Fetch the remote's current state into the local tracking refs.
    ///
    /// Holds the checkout lock exclusively for the full duration of the
    /// fetch, so concurrent refreshes are totally ordered and readers never
    /// observe a half-applied fetch. An up-to-date remote is a successful
    /// no-op; on failure the checkout is exactly as it was before the call.
    pub fn refresh(&self) -> Result<(), CheckoutError> {
        let _guard = self.inner.lock.write();
        let repo = self.open()?;
        let mut remote = repo.find_remote(ORIGIN_REMOTE)?;
        let mut opts = self.inner.credential.fetch_options();
        if let Some(depth) = self.inner.depth {
            opts.depth(depth);
        }
        if let Err(source) = remote.fetch(&[] as &[&str], Some(&mut opts), None) {
            warn!(remote_url = %self.inner.remote_url, error = %source, "unable to fetch");
            return Err(CheckoutError::Fetch(source));
        }
        debug!(remote_url = %self.inner.remote_url, "fetch finished");
        Ok(())
    }

    /// Full content of the tracked file at `path` on `branch`.
    ///
    /// A missing branch and a missing path are reported distinctly.
    pub fn get_file(&self, branch: &str, path: &str) -> Result<Vec<u8>, CheckoutError> {
        // git2 rejects an empty tree path outright; report it as missing.
        if path.is_empty() {
            return Err(CheckoutError::FileNotFound(path.to_string()));
        }
        let _guard = self.inner.lock.read();
        let repo = self.open()?;
        let commit = resolve_branch(&repo, branch)?;
        let tree = commit.tree()?;
        let entry = tree.get_path(Path::new(path)).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                CheckoutError::FileNotFound(path.to_string())
            } else {
                CheckoutError::Git(e)
            }
        })?;
        if entry.kind() != Some(ObjectType::Blob) {
            return Err(CheckoutError::FileNotFound(path.to_string()));
        }
        let blob = repo.find_blob(entry.id())?;
        debug!(branch, path, size = blob.size(), "fetched file");
        Ok(blob.content().to_vec())
    }

    /// Immediate children of `dir` on `branch`, sorted lexicographically by
    /// name. An empty `dir` lists the repository root. A `dir` that resolves
    /// to a file is a [`CheckoutError::DirectoryNotFound`].
    pub fn ls_dir(&self, branch: &str, dir: &str) -> Result<Vec<FileStat>, CheckoutError> {
        let _guard = self.inner.lock.read();
        let repo = self.open()?;
        let commit = resolve_branch(&repo, branch)?;
        let root = commit.tree()?;
        let tree = if dir.is_empty() {
            root
        } else {
            let entry = root.get_path(Path::new(dir)).map_err(|e| {
                if e.code() == ErrorCode::NotFound {
                    CheckoutError::DirectoryNotFound(dir.to_string())
                } else {
                    CheckoutError::Git(e)
                }
            })?;
            entry
                .to_object(&repo)?
                .into_tree()
                .map_err(|_| CheckoutError::DirectoryNotFound(dir.to_string()))?
        };
        let mut stats: Vec<FileStat> = tree
            .iter()
            .map(|entry| FileStat {
                name: entry.name().unwrap_or_default().to_string(),
                mode: entry.filemode() as u32,
                hash: entry.id().to_string(),
            })
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stats)
    }

    /// Every tracked file path reachable from the branch root, in pre-order
    /// traversal order.
    pub fn ls_files(&self, branch: &str) -> Result<Vec<String>, CheckoutError> {
        let _guard = self.inner.lock.read();
        let repo = self.open()?;
        ls_files_in(&repo, branch)
    }

    /// Package every tracked file under `prefix` into a zip archive.
    ///
    /// The prefix is trimmed of leading and trailing `/` before comparison
    /// and stripped from each retained path to form the entry name. Returns
    /// the archive bytes and the number of files written; zero files written
    /// is a valid result at this layer.
    pub fn zip_content(
        &self,
        branch: &str,
        prefix: &str,
    ) -> Result<(Vec<u8>, usize), CheckoutError> {
        let _guard = self.inner.lock.read();
        let repo = self.open()?;
        let files = ls_files_in(&repo, branch)?;
        let commit = resolve_branch(&repo, branch)?;
        let tree = commit.tree()?;
        let prefix = prefix.trim_matches('/');
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let mut num_files = 0;
        for file in files {
            if !file.starts_with(prefix) {
                continue;
            }
            let entry_name = file[prefix.len()..].trim_start_matches('/');
            let entry = tree.get_path(Path::new(&file))?;
            let blob = repo.find_blob(entry.id())?;
            writer.start_file(entry_name, options)?;
            writer.write_all(blob.content())?;
            num_files += 1;
        }
        let cursor = writer.finish()?;
        debug!(branch, prefix, num_files, "archive written");
        Ok((cursor.into_inner(), num_files))
    }

    fn open(&self) -> Result<Repository, CheckoutError> {
        Ok(Repository::open(&self.inner.path)?)
    }
}

/// Map a branch name to the commit its origin tracking ref points at.
///
/// Resolved fresh on every call: a concurrent refresh may have moved or
/// removed the tracking ref, so callers must hold the checkout lock.
fn resolve_branch<'r>(
    repo: &'r Repository,
    branch: &str,
) -> Result<git2::Commit<'r>, CheckoutError> {
    let ref_name = format!("refs/remotes/{ORIGIN_REMOTE}/{branch}");
    let reference = repo
        .find_reference(&ref_name)
        .map_err(|_| CheckoutError::UnknownBranch(branch.to_string()))?;
    Ok(reference.peel_to_commit()?)
}

fn ls_files_in(repo: &Repository, branch: &str) -> Result<Vec<String>, CheckoutError> {
    let commit = resolve_branch(repo, branch)?;
    let tree = commit.tree()?;
    let mut files = Vec::new();
    tree.walk(TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() == Some(ObjectType::Blob) {
            files.push(format!("{root}{}", entry.name().unwrap_or_default()));
        }
        TreeWalkResult::Ok
    })?;
    Ok(files)
}
