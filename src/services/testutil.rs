//! Shared test fixtures: real local git repositories built with `git2` and
//! cloned over the local transport, so every test runs offline.

use std::collections::BTreeMap;

use git2::{Oid, Repository, Signature};
use tempfile::TempDir;

use crate::services::checkout::{GitCheckout, RemoteCredential};

/// Branch the fixture content is committed to.
pub const FIXTURE_BRANCH: &str = "master";

/// Files committed to the fixture remote, matching the end-to-end example
/// the service is expected to reproduce.
pub const FIXTURE_FILES: &[(&str, &[u8])] = &[
    ("on_master.txt", b"true\n"),
    ("adir/subdir/file1.txt", b"one\n"),
    ("adir/subdir/file2.txt", b"two\n"),
];

enum Node {
    File(Vec<u8>),
    Dir(BTreeMap<String, Node>),
}

fn insert_path(root: &mut BTreeMap<String, Node>, path: &str, content: &[u8]) {
    match path.split_once('/') {
        None => {
            root.insert(path.to_string(), Node::File(content.to_vec()));
        }
        Some((head, rest)) => {
            let entry = root
                .entry(head.to_string())
                .or_insert_with(|| Node::Dir(BTreeMap::new()));
            match entry {
                Node::Dir(children) => insert_path(children, rest, content),
                Node::File(_) => panic!("fixture path {path} conflicts with a file"),
            }
        }
    }
}

fn write_tree(repo: &Repository, nodes: &BTreeMap<String, Node>) -> Oid {
    let mut builder = repo.treebuilder(None).expect("treebuilder");
    for (name, node) in nodes {
        match node {
            Node::File(content) => {
                let blob = repo.blob(content).expect("write blob");
                builder.insert(name, blob, 0o100644).expect("insert blob");
            }
            Node::Dir(children) => {
                let subtree = write_tree(repo, children);
                builder.insert(name, subtree, 0o040000).expect("insert tree");
            }
        }
    }
    builder.write().expect("write tree")
}

/// Commit `files` onto `branch` of `repo`, merged over whatever the branch
/// currently contains. Returns the new commit id.
pub fn commit_files(repo: &Repository, branch: &str, files: &[(&str, &[u8])]) -> Oid {
    let ref_name = format!("refs/heads/{branch}");
    let parent = repo.refname_to_id(&ref_name).ok();

    let mut root = BTreeMap::new();
    if let Some(parent) = parent {
        let tree = repo
            .find_commit(parent)
            .expect("parent commit")
            .tree()
            .expect("parent tree");
        collect_tree(repo, &tree, "", &mut root);
    }
    for (path, content) in files {
        insert_path(&mut root, path, content);
    }

    let tree_oid = write_tree(repo, &root);
    let tree = repo.find_tree(tree_oid).expect("find tree");
    let sig = Signature::now("fixture", "fixture@example.com").expect("signature");
    let parents: Vec<git2::Commit> = parent
        .map(|oid| repo.find_commit(oid).expect("parent commit"))
        .into_iter()
        .collect();
    let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
    repo.commit(Some(&ref_name), &sig, &sig, "fixture commit", &tree, &parent_refs)
        .expect("commit")
}

fn collect_tree(
    repo: &Repository,
    tree: &git2::Tree,
    prefix: &str,
    out: &mut BTreeMap<String, Node>,
) {
    for entry in tree.iter() {
        let name = entry.name().expect("utf8 entry name");
        let path = format!("{prefix}{name}");
        match entry.kind() {
            Some(git2::ObjectType::Blob) => {
                let blob = repo.find_blob(entry.id()).expect("find blob");
                insert_path(out, &path, blob.content());
            }
            Some(git2::ObjectType::Tree) => {
                let subtree = repo.find_tree(entry.id()).expect("find tree");
                collect_tree(repo, &subtree, &format!("{path}/"), out);
            }
            _ => {}
        }
    }
}

/// Create a bare "remote" repository with the fixture content on
/// [`FIXTURE_BRANCH`].
pub fn fixture_remote() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir for remote");
    let repo = Repository::init_bare(dir.path()).expect("init remote");
    commit_files(&repo, FIXTURE_BRANCH, FIXTURE_FILES);
    dir
}

/// Fixture remote plus a checkout cloned from it. The returned `TempDir`s
/// keep the remote and the clone directory alive for the test's duration.
pub fn clone_fixture() -> (TempDir, GitCheckout, TempDir) {
    let remote = fixture_remote();
    let clone_dir = tempfile::tempdir().expect("tempdir for clone");
    let checkout = GitCheckout::clone_into(
        clone_dir.path(),
        remote.path().to_str().expect("utf8 remote path"),
        RemoteCredential::None,
        None,
    )
    .expect("clone fixture");
    (remote, checkout, clone_dir)
}
