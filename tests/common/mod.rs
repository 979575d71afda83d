#![allow(dead_code)]
use std::{
    fs,
    net::TcpListener,
    path::Path,
    thread,
    time::Duration,
};

use git2::{Commit, Oid, Repository, RepositoryInitOptions, ResetType, Signature};
use tempfile::TempDir;

/// A local repository standing in for the remote.
pub struct Upstream {
    pub dir: TempDir,
    pub repo: Repository,
}

impl Upstream {
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(dir.path(), &opts)?;
        Ok(Self { dir, repo })
    }

    /// Upstream with one commit already on `main`.
    pub fn with_initial_commit() -> anyhow::Result<Self> {
        let up = Self::new()?;
        up.commit("README.md", "hello\n", "initial commit")?;
        Ok(up)
    }

    pub fn url(&self) -> String {
        self.dir.path().to_string_lossy().into_owned()
    }

    pub fn commit(&self, file: &str, content: &str, message: &str) -> anyhow::Result<Oid> {
        fs::write(self.dir.path().join(file), content)?;

        let mut index = self.repo.index()?;
        index.add_path(Path::new(file))?;
        index.write()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = Signature::now("Deploy Bot", "bot@example.com")?;

        let parents: Vec<Commit<'_>> = match self.repo.head() {
            Ok(head) => vec![head.peel_to_commit()?],
            Err(_) => vec![],
        };
        let parent_refs: Vec<&Commit<'_>> = parents.iter().collect();

        Ok(self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)?)
    }

    pub fn tag(&self, name: &str) -> anyhow::Result<()> {
        let head = self.repo.head()?.peel_to_commit()?;
        self.repo.tag_lightweight(name, head.as_object(), false)?;
        Ok(())
    }

    /// Moves `main` back to `oid`, discarding the commits after it.
    pub fn rewind_to(&self, oid: Oid) -> anyhow::Result<()> {
        let commit = self.repo.find_commit(oid)?;
        self.repo.reset(commit.as_object(), ResetType::Hard, None)?;
        Ok(())
    }
}

/// HTTP remote that accepts connections and never answers. Each connection
/// is closed after `hold`.
pub fn silent_remote(hold: Duration) -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            thread::spawn(move || {
                thread::sleep(hold);
                drop(stream);
            });
        }
    });
    Ok(format!("http://{addr}/owner/service.git"))
}
