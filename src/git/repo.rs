use std::{
    collections::BTreeSet,
    fs::{self, Permissions},
    path::{Path, PathBuf},
    time::Duration,
};

use git2::{ErrorCode, Repository, Sort, build::CheckoutBuilder};
use tokio::{
    task::{JoinError, JoinHandle, spawn_blocking},
    time::timeout,
};
use walkdir::WalkDir;

use crate::git::{
    CloneErrorKind, GitError,
    remote::{clone_into, fetch_origin},
    snapshot::{CommitRecord, RepositorySnapshot, TagRecord},
};

/// What a refresh did to the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Directory wiped and cloned again.
    Renewed,
    UpToDate,
    FastForward,
    /// Upstream history was rewritten; the local branch now points at the
    /// remote tip.
    Reset,
}

/// Slack on top of the transfer timeout before a blocking git call is
/// abandoned.
const WATCHDOG_GRACE: Duration = Duration::from_secs(5);

/// The single local checkout of the watched repository.
///
/// Lifecycle: [`setup`](Self::setup) wipes and clones,
/// [`refresh`](Self::refresh) updates in place, [`destroy`](Self::destroy)
/// removes the directory. Nothing else touches the directory.
#[derive(Debug, Clone)]
pub struct TrackedRepository {
    url: String,
    checkout_dir: PathBuf,
    branch: Option<String>, // resolved by setup
    timeout: Duration,
}

impl TrackedRepository {
    pub fn new(url: impl Into<String>, checkout_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            checkout_dir: checkout_dir.into(),
            branch: None,
            timeout,
        }
    }

    /// Throwaway clone into a temp directory.
    ///
    /// `Ok(false)` when the remote is missing or rejects our credentials,
    /// `Err` for anything else (no network, broken transport, stalled
    /// server...).
    pub async fn validate(url: &str, timeout: Duration) -> Result<bool, GitError> {
        let url = url.to_string();
        let task = spawn_blocking(move || probe_remote(&url, timeout));
        watchdog(timeout + WATCHDOG_GRACE, task).await?
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn checkout_dir(&self) -> &Path {
        &self.checkout_dir
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    /// Destructive: wipes the checkout directory and clones into it.
    pub async fn setup(&mut self) -> Result<(), GitError> {
        self.detached(TrackedRepository::clone_fresh).await
    }

    /// `renew` clones again from scratch, otherwise fetches and moves the
    /// tracked branch to the remote tip. A plain pull never downloads tags.
    pub async fn refresh(&mut self, renew: bool) -> Result<RefreshOutcome, GitError> {
        if renew {
            self.setup().await?;
            return Ok(RefreshOutcome::Renewed);
        }
        self.detached(TrackedRepository::pull).await
    }

    /// Captures history and tags; an axis that is not tracked stays empty.
    pub async fn snapshot(
        &self,
        track_commits: bool,
        track_tags: bool,
    ) -> Result<RepositorySnapshot, GitError> {
        let repo = self.clone();
        spawn_blocking(move || repo.read_snapshot(track_commits, track_tags))
            .await
            .map_err(join_error)?
    }

    /// Removes the checkout directory.
    pub fn destroy(self) -> Result<(), GitError> {
        if self.checkout_dir.exists() {
            remove_forcefully(&self.checkout_dir)?;
        }
        Ok(())
    }

    /// Runs a blocking git operation on a copy of `self` off the async
    /// workers, then adopts the copy. A pull may fetch and then clone, hence
    /// twice the transfer timeout.
    async fn detached<T, F>(&mut self, op: F) -> Result<T, GitError>
    where
        T: Send + 'static,
        F: FnOnce(&mut TrackedRepository) -> Result<T, GitError> + Send + 'static,
    {
        let mut repo = self.clone();
        let task = spawn_blocking(move || {
            let res = op(&mut repo);
            (repo, res)
        });
        match watchdog(self.timeout * 2 + WATCHDOG_GRACE, task).await {
            Ok((repo, res)) => {
                *self = repo;
                res
            }
            Err(e) => {
                // the abandoned transfer may still write into the checkout
                self.branch = None;
                Err(e)
            }
        }
    }

    fn clone_fresh(&mut self) -> Result<(), GitError> {
        self.branch = None;
        wipe_directory(&self.checkout_dir)?;
        let repo = clone_into(&self.url, &self.checkout_dir, self.timeout)?;
        self.branch = Some(default_branch(&repo)?);
        Ok(())
    }

    /// Fetches `origin` and moves the tracked branch to the fetched tip.
    fn pull(&mut self) -> Result<RefreshOutcome, GitError> {
        let branch = self.branch.clone().ok_or(GitError::NotSetUp)?;
        let repo = self.open()?;
        fetch_origin(&repo, self.timeout)?;

        let remote_tip = match repo.find_reference(&format!("refs/remotes/origin/{branch}")) {
            Ok(r) => Some(r.peel_to_commit()?.id()),
            Err(e) if e.code() == ErrorCode::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        let Some(target) = remote_tip else {
            // Remote was empty at clone time or the branch is gone:
            // clone again so the default branch is resolved afresh.
            drop(repo);
            self.clone_fresh()?;
            return Ok(RefreshOutcome::Renewed);
        };

        let head = match repo.head() {
            Ok(h) => h.target(),
            Err(e) if e.code() == ErrorCode::UnbornBranch => None,
            Err(e) => return Err(e.into()),
        };
        if head == Some(target) {
            return Ok(RefreshOutcome::UpToDate);
        }
        let outcome = match head {
            Some(current) if !repo.graph_descendant_of(target, current)? => RefreshOutcome::Reset,
            _ => RefreshOutcome::FastForward,
        };

        let local_ref = format!("refs/heads/{branch}");
        repo.reference(&local_ref, target, true, "deployer: sync with origin")?;
        repo.set_head(&local_ref)?;
        repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
        Ok(outcome)
    }

    fn read_snapshot(
        &self,
        track_commits: bool,
        track_tags: bool,
    ) -> Result<RepositorySnapshot, GitError> {
        let repo = self.open()?;
        let commits = if track_commits {
            commit_history(&repo)?
        } else {
            Vec::new()
        };
        let tags = if track_tags {
            tag_list(&repo)?
        } else {
            BTreeSet::new()
        };
        Ok(RepositorySnapshot::new(commits, tags))
    }

    fn open(&self) -> Result<Repository, GitError> {
        if self.branch.is_none() {
            return Err(GitError::NotSetUp);
        }
        Ok(Repository::open(&self.checkout_dir)?)
    }
}

fn probe_remote(url: &str, timeout: Duration) -> Result<bool, GitError> {
    let dir = tempfile::tempdir()?;
    match clone_into(url, dir.path(), timeout) {
        Ok(_) => Ok(true),
        Err(GitError::Transport {
            kind: CloneErrorKind::NotFound | CloneErrorKind::AuthFailed,
            ..
        }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Bounds a blocking git task. The progress callbacks never fire against a
/// server that accepts the connection and then stays silent.
async fn watchdog<T>(limit: Duration, task: JoinHandle<T>) -> Result<T, GitError> {
    match timeout(limit, task).await {
        Ok(joined) => joined.map_err(join_error),
        Err(_) => Err(GitError::Timeout { after: limit }),
    }
}

fn join_error(err: JoinError) -> GitError {
    GitError::Io(std::io::Error::other(err))
}

fn default_branch(repo: &Repository) -> Result<String, GitError> {
    let head = repo.find_reference("HEAD")?;
    let target = head.symbolic_target().ok_or(GitError::DetachedHead)?;
    Ok(target.strip_prefix("refs/heads/").unwrap_or(target).to_string())
}

fn commit_history(repo: &Repository) -> Result<Vec<CommitRecord>, git2::Error> {
    let mut walk = repo.revwalk()?;
    walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
    match walk.push_head() {
        Ok(()) => {}
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    }

    walk.map(|oid| {
        let commit = repo.find_commit(oid?)?;
        Ok(CommitRecord::from_commit(&commit))
    })
    .collect()
}

fn tag_list(repo: &Repository) -> Result<BTreeSet<TagRecord>, git2::Error> {
    let names = repo.tag_names(None)?;
    Ok(names
        .iter()
        .flatten()
        .map(|name| TagRecord {
            name: name.to_string(),
        })
        .collect())
}

/// Empties `dir` (creating it if needed).
pub(crate) fn wipe_directory(dir: &Path) -> std::io::Result<()> {
    if dir.exists() {
        remove_forcefully(dir)?;
    }
    fs::create_dir_all(dir)
}

/// `remove_dir_all`, retried once after making every entry writable.
fn remove_forcefully(dir: &Path) -> std::io::Result<()> {
    if fs::remove_dir_all(dir).is_ok() {
        return Ok(());
    }
    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if let Ok(meta) = entry.metadata() {
            let mut perms = meta.permissions();
            force_writable(&mut perms);
            let _ = fs::set_permissions(entry.path(), perms);
        }
    }
    fs::remove_dir_all(dir)
}

#[cfg(unix)]
fn force_writable(perms: &mut Permissions) {
    use std::os::unix::fs::PermissionsExt;
    perms.set_mode(perms.mode() | 0o700);
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn force_writable(perms: &mut Permissions) {
    perms.set_readonly(false);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wipe_creates_missing_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let target = dir.path().join("a").join("b");
        wipe_directory(&target)?;
        assert!(target.is_dir());
        Ok(())
    }

    #[test]
    fn wipe_removes_read_only_entries() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let target = dir.path().join("checkout");
        let locked = target.join("objects").join("pack");
        fs::create_dir_all(&locked)?;
        fs::write(locked.join("pack-1.idx"), b"data")?;

        let mut perms = fs::metadata(locked.join("pack-1.idx"))?.permissions();
        perms.set_readonly(true);
        fs::set_permissions(locked.join("pack-1.idx"), perms)?;
        let mut perms = fs::metadata(&locked)?.permissions();
        perms.set_readonly(true);
        fs::set_permissions(&locked, perms)?;

        wipe_directory(&target)?;

        assert!(target.is_dir());
        assert_eq!(fs::read_dir(&target)?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn snapshot_before_setup_fails() {
        let repo = TrackedRepository::new("file:///nowhere", "/nonexistent", Duration::from_secs(5));
        assert!(matches!(
            repo.snapshot(true, true).await,
            Err(GitError::NotSetUp)
        ));
    }

    #[tokio::test]
    async fn watchdog_gives_up_on_stuck_task() {
        let task = spawn_blocking(|| std::thread::sleep(Duration::from_millis(500)));
        let res = watchdog(Duration::from_millis(50), task).await;
        assert!(matches!(res, Err(GitError::Timeout { .. })), "{res:?}");
    }
}
