use thiserror::Error;

pub mod remote;
pub mod repo;
pub mod snapshot;
pub mod url;

pub use remote::{CloneErrorKind, classify_clone_error};
pub use repo::{RefreshOutcome, TrackedRepository};
pub use snapshot::{CommitRecord, RepositorySnapshot, TagRecord};

#[derive(Debug, Error)]
pub enum GitError {
    /// Clone or fetch failed on the wire.
    #[error("git transport failed ({kind:?}): {source}")]
    Transport {
        kind: CloneErrorKind,
        #[source]
        source: git2::Error,
    },

    #[error("git transfer cancelled after {after:?} without completing")]
    Timeout { after: std::time::Duration },

    #[error("repository is not set up (clone it first)")]
    NotSetUp,

    #[error("HEAD of the cloned repository is detached, cannot pick a branch to track")]
    DetachedHead,

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
