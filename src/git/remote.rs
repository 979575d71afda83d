use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use dirs::home_dir;
use git2::{
    AutotagOption, Cred, CredentialType, ErrorClass, ErrorCode, FetchOptions, RemoteCallbacks,
    Repository, build::RepoBuilder,
};

use crate::git::GitError;

const MAX_CREDENTIAL_ATTEMPTS: u8 = 3;

const NOT_FOUND_PATTERNS: &[&str] = &[
    "does not exist",
    "not found",
    "could not find repository",
    "status code: 404",
];

const AUTH_PATTERNS: &[&str] = &[
    "logon failed",
    "authentication",
    "status code: 401",
    "status code: 403",
];

/// How a failed clone should be read by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneErrorKind {
    NotFound,
    AuthFailed,
    Other,
}

pub fn classify_clone_error(err: &git2::Error) -> CloneErrorKind {
    match err.code() {
        ErrorCode::NotFound => return CloneErrorKind::NotFound,
        ErrorCode::Auth => return CloneErrorKind::AuthFailed,
        _ => {}
    }

    let msg = err.message().to_lowercase();
    if NOT_FOUND_PATTERNS.iter().any(|p| msg.contains(p)) {
        CloneErrorKind::NotFound
    } else if AUTH_PATTERNS.iter().any(|p| msg.contains(p)) {
        CloneErrorKind::AuthFailed
    } else {
        CloneErrorKind::Other
    }
}

fn find_ssh_key() -> Option<PathBuf> {
    let home = home_dir()?;
    ["id_ed25519", "id_rsa"]
        .iter()
        .map(|k| home.join(".ssh").join(k))
        .find(|p| p.exists())
}

fn auth_error(msg: &str) -> git2::Error {
    git2::Error::new(ErrorCode::Auth, ErrorClass::Net, msg)
}

/// Callbacks shared by every clone and fetch: credential lookup, and a
/// deadline after which the transfer is cancelled.
fn remote_callbacks<'a>(deadline: Instant) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempts: u8 = 0;

    callbacks.credentials(move |url, username_from_url, allowed_types| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(auth_error("Logon failed: credentials rejected by remote"));
        }
        let username = username_from_url.unwrap_or("git");

        if allowed_types.contains(CredentialType::SSH_KEY) {
            // agent first, key file on retry
            if attempts == 1
                && let Ok(cred) = Cred::ssh_key_from_agent(username)
            {
                return Ok(cred);
            }
            if let Some(key) = find_ssh_key()
                && let Ok(cred) = Cred::ssh_key(username, None, &key, None)
            {
                return Ok(cred);
            }
        }

        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT)
            && let Ok(config) = git2::Config::open_default()
            && let Ok(cred) = Cred::credential_helper(&config, url, username_from_url)
        {
            return Ok(cred);
        }

        if allowed_types.contains(CredentialType::DEFAULT)
            && let Ok(cred) = Cred::default()
        {
            return Ok(cred);
        }

        Err(auth_error("Logon failed: no authentication method available"))
    });

    callbacks.transfer_progress(move |_| Instant::now() < deadline);
    callbacks.sideband_progress(move |_| Instant::now() < deadline);

    callbacks
}

fn fetch_options<'a>(deadline: Instant) -> FetchOptions<'a> {
    let mut fo = FetchOptions::new();
    fo.remote_callbacks(remote_callbacks(deadline));
    fo
}

fn transport_error(err: git2::Error, deadline: Instant, timeout: Duration) -> GitError {
    if Instant::now() >= deadline {
        return GitError::Timeout { after: timeout };
    }
    GitError::Transport {
        kind: classify_clone_error(&err),
        source: err,
    }
}

/// Full clone of `url` into the (empty) directory `dir`.
pub(crate) fn clone_into(url: &str, dir: &Path, timeout: Duration) -> Result<Repository, GitError> {
    let deadline = Instant::now() + timeout;
    RepoBuilder::new()
        .fetch_options(fetch_options(deadline))
        .clone(url, dir)
        .map_err(|e| transport_error(e, deadline, timeout))
}

/// Fetches `origin` branches with its configured refspecs. Tags are left
/// alone; only a fresh clone picks them up.
pub(crate) fn fetch_origin(repo: &Repository, timeout: Duration) -> Result<(), GitError> {
    let deadline = Instant::now() + timeout;
    let mut remote = repo.find_remote("origin")?;
    let mut fo = fetch_options(deadline);
    fo.download_tags(AutotagOption::None);
    remote
        .fetch::<&str>(&[], Some(&mut fo), None)
        .map_err(|e| transport_error(e, deadline, timeout))
}
