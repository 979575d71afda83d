use anyhow::{Result, anyhow, bail};

/// Extracts `owner/name` (or `group/sub/name`) from a remote URL.
///
/// Handles `scheme://host/path`, scp-like `user@host:path` and bare
/// `host/path` forms; query strings, fragments and `.git` are dropped.
pub fn repo_path_from_url(remote: &str) -> Result<String> {
    let path = path_part(remote)?;
    let path = path.split(['?', '#']).next().unwrap_or_default();

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        bail!("Incorrect remote path: {path}");
    };
    let name = last.strip_suffix(".git").unwrap_or(*last);
    if parents.is_empty() || name.is_empty() {
        bail!("Incorrect remote path: {path}");
    }
    Ok(format!("{}/{name}", parents.join("/")))
}

/// Short label for logs; falls back to the URL itself.
pub fn display_name(remote: &str) -> String {
    repo_path_from_url(remote).unwrap_or_else(|_| remote.trim().to_string())
}

/// Everything after the host.
fn path_part(remote: &str) -> Result<&str> {
    let s = remote.trim();
    if s.is_empty() {
        bail!("empty remote");
    }

    if let Some((_, rest)) = s.split_once("://") {
        return rest
            .split_once('/')
            .map(|(_, path)| path)
            .ok_or_else(|| anyhow!("No '/' found after scheme in remote URL"));
    }
    if let Some((_, path)) = s.rsplit_once(':') {
        return Ok(path);
    }
    match s.split_once('/') {
        Some((_, path)) if !s.contains(' ') => Ok(path),
        _ => bail!("Failed to extract repo remote path"),
    }
}
