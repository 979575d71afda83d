use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use git2::Commit;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    pub committed_date: i64,
    pub committed_datetime: DateTime<FixedOffset>,
    pub summary: String, // first line of the message
}

impl CommitRecord {
    pub fn from_commit(commit: &Commit<'_>) -> Self {
        let time = commit.time();
        let offset = FixedOffset::east_opt(time.offset_minutes() * 60).unwrap_or_else(|| Utc.fix());
        let committed_datetime = DateTime::<Utc>::from_timestamp(time.seconds(), 0)
            .unwrap_or_default()
            .with_timezone(&offset);

        Self {
            committed_date: time.seconds(),
            committed_datetime,
            summary: commit.summary().unwrap_or_default().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TagRecord {
    pub name: String,
}

/// Commit history and tag list captured at one polling instant.
///
/// Built once and never mutated: a new poll always yields a new value, and
/// two snapshots are equal iff both components are equal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RepositorySnapshot {
    commits: Vec<CommitRecord>,
    tags: BTreeSet<TagRecord>,
}

impl RepositorySnapshot {
    pub fn new(commits: Vec<CommitRecord>, tags: BTreeSet<TagRecord>) -> Self {
        Self { commits, tags }
    }

    /// Most recent first.
    pub fn commits(&self) -> &[CommitRecord] {
        &self.commits
    }

    pub fn tags(&self) -> &BTreeSet<TagRecord> {
        &self.tags
    }

    pub fn head(&self) -> Option<&CommitRecord> {
        self.commits.first()
    }

    /// One-line description of what changed since `previous`, for the logs.
    pub fn describe_changes(&self, previous: &RepositorySnapshot) -> String {
        let mut parts = Vec::new();

        if self.commits != previous.commits {
            match self.head() {
                Some(head) => parts.push(format!(
                    "commits changed ({} -> {}), head: \"{}\"",
                    previous.commits.len(),
                    self.commits.len(),
                    head.summary
                )),
                None => parts.push("commit history is now empty".to_string()),
            }
        }

        let added: Vec<&str> = self
            .tags
            .difference(&previous.tags)
            .map(|t| t.name.as_str())
            .collect();
        let removed: Vec<&str> = previous
            .tags
            .difference(&self.tags)
            .map(|t| t.name.as_str())
            .collect();
        if !added.is_empty() {
            parts.push(format!("new tags: {}", added.join(", ")));
        }
        if !removed.is_empty() {
            parts.push(format!("removed tags: {}", removed.join(", ")));
        }

        if parts.is_empty() {
            "no change".to_string()
        } else {
            parts.join("; ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(ts: i64, summary: &str) -> CommitRecord {
        let offset = FixedOffset::east_opt(3600).unwrap();
        CommitRecord {
            committed_date: ts,
            committed_datetime: DateTime::<Utc>::from_timestamp(ts, 0)
                .unwrap()
                .with_timezone(&offset),
            summary: summary.to_string(),
        }
    }

    fn tags(names: &[&str]) -> BTreeSet<TagRecord> {
        names
            .iter()
            .map(|n| TagRecord {
                name: n.to_string(),
            })
            .collect()
    }

    #[test]
    fn tag_order_does_not_matter() {
        let a = RepositorySnapshot::new(vec![], tags(&["v1", "v2"]));
        let b = RepositorySnapshot::new(vec![], tags(&["v2", "v1"]));
        assert_eq!(a, b);
    }

    #[test]
    fn commit_order_matters() {
        let a = RepositorySnapshot::new(vec![commit(2, "b"), commit(1, "a")], tags(&[]));
        let b = RepositorySnapshot::new(vec![commit(1, "a"), commit(2, "b")], tags(&[]));
        assert_ne!(a, b);
    }

    #[test]
    fn describe_new_commit_and_tag() {
        let old = RepositorySnapshot::new(vec![commit(1, "init")], tags(&["v1"]));
        let new = RepositorySnapshot::new(vec![commit(2, "fix"), commit(1, "init")], tags(&["v1", "v2"]));

        let msg = new.describe_changes(&old);
        assert!(msg.contains("(1 -> 2)"));
        assert!(msg.contains("\"fix\""));
        assert!(msg.contains("new tags: v2"));
        assert_eq!(old.describe_changes(&old), "no change");
    }
}
