//! Commit domain model.
//!
//! Commits are created by the version-control backend and only ever
//! referenced by the integration engine, never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content hash identifying one commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    /// Wrap an id, trimming surrounding whitespace.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    /// Full id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used in log lines and error messages.
    pub fn short(&self) -> &str {
        self.0
            .char_indices()
            .nth(10)
            .map_or(self.0.as_str(), |(end, _)| &self.0[..end])
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommitId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CommitId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Authorship of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

impl Author {
    /// Author from name and email.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// One change in repository history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Commit id.
    pub id: CommitId,
    /// Parent ids, first parent first.
    pub parents: Vec<CommitId>,
    /// Commit author.
    pub author: Author,
    /// Full commit message, verbatim.
    pub message: String,
    /// Author time.
    pub timestamp: DateTime<Utc>,
}

impl Commit {
    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default().trim()
    }

    /// More than one parent.
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Mainline parent; `None` for a root commit.
    pub fn first_parent(&self) -> Option<&CommitId> {
        self.parents.first()
    }
}

/// Inclusive range of commits, oldest to newest, used to identify an
/// integration attempt in logs and errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRange {
    /// Oldest commit of the range.
    pub first: CommitId,
    /// Newest commit of the range.
    pub last: CommitId,
    /// Number of commits.
    pub count: usize,
}

impl CommitRange {
    /// Range of one commit.
    pub fn single(id: CommitId) -> Self {
        Self {
            first: id.clone(),
            last: id,
            count: 1,
        }
    }
}

impl fmt::Display for CommitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 1 {
            write!(f, "{}", self.first.short())
        } else {
            write!(
                f,
                "{}..{} ({} commits)",
                self.first.short(),
                self.last.short(),
                self.count
            )
        }
    }
}

/// Untested commits on the ready branch, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSet {
    commits: Vec<Commit>,
}

impl CandidateSet {
    /// Wrap commits that are already ordered oldest first.
    pub fn new(commits: Vec<Commit>) -> Self {
        Self { commits }
    }

    /// Set with no commits.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Commits, oldest first.
    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    /// Whether there is nothing to integrate.
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Newest candidate.
    pub fn head(&self) -> Option<&Commit> {
        self.commits.last()
    }

    /// Oldest candidate.
    pub fn oldest(&self) -> Option<&Commit> {
        self.commits.first()
    }

    /// Candidate ids, oldest first.
    pub fn ids(&self) -> Vec<CommitId> {
        self.commits.iter().map(|c| c.id.clone()).collect()
    }

    /// Whether `id` is a candidate.
    pub fn contains(&self, id: &CommitId) -> bool {
        self.commits.iter().any(|c| &c.id == id)
    }

    /// Range spanned by the set; `None` when empty.
    pub fn range(&self) -> Option<CommitRange> {
        match (self.commits.first(), self.commits.last()) {
            (Some(first), Some(last)) => Some(CommitRange {
                first: first.id.clone(),
                last: last.id.clone(),
                count: self.commits.len(),
            }),
            _ => None,
        }
    }

    /// Author attributed to the set when a single value is required: the
    /// author of the newest commit.
    pub fn attributed_author(&self) -> Option<&Author> {
        self.head().map(|c| &c.author)
    }

    /// Commits on the first-parent chain ending at the newest candidate,
    /// oldest first. Commits reachable only through a merge's other parents
    /// are carried by that merge and left out.
    pub fn first_parent_chain(&self) -> Vec<&Commit> {
        let mut chain = Vec::new();
        let mut cursor = self.head();
        while let Some(commit) = cursor {
            chain.push(commit);
            cursor = commit
                .first_parent()
                .and_then(|parent| self.commits.iter().find(|c| &c.id == parent));
        }
        chain.reverse();
        chain
    }
}
