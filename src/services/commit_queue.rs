//! Candidate selection.
//!
//! Computes the commits on a job's ready branch that have not been
//! integrated yet, ordered so that ancestors always come before their
//! descendants.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::errors::{IntegrationError, IntegrationResult};
use crate::domain::models::{CandidateSet, Commit, CommitId, FailurePolicy, JobRecord};
use crate::domain::ports::VcsGateway;

/// Orders untested commits of a ready branch.
#[derive(Clone)]
pub struct CommitQueue {
    vcs: Arc<dyn VcsGateway>,
}

impl CommitQueue {
    /// Create a queue reading history through `vcs`.
    pub fn new(vcs: Arc<dyn VcsGateway>) -> Self {
        Self { vcs }
    }

    /// Candidates for the next cycle of `record`.
    ///
    /// Under [`FailurePolicy::Skip`] commits reachable from the rejected head
    /// are left out.
    pub async fn next_candidates(
        &self,
        record: &JobRecord,
        policy: FailurePolicy,
    ) -> IntegrationResult<CandidateSet> {
        let skip = match policy {
            FailurePolicy::Skip => record.rejected_head.as_ref(),
            FailurePolicy::Retry => None,
        };
        self.compute_candidates(record, skip).await
    }

    /// Commits on the ready branch after the marker, oldest first.
    ///
    /// Without a marker the walk stops at the target branch head, and so does
    /// it when the marker is gone because the ready branch was deleted after
    /// an integration and created again. An absent ready branch yields an
    /// empty set. `also_exclude` removes everything
    /// reachable from one more commit.
    #[instrument(skip(self, record), fields(job = %record.job))]
    pub async fn compute_candidates(
        &self,
        record: &JobRecord,
        also_exclude: Option<&CommitId>,
    ) -> IntegrationResult<CandidateSet> {
        self.vcs.refresh().await?;

        let Some(ready_head) = self.vcs.resolve_branch(&record.ready_branch).await? else {
            debug!(branch = %record.ready_branch, "Ready branch does not exist");
            return Ok(CandidateSet::empty());
        };

        let mut exclude = Vec::new();
        match &record.last_integrated {
            Some(marker) => {
                if self.vcs.is_ancestor(marker, &ready_head).await? {
                    exclude.push(marker.clone());
                } else if record.ready_deleted_at.is_some() {
                    // Recreated after we deleted it: a fresh branch off the target
                    debug!(branch = %record.ready_branch, "Ready branch was recreated");
                    exclude.extend(record.last_pushed_head.iter().cloned());
                    exclude.extend(self.target_head(record).await?);
                } else {
                    return Err(IntegrationError::HistoryDiverged {
                        branch: record.ready_branch.clone(),
                        marker: marker.clone(),
                        head: ready_head,
                    });
                }
            }
            None => exclude.extend(self.target_head(record).await?),
        }
        if let Some(extra) = also_exclude {
            exclude.push(extra.clone());
        }

        let commits = self
            .vcs
            .list_commits(&record.ready_branch, &exclude)
            .await?;
        let ordered = order_oldest_first(commits);
        debug!(count = ordered.len(), head = %ready_head.short(), "Computed candidates");
        Ok(CandidateSet::new(ordered))
    }

    async fn target_head(&self, record: &JobRecord) -> IntegrationResult<Option<CommitId>> {
        self.vcs.resolve_branch(&record.target_branch).await
    }
}

/// Stable topological order over parent links: parents inside the set come
/// first, ties go to the older timestamp and then the smaller id.
pub fn order_oldest_first(commits: Vec<Commit>) -> Vec<Commit> {
    let ids: HashSet<CommitId> = commits.iter().map(|c| c.id.clone()).collect();
    let mut in_degree: HashMap<CommitId, usize> = HashMap::new();
    let mut children: HashMap<CommitId, Vec<CommitId>> = HashMap::new();

    for commit in &commits {
        let mut degree = 0;
        for parent in commit.parents.iter().filter(|p| ids.contains(*p)) {
            children
                .entry(parent.clone())
                .or_default()
                .push(commit.id.clone());
            degree += 1;
        }
        in_degree.insert(commit.id.clone(), degree);
    }

    let mut by_id: HashMap<CommitId, Commit> =
        commits.into_iter().map(|c| (c.id.clone(), c)).collect();

    // Kahn's algorithm with a min-heap keyed on (timestamp, id)
    let mut ready: BinaryHeap<Reverse<(i64, CommitId)>> = in_degree
        .iter()
        .filter(|&(_, &degree)| degree == 0)
        .filter_map(|(id, _)| by_id.get(id).map(|c| Reverse((c.timestamp.timestamp(), id.clone()))))
        .collect();

    let mut sorted = Vec::with_capacity(by_id.len());
    while let Some(Reverse((_, id))) = ready.pop() {
        if let Some(neighbors) = children.get(&id) {
            for child in neighbors {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        if let Some(c) = by_id.get(child) {
                            ready.push(Reverse((c.timestamp.timestamp(), child.clone())));
                        }
                    }
                }
            }
        }
        if let Some(commit) = by_id.remove(&id) {
            sorted.push(commit);
        }
    }

    sorted
}
