//! Map-backed job record store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::IntegrationResult;
use crate::domain::models::JobRecord;
use crate::domain::ports::JobStateRepository;

/// Job records kept in memory, lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryJobStateRepository {
    records: RwLock<HashMap<String, JobRecord>>,
}

impl InMemoryJobStateRepository {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStateRepository for InMemoryJobStateRepository {
    async fn get(&self, job: &str) -> IntegrationResult<Option<JobRecord>> {
        Ok(self.records.read().await.get(job).cloned())
    }

    async fn save(&self, record: &JobRecord) -> IntegrationResult<()> {
        self.records
            .write()
            .await
            .insert(record.job.clone(), record.clone());
        Ok(())
    }

    async fn list(&self) -> IntegrationResult<Vec<JobRecord>> {
        let mut records: Vec<JobRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.job.cmp(&b.job));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CommitId, StrategyKind};

    #[tokio::test]
    async fn test_save_replaces_and_lists_sorted() {
        let repo = InMemoryJobStateRepository::new();
        let mut web = JobRecord::new("web", "ready", "master", StrategyKind::Squash);
        repo.save(&web).await.unwrap();
        repo.save(&JobRecord::new("api", "ready", "main", StrategyKind::Accumulate))
            .await
            .unwrap();

        web.integrated(CommitId::new("abc"), CommitId::new("def"));
        repo.save(&web).await.unwrap();

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].job, "api");
        assert_eq!(all[1].last_integrated, Some(CommitId::new("abc")));
        assert!(repo.get("missing").await.unwrap().is_none());
    }
}
