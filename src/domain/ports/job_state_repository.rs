//! Job state repository port.

use async_trait::async_trait;

use crate::domain::errors::IntegrationResult;
use crate::domain::models::JobRecord;

/// Persistence for per-job records.
#[async_trait]
pub trait JobStateRepository: Send + Sync {
    /// Get the record for a job.
    async fn get(&self, job: &str) -> IntegrationResult<Option<JobRecord>>;

    /// Insert or replace the record for `record.job`.
    async fn save(&self, record: &JobRecord) -> IntegrationResult<()>;

    /// List all records ordered by job name.
    async fn list(&self) -> IntegrationResult<Vec<JobRecord>>;
}
