//! SQLite implementation of the JobStateRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::parse_datetime;
use crate::domain::errors::{IntegrationError, IntegrationResult};
use crate::domain::models::{CommitId, JobRecord, StrategyKind};
use crate::domain::ports::JobStateRepository;

/// Job records stored in the `job_state` table.
pub struct SqliteJobStateRepository {
    pool: SqlitePool,
}

impl SqliteJobStateRepository {
    /// Repository over a migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStateRepository for SqliteJobStateRepository {
    async fn get(&self, job: &str) -> IntegrationResult<Option<JobRecord>> {
        let row: Option<JobStateRow> = sqlx::query_as("SELECT * FROM job_state WHERE job = ?")
            .bind(job)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn save(&self, record: &JobRecord) -> IntegrationResult<()> {
        sqlx::query(
            r"INSERT INTO job_state (job, ready_branch, target_branch, strategy, last_integrated, rejected_head, last_pushed_head, ready_deleted_at, updated_at)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT(job) DO UPDATE SET
                ready_branch = excluded.ready_branch,
                target_branch = excluded.target_branch,
                strategy = excluded.strategy,
                last_integrated = excluded.last_integrated,
                rejected_head = excluded.rejected_head,
                last_pushed_head = excluded.last_pushed_head,
                ready_deleted_at = excluded.ready_deleted_at,
                updated_at = excluded.updated_at",
        )
        .bind(&record.job)
        .bind(&record.ready_branch)
        .bind(&record.target_branch)
        .bind(record.strategy.as_str())
        .bind(record.last_integrated.as_ref().map(CommitId::as_str))
        .bind(record.rejected_head.as_ref().map(CommitId::as_str))
        .bind(record.last_pushed_head.as_ref().map(CommitId::as_str))
        .bind(record.ready_deleted_at.map(|at| at.to_rfc3339()))
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> IntegrationResult<Vec<JobRecord>> {
        let rows: Vec<JobStateRow> = sqlx::query_as("SELECT * FROM job_state ORDER BY job")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct JobStateRow {
    job: String,
    ready_branch: String,
    target_branch: String,
    strategy: String,
    last_integrated: Option<String>,
    rejected_head: Option<String>,
    last_pushed_head: Option<String>,
    ready_deleted_at: Option<String>,
    updated_at: String,
}

impl TryFrom<JobStateRow> for JobRecord {
    type Error = IntegrationError;

    fn try_from(row: JobStateRow) -> Result<Self, Self::Error> {
        let strategy = StrategyKind::from_str(&row.strategy).ok_or_else(|| {
            IntegrationError::Storage(format!("Invalid strategy: {}", row.strategy))
        })?;

        Ok(JobRecord {
            job: row.job,
            ready_branch: row.ready_branch,
            target_branch: row.target_branch,
            strategy,
            last_integrated: row.last_integrated.map(CommitId::from),
            rejected_head: row.rejected_head.map(CommitId::from),
            last_pushed_head: row.last_pushed_head.map(CommitId::from),
            ready_deleted_at: row
                .ready_deleted_at
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}
