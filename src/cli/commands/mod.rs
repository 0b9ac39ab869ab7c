//! CLI command implementations.

pub mod candidates;
pub mod init;
pub mod run;
pub mod status;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::adapters::git::GitCliGateway;
use crate::adapters::sqlite::{initialize_database, SqliteJobStateRepository};
use crate::domain::models::{Config, JobConfig};
use crate::domain::ports::{JobStateRepository, VcsGateway};
use crate::services::IntegrationController;

/// Open the configured job database, applying pending migrations.
pub(crate) async fn open_records(config: &Config) -> Result<Arc<dyn JobStateRepository>> {
    let pool = initialize_database(&config.database)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path))?;
    Ok(Arc::new(SqliteJobStateRepository::new(pool)))
}

/// Controller for one job, working in the job's git workspace.
pub(crate) fn git_controller(
    job: &JobConfig,
    records: Arc<dyn JobStateRepository>,
) -> IntegrationController {
    let vcs: Arc<dyn VcsGateway> = Arc::new(GitCliGateway::new(&job.workspace, &job.remote));
    IntegrationController::new(job, vcs, records)
}

/// Look up a job by name, or every job when no name is given.
pub(crate) fn select_jobs<'a>(config: &'a Config, name: Option<&str>) -> Result<Vec<&'a JobConfig>> {
    match name {
        Some(name) => config
            .job(name)
            .map(|job| vec![job])
            .with_context(|| format!("No job named '{name}' is configured")),
        None => Ok(config.jobs.iter().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            jobs: vec![JobConfig::new("core", "/tmp/a"), JobConfig::new("docs", "/tmp/b")],
            ..Config::default()
        }
    }

    #[test]
    fn test_select_all_jobs() {
        let config = config();
        let jobs = select_jobs(&config, None).unwrap();
        assert_eq!(jobs.len(), 2);
    }

    #[test]
    fn test_select_named_job() {
        let config = config();
        let jobs = select_jobs(&config, Some("docs")).unwrap();
        assert_eq!(jobs[0].workspace, "/tmp/b");
        assert!(select_jobs(&config, Some("missing")).is_err());
    }
}
