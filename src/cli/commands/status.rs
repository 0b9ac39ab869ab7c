//! Implementation of the `pretested status` command.

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{presets, Attribute, Cell, ContentArrangement, Table};

use crate::cli::commands::open_records;
use crate::cli::output::{output, short_or_dash, CommandOutput};
use crate::domain::models::{CommitId, Config, JobRecord};

/// Arguments for `pretested status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show this job
    #[arg(short, long)]
    pub job: Option<String>,
}

/// One row of the status table.
#[derive(Debug, serde::Serialize)]
pub struct JobStatusOutput {
    /// Job name.
    pub job: String,
    /// Branch candidates are taken from.
    pub ready_branch: String,
    /// Branch candidates are integrated into.
    pub target_branch: String,
    /// Integration strategy name.
    pub strategy: String,
    /// Whether the job appears in the current config.
    pub configured: bool,
    /// Last integrated ready-branch commit.
    pub last_integrated: Option<String>,
    /// Head of the last range whose build failed.
    pub rejected_head: Option<String>,
    /// Target head produced by the last integration.
    pub last_pushed_head: Option<String>,
    /// When the ready branch was deleted after integrating.
    pub ready_deleted_at: Option<String>,
    /// Last change to the record.
    pub updated_at: Option<String>,
}

impl From<&JobRecord> for JobStatusOutput {
    fn from(record: &JobRecord) -> Self {
        Self {
            job: record.job.clone(),
            ready_branch: record.ready_branch.clone(),
            target_branch: record.target_branch.clone(),
            strategy: record.strategy.as_str().to_string(),
            configured: false,
            last_integrated: record.last_integrated.as_ref().map(ToString::to_string),
            rejected_head: record.rejected_head.as_ref().map(ToString::to_string),
            last_pushed_head: record.last_pushed_head.as_ref().map(ToString::to_string),
            ready_deleted_at: record.ready_deleted_at.map(|at| at.to_rfc3339()),
            updated_at: Some(record.updated_at.to_rfc3339()),
        }
    }
}

/// Result of `pretested status`.
#[derive(Debug, serde::Serialize)]
pub struct StatusOutput {
    /// Configured jobs first, then recorded-only jobs.
    pub jobs: Vec<JobStatusOutput>,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        if self.jobs.is_empty() {
            return "No jobs configured or recorded.".to_string();
        }

        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(
                [
                    "Job", "Ready", "Target", "Strategy", "Marker", "Rejected", "Pushed",
                    "Updated",
                ]
                .into_iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
            );

        for status in &self.jobs {
            let job = if status.configured {
                status.job.clone()
            } else {
                format!("{} (unconfigured)", status.job)
            };
            table.add_row(vec![
                job,
                status.ready_branch.clone(),
                status.target_branch.clone(),
                status.strategy.clone(),
                short(status.last_integrated.as_deref()),
                short(status.rejected_head.as_deref()),
                short(status.last_pushed_head.as_deref()),
                status.updated_at.clone().unwrap_or_else(|| "never".to_string()),
            ]);
        }
        table.to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn short(id: Option<&str>) -> String {
    short_or_dash(id.map(CommitId::from).as_ref())
}

/// Show job records.
pub async fn execute(args: StatusArgs, config: &Config, json_mode: bool) -> Result<()> {
    let records = open_records(config).await?;
    let recorded = records.list().await.context("Failed to list job records")?;

    let output_data = StatusOutput {
        jobs: collect_statuses(config, recorded, args.job.as_deref()),
    };
    output(&output_data, json_mode);
    Ok(())
}

/// Configured jobs first, in configuration order, followed by records of
/// jobs no longer in the configuration.
fn collect_statuses(
    config: &Config,
    mut recorded: Vec<JobRecord>,
    only: Option<&str>,
) -> Vec<JobStatusOutput> {
    let mut statuses = Vec::new();
    for job in &config.jobs {
        let status = match recorded.iter().position(|r| r.job == job.name) {
            Some(index) => JobStatusOutput::from(&recorded.remove(index)),
            None => JobStatusOutput {
                job: job.name.clone(),
                ready_branch: job.ready_branch.clone(),
                target_branch: job.target_branch.clone(),
                strategy: job.strategy.as_str().to_string(),
                configured: true,
                last_integrated: None,
                rejected_head: None,
                last_pushed_head: None,
                ready_deleted_at: None,
                updated_at: None,
            },
        };
        statuses.push(JobStatusOutput {
            configured: true,
            ..status
        });
    }
    statuses.extend(recorded.iter().map(JobStatusOutput::from));
    statuses.retain(|s| only.map_or(true, |name| s.job == name));
    statuses
}
