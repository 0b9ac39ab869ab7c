//! Implementation of the `pretested run` command.
//!
//! Acts as a small local host: it runs each job's build command in the job
//! workspace between the controller's start and completion hooks and keeps
//! cycling while the controller asks for another build.

use anyhow::{bail, Context, Result};
use clap::Args;
use futures::future::join_all;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::cli::commands::{git_controller, open_records, select_jobs};
use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::IntegrationError;
use crate::domain::models::{BuildVerdict, Config, JobConfig};
use crate::domain::ports::JobStateRepository;
use crate::services::IntegrationController;

/// Arguments for `pretested run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Only run this job
    #[arg(short, long)]
    pub job: Option<String>,
}

/// One integration cycle of a job.
#[derive(Debug, serde::Serialize)]
pub struct CycleOutput {
    /// 1-based cycle number.
    pub cycle: u32,
    /// Candidate range that was built.
    pub range: Option<String>,
    /// Build verdict, absent when the cycle failed before the build.
    pub verdict: Option<String>,
    /// Whether the range reached the target branch.
    pub integrated: bool,
    /// Target head after integration.
    pub new_head: Option<String>,
    /// Error that ended the cycle.
    pub error: Option<String>,
}

/// All cycles run for one job.
#[derive(Debug, serde::Serialize)]
pub struct JobRunOutput {
    /// Job name.
    pub job: String,
    /// Cycles in the order they ran.
    pub cycles: Vec<CycleOutput>,
    /// Last integrated ready-branch commit after the run.
    pub marker: Option<String>,
    /// Error that stopped the job.
    pub error: Option<String>,
}

/// Result of `pretested run`.
#[derive(Debug, serde::Serialize)]
pub struct RunOutput {
    /// Whether every job finished without error.
    pub success: bool,
    /// Per-job results.
    pub jobs: Vec<JobRunOutput>,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        if self.jobs.is_empty() {
            return "No jobs configured.".to_string();
        }

        let mut lines = Vec::new();
        for job in &self.jobs {
            lines.push(format!("Job '{}':", job.job));
            if job.cycles.is_empty() && job.error.is_none() {
                lines.push("  nothing to integrate".to_string());
            }
            for cycle in &job.cycles {
                let range = cycle.range.as_deref().unwrap_or("-");
                let line = match (&cycle.error, &cycle.verdict) {
                    (Some(err), _) => format!("  #{} {range}: error: {err}", cycle.cycle),
                    (None, Some(verdict)) if cycle.integrated => format!(
                        "  #{} {range}: {verdict}, integrated as {}",
                        cycle.cycle,
                        cycle.new_head.as_deref().unwrap_or("-")
                    ),
                    (None, Some(verdict)) => {
                        format!("  #{} {range}: {verdict}, not integrated", cycle.cycle)
                    }
                    (None, None) => format!("  #{} {range}", cycle.cycle),
                };
                lines.push(line);
            }
            if let Some(err) = &job.error {
                lines.push(format!("  failed: {err}"));
            }
            lines.push(format!(
                "  marker: {}",
                job.marker.as_deref().unwrap_or("-")
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Run the integration loop for the selected jobs concurrently.
pub async fn execute(args: RunArgs, config: &Config, json_mode: bool) -> Result<()> {
    let jobs = select_jobs(config, args.job.as_deref())?;
    let records = open_records(config).await?;

    let runs = join_all(jobs.into_iter().map(|job| run_job(job, records.clone()))).await;
    let failed = runs.iter().filter(|run| run.error.is_some()).count();

    let output_data = RunOutput {
        success: failed == 0,
        jobs: runs,
    };
    output(&output_data, json_mode);

    if failed > 0 {
        bail!("{failed} job(s) failed");
    }
    Ok(())
}

/// Outcome of one start/build/complete cycle.
enum Cycle {
    NoWork,
    Done { output: CycleOutput, retrigger: bool },
}

async fn run_job(job: &JobConfig, records: Arc<dyn JobStateRepository>) -> JobRunOutput {
    let mut run = JobRunOutput {
        job: job.name.clone(),
        cycles: Vec::new(),
        marker: None,
        error: None,
    };

    if job.build_command.is_empty() {
        run.error = Some(format!("Job '{}' has no build_command", job.name));
        return run;
    }

    let mut controller = git_controller(job, records.clone());
    for cycle in 1..=job.max_cycles {
        match run_cycle(&mut controller, job, cycle).await {
            Ok(Cycle::NoWork) => break,
            Ok(Cycle::Done { output, retrigger }) => {
                run.cycles.push(output);
                if !retrigger {
                    break;
                }
            }
            Err(err) => {
                let retryable = err
                    .downcast_ref::<IntegrationError>()
                    .is_some_and(IntegrationError::is_retryable);
                run.cycles.push(CycleOutput {
                    cycle,
                    range: None,
                    verdict: None,
                    integrated: false,
                    new_head: None,
                    error: Some(format!("{err:#}")),
                });
                if retryable {
                    warn!(job = %job.name, error = %err, "Retrying after concurrent update");
                    continue;
                }
                error!(job = %job.name, error = %err, "Job stopped");
                run.error = Some(format!("{err:#}"));
                break;
            }
        }
    }

    match records.get(&job.name).await {
        Ok(record) => {
            run.marker = record
                .and_then(|r| r.last_integrated)
                .map(|id| id.short().to_string());
        }
        Err(err) => warn!(job = %job.name, error = %err, "Failed to read job record"),
    }
    run
}

async fn run_cycle(
    controller: &mut IntegrationController,
    job: &JobConfig,
    cycle: u32,
) -> Result<Cycle> {
    let start = controller.on_build_start().await?;
    if !start.proceed {
        return Ok(Cycle::NoWork);
    }
    let range = start.range.map(|r| r.to_string());
    info!(job = %job.name, cycle, range = range.as_deref().unwrap_or("-"), "Running build");

    let verdict = match run_build(job).await {
        Ok(verdict) => verdict,
        Err(err) => {
            if let Err(cancel_err) = controller.cancel().await {
                warn!(job = %job.name, error = %cancel_err, "Failed to cancel attempt");
            }
            return Err(err);
        }
    };

    let completion = controller.on_build_complete(verdict).await?;
    Ok(Cycle::Done {
        output: CycleOutput {
            cycle,
            range,
            verdict: Some(verdict.to_string()),
            integrated: completion.result.integrated,
            new_head: completion
                .result
                .new_head
                .as_ref()
                .map(|id| id.short().to_string()),
            error: None,
        },
        retrigger: completion.retrigger,
    })
}

/// Run the build command in the job workspace. Build output goes to stderr
/// so that stdout only carries command output.
async fn run_build(job: &JobConfig) -> Result<BuildVerdict> {
    let Some((program, args)) = job.build_command.split_first() else {
        bail!("Job '{}' has no build_command", job.name);
    };

    let status = Command::new(program)
        .args(args)
        .current_dir(&job.workspace)
        .stdin(Stdio::null())
        .stdout(std::io::stderr())
        .status()
        .await
        .with_context(|| format!("Failed to run build command '{program}'"))?;

    Ok(verdict_for(status.code(), job.unstable_exit_code))
}

/// Map a build exit code to a verdict. A build killed by a signal has no
/// code and counts as a failure.
pub fn verdict_for(code: Option<i32>, unstable_exit_code: Option<i32>) -> BuildVerdict {
    match code {
        Some(0) => BuildVerdict::Success,
        Some(code) if Some(code) == unstable_exit_code => BuildVerdict::Unstable,
        _ => BuildVerdict::Failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_for_exit_codes() {
        assert_eq!(verdict_for(Some(0), None), BuildVerdict::Success);
        assert_eq!(verdict_for(Some(1), None), BuildVerdict::Failure);
        assert_eq!(verdict_for(Some(2), Some(2)), BuildVerdict::Unstable);
        assert_eq!(verdict_for(Some(1), Some(2)), BuildVerdict::Failure);
        assert_eq!(verdict_for(None, Some(2)), BuildVerdict::Failure);
    }

    #[test]
    fn test_unstable_exit_code_zero_is_success() {
        assert_eq!(verdict_for(Some(0), Some(0)), BuildVerdict::Success);
    }

    #[tokio::test]
    async fn test_run_build_maps_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = JobConfig::new("core", dir.path().display().to_string());

        job.build_command = vec!["sh".into(), "-c".into(), "exit 0".into()];
        assert_eq!(run_build(&job).await.unwrap(), BuildVerdict::Success);

        job.build_command = vec!["sh".into(), "-c".into(), "exit 3".into()];
        job.unstable_exit_code = Some(3);
        assert_eq!(run_build(&job).await.unwrap(), BuildVerdict::Unstable);

        job.build_command = vec!["sh".into(), "-c".into(), "exit 1".into()];
        assert_eq!(run_build(&job).await.unwrap(), BuildVerdict::Failure);
    }

    #[tokio::test]
    async fn test_missing_build_command_fails_job_before_start() {
        let job = JobConfig::new("core", "/nonexistent");
        let records: Arc<dyn JobStateRepository> =
            Arc::new(crate::adapters::memory::InMemoryJobStateRepository::new());
        let run = run_job(&job, records).await;
        assert!(run.cycles.is_empty());
        assert!(run.error.unwrap().contains("no build_command"));
    }
}
