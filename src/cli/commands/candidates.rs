//! Implementation of the `pretested candidates` command.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::commands::{git_controller, open_records, select_jobs};
use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::{CandidateSet, Commit, Config};

/// Arguments for `pretested candidates`.
#[derive(Args, Debug)]
pub struct CandidatesArgs {
    /// Job to inspect
    #[arg(short, long)]
    pub job: String,
}

/// One pending commit.
#[derive(Debug, serde::Serialize)]
pub struct CandidateOutput {
    /// Full commit id.
    pub id: String,
    /// Author as `name <email>`.
    pub author: String,
    /// Commit time, RFC 3339.
    pub timestamp: String,
    /// First line of the message.
    pub summary: String,
    /// Whether the commit is a merge.
    pub merge: bool,
}

impl From<&Commit> for CandidateOutput {
    fn from(commit: &Commit) -> Self {
        Self {
            id: commit.id.to_string(),
            author: commit.author.to_string(),
            timestamp: commit.timestamp.to_rfc3339(),
            summary: commit.summary().to_string(),
            merge: commit.is_merge(),
        }
    }
}

/// Result of `pretested candidates`.
#[derive(Debug, serde::Serialize)]
pub struct CandidatesOutput {
    /// Job name.
    pub job: String,
    /// Branch the candidates come from.
    pub ready_branch: String,
    /// Branch they would be integrated into.
    pub target_branch: String,
    /// Range the next build would test.
    pub range: Option<String>,
    /// Pending commits, oldest first.
    pub candidates: Vec<CandidateOutput>,
}

impl CandidatesOutput {
    fn new(job: &str, ready_branch: &str, target_branch: &str, set: &CandidateSet) -> Self {
        Self {
            job: job.to_string(),
            ready_branch: ready_branch.to_string(),
            target_branch: target_branch.to_string(),
            range: set.range().map(|r| r.to_string()),
            candidates: set.commits().iter().map(CandidateOutput::from).collect(),
        }
    }
}

impl CommandOutput for CandidatesOutput {
    fn to_human(&self) -> String {
        if self.candidates.is_empty() {
            return format!(
                "No untested commits on '{}' for job '{}'.",
                self.ready_branch, self.job
            );
        }

        let mut lines = vec![format!(
            "{} commit(s) on '{}' would be integrated into '{}':\n",
            self.candidates.len(),
            self.ready_branch,
            self.target_branch
        )];
        for candidate in &self.candidates {
            let marker = if candidate.merge { " (merge)" } else { "" };
            lines.push(format!(
                "  {:<10} {:<24} {}{}",
                &candidate.id[..candidate.id.len().min(10)],
                truncate(&candidate.author, 24),
                truncate(&candidate.summary, 60),
                marker
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// List what the next cycle would integrate, without preparing anything.
pub async fn execute(args: CandidatesArgs, config: &Config, json_mode: bool) -> Result<()> {
    let job = select_jobs(config, Some(&args.job))?[0];
    let records = open_records(config).await?;
    let controller = git_controller(job, records);

    let set = controller
        .pending_candidates()
        .await
        .with_context(|| format!("Failed to compute candidates for job '{}'", job.name))?;

    let output_data =
        CandidatesOutput::new(&job.name, &job.ready_branch, &job.target_branch, &set);
    output(&output_data, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Author, CommitId};
    use chrono::{TimeZone, Utc};

    fn commit(id: &str, parents: &[&str], message: &str) -> Commit {
        Commit {
            id: CommitId::new(id),
            parents: parents.iter().map(|p| CommitId::new(*p)).collect(),
            author: Author::new("bob", "bob@example.com"),
            message: message.to_string(),
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_empty_set_message() {
        let output = CandidatesOutput::new("core", "ready", "master", &CandidateSet::empty());
        assert!(output.range.is_none());
        assert_eq!(
            output.to_human(),
            "No untested commits on 'ready' for job 'core'."
        );
    }

    #[test]
    fn test_lists_commits_oldest_first() {
        let set = CandidateSet::new(vec![
            commit("1111111111aa", &["0000"], "first\n\nbody"),
            commit("2222222222bb", &["1111111111aa", "9999"], "merge it"),
        ]);
        let output = CandidatesOutput::new("core", "ready", "master", &set);

        assert_eq!(output.candidates[0].summary, "first");
        assert!(output.candidates[1].merge);
        let text = output.to_human();
        assert!(text.starts_with("2 commit(s) on 'ready'"));
        assert!(text.find("1111111111").unwrap() < text.find("2222222222").unwrap());

        let json = output.to_json();
        assert_eq!(json["candidates"][1]["author"], "bob <bob@example.com>");
    }
}
