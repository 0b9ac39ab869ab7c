//! Configuration loading and validation.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::adapters::git::{validate_branch_name, InvalidBranchName};
use crate::domain::models::{Config, FailurePolicy, StrategyKind};

/// Directory holding project configuration and state
pub const CONFIG_DIR: &str = ".pretested";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Unknown log level.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unknown log format.
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// Unknown log file rotation policy.
    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    /// The database path is empty.
    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    /// The connection pool size is zero.
    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    /// A job has no name.
    #[error("Job name cannot be empty")]
    EmptyJobName,

    /// Two jobs share a name.
    #[error("Job '{0}' is configured more than once")]
    DuplicateJob(String),

    /// A job has no workspace directory.
    #[error("Job '{0}' has no workspace")]
    EmptyWorkspace(String),

    /// A branch name git would refuse.
    #[error("Job '{job}': {source}")]
    InvalidBranch {
        job: String,
        #[source]
        source: InvalidBranchName,
    },

    /// Ready and target branch are the same.
    #[error("Job '{job}': ready and target branch are both '{branch}'")]
    SameBranch { job: String, branch: String },

    /// Skipping a failed range cannot work with fast-forward.
    #[error("Job '{0}': the skip failure policy cannot be combined with fast_forward")]
    SkipWithFastForward(String),

    /// `max_cycles` is zero.
    #[error("Job '{0}': max_cycles must be at least 1")]
    InvalidMaxCycles(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .pretested/config.yaml (project config, created by init)
    /// 3. .pretested/local.yaml (project local overrides, optional)
    /// 4. Environment variables (PRETESTED_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(Path::new(CONFIG_DIR).join("config.yaml")))
            .merge(Yaml::file(Path::new(CONFIG_DIR).join("local.yaml")))
            .merge(Env::prefixed("PRETESTED_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring environment
    /// overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file {} does not exist", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("PRETESTED_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(
                config.logging.rotation.clone(),
            ));
        }

        let mut seen = HashSet::new();
        for job in &config.jobs {
            if job.name.trim().is_empty() {
                return Err(ConfigError::EmptyJobName);
            }
            if !seen.insert(job.name.as_str()) {
                return Err(ConfigError::DuplicateJob(job.name.clone()));
            }
            if job.workspace.trim().is_empty() {
                return Err(ConfigError::EmptyWorkspace(job.name.clone()));
            }

            for branch in [&job.ready_branch, &job.target_branch] {
                validate_branch_name(branch).map_err(|source| ConfigError::InvalidBranch {
                    job: job.name.clone(),
                    source,
                })?;
            }
            if job.ready_branch == job.target_branch {
                return Err(ConfigError::SameBranch {
                    job: job.name.clone(),
                    branch: job.ready_branch.clone(),
                });
            }

            if job.failure_policy == FailurePolicy::Skip
                && job.strategy == StrategyKind::FastForward
            {
                return Err(ConfigError::SkipWithFastForward(job.name.clone()));
            }
            if job.max_cycles == 0 {
                return Err(ConfigError::InvalidMaxCycles(job.name.clone()));
            }
        }

        Ok(())
    }
}
