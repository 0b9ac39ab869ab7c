//! Configuration model.
//!
//! Deserialized by [`ConfigLoader`](crate::infrastructure::config::ConfigLoader)
//! from YAML files and environment overrides.

use serde::{Deserialize, Serialize};

use super::job::{FailurePolicy, StrategyKind, UnstablePolicy};

/// Main configuration structure for pretested
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Integration jobs, one per ready/target branch pair
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

impl Config {
    /// Job named `name`.
    pub fn job(&self, name: &str) -> Option<&JobConfig> {
        self.jobs.iter().find(|job| job.name == name)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file holding job records
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".pretested/pretested.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub directory: Option<String>,

    /// Rotation for log files: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            directory: None,
            rotation: default_rotation(),
        }
    }
}

/// One integration job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JobConfig {
    /// Unique job name, also the key of the persisted job record
    pub name: String,

    /// Branch receiving commits awaiting integration
    #[serde(default = "default_ready_branch")]
    pub ready_branch: String,

    /// Protected branch only updated by successful integration
    #[serde(default = "default_target_branch")]
    pub target_branch: String,

    /// Integration strategy
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Working copy the job prepares and builds in
    pub workspace: String,

    /// Remote holding the authoritative branches
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Meaning of an unstable build
    #[serde(default)]
    pub unstable_policy: UnstablePolicy,

    /// Handling of ranges whose build failed
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Delete the ready branch after it has been fully integrated
    #[serde(default)]
    pub delete_ready_branch: bool,

    /// Build command run by `pretested run`, argv style
    #[serde(default)]
    pub build_command: Vec<String>,

    /// Exit code of the build command that means "unstable"
    #[serde(default)]
    pub unstable_exit_code: Option<i32>,

    /// Upper bound on consecutive cycles in one `pretested run`
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,
}

fn default_ready_branch() -> String {
    "ready".to_string()
}

fn default_target_branch() -> String {
    "master".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

const fn default_max_cycles() -> u32 {
    20
}

impl JobConfig {
    /// Job with default branches and policies.
    pub fn new(name: impl Into<String>, workspace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ready_branch: default_ready_branch(),
            target_branch: default_target_branch(),
            strategy: StrategyKind::default(),
            workspace: workspace.into(),
            remote: default_remote(),
            unstable_policy: UnstablePolicy::default(),
            failure_policy: FailurePolicy::default(),
            delete_ready_branch: false,
            build_command: Vec::new(),
            unstable_exit_code: None,
            max_cycles: default_max_cycles(),
        }
    }
}
