//! Implementation of the `pretested init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::adapters::sqlite::initialize_database;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::DatabaseConfig;
use crate::infrastructure::config::CONFIG_DIR;

const DEFAULT_CONFIG: &str = r#"# Pretested integration configuration.
#
# Every job watches a ready branch and integrates commits whose build passed
# into its target branch. Values here can be overridden in local.yaml or with
# PRETESTED_* environment variables (nested keys separated by "__").

database:
  path: .pretested/pretested.db
  max_connections: 5

logging:
  level: info
  format: pretty
  rotation: daily
  # directory: .pretested/logs

jobs: []
# jobs:
#   - name: core
#     workspace: /path/to/working/copy
#     remote: origin
#     ready_branch: ready
#     target_branch: master
#     strategy: squash            # fast_forward | squash | accumulate
#     unstable_policy: fail       # fail | integrate
#     failure_policy: retry       # retry | skip
#     delete_ready_branch: false
#     build_command: ["make", "test"]
#     unstable_exit_code: 2
#     max_cycles: 20
"#;

/// Arguments for `pretested init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

/// Result of `pretested init`.
#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    /// Whether anything was initialized.
    pub success: bool,
    /// Summary for the operator.
    pub message: String,
    /// Project directory that was initialized.
    pub initialized_path: PathBuf,
    /// Whether the default config file was written.
    pub config_written: bool,
    /// Database created, if any.
    pub database_path: Option<String>,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.config_written {
            lines.push(format!("\nConfiguration written to {CONFIG_DIR}/config.yaml"));
        }
        if let Some(path) = &self.database_path {
            lines.push(format!("Database initialized at {path}"));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Run `pretested init`.
pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };

    let output_data = initialize(&target_path, args.force).await?;
    output(&output_data, json_mode);
    Ok(())
}

async fn initialize(target_path: &Path, force: bool) -> Result<InitOutput> {
    let config_dir = target_path.join(CONFIG_DIR);
    let config_file = config_dir.join("config.yaml");

    if config_file.exists() && !force {
        return Ok(InitOutput {
            success: false,
            message: "Project already initialized. Use --force to overwrite the configuration."
                .to_string(),
            initialized_path: target_path.to_path_buf(),
            config_written: false,
            database_path: None,
        });
    }

    fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;
    fs::write(&config_file, DEFAULT_CONFIG)
        .await
        .with_context(|| format!("Failed to write {}", config_file.display()))?;

    let database = DatabaseConfig {
        path: config_dir.join("pretested.db").display().to_string(),
        ..DatabaseConfig::default()
    };
    let pool = initialize_database(&database)
        .await
        .context("Failed to initialize database")?;
    pool.close().await;

    Ok(InitOutput {
        success: true,
        message: if force {
            "Project reinitialized successfully.".to_string()
        } else {
            "Project initialized successfully.".to_string()
        },
        initialized_path: target_path.to_path_buf(),
        config_written: true,
        database_path: Some(database.path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::ConfigLoader;

    #[test]
    fn test_default_config_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, DEFAULT_CONFIG).unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert!(config.jobs.is_empty());
        assert_eq!(config.database.path, ".pretested/pretested.db");
        assert_eq!(config.logging.level, "info");
    }

    #[tokio::test]
    async fn test_init_creates_config_and_database() {
        let dir = tempfile::tempdir().unwrap();

        let first = initialize(dir.path(), false).await.unwrap();
        assert!(first.success);
        assert!(dir.path().join(".pretested/config.yaml").exists());
        assert!(dir.path().join(".pretested/pretested.db").exists());

        let second = initialize(dir.path(), false).await.unwrap();
        assert!(!second.success);
        assert!(!second.config_written);

        let forced = initialize(dir.path(), true).await.unwrap();
        assert!(forced.success);
        assert!(forced.message.contains("reinitialized"));
    }
}
