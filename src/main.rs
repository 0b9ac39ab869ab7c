//! Pretested CLI entry point.

use anyhow::Result;
use clap::Parser;

use pretested::cli::{commands, handle_error, Cli, Commands};
use pretested::domain::models::Config;
use pretested::infrastructure::config::ConfigLoader;
use pretested::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    if let Err(err) = run(cli).await {
        handle_error(err, json_mode);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match (&cli.command, &cli.config) {
        (Commands::Init(_), _) => Config::default(),
        (_, Some(path)) => ConfigLoader::load_from_file(path)?,
        (_, None) => ConfigLoader::load()?,
    };
    let _logger = LoggerImpl::init(&LogConfig::from(&config.logging))?;

    match cli.command {
        Commands::Init(args) => commands::init::execute(args, cli.json).await,
        Commands::Run(args) => commands::run::execute(args, &config, cli.json).await,
        Commands::Status(args) => commands::status::execute(args, &config, cli.json).await,
        Commands::Candidates(args) => {
            commands::candidates::execute(args, &config, cli.json).await
        }
    }
}
