//! Trellis CLI entry point.

use anyhow::Result;
use clap::Parser;

use trellis::cli::{dispatch, handle_error, Cli, CliContext};
use trellis::domain::models::Config;
use trellis::infrastructure::config::ConfigLoader;
use trellis::infrastructure::logging::LoggerImpl;

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    if let Some(database) = &cli.database {
        config.database.path.clone_from(database);
        ConfigLoader::validate(&config)?;
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let _logger = LoggerImpl::init(&config.logging)?;
    let ctx = CliContext::open(&config).await?;
    dispatch(cli, &ctx).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        handle_error(err, json);
    }
}
