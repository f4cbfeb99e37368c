mod cli;
mod commands;
mod config;
mod display;

use std::process;

use anyhow::Result;
use clap::Parser;
use tracing::{Level, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};
use trafficlight::{CredentialKey, StatusCommand};

use crate::{
    cli::{Args, Commands},
    commands::CommandExecutor,
    config::AppConfig,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Application error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet)?;

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(path) = args.credentials {
        config = config.with_credentials_file(path);
    }
    let executor = CommandExecutor::new(config)?;

    match args.command {
        Commands::Watch => executor.watch().await?,
        Commands::Available => executor.set_status(StatusCommand::Available).await?,
        Commands::Busy => executor.set_status(StatusCommand::Busy).await?,
        Commands::Dnd => executor.set_status(StatusCommand::DoNotDisturb).await?,
        Commands::Token { value } => {
            executor
                .store_secret(CredentialKey::UserToken, value)
                .await?
        }
        Commands::Device { value } => {
            executor
                .store_secret(CredentialKey::DeviceId, value)
                .await?
        }
        Commands::Config => executor.show_config()?,
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    subscriber
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .init();
    Ok(())
}
