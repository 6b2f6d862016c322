use anyhow::{Context, Result};
use clap::Parser;
use parspice_config::{ConfigLoader, LoggingConfig, ParspiceConfig};
use parspice_execution::WORKER_COMMAND;
use std::path::PathBuf;
use tracing::{debug, error, info};

mod cli;
mod commands;
mod jobs;
mod logging;

use cli::{Cli, Commands, ConfigCommands};
use commands::run::RunOptions;

/// Load configuration from a file, or from defaults and environment variables
fn load_config(config_path: Option<&PathBuf>) -> Result<ParspiceConfig> {
    let config = ConfigLoader::new()
        .load(config_path)
        .context("Failed to load configuration")?;
    debug!("Configuration loaded");
    Ok(config)
}

/// Arguments that turn a copy of this executable into a worker, forwarding
/// the global flags that shape its logging
fn worker_command(cli: &Cli) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(path) = &cli.config {
        args.push("--config".to_string());
        args.push(path.display().to_string());
    }
    if let Some(level) = &cli.log_level {
        args.push("--log-level".to_string());
        args.push(level.clone());
    }
    args.push(WORKER_COMMAND.to_string());
    args
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle worker mode first; it must exit successfully even when
    // configuration is broken
    if let Commands::Worker(invocation) = cli.command {
        let logging_config = ConfigLoader::new()
            .load(cli.config.as_ref())
            .map(|config| config.logging)
            .unwrap_or_else(|_| LoggingConfig::default());
        logging::init_worker_tracing(&logging_config, cli.log_level.as_ref());

        // Task panics are caught inside the runtime; anything escaping it is
        // logged without changing the exit status
        if let Err(e) =
            tokio::task::spawn_blocking(move || commands::worker::handle_worker(invocation)).await
        {
            error!("Worker thread panicked: {}", e);
        }
        return Ok(());
    }

    let config = load_config(cli.config.as_ref())?;
    logging::init_tracing(&config.logging, cli.log_level.as_ref())?;
    info!("ParSPICE CLI starting");

    let worker_command = worker_command(&cli);
    match &cli.command {
        Commands::Run {
            job,
            tasks,
            inputs,
            setup,
            workers,
            min_port,
            report,
        } => {
            let options = RunOptions {
                job: job.clone(),
                tasks: *tasks,
                inputs: inputs.clone(),
                setup: setup.clone(),
                workers: *workers,
                min_port: *min_port,
                report: *report,
            };
            commands::run::handle_run(&config, &options, &worker_command).await
        }
        Commands::Bench {
            job,
            workers,
            tasks,
            min_port,
        } => {
            commands::bench::handle_bench(
                &config,
                job.as_deref(),
                workers,
                tasks,
                *min_port,
                &worker_command,
            )
            .await
        }
        Commands::Jobs => {
            commands::jobs::handle_jobs();
            Ok(())
        }
        Commands::Config { config_cmd } => match config_cmd {
            ConfigCommands::Validate { config_file } => {
                commands::config::handle_config_validate(config_file)
            }
            ConfigCommands::Generate { output, force } => {
                commands::config::handle_config_generate(output, *force)
            }
            ConfigCommands::Show { format } => {
                commands::config::handle_config_show(&config, format)
            }
        },
        Commands::Worker(_) => Ok(()),
    }
}
