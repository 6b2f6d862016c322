//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use parspice_execution::WorkerInvocation;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a built-in job across worker processes and print its outputs as JSON
    Run {
        /// Name of the job (see `parspice jobs`)
        #[arg(long, value_name = "NAME")]
        job: String,

        /// Number of tasks, for jobs without an input sender
        #[arg(long, value_name = "N", conflicts_with = "inputs")]
        tasks: Option<usize>,

        /// JSON array of task inputs (example: --inputs='[1.5, 2.5]')
        #[arg(long, value_name = "JSON")]
        inputs: Option<String>,

        /// JSON setup value for jobs that take one (example: --setup=2.5)
        #[arg(long, value_name = "JSON")]
        setup: Option<String>,

        /// Number of worker processes
        #[arg(long, value_name = "N")]
        workers: Option<usize>,

        /// First port of the range used by this run
        #[arg(long, value_name = "PORT")]
        min_port: Option<u16>,

        /// Print the full run report instead of the outputs only
        #[arg(long)]
        report: bool,
    },

    /// Time the benchmark jobs across worker and task counts
    Bench {
        /// Benchmark job to run: square, large-output (default: both)
        #[arg(long, value_name = "NAME")]
        job: Option<String>,

        /// Comma-separated worker counts
        #[arg(
            long,
            value_name = "LIST",
            value_delimiter = ',',
            default_values_t = vec![2usize, 4]
        )]
        workers: Vec<usize>,

        /// Comma-separated task counts
        #[arg(
            long,
            value_name = "LIST",
            value_delimiter = ',',
            default_values_t = vec![1000usize, 100000]
        )]
        tasks: Vec<usize>,

        /// First port of the range used by each run
        #[arg(long, value_name = "PORT")]
        min_port: Option<u16>,
    },

    /// List the jobs this executable can run
    Jobs,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },

    /// Run as worker process (internal use)
    #[command(hide = true)]
    Worker(WorkerInvocation),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Generate a sample configuration file
    Generate {
        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration in use
    Show {
        /// Output format: yaml, json
        #[arg(long, value_name = "FORMAT", default_value = "yaml")]
        format: String,
    },
}
