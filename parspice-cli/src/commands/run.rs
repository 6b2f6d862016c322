//! `parspice run`

use anyhow::{anyhow, bail, Context, Result};
use parspice_config::ParspiceConfig;
use parspice_execution::{Controller, Job, JobSpec};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use super::build_controller;
use crate::jobs::run_builtin;

/// Arguments of one `run` invocation
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub job: String,
    pub tasks: Option<usize>,
    pub inputs: Option<String>,
    /// JSON setup value sent to every worker before its first task
    pub setup: Option<String>,
    pub workers: Option<usize>,
    pub min_port: Option<u16>,
    pub report: bool,
}

pub async fn handle_run(
    config: &ParspiceConfig,
    options: &RunOptions,
    worker_command: &[String],
) -> Result<()> {
    let controller = build_controller(config, options.min_port, worker_command)?;
    let num_workers = options.workers.unwrap_or(config.execution.num_workers);

    let output = run_builtin(&options.job, &controller, options, num_workers).await?;

    println!(
        "{}",
        serde_json::to_string(&output).context("Failed to serialize run output")?
    );
    Ok(())
}

pub(crate) async fn run_job<J>(
    controller: &Controller,
    job: J,
    options: &RunOptions,
    num_workers: usize,
) -> Result<serde_json::Value>
where
    J: Job,
    J::Setup: DeserializeOwned,
    J::Input: DeserializeOwned,
    J::Output: Serialize,
{
    let mut spec = match (&options.inputs, options.tasks) {
        (Some(json), _) => {
            let inputs: Vec<J::Input> = serde_json::from_str(json)
                .with_context(|| format!("Failed to parse --inputs for job '{}'", J::NAME))?;
            JobSpec::with_inputs(job, inputs, num_workers)
        }
        (None, Some(count)) => JobSpec::indexed(job, count, num_workers),
        (None, None) => bail!("Job '{}' needs --tasks or --inputs", J::NAME),
    };
    if let Some(json) = &options.setup {
        let setup: J::Setup = serde_json::from_str(json)
            .with_context(|| format!("Failed to parse --setup for job '{}'", J::NAME))?;
        spec = spec.with_setup(setup);
    }

    let report = controller
        .run_detailed(spec)
        .await
        .map_err(|e| anyhow!("Run of '{}' failed: {}", J::NAME, e))?;
    info!(
        "Collected {} of {} outputs in {}ms",
        report.collected(),
        report.num_tasks,
        report.duration_ms
    );

    if options.report {
        let mut value = serde_json::to_value(&report).context("Failed to serialize run report")?;
        value["outputs"] = serde_json::to_value(&report.outputs)?;
        Ok(value)
    } else {
        Ok(serde_json::to_value(&report.outputs)?)
    }
}
