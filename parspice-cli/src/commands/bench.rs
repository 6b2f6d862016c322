//! `parspice bench`
//!
//! Times each benchmark job over a grid of worker and task counts. Throughput
//! counts only output payload bytes.

use anyhow::{bail, Result};
use parspice_config::ParspiceConfig;
use parspice_execution::{Controller, Job, JobSpec};
use std::mem::size_of;
use tracing::{info, warn};

use super::build_controller;
use crate::jobs::{LargeOutput, Square, LARGE_OUTPUT_LENGTH};

/// One timed run
#[derive(Debug, Clone, PartialEq)]
pub struct BenchRow {
    pub job: &'static str,
    pub workers: usize,
    pub tasks: usize,
    pub duration_ms: u64,
    pub payload_bytes: u64,
    pub complete: bool,
}

impl BenchRow {
    /// Output payload throughput in MB/s, `None` for runs too fast to measure
    pub fn throughput_mb_s(&self) -> Option<f64> {
        if self.duration_ms == 0 {
            return None;
        }
        Some(self.payload_bytes as f64 / 1_000_000.0 / (self.duration_ms as f64 / 1000.0))
    }
}

fn payload_bytes(job: &str) -> u64 {
    match job {
        LargeOutput::NAME => (LARGE_OUTPUT_LENGTH * size_of::<i32>()) as u64,
        _ => size_of::<f64>() as u64,
    }
}

pub async fn handle_bench(
    config: &ParspiceConfig,
    job: Option<&str>,
    workers: &[usize],
    tasks: &[usize],
    min_port: Option<u16>,
    worker_command: &[String],
) -> Result<()> {
    let jobs: Vec<&str> = match job {
        Some(name @ (Square::NAME | LargeOutput::NAME)) => vec![name],
        Some(other) => bail!(
            "Unknown benchmark job '{}'. Valid jobs: {}, {}",
            other,
            Square::NAME,
            LargeOutput::NAME
        ),
        None => vec![Square::NAME, LargeOutput::NAME],
    };

    let controller = build_controller(config, min_port, worker_command)?;
    let mut rows = Vec::new();
    for name in jobs {
        for &num_workers in workers {
            for &num_tasks in tasks {
                info!(
                    "Benchmarking '{}' with {} tasks on {} workers",
                    name, num_tasks, num_workers
                );
                let row = match name {
                    LargeOutput::NAME => {
                        time_run(&controller, LargeOutput, num_tasks, num_workers).await?
                    }
                    _ => time_run(&controller, Square, num_tasks, num_workers).await?,
                };
                if !row.complete {
                    warn!("Benchmark run of '{}' did not complete cleanly", name);
                }
                rows.push(row);
            }
        }
    }

    print!("{}", format_table(&rows));
    Ok(())
}

async fn time_run<J: Job>(
    controller: &Controller,
    job: J,
    num_tasks: usize,
    num_workers: usize,
) -> Result<BenchRow> {
    let report = controller
        .run_detailed(JobSpec::indexed(job, num_tasks, num_workers))
        .await?;

    Ok(BenchRow {
        job: J::NAME,
        workers: num_workers,
        tasks: num_tasks,
        duration_ms: report.duration_ms,
        payload_bytes: payload_bytes(J::NAME) * report.collected() as u64,
        complete: report.is_complete() && report.collected() == num_tasks,
    })
}

/// Render rows as a fixed-width table
pub fn format_table(rows: &[BenchRow]) -> String {
    let mut table = format!(
        "{:<14} {:>8} {:>10} {:>10} {:>10} {:>9}\n",
        "JOB", "WORKERS", "TASKS", "MS", "MB/S", "COMPLETE"
    );
    for row in rows {
        let throughput = row
            .throughput_mb_s()
            .map_or_else(|| "-".to_string(), |mb| format!("{:.1}", mb));
        table.push_str(&format!(
            "{:<14} {:>8} {:>10} {:>10} {:>10} {:>9}\n",
            row.job,
            row.workers,
            row.tasks,
            row.duration_ms,
            throughput,
            if row.complete { "yes" } else { "no" }
        ));
    }
    table
}
