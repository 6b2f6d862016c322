//! Worker and port configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigResult;
use crate::validation::{validate_port_range, validate_port_span, validate_positive, Validatable};

/// Execution configuration shared by every run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// First port of the range claimed by a run; worker `i` uses
    /// `min_port + 2i` (input) and `min_port + 2i + 1` (output)
    #[serde(default = "default_min_port")]
    pub min_port: u16,

    /// Number of worker processes used when a run does not say otherwise
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,

    /// Executable launched for every worker; defaults to the running binary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_executable: Option<PathBuf>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            min_port: default_min_port(),
            num_workers: default_num_workers(),
            worker_executable: None,
        }
    }
}

impl ExecutionConfig {
    /// Number of ports a run with `num_workers` workers claims
    pub fn port_span(num_workers: usize) -> usize {
        num_workers.saturating_mul(2)
    }
}

impl Validatable for ExecutionConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_port_range(self.min_port, "min_port", self.domain_name())?;
        validate_positive(self.num_workers, "num_workers", self.domain_name())?;
        validate_port_span(
            self.min_port,
            Self::port_span(self.num_workers),
            "worker port",
            self.domain_name(),
        )?;

        if let Some(path) = &self.worker_executable {
            if path.as_os_str().is_empty() {
                return Err(self.validation_error("worker_executable cannot be empty"));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "execution"
    }
}

// Default value functions
fn default_min_port() -> u16 {
    50050
}

fn default_num_workers() -> usize {
    num_cpus::get()
}
