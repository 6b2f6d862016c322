//! Command handlers for the `parspice` binary

pub mod bench;
pub mod config;
pub mod jobs;
pub mod run;
pub mod worker;

use anyhow::Result;
use parspice_config::ParspiceConfig;
use parspice_execution::{Controller, ControllerConfig};
use std::sync::Arc;

use crate::jobs::builtin_registry;

/// Build a controller for the built-in jobs, honouring a `--min-port` override
pub(crate) fn build_controller(
    config: &ParspiceConfig,
    min_port: Option<u16>,
    worker_command: &[String],
) -> Result<Controller> {
    let mut execution = config.execution.clone();
    if let Some(port) = min_port {
        execution.min_port = port;
    }

    let controller_config = ControllerConfig::from_execution_config(&execution)?
        .with_worker_command(worker_command.iter().cloned());
    Ok(Controller::new(controller_config, Arc::new(builtin_registry())))
}
