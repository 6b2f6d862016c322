//! Hidden `parspice worker` subcommand

use parspice_execution::{run_worker, WorkerInvocation};
use tracing::error;

use crate::jobs::builtin_registry;

/// Run the worker side of a job. Failures are logged; the process still
/// exits successfully and the controller notices the missing outputs.
pub fn handle_worker(invocation: WorkerInvocation) {
    let worker_index = invocation.worker_index;
    let registry = builtin_registry();

    if let Err(e) = run_worker(invocation, &registry) {
        error!(worker_index, "Worker failed: {}", e);
    }
}
