//! ParSPICE execution engine
//!
//! Partitions a batch of independent tasks across separate worker processes.
//! Each worker learns its role from its command line, connects back to the
//! controller over loopback TCP, and streams Sender-encoded values in task
//! order. The controller concatenates per-worker results by worker index, so
//! the aggregate is ordered by global task index.

pub mod error;
pub mod io_manager;
pub mod job;
pub mod partition;
pub mod process;
pub mod registry;
pub mod runner;
pub mod socket;
pub mod worker;

// Re-export main types
pub use error::{ExecutionError, ExecutionResult, TaskError, WorkerError};
pub use io_manager::{InputPlan, IoManager, IoOutcome, ListenerWaker, OutputPlan};
pub use job::{Job, JobVariant, TaskArg};
pub use partition::{partition, share, start_index, worker_ports, WorkerPorts, WorkerRange};
pub use process::{Controller, ControllerConfig, JobSpec, RunReport, TaskSource, WorkerSummary};
pub use registry::JobRegistry;
pub use socket::{
    CollectorOutcome, DispatchOutcome, InputDispatcher, OutputCollector, TransferStatus,
};
pub use worker::{
    run_worker, WorkerInvocation, WorkerReport, WorkerRuntime, WorkerState, WORKER_COMMAND,
};

// Re-export the wire contract so jobs only need this crate
pub use parspice_sender as sender;
