//! Error types for ParSPICE runs
//!
//! Configuration errors fail a whole run before any socket or process exists.
//! Connection errors stay scoped to one worker's IO thread and are only
//! logged; the run still returns whatever prefix was collected.

use parspice_sender::SenderError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for controller operations
pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Controller-side errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Worker executable not found: {}", .0.display())]
    ExecutableNotFound(PathBuf),

    #[error("Job entry point not registered: {0}")]
    EntryPointNotFound(String),

    #[error("Job '{name}' is registered with a different job type")]
    EntryPointTypeMismatch { name: String },

    #[error("Invalid partition: {0}")]
    InvalidPartition(String),

    #[error("Port range of {span} ports starting at {min_port} exceeds 65535")]
    PortRangeOverflow { min_port: u16, span: usize },

    #[error("Task source mismatch: {0}")]
    TaskSourceMismatch(String),

    #[error("Setup input mismatch: {0}")]
    SetupInputMismatch(String),

    #[error("Failed to encode setup input: {0}")]
    SetupEncoding(#[source] SenderError),

    #[error("Connection error for worker {worker_index}: {source}")]
    ConnectionError {
        worker_index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn worker {worker_index}: {source}")]
    SpawnError {
        worker_index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("IO thread for worker {worker_index} panicked")]
    IoThreadPanicked { worker_index: usize },
}

impl ExecutionError {
    /// Check if this error belongs to the configuration family, i.e. it is
    /// raised before any socket or process is created
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ExecutionError::ConfigurationError(_)
                | ExecutionError::ExecutableNotFound(_)
                | ExecutionError::EntryPointNotFound(_)
                | ExecutionError::EntryPointTypeMismatch { .. }
                | ExecutionError::InvalidPartition(_)
                | ExecutionError::PortRangeOverflow { .. }
                | ExecutionError::TaskSourceMismatch(_)
                | ExecutionError::SetupInputMismatch(_)
                | ExecutionError::SetupEncoding(_)
        )
    }
}

// Convert from config errors
impl From<parspice_config::ConfigError> for ExecutionError {
    fn from(err: parspice_config::ConfigError) -> Self {
        Self::ConfigurationError(err.to_string())
    }
}

/// Error returned by a job's setup or task hook
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Turn a caught panic payload into a task failure
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Failed(format!("panicked: {}", message))
    }
}

/// Worker-side errors
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Invalid worker invocation: {0}")]
    InvalidInvocation(String),

    #[error("Job not registered in this executable: {0}")]
    UnknownJob(String),

    #[error("Failed to connect to port {port}: {source}")]
    Connect {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Setup failed: {0}")]
    Setup(#[source] TaskError),

    #[error("Failed to read setup input: {0}")]
    SetupInput(#[source] SenderError),

    #[error("Task {index} failed: {source}")]
    Task {
        index: usize,
        #[source]
        source: TaskError,
    },

    #[error("Stream error at task {index}: {source}")]
    Sender {
        index: usize,
        #[source]
        source: SenderError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
