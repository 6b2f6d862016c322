//! Worker process runtime
//!
//! A worker is the same executable as the controller, started with the
//! [`WORKER_COMMAND`] subcommand and a [`WorkerInvocation`]. It connects to
//! the controller's listeners, runs its share of tasks in order, and closes
//! its connections before exiting.

use clap::{Args, Parser};
use serde::Serialize;
use std::fmt;
use std::io::{BufReader, BufWriter, Read, Write};
use std::net::{Ipv4Addr, TcpStream};
use std::ops::Range;
use tracing::{debug, info, warn};

use crate::error::WorkerError;
use crate::partition::{WorkerPorts, WorkerRange};
use crate::registry::JobRegistry;
use crate::runner::ErasedJob;

/// Subcommand that turns the executable into a worker
pub const WORKER_COMMAND: &str = "worker";

/// Command-line arguments of a worker process
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct WorkerInvocation {
    /// Registered name of the job to run
    #[arg(value_name = "JOB")]
    pub job: String,

    /// Input port; the output port is `base_port + 1`
    #[arg(value_name = "BASE_PORT")]
    pub base_port: u16,

    /// Global index of the first task
    #[arg(value_name = "START_INDEX")]
    pub start_index: usize,

    /// Number of tasks to run
    #[arg(value_name = "COUNT")]
    pub count: usize,

    #[arg(value_name = "WORKER_INDEX")]
    pub worker_index: usize,
}

#[derive(Parser)]
#[command(no_binary_name = true)]
struct InvocationArgs {
    #[command(flatten)]
    invocation: WorkerInvocation,
}

impl WorkerInvocation {
    pub fn new(job: impl Into<String>, range: &WorkerRange, ports: WorkerPorts) -> Self {
        Self {
            job: job.into(),
            base_port: ports.input,
            start_index: range.start_index,
            count: range.count,
            worker_index: range.worker_index,
        }
    }

    /// Parse the positional arguments that follow [`WORKER_COMMAND`]
    pub fn parse_from<I, T>(args: I) -> Result<Self, WorkerError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        InvocationArgs::try_parse_from(args)
            .map(|parsed| parsed.invocation)
            .map_err(|e| WorkerError::InvalidInvocation(e.to_string()))
    }

    /// Arguments in the order [`WorkerInvocation::parse_from`] expects
    pub fn to_args(&self) -> Vec<String> {
        vec![
            self.job.clone(),
            self.base_port.to_string(),
            self.start_index.to_string(),
            self.count.to_string(),
            self.worker_index.to_string(),
        ]
    }

    pub fn input_port(&self) -> u16 {
        self.base_port
    }

    pub fn output_port(&self) -> Result<u16, WorkerError> {
        self.base_port.checked_add(1).ok_or_else(|| {
            WorkerError::InvalidInvocation(format!(
                "base port {} has no output port",
                self.base_port
            ))
        })
    }

    /// Task range assigned to this worker
    pub fn range(&self) -> WorkerRange {
        WorkerRange {
            worker_index: self.worker_index,
            start_index: self.start_index,
            count: self.count,
        }
    }

    /// Global task indices handled by this worker
    pub fn indices(&self) -> Range<usize> {
        self.start_index..self.start_index.saturating_add(self.count)
    }
}

/// Lifecycle of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "task", rename_all = "snake_case")]
pub enum WorkerState {
    Created,
    ConnectionsEstablished,
    SetupDone,
    /// Running the task with this global index
    Running(usize),
    ConnectionsClosed,
    Exited,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Created => write!(f, "created"),
            WorkerState::ConnectionsEstablished => write!(f, "connections established"),
            WorkerState::SetupDone => write!(f, "setup done"),
            WorkerState::Running(index) => write!(f, "running task {}", index),
            WorkerState::ConnectionsClosed => write!(f, "connections closed"),
            WorkerState::Exited => write!(f, "exited"),
        }
    }
}

/// What a worker got through before exiting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub worker_index: usize,
    pub completed: usize,
    pub assigned: usize,
    pub final_state: WorkerState,
}

/// Drives one worker from connection to exit
pub struct WorkerRuntime {
    invocation: WorkerInvocation,
    job: Box<dyn ErasedJob>,
    state: WorkerState,
    input: Option<BufReader<TcpStream>>,
    output: Option<BufWriter<TcpStream>>,
    completed: usize,
}

impl WorkerRuntime {
    /// Instantiate the job named in `invocation`
    pub fn new(
        invocation: WorkerInvocation,
        registry: &JobRegistry,
    ) -> Result<Self, WorkerError> {
        let job = registry
            .instantiate(&invocation.job)
            .ok_or_else(|| WorkerError::UnknownJob(invocation.job.clone()))?;

        Ok(Self {
            invocation,
            job,
            state: WorkerState::Created,
            input: None,
            output: None,
            completed: 0,
        })
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn invocation(&self) -> &WorkerInvocation {
        &self.invocation
    }

    /// Connect, set up, run every task, then close.
    ///
    /// Each output value is flushed as soon as its task finishes. Connections
    /// are closed whether or not a step failed, so the controller receives
    /// every value produced before a failure. The first error is returned.
    pub fn run(mut self) -> Result<WorkerReport, WorkerError> {
        info!(
            "Worker {} starting job '{}' for tasks {:?}",
            self.invocation.worker_index,
            self.invocation.job,
            self.invocation.indices()
        );

        let result = self.execute();
        let closed = self.close();
        self.transition(WorkerState::Exited);

        let report = WorkerReport {
            worker_index: self.invocation.worker_index,
            completed: self.completed,
            assigned: self.invocation.count,
            final_state: self.state,
        };

        match result.and(closed) {
            Ok(()) => {
                info!(
                    "Worker {} finished {} tasks",
                    report.worker_index, report.completed
                );
                Ok(report)
            }
            Err(e) => {
                warn!(
                    worker_index = report.worker_index,
                    completed = report.completed,
                    "Worker stopped early: {}",
                    e
                );
                Err(e)
            }
        }
    }

    fn execute(&mut self) -> Result<(), WorkerError> {
        self.connect()?;
        self.setup()?;
        self.run_tasks()
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(worker_index = self.invocation.worker_index, "{} -> {}", self.state, next);
        self.state = next;
    }

    fn connect(&mut self) -> Result<(), WorkerError> {
        let variant = self.job.variant();

        if self.job.opens_input() {
            let port = self.invocation.input_port();
            let stream = connect_loopback(port)?;
            self.input = Some(BufReader::new(stream));
        }

        if variant.produces_output() {
            let port = self.invocation.output_port()?;
            let stream = connect_loopback(port)?;
            self.output = Some(BufWriter::new(stream));
        }

        self.transition(WorkerState::ConnectionsEstablished);
        Ok(())
    }

    fn setup(&mut self) -> Result<(), WorkerError> {
        let range = self.invocation.range();
        let input = self.input.as_mut().map(|r| r as &mut dyn Read);
        self.job.setup(&range, input)?;
        self.transition(WorkerState::SetupDone);
        Ok(())
    }

    fn run_tasks(&mut self) -> Result<(), WorkerError> {
        for index in self.invocation.indices() {
            self.transition(WorkerState::Running(index));

            let input = self.input.as_mut().map(|r| r as &mut dyn Read);
            let output = self.output.as_mut().map(|w| w as &mut dyn Write);
            self.job.run_task(index, input, output)?;

            // One flush per task so the collector sees progress as it happens
            if let Some(output) = self.output.as_mut() {
                output.flush()?;
            }
            self.completed += 1;
        }
        Ok(())
    }

    /// Close in reverse order of opening: output, then input
    fn close(&mut self) -> Result<(), WorkerError> {
        let mut result = Ok(());

        if let Some(mut output) = self.output.take() {
            if let Err(e) = output.flush() {
                result = Err(WorkerError::Io(e));
            }
        }
        self.input.take();

        self.transition(WorkerState::ConnectionsClosed);
        result
    }
}

fn connect_loopback(port: u16) -> Result<TcpStream, WorkerError> {
    let stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port))
        .map_err(|source| WorkerError::Connect { port, source })?;
    debug!(port, "Connected to controller");
    Ok(stream)
}

/// Build and run a worker in one step
pub fn run_worker(
    invocation: WorkerInvocation,
    registry: &JobRegistry,
) -> Result<WorkerReport, WorkerError> {
    WorkerRuntime::new(invocation, registry)?.run()
}
