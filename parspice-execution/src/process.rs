//! Controller: runs one job across worker processes
//!
//! A run validates its configuration, partitions the tasks, binds every
//! worker's listeners, spawns the worker processes, waits for all IO and all
//! exits, and concatenates outputs by worker index.

use chrono::{DateTime, Utc};
use parspice_config::{ExecutionConfig, Validatable};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{ExecutionError, ExecutionResult};
use crate::io_manager::{InputPlan, IoManager, IoOutcome, OutputPlan};
use crate::job::{Job, JobVariant};
use crate::partition::{partition, validate_port_range, worker_ports, WorkerPorts, WorkerRange};
use crate::registry::JobRegistry;
use crate::socket::{DispatchOutcome, TransferStatus};
use crate::worker::{WorkerInvocation, WORKER_COMMAND};

/// How the controller launches workers
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Executable started for every worker
    pub worker_executable: PathBuf,
    /// First port of the range claimed by a run
    pub min_port: u16,
    /// Arguments placed before the worker invocation
    pub worker_command: Vec<String>,
}

impl ControllerConfig {
    pub fn new(worker_executable: impl Into<PathBuf>, min_port: u16) -> Self {
        Self {
            worker_executable: worker_executable.into(),
            min_port,
            worker_command: vec![WORKER_COMMAND.to_string()],
        }
    }

    /// Build from loaded configuration. Without an explicit executable the
    /// running binary is used.
    pub fn from_execution_config(config: &ExecutionConfig) -> ExecutionResult<Self> {
        config.validate()?;

        let executable = match &config.worker_executable {
            Some(path) => path.clone(),
            None => std::env::current_exe().map_err(|e| {
                ExecutionError::ConfigurationError(format!(
                    "Cannot locate current executable: {}",
                    e
                ))
            })?,
        };

        Ok(Self::new(executable, config.min_port))
    }

    pub fn with_worker_command<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.worker_command = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Where task arguments come from
#[derive(Debug, Clone, PartialEq)]
pub enum TaskSource<I> {
    /// Tasks `0..n` receive their index
    Count(usize),
    /// One task per input value, in order
    Inputs(Vec<I>),
}

impl<I> TaskSource<I> {
    pub fn len(&self) -> usize {
        match self {
            TaskSource::Count(count) => *count,
            TaskSource::Inputs(inputs) => inputs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One run request
pub struct JobSpec<J: Job> {
    pub job: J,
    pub tasks: TaskSource<J::Input>,
    pub num_workers: usize,
    /// Value handed to every worker's setup hook; required exactly when the
    /// job declares a setup sender
    pub setup: Option<J::Setup>,
}

impl<J: Job> JobSpec<J> {
    /// Run `num_tasks` index-driven tasks
    pub fn indexed(job: J, num_tasks: usize, num_workers: usize) -> Self {
        Self {
            job,
            tasks: TaskSource::Count(num_tasks),
            num_workers,
            setup: None,
        }
    }

    /// Run one task per element of `inputs`
    pub fn with_inputs(job: J, inputs: Vec<J::Input>, num_workers: usize) -> Self {
        Self {
            job,
            tasks: TaskSource::Inputs(inputs),
            num_workers,
            setup: None,
        }
    }

    pub fn with_setup(mut self, setup: J::Setup) -> Self {
        self.setup = Some(setup);
        self
    }

    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }
}

/// Per-worker view of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSummary {
    #[serde(flatten)]
    pub range: WorkerRange,
    pub ports: WorkerPorts,
    pub pid: Option<u32>,
    pub spawned: bool,
    pub exit_code: Option<i32>,
    pub exit_success: bool,
    pub dispatch: Option<DispatchOutcome>,
    pub collected: Option<usize>,
    pub collect_status: Option<TransferStatus>,
}

impl WorkerSummary {
    /// Spawned, exited cleanly, and every socket role completed
    pub fn is_complete(&self) -> bool {
        self.spawned
            && self.exit_success
            && self.dispatch.as_ref().map_or(true, |d| d.status.is_completed())
            && self.collect_status.as_ref().map_or(true, TransferStatus::is_completed)
    }
}

/// Everything known about a finished run
#[derive(Debug, Serialize)]
pub struct RunReport<O> {
    pub run_id: Uuid,
    pub job: String,
    pub variant: JobVariant,
    pub num_tasks: usize,
    pub num_workers: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub workers: Vec<WorkerSummary>,
    /// Aggregated outputs in global task order; `None` when the job has no
    /// output sender
    #[serde(skip)]
    pub outputs: Option<Vec<O>>,
}

impl<O> RunReport<O> {
    pub fn is_complete(&self) -> bool {
        self.workers.iter().all(WorkerSummary::is_complete)
    }

    pub fn collected(&self) -> usize {
        self.outputs.as_ref().map_or(0, Vec::len)
    }

    pub fn into_outputs(self) -> Option<Vec<O>> {
        self.outputs
    }
}

struct WorkerRun<O> {
    io: Option<IoOutcome<O>>,
    pid: Option<u32>,
    exit: Option<ExitStatus>,
}

/// Runs jobs across worker processes
pub struct Controller {
    config: ControllerConfig,
    registry: Arc<JobRegistry>,
}

impl Controller {
    pub fn new(config: ControllerConfig, registry: Arc<JobRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Run a job and return its outputs in global task order.
    ///
    /// Jobs without an output sender yield `Ok(None)`. Worker failures do not
    /// fail the run: the result then holds only the values that arrived, and
    /// the failure is logged. Only configuration errors are returned, before
    /// any socket or process exists.
    pub async fn run<J: Job>(&self, spec: JobSpec<J>) -> ExecutionResult<Option<Vec<J::Output>>> {
        Ok(self.run_detailed(spec).await?.into_outputs())
    }

    /// Like [`Controller::run`], with per-worker details
    pub async fn run_detailed<J: Job>(
        &self,
        spec: JobSpec<J>,
    ) -> ExecutionResult<RunReport<J::Output>> {
        let run_id = Uuid::new_v4();
        let span = info_span!("parspice_run", %run_id, job = J::NAME);
        self.execute(run_id, spec).instrument(span).await
    }

    async fn execute<J: Job>(
        &self,
        run_id: Uuid,
        spec: JobSpec<J>,
    ) -> ExecutionResult<RunReport<J::Output>> {
        let started_at = Utc::now();
        let JobSpec {
            job,
            tasks,
            num_workers,
            setup,
        } = spec;
        let variant = JobVariant::of(&job);
        let num_tasks = tasks.len();

        self.validate::<J>(variant, &tasks, num_workers)?;
        let setup = encode_setup(&job, setup)?;
        let ranges = partition(num_tasks, num_workers)?;
        let ports = ranges
            .iter()
            .map(|range| worker_ports(self.config.min_port, range.worker_index))
            .collect::<ExecutionResult<Vec<_>>>()?;

        info!(
            "Running job '{}' ({}) with {} tasks on {} workers",
            J::NAME,
            variant,
            num_tasks,
            num_workers
        );

        // Listeners must exist before any worker tries to connect
        let input_sender = job.input_sender();
        let output_sender = job.output_sender();
        let mut inputs = match tasks {
            TaskSource::Inputs(values) => Some(values.into_iter()),
            TaskSource::Count(_) => None,
        };

        let mut managers = Vec::with_capacity(num_workers);
        for (range, ports) in ranges.iter().zip(&ports) {
            let input_plan = match (&input_sender, inputs.as_mut()) {
                (Some(sender), Some(values)) => Some(InputPlan {
                    port: ports.input,
                    setup: setup.clone(),
                    inputs: values.by_ref().take(range.count).collect(),
                    sender: Some(Arc::clone(sender)),
                }),
                _ => setup.as_ref().map(|setup| InputPlan {
                    port: ports.input,
                    setup: Some(Arc::clone(setup)),
                    inputs: Vec::new(),
                    sender: None,
                }),
            };
            let output_plan = output_sender.as_ref().map(|sender| OutputPlan {
                port: ports.output,
                expected: range.count,
                sender: Arc::clone(sender),
            });
            managers.push(IoManager::start(range.worker_index, input_plan, output_plan));
        }

        let mut supervisors: Vec<JoinHandle<WorkerRun<J::Output>>> =
            Vec::with_capacity(num_workers);
        for ((range, ports), manager) in ranges.iter().zip(&ports).zip(managers) {
            let invocation = WorkerInvocation::new(J::NAME, range, *ports);
            let child = match self.spawn_worker(&invocation) {
                Ok(child) => Some(child),
                Err(e) => {
                    error!("{}", e);
                    manager.abandon();
                    None
                }
            };
            supervisors.push(tokio::spawn(supervise(manager, child)));
        }

        let mut outputs = output_sender.as_ref().map(|_| Vec::with_capacity(num_tasks));
        let mut workers = Vec::with_capacity(num_workers);
        for ((range, ports), supervisor) in ranges.iter().zip(&ports).zip(supervisors) {
            let run = supervisor.await.unwrap_or_else(|e| {
                error!(
                    "{}: {}",
                    ExecutionError::IoThreadPanicked {
                        worker_index: range.worker_index
                    },
                    e
                );
                WorkerRun {
                    io: None,
                    pid: None,
                    exit: None,
                }
            });

            let (dispatch, collect) = match run.io {
                Some(io) => (io.dispatch, io.collect),
                None => (None, None),
            };
            let collected = collect.as_ref().map(|c| c.values.len());
            let collect_status = collect.as_ref().map(|c| c.status.clone());
            if let (Some(all), Some(collect)) = (outputs.as_mut(), collect) {
                all.extend(collect.values);
            }

            workers.push(WorkerSummary {
                range: *range,
                ports: *ports,
                pid: run.pid,
                spawned: run.pid.is_some() || run.exit.is_some(),
                exit_code: run.exit.and_then(|status| status.code()),
                exit_success: run.exit.map_or(false, |status| status.success()),
                dispatch,
                collected,
                collect_status,
            });
        }

        let completed_at = Utc::now();
        let duration_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;
        let report = RunReport {
            run_id,
            job: J::NAME.to_string(),
            variant,
            num_tasks,
            num_workers,
            started_at,
            completed_at,
            duration_ms,
            workers,
            outputs,
        };

        if report.is_complete() {
            info!("Job '{}' completed in {}ms", J::NAME, duration_ms);
        } else {
            warn!(
                collected = report.collected(),
                num_tasks,
                "Job '{}' finished with failures after {}ms",
                J::NAME,
                duration_ms
            );
        }

        Ok(report)
    }

    fn validate<J: Job>(
        &self,
        variant: JobVariant,
        tasks: &TaskSource<J::Input>,
        num_workers: usize,
    ) -> ExecutionResult<()> {
        validate_executable(&self.config.worker_executable)?;
        self.registry.resolve::<J>()?;

        if num_workers == 0 {
            return Err(ExecutionError::InvalidPartition(
                "num_workers must be at least 1".to_string(),
            ));
        }
        validate_port_range(self.config.min_port, num_workers)?;

        match (variant.consumes_input(), tasks) {
            (true, TaskSource::Count(_)) => Err(ExecutionError::TaskSourceMismatch(format!(
                "job '{}' has an input sender and needs input values",
                J::NAME
            ))),
            (false, TaskSource::Inputs(_)) => Err(ExecutionError::TaskSourceMismatch(format!(
                "job '{}' has no input sender and takes a task count",
                J::NAME
            ))),
            _ => Ok(()),
        }
    }

    fn spawn_worker(&self, invocation: &WorkerInvocation) -> ExecutionResult<Child> {
        let child = Command::new(&self.config.worker_executable)
            .args(&self.config.worker_command)
            .args(invocation.to_args())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| ExecutionError::SpawnError {
                worker_index: invocation.worker_index,
                source,
            })?;

        debug!(
            worker_index = invocation.worker_index,
            pid = child.id(),
            "Spawned worker for tasks {:?}",
            invocation.indices()
        );
        Ok(child)
    }
}

/// Check the setup value against the job's setup sender and encode it once
/// for every worker
fn encode_setup<J: Job>(job: &J, setup: Option<J::Setup>) -> ExecutionResult<Option<Arc<[u8]>>> {
    match (job.setup_sender(), setup) {
        (Some(sender), Some(value)) => {
            let mut bytes = Vec::new();
            sender
                .encode(&value, &mut bytes)
                .map_err(ExecutionError::SetupEncoding)?;
            Ok(Some(Arc::from(bytes)))
        }
        (Some(_), None) => Err(ExecutionError::SetupInputMismatch(format!(
            "job '{}' has a setup sender and needs a setup value",
            J::NAME
        ))),
        (None, Some(_)) => Err(ExecutionError::SetupInputMismatch(format!(
            "job '{}' has no setup sender and takes no setup value",
            J::NAME
        ))),
        (None, None) => Ok(None),
    }
}

/// Wait for one worker's IO and process exit. Once the process has exited,
/// listeners it never connected to are woken so the IO side cannot hang.
async fn supervise<O: Send + 'static>(
    manager: IoManager<O>,
    child: Option<Child>,
) -> WorkerRun<O> {
    let worker_index = manager.worker_index();
    let waker = manager.waker();
    let pid = child.as_ref().and_then(Child::id);

    let exit = async move {
        let mut child = child?;
        let status = match child.wait().await {
            Ok(status) => Some(status),
            Err(e) => {
                error!(worker_index, error = %e, "Failed to wait for worker");
                None
            }
        };
        if let Some(status) = &status {
            if status.success() {
                debug!(worker_index, "Worker exited");
            } else {
                warn!(worker_index, %status, "Worker exited with non-zero status");
            }
        }
        waker.wake();
        status
    };

    let (io, exit) = tokio::join!(manager.join(), exit);
    WorkerRun {
        io: Some(io),
        pid,
        exit,
    }
}

fn validate_executable(path: &Path) -> ExecutionResult<()> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Ok(()),
        _ => Err(ExecutionError::ExecutableNotFound(path.to_path_buf())),
    }
}
