//! User job model
//!
//! A [`Job`] is the per-task computation plus the senders describing its
//! input and output shapes. Whether a sender is present decides the job's
//! [`JobVariant`], and with it which sockets a run opens. A job may also
//! declare a setup sender; its one setup value travels ahead of the task
//! inputs on the input connection.

use parspice_sender::SharedSender;
use serde::Serialize;
use std::fmt;

use crate::error::TaskError;
use crate::partition::WorkerRange;

/// Which directions carry data over sockets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobVariant {
    NoIo,
    InputOnly,
    OutputOnly,
    InputOutput,
}

impl JobVariant {
    /// Variant implied by the senders `job` declares
    pub fn of<J: Job>(job: &J) -> Self {
        JobVariant::from_flags(job.input_sender().is_some(), job.output_sender().is_some())
    }

    pub fn from_flags(has_input: bool, has_output: bool) -> Self {
        match (has_input, has_output) {
            (false, false) => JobVariant::NoIo,
            (true, false) => JobVariant::InputOnly,
            (false, true) => JobVariant::OutputOnly,
            (true, true) => JobVariant::InputOutput,
        }
    }

    pub fn consumes_input(&self) -> bool {
        matches!(self, JobVariant::InputOnly | JobVariant::InputOutput)
    }

    pub fn produces_output(&self) -> bool {
        matches!(self, JobVariant::OutputOnly | JobVariant::InputOutput)
    }
}

impl fmt::Display for JobVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobVariant::NoIo => "no-io",
            JobVariant::InputOnly => "input-only",
            JobVariant::OutputOnly => "output-only",
            JobVariant::InputOutput => "input-output",
        };
        write!(f, "{}", name)
    }
}

/// Argument handed to a single task invocation
#[derive(Debug, Clone, PartialEq)]
pub enum TaskArg<I> {
    /// Global task index, for jobs without an input sender
    Index(usize),
    /// Decoded input value, for jobs with an input sender
    Input(I),
}

impl<I> TaskArg<I> {
    pub fn index(&self) -> Option<usize> {
        match self {
            TaskArg::Index(index) => Some(*index),
            TaskArg::Input(_) => None,
        }
    }

    pub fn into_input(self) -> Option<I> {
        match self {
            TaskArg::Input(input) => Some(input),
            TaskArg::Index(_) => None,
        }
    }
}

/// A batch computation that runs inside worker processes.
///
/// The same job type must be registered under [`Job::NAME`] in the worker
/// executable, because workers only receive the name on their command line.
/// Construction should be cheap; expensive per-process initialisation such as
/// loading kernels belongs in [`Job::setup`], which runs once per worker
/// before its first task.
///
/// Jobs without an input sender receive [`TaskArg::Index`]; jobs with one
/// receive [`TaskArg::Input`]. Jobs without an output sender still return a
/// value, which the worker discards.
///
/// A job with a [`Job::setup_sender`] gets the run's setup value decoded and
/// passed to [`Job::setup`]; every worker receives the same value. Jobs
/// without one use `type Setup = ();` and receive `None`. Setup also sees the
/// worker's own task range.
pub trait Job: Send + 'static {
    /// Entry-point name used to locate the job inside the worker executable
    const NAME: &'static str;

    type Setup: Send + 'static;
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn setup_sender(&self) -> Option<SharedSender<Self::Setup>> {
        None
    }

    fn input_sender(&self) -> Option<SharedSender<Self::Input>> {
        None
    }

    fn output_sender(&self) -> Option<SharedSender<Self::Output>> {
        None
    }

    fn setup(
        &mut self,
        _worker: &WorkerRange,
        _setup: Option<Self::Setup>,
    ) -> Result<(), TaskError> {
        Ok(())
    }

    fn task(&mut self, arg: TaskArg<Self::Input>) -> Result<Self::Output, TaskError>;
}

#[cfg(test)]
pub(crate) mod test_jobs {
    use super::*;
    use parspice_sender::{F64Sender, I64Sender};
    use std::sync::Arc;

    /// Output-only: index squared
    #[derive(Debug, Default)]
    pub struct SquareIndex;

    impl Job for SquareIndex {
        const NAME: &'static str = "test-square-index";
        type Setup = ();
        type Input = ();
        type Output = i64;

        fn output_sender(&self) -> Option<SharedSender<i64>> {
            Some(Arc::new(I64Sender))
        }

        fn task(&mut self, arg: TaskArg<()>) -> Result<i64, TaskError> {
            let index = arg.index().ok_or_else(|| TaskError::failed("expected an index"))? as i64;
            if index == 3 {
                return Err(TaskError::failed("index 3 is rejected"));
            }
            Ok(index * index)
        }
    }

    /// Input-output: add the offset set up once per worker
    #[derive(Debug, Default)]
    pub struct AddOffset {
        pub offset: f64,
    }

    impl Job for AddOffset {
        const NAME: &'static str = "test-add-offset";
        type Setup = ();
        type Input = f64;
        type Output = f64;

        fn input_sender(&self) -> Option<SharedSender<f64>> {
            Some(Arc::new(F64Sender))
        }

        fn output_sender(&self) -> Option<SharedSender<f64>> {
            Some(Arc::new(F64Sender))
        }

        fn setup(&mut self, _worker: &WorkerRange, _setup: Option<()>) -> Result<(), TaskError> {
            self.offset = 100.0;
            Ok(())
        }

        fn task(&mut self, arg: TaskArg<f64>) -> Result<f64, TaskError> {
            let value = arg.into_input().ok_or_else(|| TaskError::failed("expected an input"))?;
            Ok(value + self.offset)
        }
    }

    /// No sockets at all
    #[derive(Debug, Default)]
    pub struct Noop;

    impl Job for Noop {
        const NAME: &'static str = "test-noop";
        type Setup = ();
        type Input = ();
        type Output = ();

        fn task(&mut self, _arg: TaskArg<()>) -> Result<(), TaskError> {
            Ok(())
        }
    }

    /// Output-only: index times the scale received as setup input
    #[derive(Debug, Default)]
    pub struct ScaleIndex {
        pub scale: Option<i64>,
    }

    impl Job for ScaleIndex {
        const NAME: &'static str = "test-scale-index";
        type Setup = i64;
        type Input = ();
        type Output = i64;

        fn setup_sender(&self) -> Option<SharedSender<i64>> {
            Some(Arc::new(I64Sender))
        }

        fn output_sender(&self) -> Option<SharedSender<i64>> {
            Some(Arc::new(I64Sender))
        }

        fn setup(&mut self, _worker: &WorkerRange, setup: Option<i64>) -> Result<(), TaskError> {
            self.scale = Some(setup.ok_or_else(|| TaskError::failed("missing scale"))?);
            Ok(())
        }

        fn task(&mut self, arg: TaskArg<()>) -> Result<i64, TaskError> {
            let scale = self.scale.ok_or_else(|| TaskError::failed("setup did not run"))?;
            let index = arg.index().ok_or_else(|| TaskError::failed("expected an index"))? as i64;
            Ok(index * scale)
        }
    }

    /// Output-only job whose setup fails on worker 0
    #[derive(Debug, Default)]
    pub struct BrokenSetup;

    impl Job for BrokenSetup {
        const NAME: &'static str = "test-broken-setup";
        type Setup = ();
        type Input = ();
        type Output = i64;

        fn output_sender(&self) -> Option<SharedSender<i64>> {
            Some(Arc::new(I64Sender))
        }

        fn setup(&mut self, worker: &WorkerRange, _setup: Option<()>) -> Result<(), TaskError> {
            match worker.worker_index {
                0 => Err(TaskError::failed("no kernels")),
                _ => Ok(()),
            }
        }

        fn task(&mut self, _arg: TaskArg<()>) -> Result<i64, TaskError> {
            Ok(1)
        }
    }

    /// Output-only job that panics at index 2
    #[derive(Debug, Default)]
    pub struct PanicAtTwo;

    impl Job for PanicAtTwo {
        const NAME: &'static str = "test-panic-at-two";
        type Setup = ();
        type Input = ();
        type Output = i64;

        fn output_sender(&self) -> Option<SharedSender<i64>> {
            Some(Arc::new(I64Sender))
        }

        fn task(&mut self, arg: TaskArg<()>) -> Result<i64, TaskError> {
            let values = [10, 11];
            let index = arg.index().ok_or_else(|| TaskError::failed("expected an index"))?;
            Ok(values[index])
        }
    }
}
