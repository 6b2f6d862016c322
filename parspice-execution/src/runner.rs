//! Type-erased task runner used inside workers.
//!
//! One runner covers all four job variants: an optional decode step, the
//! compute step, and an optional encode step. A panic inside a job hook is
//! caught and reported as a failure of that hook.

use parspice_sender::SharedSender;
use std::io::{Read, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{TaskError, WorkerError};
use crate::job::{Job, JobVariant, TaskArg};
use crate::partition::WorkerRange;

/// Object-safe view of a [`Job`] with its senders attached
pub trait ErasedJob: Send {
    fn name(&self) -> &'static str;

    fn variant(&self) -> JobVariant;

    /// Whether a setup value arrives on the input connection
    fn takes_setup_input(&self) -> bool;

    /// Whether the worker opens the input connection at all
    fn opens_input(&self) -> bool {
        self.variant().consumes_input() || self.takes_setup_input()
    }

    /// Read the setup value from `input` when the job declares a setup
    /// sender, then run the job's setup hook for `worker`
    fn setup(
        &mut self,
        worker: &WorkerRange,
        input: Option<&mut dyn Read>,
    ) -> Result<(), WorkerError>;

    /// Run the task with global index `index`, reading its input from `input`
    /// and writing its output to `output` when the job has those senders
    fn run_task(
        &mut self,
        index: usize,
        input: Option<&mut dyn Read>,
        output: Option<&mut dyn Write>,
    ) -> Result<(), WorkerError>;
}

pub(crate) struct TaskRunner<J: Job> {
    job: J,
    setup: Option<SharedSender<J::Setup>>,
    decode: Option<SharedSender<J::Input>>,
    encode: Option<SharedSender<J::Output>>,
}

impl<J: Job> TaskRunner<J> {
    pub(crate) fn new(job: J) -> Self {
        let setup = job.setup_sender();
        let decode = job.input_sender();
        let encode = job.output_sender();
        Self {
            job,
            setup,
            decode,
            encode,
        }
    }
}

impl<J: Job> ErasedJob for TaskRunner<J> {
    fn name(&self) -> &'static str {
        J::NAME
    }

    fn variant(&self) -> JobVariant {
        JobVariant::from_flags(self.decode.is_some(), self.encode.is_some())
    }

    fn takes_setup_input(&self) -> bool {
        self.setup.is_some()
    }

    fn setup(
        &mut self,
        worker: &WorkerRange,
        input: Option<&mut dyn Read>,
    ) -> Result<(), WorkerError> {
        let value = match (&self.setup, input) {
            (Some(sender), Some(reader)) => {
                Some(sender.decode(reader).map_err(WorkerError::SetupInput)?)
            }
            (Some(_), None) => {
                return Err(WorkerError::InvalidInvocation(format!(
                    "job '{}' needs a setup input stream",
                    J::NAME
                )))
            }
            (None, _) => None,
        };

        let job = &mut self.job;
        catch_unwind(AssertUnwindSafe(|| job.setup(worker, value)))
            .unwrap_or_else(|payload| Err(TaskError::from_panic(payload)))
            .map_err(WorkerError::Setup)
    }

    fn run_task(
        &mut self,
        index: usize,
        input: Option<&mut dyn Read>,
        output: Option<&mut dyn Write>,
    ) -> Result<(), WorkerError> {
        let arg = match (&self.decode, input) {
            (Some(sender), Some(reader)) => TaskArg::Input(
                sender
                    .decode(reader)
                    .map_err(|source| WorkerError::Sender { index, source })?,
            ),
            (Some(_), None) => {
                return Err(WorkerError::InvalidInvocation(format!(
                    "job '{}' needs an input stream",
                    J::NAME
                )))
            }
            (None, _) => TaskArg::Index(index),
        };

        let job = &mut self.job;
        let value = catch_unwind(AssertUnwindSafe(|| job.task(arg)))
            .unwrap_or_else(|payload| Err(TaskError::from_panic(payload)))
            .map_err(|source| WorkerError::Task { index, source })?;

        match (&self.encode, output) {
            (Some(sender), Some(writer)) => sender
                .encode(&value, writer)
                .map_err(|source| WorkerError::Sender { index, source }),
            (Some(_), None) => Err(WorkerError::InvalidInvocation(format!(
                "job '{}' needs an output stream",
                J::NAME
            ))),
            (None, _) => Ok(()),
        }
    }
}
