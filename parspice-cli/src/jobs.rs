//! Built-in jobs shipped with the `parspice` binary
//!
//! `square` and `large-output` are the benchmark jobs; the rest exercise each
//! job variant, setup inputs and worker failures from the command line.
//!
//! [`builtin_jobs!`] is the single table of built-in jobs: it generates both
//! the worker-side registry and the `run` dispatch.

use parspice_execution::{Controller, Job, JobRegistry, TaskArg, TaskError, WorkerRange};
use parspice_sender::{
    ArraySender, F64Sender, I32Sender, I64Sender, MatrixSender, SharedSender, StringSender,
    U32Sender,
};
use std::sync::Arc;
use tracing::debug;

use crate::commands::run::{run_job, RunOptions};

/// Length of every `large-output` row
pub const LARGE_OUTPUT_LENGTH: usize = 300;

fn index_of<I>(arg: TaskArg<I>) -> Result<usize, TaskError> {
    arg.index()
        .ok_or_else(|| TaskError::failed("index-driven job received an input value"))
}

fn input_of<I>(arg: TaskArg<I>) -> Result<I, TaskError> {
    arg.into_input()
        .ok_or_else(|| TaskError::failed("input-driven job received a bare index"))
}

/// Square of the task index. The cheapest possible task.
#[derive(Debug, Default)]
pub struct Square;

impl Job for Square {
    const NAME: &'static str = "square";
    type Setup = ();
    type Input = ();
    type Output = f64;

    fn output_sender(&self) -> Option<SharedSender<f64>> {
        Some(Arc::new(F64Sender))
    }

    fn task(&mut self, arg: TaskArg<()>) -> Result<f64, TaskError> {
        Ok((index_of(arg)? as f64).powi(2))
    }
}

/// A fixed-length row `i, i + 1, ..., i + 299` per task
#[derive(Debug, Default)]
pub struct LargeOutput;

impl Job for LargeOutput {
    const NAME: &'static str = "large-output";
    type Setup = ();
    type Input = ();
    type Output = Vec<i32>;

    fn output_sender(&self) -> Option<SharedSender<Vec<i32>>> {
        Some(Arc::new(ArraySender::fixed(I32Sender, LARGE_OUTPUT_LENGTH)))
    }

    fn task(&mut self, arg: TaskArg<()>) -> Result<Vec<i32>, TaskError> {
        let index = i32::try_from(index_of(arg)?)
            .map_err(|_| TaskError::failed("task index exceeds i32"))?;
        Ok((0..LARGE_OUTPUT_LENGTH as i32).map(|j| index.wrapping_add(j)).collect())
    }
}

#[derive(Debug, Default)]
pub struct SquareInt;

impl Job for SquareInt {
    const NAME: &'static str = "square-int";
    type Setup = ();
    type Input = ();
    type Output = i64;

    fn output_sender(&self) -> Option<SharedSender<i64>> {
        Some(Arc::new(I64Sender))
    }

    fn task(&mut self, arg: TaskArg<()>) -> Result<i64, TaskError> {
        let index = index_of(arg)? as i64;
        Ok(index * index)
    }
}

/// Adds an offset chosen once per worker in `setup`
#[derive(Debug, Default)]
pub struct AddOffset {
    offset: Option<f64>,
}

impl AddOffset {
    pub const OFFSET: f64 = 100.0;
}

impl Job for AddOffset {
    const NAME: &'static str = "add-offset";
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
        self.offset = Some(Self::OFFSET);
        Ok(())
    }

    fn task(&mut self, arg: TaskArg<f64>) -> Result<f64, TaskError> {
        let offset = self
            .offset
            .ok_or_else(|| TaskError::failed("setup has not run"))?;
        Ok(input_of(arg)? + offset)
    }
}

/// Returns each input string unchanged
#[derive(Debug, Default)]
pub struct Identity;

impl Job for Identity {
    const NAME: &'static str = "identity";
    type Setup = ();
    type Input = String;
    type Output = String;

    fn input_sender(&self) -> Option<SharedSender<String>> {
        Some(Arc::new(StringSender))
    }

    fn output_sender(&self) -> Option<SharedSender<String>> {
        Some(Arc::new(StringSender))
    }

    fn task(&mut self, arg: TaskArg<String>) -> Result<String, TaskError> {
        input_of(arg)
    }
}

/// Doubles every element of a 2x2 matrix
#[derive(Debug, Default)]
pub struct DoubleMatrix;

impl DoubleMatrix {
    fn sender() -> SharedSender<Vec<Vec<f64>>> {
        Arc::new(MatrixSender::fixed_matrix(F64Sender, 2, 2))
    }
}

impl Job for DoubleMatrix {
    const NAME: &'static str = "double-matrix";
    type Setup = ();
    type Input = Vec<Vec<f64>>;
    type Output = Vec<Vec<f64>>;

    fn input_sender(&self) -> Option<SharedSender<Vec<Vec<f64>>>> {
        Some(Self::sender())
    }

    fn output_sender(&self) -> Option<SharedSender<Vec<Vec<f64>>>> {
        Some(Self::sender())
    }

    fn task(&mut self, arg: TaskArg<Vec<Vec<f64>>>) -> Result<Vec<Vec<f64>>, TaskError> {
        let matrix = input_of(arg)?;
        Ok(matrix
            .into_iter()
            .map(|row| row.into_iter().map(|value| value * 2.0).collect())
            .collect())
    }
}

/// Does nothing; no sockets are opened
#[derive(Debug, Default)]
pub struct Touch;

impl Job for Touch {
    const NAME: &'static str = "touch";
    type Setup = ();
    type Input = ();
    type Output = ();

    fn task(&mut self, _arg: TaskArg<()>) -> Result<(), TaskError> {
        Ok(())
    }
}

/// Consumes inputs and produces nothing
#[derive(Debug, Default)]
pub struct Sink {
    total: f64,
}

impl Job for Sink {
    const NAME: &'static str = "sink";
    type Setup = ();
    type Input = f64;
    type Output = ();

    fn input_sender(&self) -> Option<SharedSender<f64>> {
        Some(Arc::new(F64Sender))
    }

    fn task(&mut self, arg: TaskArg<f64>) -> Result<(), TaskError> {
        self.total += input_of(arg)?;
        debug!(total = self.total, "Sink consumed value");
        Ok(())
    }
}

/// Squares the index but fails at global index 3
#[derive(Debug, Default)]
pub struct FailAtThree;

impl Job for FailAtThree {
    const NAME: &'static str = "fail-at-three";
    type Setup = ();
    type Input = ();
    type Output = i64;

    fn output_sender(&self) -> Option<SharedSender<i64>> {
        Some(Arc::new(I64Sender))
    }

    fn task(&mut self, arg: TaskArg<()>) -> Result<i64, TaskError> {
        match index_of(arg)? {
            3 => Err(TaskError::failed("task 3 always fails")),
            index => Ok((index * index) as i64),
        }
    }
}

/// Index times a factor sent once to every worker as setup input
#[derive(Debug, Default)]
pub struct Scale {
    factor: Option<f64>,
}

impl Job for Scale {
    const NAME: &'static str = "scale";
    type Setup = f64;
    type Input = ();
    type Output = f64;

    fn setup_sender(&self) -> Option<SharedSender<f64>> {
        Some(Arc::new(F64Sender))
    }

    fn output_sender(&self) -> Option<SharedSender<f64>> {
        Some(Arc::new(F64Sender))
    }

    fn setup(&mut self, _worker: &WorkerRange, setup: Option<f64>) -> Result<(), TaskError> {
        let factor = setup.ok_or_else(|| TaskError::failed("scale needs a setup factor"))?;
        self.factor = Some(factor);
        Ok(())
    }

    fn task(&mut self, arg: TaskArg<()>) -> Result<f64, TaskError> {
        let factor = self
            .factor
            .ok_or_else(|| TaskError::failed("setup has not run"))?;
        Ok(index_of(arg)? as f64 * factor)
    }
}

/// Returns the task index; setup fails on the worker named by the setup input
#[derive(Debug, Default)]
pub struct FailSetup;

impl Job for FailSetup {
    const NAME: &'static str = "fail-setup";
    type Setup = u32;
    type Input = ();
    type Output = i64;

    fn setup_sender(&self) -> Option<SharedSender<u32>> {
        Some(Arc::new(U32Sender))
    }

    fn output_sender(&self) -> Option<SharedSender<i64>> {
        Some(Arc::new(I64Sender))
    }

    fn setup(&mut self, worker: &WorkerRange, setup: Option<u32>) -> Result<(), TaskError> {
        match setup {
            Some(target) if target as usize == worker.worker_index => Err(TaskError::failed(
                format!("setup rejected on worker {}", worker.worker_index),
            )),
            _ => Ok(()),
        }
    }

    fn task(&mut self, arg: TaskArg<()>) -> Result<i64, TaskError> {
        Ok(index_of(arg)? as i64)
    }
}

/// Looks the index up in a two-entry table, so task 2 onwards panics
#[derive(Debug, Default)]
pub struct PanicAtTwo;

impl PanicAtTwo {
    const TABLE: [i64; 2] = [0, 10];
}

impl Job for PanicAtTwo {
    const NAME: &'static str = "panic-at-two";
    type Setup = ();
    type Input = ();
    type Output = i64;

    fn output_sender(&self) -> Option<SharedSender<i64>> {
        Some(Arc::new(I64Sender))
    }

    fn task(&mut self, arg: TaskArg<()>) -> Result<i64, TaskError> {
        let index = index_of(arg)?;
        Ok(Self::TABLE[index])
    }
}

macro_rules! builtin_jobs {
    ($($job:ident => $make:expr),+ $(,)?) => {
        /// Every job this executable can run as a worker
        pub fn builtin_registry() -> JobRegistry {
            JobRegistry::new()$(.with::<$job, _>($make))+
        }

        /// Run the built-in job registered as `name` and return its JSON output
        pub(crate) async fn run_builtin(
            name: &str,
            controller: &Controller,
            options: &RunOptions,
            num_workers: usize,
        ) -> anyhow::Result<serde_json::Value> {
            match name {
                $($job::NAME => {
                    let job: $job = ($make)();
                    run_job(controller, job, options, num_workers).await
                })+
                other => anyhow::bail!(
                    "Unknown job '{}'. Run `parspice jobs` to list available jobs",
                    other
                ),
            }
        }
    };
}

builtin_jobs! {
    Square => || Square,
    LargeOutput => || LargeOutput,
    SquareInt => || SquareInt,
    AddOffset => AddOffset::default,
    Identity => || Identity,
    DoubleMatrix => || DoubleMatrix,
    Touch => || Touch,
    Sink => Sink::default,
    FailAtThree => || FailAtThree,
    Scale => Scale::default,
    FailSetup => || FailSetup,
    PanicAtTwo => || PanicAtTwo,
}
