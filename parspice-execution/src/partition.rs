//! Task partitioning and port assignment
//!
//! Worker `i` of `w` receives `n / w` tasks, plus one more when `i < n % w`.
//! Shares are contiguous and ordered, so concatenating per-worker results by
//! worker index restores global task order.

use serde::Serialize;
use std::ops::Range;

use crate::error::{ExecutionError, ExecutionResult};

/// Contiguous slice of the task index space handled by one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerRange {
    pub worker_index: usize,
    pub start_index: usize,
    pub count: usize,
}

impl WorkerRange {
    /// One past the last task index of this range
    pub fn end_index(&self) -> usize {
        self.start_index + self.count
    }

    pub fn indices(&self) -> Range<usize> {
        self.start_index..self.end_index()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Ports owned by one worker for the duration of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerPorts {
    pub input: u16,
    pub output: u16,
}

/// Number of tasks assigned to `worker_index`. Zero when `num_workers` is zero.
pub fn share(num_tasks: usize, num_workers: usize, worker_index: usize) -> usize {
    if num_workers == 0 {
        return 0;
    }
    num_tasks / num_workers + usize::from(worker_index < num_tasks % num_workers)
}

/// First global task index of `worker_index`, the sum of all earlier shares
pub fn start_index(num_tasks: usize, num_workers: usize, worker_index: usize) -> usize {
    if num_workers == 0 {
        return 0;
    }
    let base = num_tasks / num_workers;
    let remainder = num_tasks % num_workers;
    worker_index * base + worker_index.min(remainder)
}

/// Split `num_tasks` across `num_workers` workers
pub fn partition(num_tasks: usize, num_workers: usize) -> ExecutionResult<Vec<WorkerRange>> {
    if num_workers == 0 {
        return Err(ExecutionError::InvalidPartition(
            "num_workers must be at least 1".to_string(),
        ));
    }

    Ok((0..num_workers)
        .map(|worker_index| WorkerRange {
            worker_index,
            start_index: start_index(num_tasks, num_workers, worker_index),
            count: share(num_tasks, num_workers, worker_index),
        })
        .collect())
}

/// Fail unless every port `min_port .. min_port + 2 * num_workers` exists
pub fn validate_port_range(min_port: u16, num_workers: usize) -> ExecutionResult<()> {
    let span = num_workers.saturating_mul(2);
    let last = (min_port as usize).saturating_add(span.saturating_sub(1));
    if min_port == 0 || last > u16::MAX as usize {
        return Err(ExecutionError::PortRangeOverflow { min_port, span });
    }
    Ok(())
}

/// Ports for `worker_index`: input on `min_port + 2i`, output on `min_port + 2i + 1`
pub fn worker_ports(min_port: u16, worker_index: usize) -> ExecutionResult<WorkerPorts> {
    let overflow = || ExecutionError::PortRangeOverflow {
        min_port,
        span: worker_index.saturating_add(1).saturating_mul(2),
    };

    let input = worker_index
        .checked_mul(2)
        .and_then(|offset| offset.checked_add(min_port as usize))
        .and_then(|port| u16::try_from(port).ok())
        .ok_or_else(overflow)?;
    let output = input.checked_add(1).ok_or_else(overflow)?;

    Ok(WorkerPorts { input, output })
}
