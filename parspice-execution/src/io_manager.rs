//! Per-worker IO manager
//!
//! Owns the socket roles of one worker for one run. [`IoManager::start`]
//! binds and launches them, [`IoManager::join`] waits for them, and
//! [`IoManager::abandon`] unblocks listeners whose worker never started or
//! exited without connecting.

use parspice_sender::SharedSender;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::ExecutionError;
use crate::socket::{CollectorOutcome, DispatchOutcome, InputDispatcher, OutputCollector};

/// Setup value and inputs to stream to one worker
pub struct InputPlan<I> {
    pub port: u16,
    /// Encoded setup value, written before any input
    pub setup: Option<Arc<[u8]>>,
    pub inputs: Vec<I>,
    /// `None` when the connection only carries the setup value
    pub sender: Option<SharedSender<I>>,
}

/// Outputs to read from one worker
pub struct OutputPlan<O> {
    pub port: u16,
    pub expected: usize,
    pub sender: SharedSender<O>,
}

enum RoleState<T> {
    Listening { addr: SocketAddr, handle: JoinHandle<T> },
    Unavailable(T),
}

impl<T> RoleState<T> {
    fn addr(&self) -> Option<SocketAddr> {
        match self {
            RoleState::Listening { addr, .. } => Some(*addr),
            RoleState::Unavailable(_) => None,
        }
    }

    async fn join(self, worker_index: usize, on_panic: impl FnOnce() -> T) -> T {
        match self {
            RoleState::Listening { handle, .. } => match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(worker_index, error = %e, "IO thread panicked");
                    on_panic()
                }
            },
            RoleState::Unavailable(outcome) => outcome,
        }
    }
}

/// Unblocks listeners that are still waiting for a worker connection.
///
/// A throwaway connection completes the pending accept; the role then fails
/// on the empty stream. Listeners that already finished are gone, so waking
/// them is a no-op.
#[derive(Debug, Clone)]
pub struct ListenerWaker {
    worker_index: usize,
    addrs: Vec<SocketAddr>,
}

impl ListenerWaker {
    pub fn wake(&self) {
        for addr in &self.addrs {
            let worker_index = self.worker_index;
            match TcpStream::connect(addr) {
                Ok(_) => debug!(worker_index, %addr, "Woke listener"),
                Err(e) => debug!(worker_index, %addr, error = %e, "Listener already closed"),
            }
        }
    }
}

fn listening_addr(
    worker_index: usize,
    addr: std::io::Result<SocketAddr>,
) -> Result<SocketAddr, ExecutionError> {
    addr.map_err(|source| ExecutionError::ConnectionError {
        worker_index,
        source,
    })
}

/// Results of one worker's socket roles
#[derive(Debug)]
pub struct IoOutcome<O> {
    pub worker_index: usize,
    pub dispatch: Option<DispatchOutcome>,
    pub collect: Option<CollectorOutcome<O>>,
}

/// Socket roles of one worker
pub struct IoManager<O> {
    worker_index: usize,
    input: Option<RoleState<DispatchOutcome>>,
    output: Option<RoleState<CollectorOutcome<O>>>,
}

impl<O: Send + 'static> IoManager<O> {
    /// Bind and launch the roles described by `input` and `output`.
    ///
    /// Must run inside a tokio runtime. A role that fails to bind is logged
    /// and reported as failed from [`IoManager::join`].
    pub fn start<I: Send + 'static>(
        worker_index: usize,
        input: Option<InputPlan<I>>,
        output: Option<OutputPlan<O>>,
    ) -> Self {
        let input = input.map(|plan| {
            let total = plan.inputs.len();
            let dispatcher = match plan.sender {
                Some(sender) => {
                    InputDispatcher::bind(worker_index, plan.port, plan.inputs, sender).map(|d| {
                        match plan.setup {
                            Some(setup) => d.with_setup(setup),
                            None => d,
                        }
                    })
                }
                None => {
                    let setup = plan.setup.unwrap_or_else(|| Arc::from(Vec::<u8>::new()));
                    InputDispatcher::setup_only(worker_index, plan.port, setup)
                }
            }
            .and_then(|d| Ok((listening_addr(worker_index, d.local_addr())?, d)));

            match dispatcher {
                Ok((addr, dispatcher)) => {
                    debug!(worker_index, %addr, "Input dispatcher listening");
                    RoleState::Listening {
                        addr,
                        handle: dispatcher.spawn(),
                    }
                }
                Err(e) => {
                    error!(
                        worker_index,
                        port = plan.port,
                        error = %e,
                        "Input dispatcher failed to bind"
                    );
                    let outcome = DispatchOutcome::failed(worker_index, total, e.to_string());
                    RoleState::Unavailable(outcome)
                }
            }
        });

        let output = output.map(|plan| {
            let collector =
                OutputCollector::bind(worker_index, plan.port, plan.expected, plan.sender)
                    .and_then(|c| Ok((listening_addr(worker_index, c.local_addr())?, c)));

            match collector {
                Ok((addr, collector)) => {
                    debug!(worker_index, %addr, "Output collector listening");
                    RoleState::Listening {
                        addr,
                        handle: collector.spawn(),
                    }
                }
                Err(e) => {
                    error!(
                        worker_index,
                        port = plan.port,
                        error = %e,
                        "Output collector failed to bind"
                    );
                    RoleState::Unavailable(CollectorOutcome::failed(
                        worker_index,
                        plan.expected,
                        e.to_string(),
                    ))
                }
            }
        });

        Self {
            worker_index,
            input,
            output,
        }
    }

    pub fn worker_index(&self) -> usize {
        self.worker_index
    }

    /// Address of the input listener, if one is bound
    pub fn input_addr(&self) -> Option<SocketAddr> {
        self.input.as_ref().and_then(RoleState::addr)
    }

    /// Address of the output listener, if one is bound
    pub fn output_addr(&self) -> Option<SocketAddr> {
        self.output.as_ref().and_then(RoleState::addr)
    }

    /// Waker for every bound listener, usable after the manager is joined
    pub fn waker(&self) -> ListenerWaker {
        ListenerWaker {
            worker_index: self.worker_index,
            addrs: self.input_addr().into_iter().chain(self.output_addr()).collect(),
        }
    }

    /// Unblock listeners of a worker that will never connect
    pub fn abandon(&self) {
        self.waker().wake();
    }

    /// Wait for every role to finish
    pub async fn join(self) -> IoOutcome<O> {
        let worker_index = self.worker_index;

        let dispatch = match self.input {
            Some(role) => Some(
                role.join(worker_index, || {
                    DispatchOutcome::failed(worker_index, 0, "input thread panicked")
                })
                .await,
            ),
            None => None,
        };

        let collect = match self.output {
            Some(role) => Some(
                role.join(worker_index, || {
                    CollectorOutcome::failed(worker_index, 0, "output thread panicked")
                })
                .await,
            ),
            None => None,
        };

        IoOutcome {
            worker_index,
            dispatch,
            collect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parspice_sender::{I32Sender, Sender};
    use std::io::{BufWriter, Read, Write};
    use std::thread;

    fn plans(values: Vec<i32>, expected: usize) -> (InputPlan<i32>, OutputPlan<i32>) {
        (
            InputPlan {
                port: 0,
                setup: None,
                inputs: values,
                sender: Some(Arc::new(I32Sender)),
            },
            OutputPlan {
                port: 0,
                expected,
                sender: Arc::new(I32Sender),
            },
        )
    }

    #[tokio::test]
    async fn test_echo_through_both_roles() {
        let (input, output) = plans(vec![3, 1, 4, 1, 5], 5);
        let manager = IoManager::start(0, Some(input), Some(output));
        let input_addr = manager.input_addr().unwrap();
        let output_addr = manager.output_addr().unwrap();

        // Fake worker: read each input and echo its double
        let worker = thread::spawn(move || {
            let mut reader = TcpStream::connect(input_addr).unwrap();
            let mut writer = BufWriter::new(TcpStream::connect(output_addr).unwrap());
            for _ in 0..5 {
                let value: i32 = I32Sender.decode(&mut reader).unwrap();
                I32Sender.encode(&(value * 2), &mut writer).unwrap();
            }
            writer.flush().unwrap();
        });

        let outcome = manager.join().await;
        worker.join().unwrap();

        let dispatch = outcome.dispatch.unwrap();
        assert_eq!(dispatch.sent, 5);
        assert!(dispatch.status.is_completed());

        let collect = outcome.collect.unwrap();
        assert_eq!(collect.values, vec![6, 2, 8, 2, 10]);
        assert!(collect.status.is_completed());
    }

    #[tokio::test]
    async fn test_abandon_unblocks_listeners() {
        let (input, output) = plans(vec![1, 2], 2);
        let manager = IoManager::start(4, Some(input), Some(output));
        manager.abandon();

        let outcome = manager.join().await;
        let collect = outcome.collect.unwrap();
        assert_eq!(outcome.worker_index, 4);
        assert!(collect.values.is_empty());
        assert!(!collect.status.is_completed());
    }

    #[tokio::test]
    async fn test_unbindable_port_reports_failure() {
        let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = blocker.local_addr().unwrap().port();

        let output: OutputPlan<i32> = OutputPlan {
            port,
            expected: 3,
            sender: Arc::new(I32Sender),
        };
        let manager = IoManager::start::<i32>(1, None, Some(output));
        assert!(manager.output_addr().is_none());

        let outcome = manager.join().await;
        assert!(outcome.dispatch.is_none());
        let collect = outcome.collect.unwrap();
        assert_eq!(collect.expected, 3);
        assert!(!collect.status.is_completed());
    }

    #[tokio::test]
    async fn test_setup_only_plan_opens_input_listener() {
        let input: InputPlan<i32> = InputPlan {
            port: 0,
            setup: Some(Arc::from(vec![0u8, 0, 0, 7])),
            inputs: Vec::new(),
            sender: None,
        };
        let manager = IoManager::<i32>::start(2, Some(input), None);
        let input_addr = manager.input_addr().unwrap();

        let worker = thread::spawn(move || {
            let mut reader = TcpStream::connect(input_addr).unwrap();
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes).unwrap();
            bytes
        });

        let outcome = manager.join().await;
        assert_eq!(worker.join().unwrap(), vec![0, 0, 0, 7]);
        assert!(outcome.collect.is_none());
        let dispatch = outcome.dispatch.unwrap();
        assert_eq!(dispatch.total, 0);
        assert!(dispatch.status.is_completed());
    }
}
