//! Controller-side socket roles
//!
//! Each worker gets up to two loopback listeners: an [`InputDispatcher`]
//! streaming its share of inputs, and an [`OutputCollector`] reading its
//! outputs. Both bind on construction, so the listener exists before the
//! worker process is spawned, and both serve exactly one connection.
//! The transfer itself is blocking and runs on a tokio blocking thread.

use parspice_sender::{SenderError, SenderResult, SharedSender};
use serde::Serialize;
use std::io::{BufReader, BufWriter, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::{ExecutionError, ExecutionResult};

/// How a socket role ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum TransferStatus {
    Completed,
    Failed(String),
}

impl TransferStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, TransferStatus::Completed)
    }
}

/// Values read from one worker, in task order
#[derive(Debug)]
pub struct CollectorOutcome<O> {
    pub worker_index: usize,
    pub expected: usize,
    pub values: Vec<O>,
    pub status: TransferStatus,
}

impl<O> CollectorOutcome<O> {
    pub(crate) fn failed(worker_index: usize, expected: usize, reason: impl Into<String>) -> Self {
        Self {
            worker_index,
            expected,
            values: Vec::new(),
            status: TransferStatus::Failed(reason.into()),
        }
    }
}

/// Summary of the inputs written to one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub worker_index: usize,
    pub sent: usize,
    pub total: usize,
    pub status: TransferStatus,
}

impl DispatchOutcome {
    pub(crate) fn failed(worker_index: usize, total: usize, reason: impl Into<String>) -> Self {
        Self {
            worker_index,
            sent: 0,
            total,
            status: TransferStatus::Failed(reason.into()),
        }
    }
}

fn bind_loopback(worker_index: usize, port: u16) -> ExecutionResult<TcpListener> {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port))
        .map_err(|source| ExecutionError::ConnectionError { worker_index, source })
}

/// Reads exactly `expected` values from one worker
pub struct OutputCollector<O> {
    worker_index: usize,
    expected: usize,
    listener: TcpListener,
    sender: SharedSender<O>,
}

impl<O: Send + 'static> OutputCollector<O> {
    /// Bind the listener on `port`. Port 0 picks a free port.
    pub fn bind(
        worker_index: usize,
        port: u16,
        expected: usize,
        sender: SharedSender<O>,
    ) -> ExecutionResult<Self> {
        let listener = bind_loopback(worker_index, port)?;
        Ok(Self {
            worker_index,
            expected,
            listener,
            sender,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept one connection and decode values until `expected` have arrived.
    ///
    /// On a connection or decode failure the values read so far are kept and
    /// the outcome is marked failed.
    pub fn collect(self) -> CollectorOutcome<O> {
        let mut values = Vec::with_capacity(self.expected);
        let status = match self.receive_into(&mut values) {
            Ok(()) => {
                debug!(
                    worker_index = self.worker_index,
                    collected = values.len(),
                    "Output collection completed"
                );
                TransferStatus::Completed
            }
            Err(e) => {
                error!(
                    worker_index = self.worker_index,
                    collected = values.len(),
                    expected = self.expected,
                    error = %e,
                    "Output collector failed after {} values",
                    values.len()
                );
                TransferStatus::Failed(e.to_string())
            }
        };

        CollectorOutcome {
            worker_index: self.worker_index,
            expected: self.expected,
            values,
            status,
        }
    }

    fn receive_into(&self, values: &mut Vec<O>) -> SenderResult<()> {
        let (stream, peer) = self.listener.accept()?;
        debug!(worker_index = self.worker_index, %peer, "Output connection accepted");

        let mut reader = BufReader::new(stream);
        while values.len() < self.expected {
            values.push(self.sender.decode(&mut reader)?);
        }
        Ok(())
    }

    /// Run [`OutputCollector::collect`] on a blocking thread
    pub fn spawn(self) -> JoinHandle<CollectorOutcome<O>> {
        tokio::task::spawn_blocking(move || self.collect())
    }
}

/// Writes one worker's setup value and share of inputs, in order
pub struct InputDispatcher<I> {
    worker_index: usize,
    listener: TcpListener,
    setup: Option<Arc<[u8]>>,
    inputs: Vec<I>,
    sender: Option<SharedSender<I>>,
}

impl<I: Send + 'static> InputDispatcher<I> {
    /// Bind the listener on `port`. Port 0 picks a free port.
    pub fn bind(
        worker_index: usize,
        port: u16,
        inputs: Vec<I>,
        sender: SharedSender<I>,
    ) -> ExecutionResult<Self> {
        let listener = bind_loopback(worker_index, port)?;
        Ok(Self {
            worker_index,
            listener,
            setup: None,
            inputs,
            sender: Some(sender),
        })
    }

    /// Bind a listener that only delivers a setup value
    pub fn setup_only(worker_index: usize, port: u16, setup: Arc<[u8]>) -> ExecutionResult<Self> {
        let listener = bind_loopback(worker_index, port)?;
        Ok(Self {
            worker_index,
            listener,
            setup: Some(setup),
            inputs: Vec::new(),
            sender: None,
        })
    }

    /// Send the already encoded `setup` value ahead of the inputs
    pub fn with_setup(mut self, setup: Arc<[u8]>) -> Self {
        self.setup = Some(setup);
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept one connection, write the setup value if any, then encode
    /// every input onto it
    pub fn dispatch(self) -> DispatchOutcome {
        let total = self.inputs.len();
        let mut sent = 0;
        let status = match self.send_all(&mut sent) {
            Ok(()) => {
                debug!(worker_index = self.worker_index, sent, "Input dispatch completed");
                TransferStatus::Completed
            }
            Err(e) => {
                error!(
                    worker_index = self.worker_index,
                    sent,
                    total,
                    error = %e,
                    "Input dispatcher failed after {} values",
                    sent
                );
                TransferStatus::Failed(e.to_string())
            }
        };

        DispatchOutcome {
            worker_index: self.worker_index,
            sent,
            total,
            status,
        }
    }

    fn send_all(&self, sent: &mut usize) -> SenderResult<()> {
        let (stream, peer) = self.listener.accept()?;
        debug!(worker_index = self.worker_index, %peer, "Input connection accepted");

        let mut writer = BufWriter::new(stream);
        if let Some(setup) = &self.setup {
            writer.write_all(setup)?;
        }
        if let Some(sender) = &self.sender {
            for input in &self.inputs {
                sender.encode(input, &mut writer)?;
                *sent += 1;
            }
        }
        writer.flush().map_err(SenderError::from)
    }

    /// Run [`InputDispatcher::dispatch`] on a blocking thread
    pub fn spawn(self) -> JoinHandle<DispatchOutcome> {
        tokio::task::spawn_blocking(move || self.dispatch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parspice_sender::{I32Sender, I64Sender, Sender, StringSender};
    use std::io::{BufWriter, Read, Write};
    use std::net::TcpStream;
    use std::thread;

    fn write_values(addr: SocketAddr, values: &[i32]) {
        let stream = TcpStream::connect(addr).unwrap();
        let mut writer = BufWriter::new(stream);
        for value in values {
            I32Sender.encode(value, &mut writer).unwrap();
        }
        writer.flush().unwrap();
    }

    #[tokio::test]
    async fn test_collect_all_values() {
        let collector = OutputCollector::<i32>::bind(0, 0, 4, Arc::new(I32Sender)).unwrap();
        let addr = collector.local_addr().unwrap();
        let handle = collector.spawn();

        let writer = thread::spawn(move || write_values(addr, &[1, 4, 9, 16]));
        let outcome = handle.await.unwrap();
        writer.join().unwrap();

        assert_eq!(outcome.values, vec![1, 4, 9, 16]);
        assert_eq!(outcome.status, TransferStatus::Completed);
    }

    #[tokio::test]
    async fn test_collector_keeps_prefix_on_early_close() {
        let collector = OutputCollector::<i32>::bind(2, 0, 5, Arc::new(I32Sender)).unwrap();
        let addr = collector.local_addr().unwrap();
        let handle = collector.spawn();

        let writer = thread::spawn(move || write_values(addr, &[7, 8, 9]));
        let outcome = handle.await.unwrap();
        writer.join().unwrap();

        assert_eq!(outcome.worker_index, 2);
        assert_eq!(outcome.values, vec![7, 8, 9]);
        assert!(!outcome.status.is_completed());
    }

    #[tokio::test]
    async fn test_collector_with_zero_expected_still_accepts() {
        let collector = OutputCollector::<i32>::bind(0, 0, 0, Arc::new(I32Sender)).unwrap();
        let addr = collector.local_addr().unwrap();
        let handle = collector.spawn();

        let writer = thread::spawn(move || write_values(addr, &[]));
        let outcome = handle.await.unwrap();
        writer.join().unwrap();

        assert!(outcome.values.is_empty());
        assert!(outcome.status.is_completed());
    }

    #[tokio::test]
    async fn test_dispatch_streams_inputs_in_order() {
        let inputs = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
        let dispatcher =
            InputDispatcher::bind(1, 0, inputs.clone(), Arc::new(StringSender)).unwrap();
        let addr = dispatcher.local_addr().unwrap();
        let handle = dispatcher.spawn();

        let reader = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            let mut received = Vec::new();
            for _ in 0..3 {
                let value: String = StringSender.decode(&mut stream).unwrap();
                received.push(value);
            }
            let mut rest = Vec::new();
            stream.read_to_end(&mut rest).unwrap();
            (received, rest)
        });

        let outcome = handle.await.unwrap();
        let (received, rest) = reader.join().unwrap();

        assert_eq!(received, inputs);
        assert!(rest.is_empty());
        assert_eq!(outcome.sent, 3);
        assert_eq!(outcome.total, 3);
        assert!(outcome.status.is_completed());
    }

    #[tokio::test]
    async fn test_dispatch_writes_setup_before_inputs() {
        let mut setup = Vec::new();
        I64Sender.encode(&-9, &mut setup).unwrap();
        let dispatcher = InputDispatcher::bind(0, 0, vec![5_i32, 6], Arc::new(I32Sender))
            .unwrap()
            .with_setup(Arc::from(setup));
        let addr = dispatcher.local_addr().unwrap();
        let handle = dispatcher.spawn();

        let reader = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            let setup: i64 = I64Sender.decode(&mut stream).unwrap();
            let first: i32 = I32Sender.decode(&mut stream).unwrap();
            let second: i32 = I32Sender.decode(&mut stream).unwrap();
            (setup, first, second)
        });

        let outcome = handle.await.unwrap();
        assert_eq!(reader.join().unwrap(), (-9, 5, 6));
        assert_eq!(outcome.sent, 2);
        assert!(outcome.status.is_completed());
    }

    #[tokio::test]
    async fn test_setup_only_dispatch() {
        let dispatcher =
            InputDispatcher::<f64>::setup_only(3, 0, Arc::from(vec![1u8, 2, 3, 4])).unwrap();
        let addr = dispatcher.local_addr().unwrap();
        let handle = dispatcher.spawn();

        let reader = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            let mut bytes = Vec::new();
            stream.read_to_end(&mut bytes).unwrap();
            bytes
        });

        let outcome = handle.await.unwrap();
        assert_eq!(reader.join().unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(outcome.worker_index, 3);
        assert_eq!(outcome.total, 0);
        assert!(outcome.status.is_completed());
    }

    #[test]
    fn test_bind_conflict_is_connection_error() {
        let first = OutputCollector::<i32>::bind(0, 0, 1, Arc::new(I32Sender)).unwrap();
        let port = first.local_addr().unwrap().port();

        let second = OutputCollector::<i32>::bind(3, port, 1, Arc::new(I32Sender));
        assert!(matches!(
            second,
            Err(ExecutionError::ConnectionError { worker_index: 3, .. })
        ));
    }

    #[test]
    fn test_transfer_status_serialization() {
        let failed = TransferStatus::Failed("connection reset".to_string());
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "connection reset");
    }
}
