//! Message bus abstraction.
//!
//! Processes never address each other directly. Every message goes through a
//! [`MessageBus`], which replaces any global list of processes with a
//! point-to-point `send` and a `broadcast` built on it.
//!
//! # Delivery contract
//!
//! - A broadcast reaches every process other than its sender
//! - For each ordered pair (sender, receiver), messages arrive in the order
//!   they were sent
//! - Nothing is guaranteed across different senders
//! - Delivery is assumed reliable: no loss, no duplication
//!
//! # Implementations
//!
//! - **`ChannelBus`** (kasami-node): one Tokio mpsc inbox per process
//! - **`SimBus`** (kasami-harness): `kasami-proto` frames over Turmoil TCP

use std::io;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    message::{Envelope, RequestMessage},
    types::ProcessId,
};

/// Errors raised while delivering a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Target outside the system
    #[error("unknown process {process}: bus connects {count} processes")]
    UnknownProcess {
        /// Raw id that was rejected
        process: u32,
        /// Number of processes on the bus
        count: usize,
    },

    /// The recipient no longer accepts messages
    #[error("inbox of {process} is closed")]
    Closed {
        /// Recipient whose inbox is gone
        process: ProcessId,
    },

    /// Underlying transport failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<io::Error> for BusError {
    fn from(err: io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Point-to-point and broadcast delivery between the processes of one
/// system.
#[async_trait]
pub trait MessageBus: Send + Sync + 'static {
    /// Number of processes reachable through this bus
    fn process_count(&self) -> usize;

    /// Deliver `envelope` to process `to`.
    ///
    /// # Errors
    ///
    /// - [`BusError::UnknownProcess`] if `to` is outside the system
    /// - [`BusError::Closed`] if the recipient has shut down
    /// - [`BusError::Transport`] if the underlying transport fails
    async fn send(&self, to: ProcessId, envelope: Envelope) -> Result<(), BusError>;

    /// Send `request` to every process except its sender, in id order.
    ///
    /// # Errors
    ///
    /// Stops at the first failed send and returns its error.
    async fn broadcast(&self, request: RequestMessage) -> Result<(), BusError> {
        for to in ProcessId::all(self.process_count()) {
            if to == request.sender {
                continue;
            }
            self.send(to, Envelope::request(request)).await?;
        }
        Ok(())
    }
}

/// Reject `to` if it is not a process of a system of `count` processes.
///
/// # Errors
///
/// Returns [`BusError::UnknownProcess`] for ids outside `[0, count)`.
pub fn check_target(to: ProcessId, count: usize) -> Result<(), BusError> {
    if to.index() >= count {
        return Err(BusError::UnknownProcess { process: to.as_u32(), count });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::message::Message;

    struct RecordingBus {
        count: usize,
        sent: Mutex<Vec<(ProcessId, Envelope)>>,
    }

    #[async_trait]
    impl MessageBus for RecordingBus {
        fn process_count(&self) -> usize {
            self.count
        }

        async fn send(&self, to: ProcessId, envelope: Envelope) -> Result<(), BusError> {
            check_target(to, self.count)?;
            self.sent.lock().expect("lock").push((to, envelope));
            Ok(())
        }
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        // The recording bus never awaits anything, so a single poll finishes
        let mut future = std::pin::pin!(future);
        let mut cx = std::task::Context::from_waker(std::task::Waker::noop());
        match future.as_mut().poll(&mut cx) {
            std::task::Poll::Ready(output) => output,
            std::task::Poll::Pending => panic!("recording bus future was pending"),
        }
    }

    #[test]
    fn broadcast_skips_sender() {
        let bus = RecordingBus { count: 4, sent: Mutex::new(Vec::new()) };
        let request = RequestMessage { sender: ProcessId::new(2), seq: 1 };

        block_on(bus.broadcast(request)).expect("all targets valid");

        let sent = bus.sent.lock().expect("lock");
        let targets: Vec<_> = sent.iter().map(|(to, _)| to.as_u32()).collect();
        assert_eq!(targets, vec![0, 1, 3]);
        assert!(sent.iter().all(|(_, e)| e.message == Message::Request(request)));
    }

    #[test]
    fn send_rejects_unknown_target() {
        let bus = RecordingBus { count: 2, sent: Mutex::new(Vec::new()) };
        let result = block_on(bus.send(ProcessId::new(2), Envelope::request(RequestMessage {
            sender: ProcessId::new(0),
            seq: 1,
        })));
        assert_eq!(result, Err(BusError::UnknownProcess { process: 2, count: 2 }));
    }

    #[test]
    fn io_errors_become_transport_errors() {
        let err = BusError::from(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
        assert_eq!(err, BusError::Transport("peer gone".to_string()));
    }
}
