//! In-memory message bus over Tokio channels.

use async_trait::async_trait;
use kasami_core::{
    BusError, Envelope, MessageBus, ProcessId,
    bus::check_target,
};
use tokio::sync::mpsc;

/// One unbounded inbox per process.
///
/// Per-sender FIFO holds because a sender's messages to one recipient are
/// pushed, in order, onto that recipient's single queue.
#[derive(Debug)]
pub struct ChannelBus {
    inboxes: Vec<mpsc::UnboundedSender<Envelope>>,
}

impl ChannelBus {
    /// Bus for `process_count` processes together with their inboxes,
    /// indexed by process id.
    pub fn new(process_count: usize) -> (Self, Vec<mpsc::UnboundedReceiver<Envelope>>) {
        let (inboxes, receivers) = (0..process_count).map(|_| mpsc::unbounded_channel()).unzip();
        (Self { inboxes }, receivers)
    }
}

#[async_trait]
impl MessageBus for ChannelBus {
    fn process_count(&self) -> usize {
        self.inboxes.len()
    }

    async fn send(&self, to: ProcessId, envelope: Envelope) -> Result<(), BusError> {
        check_target(to, self.inboxes.len())?;
        self.inboxes[to.index()].send(envelope).map_err(|_| BusError::Closed { process: to })
    }
}
