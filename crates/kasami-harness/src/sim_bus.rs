//! Turmoil-based message bus using TCP streams.
//!
//! Every process runs on its own Turmoil host named `p{id}` and listens on
//! [`PORT`]. A sender opens one TCP connection per peer on first use and
//! writes `kasami-proto` frames to it; the receiver decodes frames from each
//! accepted connection into its inbox.
//!
//! One connection per ordered pair gives exactly the delivery contract the
//! protocol needs: TCP keeps each pair in order, while frames from different
//! senders interleave however the simulated network delivers them.

use std::{io, time::Duration};

use async_trait::async_trait;
use kasami_core::{BusError, Envelope, MessageBus, ProcessId, bus::check_target};
use kasami_proto::{Frame, FrameHeader};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    sync::{Mutex, mpsc},
};
use turmoil::net::{TcpListener, TcpStream};

/// Port every process listens on
pub const PORT: u16 = 7400;

const CONNECT_ATTEMPTS: usize = 5;
const CONNECT_BACKOFF: Duration = Duration::from_millis(10);

/// Turmoil host name of process `id`
pub fn host_name(id: ProcessId) -> String {
    format!("p{}", id.as_u32())
}

/// Simulation bus for the process running on the current Turmoil host.
pub struct SimBus {
    id: ProcessId,
    peers: Vec<Mutex<Option<TcpStream>>>,
}

impl SimBus {
    /// Bus for process `id` in a system of `process_count` processes.
    ///
    /// Connections are opened lazily on the first send to each peer.
    pub fn new(id: ProcessId, process_count: usize) -> Self {
        Self { id, peers: (0..process_count).map(|_| Mutex::new(None)).collect() }
    }

    /// Bind [`PORT`] on the current host and decode every inbound frame into
    /// the returned inbox.
    ///
    /// Frames that fail to decode, or that do not fit a system of
    /// `process_count` processes, close the connection they arrived on.
    ///
    /// # Errors
    ///
    /// Returns error if the port is already bound.
    pub async fn listen(process_count: usize) -> io::Result<mpsc::UnboundedReceiver<Envelope>> {
        let listener = TcpListener::bind(format!("0.0.0.0:{PORT}").as_str()).await?;
        let (inbox, receiver) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        return;
                    },
                };

                tracing::trace!(%peer, "Accepted connection");
                tokio::spawn(read_envelopes(stream, process_count, inbox.clone()));
            }
        });

        Ok(receiver)
    }

    async fn connect(to: ProcessId) -> io::Result<TcpStream> {
        let address = format!("{}:{}", host_name(to), PORT);
        let mut attempt = 1;
        loop {
            match TcpStream::connect(address.as_str()).await {
                Ok(stream) => return Ok(stream),
                Err(e) if attempt < CONNECT_ATTEMPTS => {
                    tracing::debug!(%to, attempt, error = %e, "Connect failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(CONNECT_BACKOFF).await;
                },
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl MessageBus for SimBus {
    fn process_count(&self) -> usize {
        self.peers.len()
    }

    async fn send(&self, to: ProcessId, envelope: Envelope) -> Result<(), BusError> {
        check_target(to, self.peers.len())?;
        if to == self.id {
            return Err(BusError::Transport(format!("{to} cannot send to itself")));
        }

        let frame = envelope.to_frame().map_err(|e| BusError::Transport(e.to_string()))?;
        let mut buf = Vec::with_capacity(frame.encoded_len());
        frame.encode(&mut buf).map_err(|e| BusError::Transport(e.to_string()))?;

        let mut slot = self.peers[to.index()].lock().await;
        if slot.is_none() {
            *slot = Some(Self::connect(to).await?);
        }

        let Some(stream) = slot.as_mut() else {
            return Err(BusError::Closed { process: to });
        };

        if let Err(e) = stream.write_all(&buf).await {
            // Reconnect on the next send
            *slot = None;
            return Err(e.into());
        }

        Ok(())
    }
}

/// Read one frame. Returns `None` on a clean end of stream.
///
/// # Errors
///
/// Returns `InvalidData` for malformed frames and propagates I/O errors.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Option<Frame>> {
    let mut header_buf = [0u8; FrameHeader::SIZE];
    match reader.read_exact(&mut header_buf).await {
        Ok(_) => {},
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let header = *FrameHeader::from_bytes(&header_buf)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut payload = vec![0u8; header.payload_size() as usize];
    reader.read_exact(&mut payload).await?;

    Ok(Some(Frame::new(header, payload)))
}

async fn read_envelopes(
    mut stream: TcpStream,
    process_count: usize,
    inbox: mpsc::UnboundedSender<Envelope>,
) {
    loop {
        let frame = match read_frame(&mut stream).await {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping connection after read error");
                return;
            },
        };

        let envelope = match Envelope::from_frame(&frame, process_count) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping connection after invalid frame");
                return;
            },
        };

        if inbox.send(envelope).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use kasami_core::{Message, RequestMessage, Token};

    use super::*;

    #[test]
    fn frames_arrive_in_send_order() {
        let mut sim = turmoil::Builder::new().build();

        sim.host("p1", || async {
            let bus = SimBus::new(ProcessId::new(1), 2);

            for seq in 1..=10 {
                bus.send(ProcessId::new(0), Envelope::request(RequestMessage {
                    sender: ProcessId::new(1),
                    seq,
                }))
                .await?;
            }
            bus.send(ProcessId::new(0), Envelope::token(ProcessId::new(1), Token::new(2))).await?;

            Ok(())
        });

        sim.client("p0", async {
            let mut inbox = SimBus::listen(2).await?;

            for seq in 1..=10 {
                let envelope = inbox.recv().await.expect("sender alive");
                assert_eq!(envelope.from, ProcessId::new(1));
                assert_eq!(
                    envelope.message,
                    Message::Request(RequestMessage { sender: ProcessId::new(1), seq })
                );
            }

            let envelope = inbox.recv().await.expect("sender alive");
            assert!(matches!(envelope.message, Message::Token(_)));

            Ok(())
        });

        sim.run().expect("simulation failed");
    }

    #[test]
    fn send_to_self_is_rejected() {
        let mut sim = turmoil::Builder::new().build();

        sim.client("p0", async {
            let bus = SimBus::new(ProcessId::new(0), 2);
            let result = bus
                .send(ProcessId::new(0), Envelope::token(ProcessId::new(0), Token::new(2)))
                .await;
            assert!(matches!(result, Err(BusError::Transport(_))));
            Ok(())
        });

        sim.run().expect("simulation failed");
    }

    #[test]
    fn read_frame_rejects_garbage() {
        let mut sim = turmoil::Builder::new().build();

        sim.client("reader", async {
            let mut garbage: &[u8] = &[0xFF; FrameHeader::SIZE];
            let result = read_frame(&mut garbage).await;
            assert_eq!(result.map(|_| ()).map_err(|e| e.kind()), Err(io::ErrorKind::InvalidData));

            let mut empty: &[u8] = &[];
            assert!(read_frame(&mut empty).await?.is_none());
            Ok(())
        });

        sim.run().expect("simulation failed");
    }
}
