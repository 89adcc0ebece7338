//! Server-side socket: receive a request, send its reply, repeat.
//!
//! Each accepted connection gets a reader task that pushes complete request
//! frames onto a shared inbound queue and a writer task that drains that
//! connection's replies. The socket strictly alternates: after [`recv`]
//! returns, the next call must be [`send`].
//!
//! [`recv`]: ReplySocket::recv
//! [`send`]: ReplySocket::send

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use super::stream::{BoxedReader, Listener};
use super::writer::{spawn_writer_task, OutboundFrame, WriterHandle};
use super::{Endpoint, TransportConfig};
use crate::error::{Error, Result};
use crate::protocol::{FrameBuffer, Header};

const READ_CHUNK_SIZE: usize = 64 * 1024;
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A request frame tagged with where its reply must go.
struct Inbound {
    payload: Bytes,
    reply_to: ReplyTo,
}

struct ReplyTo {
    sequence: u32,
    writer: WriterHandle,
    peer: Arc<str>,
}

/// Fan-in reply socket bound to one or more endpoints.
pub struct ReplySocket {
    config: TransportConfig,
    inbound_tx: mpsc::Sender<Inbound>,
    inbound_rx: mpsc::Receiver<Inbound>,
    pending: Option<ReplyTo>,
    endpoints: Vec<Endpoint>,
    acceptors: Vec<JoinHandle<()>>,
}

impl ReplySocket {
    pub fn new(config: TransportConfig) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(config.channel_capacity.max(1));
        Self {
            config,
            inbound_tx,
            inbound_rx,
            pending: None,
            endpoints: Vec::new(),
            acceptors: Vec::new(),
        }
    }

    /// Start listening on `endpoint` and return the endpoint actually bound.
    ///
    /// May be called several times; requests from every endpoint share one
    /// queue.
    pub async fn bind(&mut self, endpoint: &str) -> Result<Endpoint> {
        let endpoint: Endpoint = endpoint.parse()?;
        let (listener, bound) = Listener::bind(&endpoint).await?;
        debug!(endpoint = %bound, "reply socket bound");

        let acceptor = tokio::spawn(accept_loop(
            listener,
            self.inbound_tx.clone(),
            self.config,
        ));
        self.acceptors.push(acceptor);
        self.endpoints.push(bound.clone());
        Ok(bound)
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Wait for the next request payload from any connection.
    ///
    /// # Errors
    ///
    /// `SocketState` if the previous request has not been answered.
    pub async fn recv(&mut self) -> Result<Bytes> {
        if self.pending.is_some() {
            return Err(Error::SocketState("recv called while a reply is owed"));
        }

        // The socket holds a sender itself, so the queue never closes.
        let inbound = self
            .inbound_rx
            .recv()
            .await
            .ok_or(Error::ConnectionClosed)?;

        trace!(
            peer = %inbound.reply_to.peer,
            sequence = inbound.reply_to.sequence,
            len = inbound.payload.len(),
            "request received"
        );
        self.pending = Some(inbound.reply_to);
        Ok(inbound.payload)
    }

    /// Reply to the request returned by the last [`recv`](Self::recv).
    ///
    /// # Errors
    ///
    /// `SocketState` without an owed reply; `ConnectionClosed` if the
    /// requesting peer has gone away. Either way the socket is ready to
    /// receive again.
    pub async fn send(&mut self, payload: Vec<u8>) -> Result<()> {
        let reply_to = self
            .pending
            .take()
            .ok_or(Error::SocketState("send called without a pending request"))?;

        let length = u32::try_from(payload.len())
            .map_err(|_| Error::Protocol(format!("reply of {} bytes is too large", payload.len())))?;
        let header = Header::reply(reply_to.sequence, length);
        reply_to
            .writer
            .send(OutboundFrame::new(&header, Bytes::from(payload)))
            .await
    }
}

impl Drop for ReplySocket {
    fn drop(&mut self) {
        for acceptor in &self.acceptors {
            acceptor.abort();
        }
    }
}

async fn accept_loop(listener: Listener, inbound: mpsc::Sender<Inbound>, config: TransportConfig) {
    loop {
        match listener.accept().await {
            Ok((reader, writer, peer)) => {
                debug!(%peer, "connection accepted");
                let (handle, writer_task) = spawn_writer_task(writer, config.channel_capacity);
                tokio::spawn(connection_loop(
                    reader,
                    handle,
                    writer_task,
                    Arc::from(peer),
                    inbound.clone(),
                    config.max_payload_size,
                ));
            }
            Err(err) => {
                warn!(error = %err, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn connection_loop(
    mut reader: BoxedReader,
    writer: WriterHandle,
    writer_task: JoinHandle<Result<()>>,
    peer: Arc<str>,
    inbound: mpsc::Sender<Inbound>,
    max_payload_size: u32,
) {
    if let Err(err) = read_requests(&mut reader, &writer, &peer, &inbound, max_payload_size).await {
        match err {
            Error::ConnectionClosed => debug!(%peer, "connection closed"),
            err => warn!(%peer, error = %err, "dropping connection"),
        }
    }

    // Outstanding replies hold clones of the handle; the writer task ends
    // once the last of them is sent or dropped.
    drop(writer);
    match writer_task.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!(%peer, error = %err, "writer stopped"),
        Err(err) => error!(%peer, error = %err, "writer task failed"),
    }
}

async fn read_requests(
    reader: &mut BoxedReader,
    writer: &WriterHandle,
    peer: &Arc<str>,
    inbound: &mpsc::Sender<Inbound>,
    max_payload_size: u32,
) -> Result<()> {
    let mut buffer = FrameBuffer::with_max_payload(max_payload_size);
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }

        for frame in buffer.push(&chunk[..n])? {
            if frame.is_reply() {
                return Err(Error::Protocol("peer sent a reply frame".to_string()));
            }
            let request = Inbound {
                reply_to: ReplyTo {
                    sequence: frame.sequence(),
                    writer: writer.clone(),
                    peer: Arc::clone(peer),
                },
                payload: frame.into_payload(),
            };
            inbound
                .send(request)
                .await
                .map_err(|_| Error::ConnectionClosed)?;
        }
    }
}
