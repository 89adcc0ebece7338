//! Client-side socket: one outstanding request at a time.
//!
//! Each request frame carries a fresh sequence number and the server echoes
//! it in the reply. A reply whose sequence does not match the outstanding
//! request answers a request that was superseded by [`resend`] and is
//! dropped.
//!
//! [`resend`]: RequestSocket::resend

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, trace};

use super::stream::{connect, BoxedReader, BoxedWriter};
use super::{Endpoint, TransportConfig};
use crate::error::{Error, Result};
use crate::protocol::{build_frame, Frame, FrameBuffer, Header};

const READ_CHUNK_SIZE: usize = 64 * 1024;

struct Connection {
    reader: BoxedReader,
    writer: BoxedWriter,
    buffer: FrameBuffer,
    frames: VecDeque<Frame>,
}

/// Lazily connected request socket.
pub struct RequestSocket {
    endpoint: Endpoint,
    config: TransportConfig,
    conn: Option<Connection>,
    next_sequence: u32,
    outstanding: Option<u32>,
    ready: Option<Bytes>,
}

impl RequestSocket {
    /// Create a socket for `endpoint`; nothing connects until first use.
    pub fn new(endpoint: Endpoint, config: TransportConfig) -> Self {
        Self {
            endpoint,
            config,
            conn: None,
            next_sequence: 1,
            outstanding: None,
            ready: None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub fn has_outstanding(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Connect if not already connected.
    pub async fn connect(&mut self) -> Result<()> {
        if self.conn.is_none() {
            let (reader, writer) = connect(&self.endpoint).await?;
            debug!(endpoint = %self.endpoint, "connected");
            self.conn = Some(Connection {
                reader,
                writer,
                buffer: FrameBuffer::with_max_payload(self.config.max_payload_size),
                frames: VecDeque::new(),
            });
        }
        Ok(())
    }

    /// Send a request.
    ///
    /// # Errors
    ///
    /// `SocketState` if the previous request is still unanswered.
    pub async fn send(&mut self, payload: &[u8]) -> Result<()> {
        if self.outstanding.is_some() {
            return Err(Error::SocketState("send called while a request is outstanding"));
        }
        self.transmit(payload).await
    }

    /// Send a request that supersedes any outstanding one.
    ///
    /// A late reply to the superseded request is discarded.
    pub async fn resend(&mut self, payload: &[u8]) -> Result<()> {
        self.transmit(payload).await
    }

    async fn transmit(&mut self, payload: &[u8]) -> Result<()> {
        let length = u32::try_from(payload.len())
            .map_err(|_| Error::Protocol(format!("request of {} bytes is too large", payload.len())))?;

        self.connect().await?;
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.ready = None;

        let frame = build_frame(&Header::request(sequence, length), payload);
        let result = match self.conn.as_mut() {
            Some(conn) => write_frame(&mut conn.writer, &frame).await,
            None => Err(Error::ConnectionClosed),
        };
        match result {
            Ok(()) => {
                self.outstanding = Some(sequence);
                Ok(())
            }
            Err(err) => {
                self.close();
                Err(err)
            }
        }
    }

    /// Wait up to `timeout` for the reply to the outstanding request.
    ///
    /// Returns `true` once the reply is ready to [`recv`](Self::recv). A
    /// transport error closes the socket.
    pub async fn poll(&mut self, timeout: Duration) -> Result<bool> {
        if self.ready.is_some() {
            return Ok(true);
        }
        if self.outstanding.is_none() {
            return Err(Error::SocketState("poll called without an outstanding request"));
        }

        match tokio::time::timeout(timeout, self.wait_reply()).await {
            Ok(Ok(payload)) => {
                self.ready = Some(payload);
                Ok(true)
            }
            Ok(Err(err)) => {
                self.close();
                Err(err)
            }
            Err(_elapsed) => Ok(false),
        }
    }

    /// Wait without bound for the reply to the outstanding request.
    pub async fn recv(&mut self) -> Result<Bytes> {
        if let Some(payload) = self.ready.take() {
            self.outstanding = None;
            return Ok(payload);
        }
        if self.outstanding.is_none() {
            return Err(Error::SocketState("recv called without an outstanding request"));
        }

        match self.wait_reply().await {
            Ok(payload) => {
                self.outstanding = None;
                Ok(payload)
            }
            Err(err) => {
                self.close();
                Err(err)
            }
        }
    }

    /// Drop the connection and forget any outstanding request.
    pub fn close(&mut self) {
        if self.conn.take().is_some() {
            debug!(endpoint = %self.endpoint, "connection closed");
        }
        self.outstanding = None;
        self.ready = None;
    }

    /// Read until a reply to the outstanding sequence arrives.
    ///
    /// Cancel-safe: bytes already read stay in the frame buffer.
    async fn wait_reply(&mut self) -> Result<Bytes> {
        let expected = self
            .outstanding
            .ok_or(Error::SocketState("no outstanding request"))?;
        let conn = self.conn.as_mut().ok_or(Error::ConnectionClosed)?;
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];

        loop {
            while let Some(frame) = conn.frames.pop_front() {
                if !frame.is_reply() {
                    return Err(Error::Protocol("server sent a request frame".to_string()));
                }
                if frame.sequence() == expected {
                    return Ok(frame.into_payload());
                }
                trace!(
                    expected,
                    sequence = frame.sequence(),
                    "discarding stale reply"
                );
            }

            let n = conn.reader.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            conn.frames.extend(conn.buffer.push(&chunk[..n])?);
        }
    }
}

async fn write_frame(writer: &mut BoxedWriter, frame: &[u8]) -> Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

impl std::fmt::Debug for RequestSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSocket")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.conn.is_some())
            .field("outstanding", &self.outstanding)
            .finish()
    }
}
