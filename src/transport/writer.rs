//! Per-connection writer task.
//!
//! Replies for one connection are queued on an mpsc channel and written by a
//! dedicated task, batching whatever is ready into a single vectored write.
//!
//! ```text
//! Server loop ─► WriterHandle ─► mpsc ─► writer task ─► stream
//! ```

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::protocol::{Header, HEADER_SIZE};

/// Maximum frames written in one batch.
const MAX_BATCH_SIZE: usize = 64;

/// A frame queued for writing.
#[derive(Debug)]
pub(crate) struct OutboundFrame {
    header: [u8; HEADER_SIZE],
    payload: Bytes,
}

impl OutboundFrame {
    pub(crate) fn new(header: &Header, payload: Bytes) -> Self {
        Self {
            header: header.encode(),
            payload,
        }
    }

    fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Sending side of a connection's writer task.
#[derive(Debug, Clone)]
pub(crate) struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue a frame.
    ///
    /// Fails with `ConnectionClosed` once the writer task has stopped.
    pub(crate) async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| Error::ConnectionClosed)
    }
}

/// Spawn the writer task for one connection.
///
/// The task ends when every handle is dropped or a write fails.
pub(crate) fn spawn_writer_task<W>(
    writer: W,
    capacity: usize,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);

    while let Some(first) = rx.recv().await {
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        write_batch(&mut writer, &batch).await?;
        batch.clear();
    }

    writer.shutdown().await.or_else(ignore_not_connected)
}

fn ignore_not_connected(err: std::io::Error) -> Result<()> {
    match err.kind() {
        std::io::ErrorKind::NotConnected | std::io::ErrorKind::BrokenPipe => Ok(()),
        _ => Err(err.into()),
    }
}

/// Write a batch with one vectored write, finishing any remainder with
/// plain writes.
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if batch.is_empty() {
        return Ok(());
    }

    let mut slices: Vec<IoSlice<'_>> = Vec::with_capacity(batch.len() * 2);
    for frame in batch {
        slices.push(IoSlice::new(&frame.header));
        if !frame.payload.is_empty() {
            slices.push(IoSlice::new(&frame.payload));
        }
    }

    let total: usize = batch.iter().map(OutboundFrame::size).sum();
    let written = writer.write_vectored(&slices).await?;
    if written == 0 {
        return Err(std::io::Error::new(std::io::ErrorKind::WriteZero, "write_vectored returned 0").into());
    }

    if written < total {
        write_remaining(writer, batch, written).await?;
    }

    writer.flush().await?;
    Ok(())
}

/// Write everything in `batch` past the first `skip` bytes.
async fn write_remaining<W>(writer: &mut W, batch: &[OutboundFrame], mut skip: usize) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    for frame in batch {
        for part in [&frame.header[..], &frame.payload[..]] {
            if skip >= part.len() {
                skip -= part.len();
                continue;
            }
            writer.write_all(&part[skip..]).await?;
            skip = 0;
        }
    }
    Ok(())
}
