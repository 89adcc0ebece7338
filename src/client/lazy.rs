//! Bounded resend under timeout.
//!
//! Each attempt connects if needed, sends (or resends) the same request bytes
//! and waits for the reply, all within one policy timeout. A silent server or a
//! broken connection consumes one attempt. After the last attempt the
//! connection is torn down, since the socket still owes a reply that will
//! never be read.

use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::transport::RequestSocket;

/// Default number of attempts.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default wait per attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// How hard a lazy client tries before reporting the server unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first send included. `0` behaves as `1`.
    pub retries: u32,
    /// Budget per attempt, shared by connect, send and the wait for the reply.
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, timeout: Duration) -> Self {
        Self { retries, timeout }
    }

    /// Attempts actually made.
    pub fn attempts(&self) -> u32 {
        self.retries.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRIES, DEFAULT_TIMEOUT)
    }
}

/// Deliver `payload` and return the reply bytes.
///
/// # Errors
///
/// `ServerUnavailable` once every attempt has failed. Non-transport errors
/// are returned as they occur.
pub(crate) async fn exchange(
    socket: &mut RequestSocket,
    payload: &[u8],
    policy: RetryPolicy,
) -> Result<Bytes> {
    let attempts = policy.attempts();

    for attempt in 1..=attempts {
        let deadline = Instant::now() + policy.timeout;
        match try_once(socket, payload, deadline).await {
            Ok(Some(reply)) => return Ok(reply),
            Ok(None) => debug!(attempt, attempts, "no reply within timeout"),
            Err(err) if err.is_transient() => {
                debug!(attempt, attempts, error = %err, "attempt failed");
                socket.close();
            }
            Err(err) => return Err(err),
        }
    }

    socket.close();
    warn!(endpoint = %socket.endpoint(), attempts, "server unavailable");
    Err(Error::ServerUnavailable { attempts })
}

/// One attempt: `Ok(None)` means the deadline passed first.
async fn try_once(
    socket: &mut RequestSocket,
    payload: &[u8],
    deadline: Instant,
) -> Result<Option<Bytes>> {
    let delivered = tokio::time::timeout_at(deadline, async {
        if socket.has_outstanding() {
            socket.resend(payload).await
        } else {
            socket.send(payload).await
        }
    })
    .await;

    match delivered {
        Ok(sent) => sent?,
        Err(_elapsed) => {
            // A half-written frame would corrupt the stream.
            socket.close();
            return Ok(None);
        }
    }

    if socket.poll(deadline.saturating_duration_since(Instant::now())).await? {
        socket.recv().await.map(Some)
    } else {
        Ok(None)
    }
}
