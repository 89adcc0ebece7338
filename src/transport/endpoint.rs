//! Endpoint addresses.
//!
//! # Example
//!
//! ```
//! use routewire::Endpoint;
//!
//! let endpoint: Endpoint = "tcp://127.0.0.1:5555".parse().unwrap();
//! assert_eq!(endpoint.to_string(), "tcp://127.0.0.1:5555");
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

const TCP_SCHEME: &str = "tcp://";
const IPC_SCHEME: &str = "ipc://";

/// Where a socket binds or connects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `tcp://host:port`; port `0` binds an ephemeral port.
    Tcp(String),
    /// `ipc:///path/to/socket`, a Unix domain socket.
    Ipc(PathBuf),
}

impl Endpoint {
    pub fn tcp(addr: impl Into<String>) -> Self {
        Endpoint::Tcp(addr.into())
    }

    pub fn ipc(path: impl Into<PathBuf>) -> Self {
        Endpoint::Ipc(path.into())
    }

    /// A fresh Unix socket path for this process.
    ///
    /// Format: `/tmp/routewire-{pid}-{random}.sock`
    pub fn random_ipc() -> Self {
        let pid = std::process::id();
        Endpoint::Ipc(PathBuf::from(format!(
            "/tmp/routewire-{}-{:x}.sock",
            pid,
            rand_u64()
        )))
    }

    pub fn is_ipc(&self) -> bool {
        matches!(self, Endpoint::Ipc(_))
    }

    pub fn ipc_path(&self) -> Option<&Path> {
        match self {
            Endpoint::Ipc(path) => Some(path),
            Endpoint::Tcp(_) => None,
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(addr) = s.strip_prefix(TCP_SCHEME) {
            match addr.rsplit_once(':') {
                Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                    Ok(Endpoint::Tcp(addr.to_string()))
                }
                _ => Err(Error::InvalidEndpoint(s.to_string())),
            }
        } else if let Some(path) = s.strip_prefix(IPC_SCHEME) {
            if path.is_empty() {
                return Err(Error::InvalidEndpoint(s.to_string()));
            }
            Ok(Endpoint::Ipc(PathBuf::from(path)))
        } else {
            Err(Error::InvalidEndpoint(s.to_string()))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "{TCP_SCHEME}{addr}"),
            Endpoint::Ipc(path) => write!(f, "{IPC_SCHEME}{}", path.display()),
        }
    }
}

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Cheap non-cryptographic random number from time, pid and a counter.
pub(crate) fn rand_u64() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let pid = std::process::id() as u64;
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);

    (nanos ^ count.rotate_left(32)).wrapping_mul(0x517cc1b727220a95) ^ pid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp() {
        let endpoint: Endpoint = "tcp://localhost:4242".parse().unwrap();
        assert_eq!(endpoint, Endpoint::tcp("localhost:4242"));
        assert!(!endpoint.is_ipc());
    }

    #[test]
    fn test_parse_ipc() {
        let endpoint: Endpoint = "ipc:///tmp/rw.sock".parse().unwrap();
        assert_eq!(endpoint.ipc_path(), Some(Path::new("/tmp/rw.sock")));
        assert_eq!(endpoint.to_string(), "ipc:///tmp/rw.sock");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        for input in ["", "tcp://", "tcp://host", "tcp://:80", "tcp://h:notaport", "ipc://", "udp://h:1"] {
            assert!(
                matches!(input.parse::<Endpoint>(), Err(Error::InvalidEndpoint(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_random_ipc_format_and_uniqueness() {
        let a = Endpoint::random_ipc().to_string();
        let b = Endpoint::random_ipc().to_string();
        let pid = std::process::id().to_string();

        assert!(a.starts_with("ipc:///tmp/routewire-"));
        assert!(a.ends_with(".sock"));
        assert!(a.contains(&pid));
        assert_ne!(a, b);
    }
}
