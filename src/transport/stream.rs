//! Listeners and connected streams for each endpoint kind.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

use super::Endpoint;
use crate::error::Result;

pub(crate) type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub(crate) type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A bound listening socket.
pub(crate) enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix {
        listener: tokio::net::UnixListener,
        path: std::path::PathBuf,
    },
}

impl Listener {
    /// Bind and return the listener with the endpoint actually bound.
    ///
    /// For TCP the port is resolved, so `tcp://127.0.0.1:0` comes back with
    /// the ephemeral port. A stale Unix socket file is removed first.
    pub(crate) async fn bind(endpoint: &Endpoint) -> Result<(Self, Endpoint)> {
        match endpoint {
            Endpoint::Tcp(addr) => {
                let listener = TcpListener::bind(addr.as_str()).await?;
                let local = listener.local_addr()?;
                Ok((Listener::Tcp(listener), Endpoint::Tcp(local.to_string())))
            }
            #[cfg(unix)]
            Endpoint::Ipc(path) => {
                if path.exists() {
                    std::fs::remove_file(path)?;
                }
                let listener = tokio::net::UnixListener::bind(path)?;
                Ok((
                    Listener::Unix {
                        listener,
                        path: path.clone(),
                    },
                    endpoint.clone(),
                ))
            }
            #[cfg(not(unix))]
            Endpoint::Ipc(_) => Err(crate::error::Error::InvalidEndpoint(endpoint.to_string())),
        }
    }

    /// Accept one connection, split into halves, plus a peer label for logs.
    pub(crate) async fn accept(&self) -> Result<(BoxedReader, BoxedWriter, String)> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, addr) = listener.accept().await?;
                stream.set_nodelay(true)?;
                let (reader, writer) = stream.into_split();
                Ok((Box::new(reader), Box::new(writer), addr.to_string()))
            }
            #[cfg(unix)]
            Listener::Unix { listener, path } => {
                let (stream, _addr) = listener.accept().await?;
                let (reader, writer) = stream.into_split();
                Ok((
                    Box::new(reader),
                    Box::new(writer),
                    path.display().to_string(),
                ))
            }
        }
    }
}

#[cfg(unix)]
impl Drop for Listener {
    fn drop(&mut self) {
        if let Listener::Unix { path, .. } = self {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Open a connection to `endpoint`.
pub(crate) async fn connect(endpoint: &Endpoint) -> Result<(BoxedReader, BoxedWriter)> {
    match endpoint {
        Endpoint::Tcp(addr) => {
            let stream = TcpStream::connect(addr.as_str()).await?;
            stream.set_nodelay(true)?;
            let (reader, writer) = stream.into_split();
            Ok((Box::new(reader), Box::new(writer)))
        }
        #[cfg(unix)]
        Endpoint::Ipc(path) => {
            let stream = tokio::net::UnixStream::connect(path).await?;
            let (reader, writer) = stream.into_split();
            Ok((Box::new(reader), Box::new(writer)))
        }
        #[cfg(not(unix))]
        Endpoint::Ipc(_) => Err(crate::error::Error::InvalidEndpoint(endpoint.to_string())),
    }
}
