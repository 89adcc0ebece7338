//! Transport module - framed request/reply sockets over TCP and Unix sockets.
//!
//! - [`Endpoint`]: `tcp://host:port` and `ipc:///path` addresses
//! - [`ReplySocket`]: server side, fans in requests from many connections
//! - [`RequestSocket`]: client side, one outstanding request at a time
//!
//! Every message travels as one frame (see [`crate::protocol::Header`]). A
//! reply echoes the sequence number of the request it answers.

mod endpoint;
mod reply;
mod request;
mod stream;
mod writer;

pub use endpoint::Endpoint;
pub use reply::ReplySocket;
pub use request::RequestSocket;

pub(crate) use endpoint::rand_u64;

use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;

/// Default capacity of each connection's outbound frame queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Limits shared by both socket kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Largest payload accepted in an incoming frame.
    pub max_payload_size: u32,
    /// Outbound queue depth per server connection.
    pub channel_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}
