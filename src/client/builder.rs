//! Convenience constructors for a [`Client`] over a real TCP connection.
//!
//! The core itself is agnostic to how the stream was obtained — `Client::new`
//! takes anything that is `AsyncRead + AsyncWrite` (see the module docs on
//! [`crate::client::core`]), which is what lets tests drive it over an
//! in-memory `tokio::io::duplex` pair. `ClientBuilder` is the TCP-specific
//! convenience layered on top, matching the teacher's own split between a
//! generic connection type and a `ClientBuilder` that knows about
//! `ToSocketAddrs`.

use tokio::net::{TcpStream, ToSocketAddrs};

use crate::client::config::ClientConfig;
use crate::client::core::Client;
use crate::client::error::{ClientError, Result};

/// Factory for creating an AMI [`Client`] connected to a real TCP peer.
pub struct ClientBuilder;

impl ClientBuilder {
    /// Connects to `addr` and starts a client with the default
    /// [`ClientConfig`] (drop-oldest back-pressure, UUID v4 ActionIDs, the
    /// default frame size cap).
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Client> {
        Self::connect_with(addr, ClientConfig::default()).await
    }

    /// Connects to `addr` and starts a client with a caller-supplied
    /// [`ClientConfig`] — e.g. to select `BackpressurePolicy::Block`, install
    /// a deterministic `ActionIdGenerator` for tests, or raise/lower the
    /// frame size cap.
    pub async fn connect_with<A: ToSocketAddrs>(addr: A, config: ClientConfig) -> Result<Client> {
        let stream = TcpStream::connect(addr).await.map_err(ClientError::Io)?;
        // AMI servers are chatty one-message-at-a-time; Nagle's algorithm
        // only adds latency to the request/reply round trip for no
        // throughput benefit at these message sizes.
        let _ = stream.set_nodelay(true);
        Ok(Client::new(stream, config))
    }
}
