//! Transport boundary: framed text send/receive over one bidirectional link.
//!
//! The client and server never touch a socket type directly; they work
//! against [`FrameSink`] and [`FrameSource`] halves produced by a
//! [`Dialer`] (client side) or an accept helper (server side). [`ws`] is the
//! production WebSocket implementation; [`mem`] is an in-process pair for
//! tests.

use async_trait::async_trait;

pub mod mem;
pub mod ws;

/// Errors surfaced by a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Establishing the link failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The peer closed the link or it is no longer usable.
    #[error("transport closed")]
    Closed,

    /// I/O failure on an established link.
    #[error("transport i/o error: {0}")]
    Io(String),

    /// The peer sent something the transport layer cannot represent.
    #[error("transport protocol error: {0}")]
    Protocol(String),
}

/// Write half of a link. Exactly one task owns a sink at a time, which is
/// what makes writes on a connection totally ordered.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text frame.
    async fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Close the link. Errors during close are ignored.
    async fn close(&mut self);
}

impl std::fmt::Debug for dyn FrameSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FrameSink")
    }
}

/// Read half of a link.
#[async_trait]
pub trait FrameSource: Send {
    /// Receive the next text frame. Returns [`TransportError::Closed`] once
    /// the peer has gone away.
    async fn recv(&mut self) -> Result<String, TransportError>;
}

impl std::fmt::Debug for dyn FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FrameSource")
    }
}

/// A connected link, split into its two halves.
pub type TransportPair = (Box<dyn FrameSink>, Box<dyn FrameSource>);

/// Establishes new links for the client's reconnect loop.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Open a link to `url`.
    async fn dial(&self, url: &str) -> Result<TransportPair, TransportError>;
}
