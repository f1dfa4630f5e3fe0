//! In-process transport pair over bounded channels.
//!
//! Gives tests a real bidirectional link with close semantics and
//! backpressure, without a socket.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{FrameSink, FrameSource, TransportError, TransportPair};

/// Create two connected links. Frames sent on one side's sink arrive on the
/// other side's source. Dropping or closing a sink closes the peer's source.
pub fn pair(capacity: usize) -> (TransportPair, TransportPair) {
    let (a_tx, a_rx) = mpsc::channel(capacity);
    let (b_tx, b_rx) = mpsc::channel(capacity);
    let a = (
        Box::new(MemSink { tx: Some(a_tx) }) as Box<dyn FrameSink>,
        Box::new(MemSource { rx: b_rx }) as Box<dyn FrameSource>,
    );
    let b = (
        Box::new(MemSink { tx: Some(b_tx) }) as Box<dyn FrameSink>,
        Box::new(MemSource { rx: a_rx }) as Box<dyn FrameSource>,
    );
    (a, b)
}

struct MemSink {
    tx: Option<mpsc::Sender<String>>,
}

#[async_trait]
impl FrameSink for MemSink {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        match &self.tx {
            Some(tx) => tx.send(frame).await.map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&mut self) {
        self.tx = None;
    }
}

struct MemSource {
    rx: mpsc::Receiver<String>,
}

#[async_trait]
impl FrameSource for MemSource {
    async fn recv(&mut self) -> Result<String, TransportError> {
        self.rx.recv().await.ok_or(TransportError::Closed)
    }
}
