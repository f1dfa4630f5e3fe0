//! Per-connection write path.
//!
//! Exactly one task owns the sink; handlers, middleware, and the
//! dispatcher all write by enqueueing serialized frames, which keeps
//! concurrent replies and pushes ordered on the wire.

use metrics::counter;
use tether_core::FrameSink;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::ServerConfig;

pub(crate) struct ConnWriter;

impl ConnWriter {
    /// Spawn the writer task for `sink`. Returns the frame queue and the
    /// task handle; cancel `scope` and join the handle to flush and close.
    pub(crate) fn spawn(
        sink: Box<dyn FrameSink>,
        config: &ServerConfig,
        scope: CancellationToken,
    ) -> (mpsc::Sender<String>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.write_queue_capacity.max(1));
        let batch = config.write_batch_size.max(1);
        let handle = tokio::spawn(drive(sink, rx, batch, scope));
        (tx, handle)
    }
}

/// Enqueue one serialized frame, dropping it if the client is too far
/// behind.
pub(crate) fn enqueue(queue: &mpsc::Sender<String>, frame: String) -> bool {
    match queue.try_send(frame) {
        Ok(()) => true,
        Err(err) => {
            counter!("server_frames_dropped_total").increment(1);
            warn!(%err, "write queue rejected frame");
            false
        }
    }
}

async fn drive(
    mut sink: Box<dyn FrameSink>,
    mut rx: mpsc::Receiver<String>,
    batch: usize,
    scope: CancellationToken,
) {
    let mut buf = Vec::with_capacity(batch);
    'outer: loop {
        buf.clear();
        let received = tokio::select! {
            () = scope.cancelled() => break,
            received = rx.recv_many(&mut buf, batch) => received,
        };
        if received == 0 {
            break;
        }
        for frame in buf.drain(..) {
            if let Err(err) = sink.send(frame).await {
                warn!(%err, "write failed, closing connection");
                scope.cancel();
                break 'outer;
            }
        }
    }
    sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::transport::mem;

    #[tokio::test]
    async fn frames_arrive_in_order() {
        let (server_side, client_side) = mem::pair(32);
        let (sink, _source) = server_side;
        let (_peer_sink, mut peer_source) = client_side;

        let scope = CancellationToken::new();
        let (queue, handle) = ConnWriter::spawn(sink, &ServerConfig::default(), scope.clone());

        for i in 0..5 {
            assert!(enqueue(&queue, format!("frame-{i}")));
        }
        for i in 0..5 {
            assert_eq!(peer_source.recv().await.unwrap(), format!("frame-{i}"));
        }

        scope.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn full_queue_drops_frames() {
        let (queue, _rx) = mpsc::channel(1);
        assert!(enqueue(&queue, "a".into()));
        assert!(!enqueue(&queue, "b".into()));
    }

    #[tokio::test]
    async fn closed_queue_drops_frames() {
        let (queue, rx) = mpsc::channel(1);
        drop(rx);
        assert!(!enqueue(&queue, "a".into()));
    }

    #[tokio::test]
    async fn cancel_stops_the_writer() {
        let (server_side, client_side) = mem::pair(8);
        let (sink, _source) = server_side;

        let scope = CancellationToken::new();
        let (queue, handle) = ConnWriter::spawn(sink, &ServerConfig::default(), scope.clone());
        scope.cancel();
        handle.await.unwrap();

        // The peer sees the closed link.
        let (_peer_sink, mut peer_source) = client_side;
        assert!(peer_source.recv().await.is_err());
        drop(queue);
    }

    #[tokio::test]
    async fn dropping_queue_ends_the_writer() {
        let (server_side, _client_side) = mem::pair(8);
        let (sink, _source) = server_side;

        let scope = CancellationToken::new();
        let (queue, handle) = ConnWriter::spawn(sink, &ServerConfig::default(), scope);
        drop(queue);
        handle.await.unwrap();
    }
}
