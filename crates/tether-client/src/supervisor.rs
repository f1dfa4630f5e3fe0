//! Connection supervision: dial, serve, reconnect.
//!
//! One supervisor task owns the connection lifecycle. Per connection it
//! spawns a writer (sole owner of the sink) and a heartbeat, keeps the read
//! loop for itself, and tears all of it down through a child cancellation
//! scope before reconnecting.

use metrics::counter;
use serde_json::Value;
use tether_core::{
    FrameKind, FrameSink, FrameSource, InboundFrame, ResponseBody, TransportError,
    CODE_SERVER_ERROR, MSG_RETRIES_EXHAUSTED, MSG_SERVER_ERROR,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::Client;
use crate::pending::PendingRequest;

impl Client {
    /// Drive the connection until [`Client::shutdown`] is called.
    ///
    /// Dial failures back off linearly (`fails × reconnect_base_delay`);
    /// a successful dial resets the counter. Requests in flight when a
    /// connection drops are recycled onto the queue for the next one.
    pub async fn run(&self) {
        let mut fails: u32 = 0;
        loop {
            if self.inner.root.is_cancelled() {
                return;
            }

            let dialed = tokio::select! {
                () = self.inner.root.cancelled() => return,
                dialed = self.inner.dialer.dial(&self.inner.config.url) => dialed,
            };

            match dialed {
                Ok((sink, source)) => {
                    fails = 0;
                    counter!("client_connects_total").increment(1);
                    info!(url = %self.inner.config.url, "connected");
                    self.hooks().on_connected().await;

                    self.serve_connection(sink, source).await;

                    self.hooks().on_closed().await;
                }
                Err(err) => {
                    fails += 1;
                    counter!("client_dial_failures_total").increment(1);
                    warn!(%err, fails, url = %self.inner.config.url, "dial failed");
                    self.hooks().on_dial_error(&err).await;

                    let delay = self.inner.config.reconnect_base_delay() * fails;
                    tokio::select! {
                        () = self.inner.root.cancelled() => return,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn serve_connection(&self, sink: Box<dyn FrameSink>, mut source: Box<dyn FrameSource>) {
        let scope = self.inner.root.child_token();
        let writer = tokio::spawn(write_loop(self.clone(), scope.clone(), sink));
        let heartbeat = tokio::spawn(heartbeat_loop(self.clone(), scope.clone()));

        // Requests interrupted by the previous connection go back on the
        // queue with their try budget intact. The writer is already
        // draining, so waiting for queue space here cannot wedge.
        for request in self.inner.pending.drain() {
            if request.cancel_wait.is_cancelled() {
                continue;
            }
            self.requeue(&scope, request).await;
        }

        loop {
            let frame = tokio::select! {
                () = scope.cancelled() => break,
                frame = source.recv() => frame,
            };
            match frame {
                Ok(text) => {
                    if let Err(err) = self.handle_frame(&text) {
                        error!(%err, "undecodable frame, closing connection");
                        break;
                    }
                }
                Err(err) => {
                    debug!(%err, "connection ended");
                    break;
                }
            }
        }

        scope.cancel();
        let _ = writer.await;
        let _ = heartbeat.await;
    }

    /// Put a request back on the queue, waiting for space when it is
    /// full. If `scope` ends first the request returns to the store for
    /// the next connection; if its caller has stopped waiting it is
    /// dropped.
    async fn requeue(&self, scope: &CancellationToken, request: PendingRequest) {
        let cancel_wait = request.cancel_wait.clone();
        tokio::select! {
            () = cancel_wait.cancelled() => {}
            () = scope.cancelled() => {
                self.inner
                    .pending
                    .insert(request.envelope.uuid.clone(), request);
            }
            permit = self.inner.queue_tx.reserve() => {
                if let Ok(permit) = permit {
                    permit.send(request);
                }
            }
        }
    }

    /// Route one inbound frame. Decode failures are fatal to the
    /// connection; the caller tears it down and reconnects.
    fn handle_frame(&self, text: &str) -> Result<(), TransportError> {
        let frame: InboundFrame = serde_json::from_str(text)
            .map_err(|err| TransportError::Protocol(format!("bad frame: {err}")))?;

        match frame.kind {
            FrameKind::Push => {
                counter!("client_pushes_received_total").increment(1);
                self.inner.pushes.publish(&frame.command, frame.body);
                Ok(())
            }
            FrameKind::Response => {
                let Some(entry) = self.inner.pending.remove(&frame.uuid) else {
                    // Late answer to a request we already gave up on.
                    debug!(uuid = %frame.uuid, "response for unknown request, dropping");
                    return Ok(());
                };
                match serde_json::from_value::<ResponseBody>(frame.body) {
                    Ok(body) => {
                        self.inner.responses.publish(&frame.uuid, body);
                        // Cancel only after publishing, or the correlation
                        // subscription would be gone before the body lands.
                        entry.cancel_wait.cancel();
                        Ok(())
                    }
                    Err(err) => {
                        // Keep the request alive so the reconnect drain
                        // can retry it.
                        self.inner.pending.insert(frame.uuid.clone(), entry);
                        Err(TransportError::Protocol(format!("bad response body: {err}")))
                    }
                }
            }
        }
    }
}

/// Sole owner of the sink for one connection. Drains the shared request
/// queue; a write failure recycles the request and ends the connection.
async fn write_loop(client: Client, scope: CancellationToken, mut sink: Box<dyn FrameSink>) {
    let inner = &client.inner;
    let mut queue = inner.queue_rx.lock().await;

    loop {
        let request = tokio::select! {
            () = scope.cancelled() => break,
            request = queue.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        if request.cancel_wait.is_cancelled() {
            continue;
        }

        if request.tries_left == 0 {
            counter!("client_retries_exhausted_total").increment(1);
            warn!(
                uuid = %request.envelope.uuid,
                command = %request.envelope.command,
                "write attempts exhausted"
            );
            inner.responses.publish(
                &request.envelope.uuid,
                ResponseBody::fail(&request.envelope.uuid, CODE_SERVER_ERROR, MSG_RETRIES_EXHAUSTED),
            );
            continue;
        }

        let text = match serde_json::to_string(&request.envelope) {
            Ok(text) => text,
            Err(err) => {
                error!(%err, uuid = %request.envelope.uuid, "unserializable request");
                inner.responses.publish(
                    &request.envelope.uuid,
                    ResponseBody::fail(&request.envelope.uuid, CODE_SERVER_ERROR, MSG_SERVER_ERROR),
                );
                continue;
            }
        };

        match sink.send(text).await {
            Ok(()) => {
                let mut request = request;
                // A try is consumed only once the write reached the
                // transport.
                request.tries_left -= 1;
                let uuid = request.envelope.uuid.clone();
                let cancel_wait = request.cancel_wait.clone();
                inner.pending.insert(uuid.clone(), request);
                spawn_retry_timer(client.clone(), scope.clone(), uuid, cancel_wait);
            }
            Err(err) => {
                warn!(%err, uuid = %request.envelope.uuid, "write failed, ending connection");
                inner
                    .pending
                    .insert(request.envelope.uuid.clone(), request);
                scope.cancel();
                break;
            }
        }
    }

    sink.close().await;
}

/// Re-enqueue a written request if no response arrives within one response
/// timeout. The caller's own deadline stays authoritative; this timer only
/// feeds the retry path.
fn spawn_retry_timer(
    client: Client,
    scope: CancellationToken,
    uuid: String,
    cancel_wait: CancellationToken,
) {
    let timeout = client.inner.config.response_timeout();
    drop(tokio::spawn(async move {
        tokio::select! {
            () = cancel_wait.cancelled() => {
                // Caller stopped waiting (answered, timed out, or shut
                // down); the entry, if still present, is stale.
                let _ = client.inner.pending.remove(&uuid);
            }
            () = scope.cancelled() => {
                // Connection ended; the store is drained on reconnect.
            }
            () = tokio::time::sleep(timeout) => {
                if let Some(request) = client.inner.pending.remove(&uuid) {
                    counter!("client_request_retries_total").increment(1);
                    debug!(%uuid, tries_left = request.tries_left, "no response in time, requeueing");
                    client.requeue(&scope, request).await;
                }
            }
        }
    }));
}

/// Periodic liveness check. Any response at all proves the link; the
/// outcome is ignored. The ping itself races the connection scope so a
/// dead link never holds up teardown.
async fn heartbeat_loop(client: Client, scope: CancellationToken) {
    let interval = client.inner.config.heartbeat_interval();
    loop {
        tokio::select! {
            () = scope.cancelled() => return,
            () = tokio::time::sleep(interval) => {}
        }
        tokio::select! {
            () = scope.cancelled() => return,
            _ = client.send("ping", Value::Null) => {}
        }
    }
}
