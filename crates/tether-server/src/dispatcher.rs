//! Per-connection dispatch loop.

use std::ops::{Deref, DerefMut};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use metrics::{counter, histogram};
use tether_core::{
    FrameKind, FrameSink, FrameSource, OutboundFrame, RequestEnvelope, ResponseBody,
    CODE_NOT_FOUND, MSG_COMMAND_NOT_FOUND, MSG_PARSE_ERROR,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::ServerConfig;
use crate::push::Pusher;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::writer::{enqueue, ConnWriter};

/// Command server: a root [`Router`] plus the per-connection dispatch
/// loop. Derefs to the router, so registration happens directly on the
/// server value.
pub struct Server<S> {
    router: Router<S>,
    config: ServerConfig,
}

impl<S> Clone for Server<S> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: Default + Send + Sync + 'static> Default for Server<S> {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl<S: Default + Send + Sync + 'static> Server<S> {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            router: Router::new(),
            config,
        }
    }

    /// Serve one accepted connection until the transport ends or `cancel`
    /// fires.
    ///
    /// A fresh `S::default()` state value is created for the connection
    /// and shared by every request dispatched on it. Undecodable requests
    /// and unknown commands are answered, never fatal; only transport
    /// errors (or cancellation) end the loop.
    pub async fn process(
        &self,
        sink: Box<dyn FrameSink>,
        mut source: Box<dyn FrameSource>,
        client_addr: String,
        cancel: CancellationToken,
    ) {
        let scope = cancel.child_token();
        let state = Arc::new(S::default());
        let (queue, writer) = ConnWriter::spawn(sink, &self.config, scope.clone());
        let pusher = Pusher::new(queue.clone());

        counter!("server_connections_total").increment(1);
        debug!(%client_addr, "connection open");

        loop {
            let frame = tokio::select! {
                () = scope.cancelled() => break,
                frame = source.recv() => frame,
            };
            match frame {
                Ok(text) => {
                    self.dispatch(&text, &state, &pusher, &queue, &client_addr)
                        .await;
                }
                Err(err) => {
                    debug!(%client_addr, %err, "connection ended");
                    break;
                }
            }
        }

        scope.cancel();
        let _ = writer.await;
        debug!(%client_addr, "connection closed");
    }

    async fn dispatch(
        &self,
        text: &str,
        state: &Arc<S>,
        pusher: &Pusher,
        queue: &mpsc::Sender<String>,
        client_addr: &str,
    ) {
        let envelope: RequestEnvelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                counter!("server_parse_errors_total").increment(1);
                debug!(%client_addr, %err, "unparseable request");
                // No uuid to correlate with; the client logs and drops it.
                send_response(
                    queue,
                    "",
                    ResponseBody::fail("", CODE_NOT_FOUND, MSG_PARSE_ERROR),
                );
                return;
            }
        };

        let Some(handler) = self.router.resolve(&envelope.command) else {
            counter!("server_unknown_commands_total").increment(1);
            debug!(%client_addr, command = %envelope.command, "unknown command");
            send_response(
                queue,
                &envelope.command,
                ResponseBody::fail(&envelope.uuid, CODE_NOT_FOUND, MSG_COMMAND_NOT_FOUND),
            );
            return;
        };

        let request = Request {
            version: envelope.version,
            uuid: envelope.uuid.clone(),
            command: envelope.command.clone(),
            payload: envelope.payload,
            client_addr: client_addr.to_string(),
            state: Arc::clone(state),
            pusher: pusher.clone(),
        };
        let response = Response::new(envelope.uuid.clone());

        let started = Instant::now();
        let outcome = AssertUnwindSafe(handler.handle(&request, &response))
            .catch_unwind()
            .await;
        if outcome.is_err() {
            counter!("server_handler_panics_total").increment(1);
            error!(%client_addr, command = %envelope.command, "handler panicked");
            let _ = response.fail();
        }

        histogram!("server_request_duration_seconds", "command" => envelope.command.clone())
            .record(started.elapsed().as_secs_f64());
        counter!("server_requests_total", "command" => envelope.command.clone()).increment(1);

        send_response(queue, &envelope.command, response.take_or_default());
    }
}

fn send_response(queue: &mpsc::Sender<String>, command: &str, body: ResponseBody) {
    let frame = OutboundFrame {
        uuid: body.uuid.clone(),
        kind: FrameKind::Response,
        command: command.to_string(),
        body: match serde_json::to_value(&body) {
            Ok(value) => value,
            Err(err) => {
                error!(%err, "unserializable response body");
                return;
            }
        },
    };
    match serde_json::to_string(&frame) {
        Ok(text) => {
            let _ = enqueue(queue, text);
        }
        Err(err) => {
            error!(%err, "unserializable response frame");
        }
    }
}

impl<S> Deref for Server<S> {
    type Target = Router<S>;

    fn deref(&self) -> &Self::Target {
        &self.router
    }
}

impl<S> DerefMut for Server<S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.router
    }
}
