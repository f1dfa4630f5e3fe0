use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use tether_core::transport::ws::WsDialer;
use tether_core::{Dialer, ResponseBody};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::errors::SendError;
use crate::hooks::{ClientHooks, NoopHooks};
use crate::pending::{PendingRequest, PendingStore};
use tether_broker::Broker;
use tether_core::RequestEnvelope;

pub(crate) struct Inner {
    pub(crate) config: ClientConfig,
    pub(crate) dialer: Arc<dyn Dialer>,
    pub(crate) hooks: parking_lot::RwLock<Arc<dyn ClientHooks>>,
    pub(crate) queue_tx: mpsc::Sender<PendingRequest>,
    pub(crate) queue_rx: tokio::sync::Mutex<mpsc::Receiver<PendingRequest>>,
    pub(crate) pending: PendingStore,
    pub(crate) responses: Broker<String, ResponseBody>,
    pub(crate) pushes: Broker<String, Value>,
    pub(crate) root: CancellationToken,
}

/// Handle to a supervised connection.
///
/// `Client` is a cheap clone; all clones share one queue, one pending
/// store, and one supervisor. Typical use: clone one handle into a spawned
/// [`Client::run`] task and call [`Client::send`] from the others.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<Inner>,
}

impl Client {
    /// Create a client that dials `config.url` over WebSocket.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_dialer(config, Arc::new(WsDialer))
    }

    /// Create a client over a custom transport dialer.
    pub fn with_dialer(config: ClientConfig, dialer: Arc<dyn Dialer>) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                dialer,
                hooks: parking_lot::RwLock::new(Arc::new(NoopHooks)),
                queue_tx,
                queue_rx: tokio::sync::Mutex::new(queue_rx),
                pending: PendingStore::default(),
                responses: Broker::new(),
                pushes: Broker::new(),
                root: CancellationToken::new(),
            }),
        }
    }

    /// Install lifecycle hooks. Replaces any previously installed set.
    pub fn on_hooks(&self, hooks: Arc<dyn ClientHooks>) {
        *self.inner.hooks.write() = hooks;
    }

    pub(crate) fn hooks(&self) -> Arc<dyn ClientHooks> {
        Arc::clone(&*self.inner.hooks.read())
    }

    /// Issue a request and wait for its response.
    ///
    /// One deadline (`response_timeout`) covers both enqueueing and
    /// waiting. The returned body may carry an application failure code;
    /// only timeouts and shutdown surface as `Err`.
    pub async fn send(
        &self,
        command: impl Into<String>,
        payload: Value,
    ) -> Result<ResponseBody, SendError> {
        if self.inner.root.is_cancelled() {
            return Err(SendError::Canceled);
        }

        let uuid = Uuid::new_v4().to_string();
        let envelope = RequestEnvelope {
            version: self.inner.config.version.clone(),
            uuid: uuid.clone(),
            command: command.into(),
            payload,
        };

        // The wait scope doubles as the correlation subscription's lifetime
        // and the retry timers' cancel signal; the drop guard ends it no
        // matter how this function returns.
        let wait = CancellationToken::new();
        let _wait_guard = wait.clone().drop_guard();
        let (tx, mut rx) = mpsc::channel(1);
        self.inner.responses.subscribe(wait.clone(), uuid.clone(), tx);

        let request = PendingRequest {
            envelope,
            tries_left: self.inner.config.max_tries,
            cancel_wait: wait,
        };
        let deadline = Instant::now() + self.inner.config.response_timeout();

        tokio::select! {
            () = self.inner.root.cancelled() => return Err(SendError::Canceled),
            enqueued = tokio::time::timeout_at(deadline, self.inner.queue_tx.send(request)) => {
                match enqueued {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => return Err(SendError::Canceled),
                    Err(_) => {
                        counter!("client_send_timeouts_total").increment(1);
                        debug!(%uuid, "request queue full until deadline");
                        return Err(SendError::Timeout);
                    }
                }
            }
        }

        tokio::select! {
            () = self.inner.root.cancelled() => Err(SendError::Canceled),
            response = tokio::time::timeout_at(deadline, rx.recv()) => match response {
                Ok(Some(body)) => Ok(body),
                Ok(None) => Err(SendError::Canceled),
                Err(_) => {
                    counter!("client_send_timeouts_total").increment(1);
                    debug!(%uuid, "no response before deadline");
                    Err(SendError::Timeout)
                }
            },
        }
    }

    /// Subscribe `sink` to unsolicited push frames whose command equals
    /// `topic`. The subscription lasts until `scope` is cancelled.
    pub fn subscribe(
        &self,
        scope: CancellationToken,
        topic: impl Into<String>,
        sink: mpsc::Sender<Value>,
    ) {
        self.inner.pushes.subscribe(scope, topic.into(), sink);
    }

    /// Stop the supervisor and fail all waiting `send` calls with
    /// [`SendError::Canceled`].
    pub fn shutdown(&self) {
        self.inner.root.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.root.is_cancelled()
    }
}
