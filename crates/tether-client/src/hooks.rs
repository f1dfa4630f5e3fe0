use async_trait::async_trait;
use tether_core::TransportError;

/// Observer hooks for connection lifecycle events.
///
/// All methods default to no-ops; implement only what you need. Hooks run
/// inline on the supervisor task, so keep them short.
#[async_trait]
pub trait ClientHooks: Send + Sync {
    /// A dial attempt failed; the supervisor will back off and retry.
    async fn on_dial_error(&self, _error: &TransportError) {}

    /// A connection was established.
    async fn on_connected(&self) {}

    /// The current connection ended (for any reason).
    async fn on_closed(&self) {}
}

pub(crate) struct NoopHooks;

#[async_trait]
impl ClientHooks for NoopHooks {}
