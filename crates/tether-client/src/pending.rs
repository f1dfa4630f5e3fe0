use std::collections::HashMap;

use parking_lot::Mutex;
use tether_core::RequestEnvelope;
use tokio_util::sync::CancellationToken;

/// A request that has been handed to the supervisor but not yet answered.
///
/// `tries_left` counts remaining write attempts; it is decremented only
/// when a write actually reaches the transport, so a request interrupted
/// by a connection drop keeps its budget.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub envelope: RequestEnvelope,
    pub tries_left: u32,
    /// Cancelled when the caller stops waiting (response, timeout, or
    /// shutdown); retry timers watch it.
    pub cancel_wait: CancellationToken,
}

/// Requests written to the wire and awaiting a response, keyed by uuid.
#[derive(Default)]
pub(crate) struct PendingStore {
    inner: Mutex<HashMap<String, PendingRequest>>,
}

impl PendingStore {
    pub fn insert(&self, uuid: String, request: PendingRequest) {
        let _ = self.inner.lock().insert(uuid, request);
    }

    pub fn remove(&self, uuid: &str) -> Option<PendingRequest> {
        self.inner.lock().remove(uuid)
    }

    /// Take every in-flight request, emptying the store. Used on reconnect
    /// to move interrupted requests back onto the queue.
    pub fn drain(&self) -> Vec<PendingRequest> {
        self.inner.lock().drain().map(|(_, req)| req).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(uuid: &str) -> PendingRequest {
        PendingRequest {
            envelope: RequestEnvelope {
                version: "1.0".into(),
                uuid: uuid.into(),
                command: "echo".into(),
                payload: json!({"x": 1}),
            },
            tries_left: 1,
            cancel_wait: CancellationToken::new(),
        }
    }

    #[test]
    fn insert_remove() {
        let store = PendingStore::default();
        store.insert("a".into(), request("a"));
        assert_eq!(store.len(), 1);

        let req = store.remove("a").unwrap();
        assert_eq!(req.envelope.uuid, "a");
        assert!(store.remove("a").is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn drain_empties_store() {
        let store = PendingStore::default();
        store.insert("a".into(), request("a"));
        store.insert("b".into(), request("b"));

        let drained = store.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn insert_replaces_same_uuid() {
        let store = PendingStore::default();
        store.insert("a".into(), request("a"));
        let mut replacement = request("a");
        replacement.tries_left = 9;
        store.insert("a".into(), replacement);

        assert_eq!(store.len(), 1);
        assert_eq!(store.remove("a").unwrap().tries_left, 9);
    }
}
