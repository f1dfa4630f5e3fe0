use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::push::Pusher;

/// One decoded request, as seen by handlers and middleware.
///
/// `state` is the per-connection state value: one instance per accepted
/// connection, shared by every request dispatched on it.
pub struct Request<S> {
    pub version: String,
    pub uuid: String,
    pub command: String,
    pub payload: Value,
    /// Peer address, e.g. `127.0.0.1:52114`.
    pub client_addr: String,
    pub state: Arc<S>,
    /// Push handle bound to this request's connection.
    pub pusher: Pusher,
}

impl<S> Request<S> {
    /// Decode the payload into a typed parameter struct.
    pub fn params<P: DeserializeOwned>(&self) -> Result<P, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[derive(Deserialize)]
    struct EchoParams {
        x: i64,
    }

    fn request(payload: Value) -> Request<()> {
        let (tx, _rx) = mpsc::channel(1);
        Request {
            version: "1.0".into(),
            uuid: "u".into(),
            command: "echo".into(),
            payload,
            client_addr: "127.0.0.1:1".into(),
            state: Arc::new(()),
            pusher: Pusher::new(tx),
        }
    }

    #[test]
    fn params_decodes_payload() {
        let req = request(json!({"x": 5}));
        let params: EchoParams = req.params().unwrap();
        assert_eq!(params.x, 5);
    }

    #[test]
    fn params_rejects_mismatched_payload() {
        let req = request(json!({"x": "not a number"}));
        assert!(req.params::<EchoParams>().is_err());
    }
}
