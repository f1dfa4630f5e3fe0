use serde_json::Value;
use tether_core::{FrameKind, OutboundFrame, PushBody};
use tokio::sync::mpsc;
use tracing::error;

use crate::writer::enqueue;

/// Handle for sending unsolicited push frames on one connection.
///
/// Cheap to clone; handlers can stash one away and push from spawned
/// tasks as long as the connection lives.
#[derive(Clone)]
pub struct Pusher {
    queue: mpsc::Sender<String>,
}

impl Pusher {
    pub(crate) fn new(queue: mpsc::Sender<String>) -> Self {
        Self { queue }
    }

    /// Enqueue a push frame addressed to `command` subscribers on the
    /// client. Returns `false` if the frame was dropped (queue full or
    /// connection gone).
    pub fn push(&self, command: impl Into<String>, data: Value) -> bool {
        let command = command.into();
        let frame = OutboundFrame {
            uuid: String::new(),
            kind: FrameKind::Push,
            command: command.clone(),
            body: match serde_json::to_value(PushBody { command, data }) {
                Ok(body) => body,
                Err(err) => {
                    error!(%err, "unserializable push body");
                    return false;
                }
            },
        };
        match serde_json::to_string(&frame) {
            Ok(text) => enqueue(&self.queue, text),
            Err(err) => {
                error!(%err, "unserializable push frame");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn push_builds_a_push_frame() {
        let (tx, mut rx) = mpsc::channel(4);
        let pusher = Pusher::new(tx);

        assert!(pusher.push("news", json!({"headline": "hi"})));

        let text = rx.recv().await.unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "push");
        assert_eq!(value["uuid"], "");
        assert_eq!(value["command"], "news");
        assert_eq!(value["body"]["command"], "news");
        assert_eq!(value["body"]["data"]["headline"], "hi");
    }

    #[tokio::test]
    async fn push_reports_drop_on_closed_connection() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let pusher = Pusher::new(tx);
        assert!(!pusher.push("news", Value::Null));
    }
}
