//! WebSocket transport over `tokio-tungstenite`.
//!
//! Frames are text messages. Ping/Pong control frames are answered by the
//! library and skipped here; a Close frame or stream end maps to
//! [`TransportError::Closed`].

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{accept_async, connect_async};
use tracing::debug;

use super::{Dialer, FrameSink, FrameSource, TransportError, TransportPair};

/// Dial `url` and split the socket into transport halves.
pub async fn connect(url: &str) -> Result<TransportPair, TransportError> {
    let (socket, _response) = connect_async(url)
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;
    debug!(url, "websocket connected");
    let (sink, stream) = socket.split();
    Ok((Box::new(WsSink(sink)), Box::new(WsSource(stream))))
}

/// Perform the server-side handshake on an accepted TCP stream and split it.
pub async fn accept(stream: TcpStream) -> Result<TransportPair, TransportError> {
    let socket = accept_async(stream)
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;
    let (sink, stream) = socket.split();
    Ok((Box::new(WsSink(sink)), Box::new(WsSource(stream))))
}

/// [`Dialer`] backed by [`connect`].
#[derive(Clone, Copy, Debug, Default)]
pub struct WsDialer;

#[async_trait]
impl Dialer for WsDialer {
    async fn dial(&self, url: &str) -> Result<TransportPair, TransportError> {
        connect(url).await
    }
}

struct WsSink<S>(S);

#[async_trait]
impl<S> FrameSink for WsSink<S>
where
    S: Sink<Message, Error = WsError> + Unpin + Send,
{
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.0.send(Message::text(frame)).await.map_err(map_err)
    }

    async fn close(&mut self) {
        let _ = self.0.close().await;
    }
}

struct WsSource<S>(S);

#[async_trait]
impl<S> FrameSource for WsSource<S>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin + Send,
{
    async fn recv(&mut self) -> Result<String, TransportError> {
        loop {
            let message = match self.0.next().await {
                Some(Ok(m)) => m,
                Some(Err(e)) => return Err(map_err(e)),
                None => return Err(TransportError::Closed),
            };
            match message {
                Message::Text(text) => return Ok(text.to_string()),
                Message::Binary(bytes) => {
                    return String::from_utf8(bytes.to_vec())
                        .map_err(|e| TransportError::Protocol(e.to_string()));
                }
                Message::Close(_) => return Err(TransportError::Closed),
                // Control frames are handled by tungstenite itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }
}

fn map_err(err: WsError) -> TransportError {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
        WsError::Io(e) => TransportError::Io(e.to_string()),
        other => TransportError::Protocol(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connect_refused() {
        // Bind then drop to get a port that refuses connections.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = connect(&format!("ws://{addr}")).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)));
    }

    #[tokio::test]
    async fn accept_and_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (mut sink, mut source) = accept(stream).await.unwrap();
            let got = source.recv().await.unwrap();
            sink.send(format!("echo:{got}")).await.unwrap();
            sink.close().await;
        });

        let (mut sink, mut source) = connect(&format!("ws://{addr}")).await.unwrap();
        sink.send("hello".into()).await.unwrap();
        assert_eq!(source.recv().await.unwrap(), "echo:hello");
        // After the peer closes, recv reports Closed.
        assert!(matches!(
            source.recv().await.unwrap_err(),
            TransportError::Closed
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn dialer_delegates_to_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = WsDialer.dial(&format!("ws://{addr}")).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)));
    }
}
