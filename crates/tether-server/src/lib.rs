//! # tether-server
//!
//! Server side of the tether RPC framework: a prefix-composing command
//! router with middleware, and a per-connection dispatch loop that answers
//! every request exactly once.
//!
//! ```ignore
//! let mut server: Server<MyConnState> = Server::default();
//! server.use_middleware(Arc::new(Logging));
//! let api = server.group("api/", vec![]);
//! api.set_handle("echo", Arc::new(EchoHandler), vec![])?;
//!
//! let listener = TcpListener::bind("127.0.0.1:9000").await?;
//! loop {
//!     let (stream, addr) = listener.accept().await?;
//!     let server = server.clone();
//!     tokio::spawn(async move {
//!         if let Ok((sink, source)) = transport::ws::accept(stream).await {
//!             server.process(sink, source, addr.to_string(), cancel).await;
//!         }
//!     });
//! }
//! ```

#![deny(unsafe_code)]

mod config;
mod dispatcher;
mod errors;
mod push;
mod request;
mod response;
mod router;
mod writer;

pub use config::ServerConfig;
pub use dispatcher::Server;
pub use errors::{ResponseError, RouterError};
pub use push::Pusher;
pub use request::Request;
pub use response::Response;
pub use router::{Handler, Middleware, Router};
