//! # tether-client
//!
//! Supervised client connection for the tether RPC framework.
//!
//! A [`Client`] owns one logical link to a server: it dials, reconnects
//! with linear backoff, heartbeats, and correlates responses to in-flight
//! requests by uuid. Requests caught in a connection drop are retried on
//! the next connection until their try budget runs out.
//!
//! ```ignore
//! let client = Client::new(ClientConfig::new("ws://127.0.0.1:9000"));
//! tokio::spawn({
//!     let client = client.clone();
//!     async move { client.run().await }
//! });
//! let reply = client.send("api/echo", serde_json::json!({"x": 1})).await?;
//! ```

#![deny(unsafe_code)]

mod client;
mod config;
mod errors;
mod hooks;
mod pending;
mod supervisor;

pub use client::Client;
pub use config::ClientConfig;
pub use errors::SendError;
pub use hooks::ClientHooks;
