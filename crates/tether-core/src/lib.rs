//! # tether-core
//!
//! Wire envelope model and transport boundary for the tether RPC framework.
//!
//! This crate provides the shared vocabulary the client and server crates
//! depend on:
//!
//! - **Envelopes**: [`RequestEnvelope`], [`InboundFrame`], [`OutboundFrame`]
//!   matching the JSON wire format exactly
//! - **Bodies**: [`ResponseBody`] (`code == 0` ⇒ success) and [`PushBody`]
//! - **Transport seam**: [`transport::FrameSink`] / [`transport::FrameSource`]
//!   / [`transport::Dialer`] traits, with a `tokio-tungstenite` implementation
//!   in [`transport::ws`] and an in-process pair in [`transport::mem`]

#![deny(unsafe_code)]

pub mod envelope;
pub mod transport;

pub use envelope::{
    FrameKind, InboundFrame, OutboundFrame, PushBody, RequestEnvelope, ResponseBody, CODE_NOT_FOUND,
    CODE_OK, CODE_SERVER_ERROR, MSG_COMMAND_NOT_FOUND, MSG_PARSE_ERROR, MSG_RETRIES_EXHAUSTED,
    MSG_SERVER_ERROR, MSG_SUCCESS,
};
pub use transport::{Dialer, FrameSink, FrameSource, TransportError, TransportPair};
