use thiserror::Error;

/// Why a `send` call failed to produce a response body.
///
/// Application-level failures are not errors here: a response with a
/// non-zero code is still delivered as `Ok`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// The response deadline elapsed before a response was correlated.
    #[error("timed out waiting for a response")]
    Timeout,

    /// The client was shut down before the request completed.
    #[error("client is shut down")]
    Canceled,
}
