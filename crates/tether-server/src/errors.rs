use thiserror::Error;

/// Registration-time router failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// The fully-composed command string is already registered.
    #[error("command already registered: {command}")]
    DuplicateCommand { command: String },
}

/// Failures of the one-shot response slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResponseError {
    /// A body was already set; the first reply stands.
    #[error("response already set")]
    AlreadyReplied,
}
