//! The crate's error taxonomy.

use std::sync::Arc;

use thiserror::Error;

/// Every way a [`crate::Client`] operation can fail.
///
/// `MalformedMessage`, `UnexpectedEof` and `Io` are terminal: hitting any of
/// them transitions the whole client to its terminal state (see
/// [`crate::client::Client::dispose`] and the reader task), failing every
/// pending request and completing every subscriber with the same cause.
/// `DuplicateActionId`, `InvalidArgument` and `Cancelled` are local — they
/// only affect the call that triggered them. `ClientClosed` is what every
/// subsequent call sees once a terminal transition has already happened; it
/// carries that transition's cause behind an `Arc` so the one value can be
/// handed out to every caller without requiring the whole error type to be
/// `Clone` (`std::io::Error` isn't).
#[derive(Debug, Error)]
pub enum ClientError {
    /// A decoded line was non-empty and not a banner but had no colon.
    #[error("malformed AMI message: {0}")]
    MalformedMessage(String),

    /// The stream ended with a partial frame still buffered.
    #[error("stream ended with an incomplete frame buffered")]
    UnexpectedEof,

    /// The stream ended cleanly, with no partial frame buffered.
    #[error("stream closed")]
    Eof,

    /// A read or write on the underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A second `publish` was issued with an `ActionID` already outstanding.
    #[error("ActionID already has an outstanding request: {0}")]
    DuplicateActionId(String),

    /// A required field was missing at publish time.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The caller's wait for a reply was cancelled before one arrived.
    #[error("request cancelled")]
    Cancelled,

    /// The client has already transitioned to terminal; `cause` is that
    /// transition's recorded cause.
    #[error("client is closed: {0}")]
    ClientClosed(Arc<ClientError>),
}

impl ClientError {
    /// True for the three causes that drive a terminal transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ClientError::MalformedMessage(_) | ClientError::UnexpectedEof | ClientError::Eof | ClientError::Io(_)
        )
    }
}

/// A specialized `Result` for AMI client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
