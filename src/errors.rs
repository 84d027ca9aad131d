//! Error taxonomy.
//!
//! Three layers, matching where a failure is observed:
//!
//! - [`TransportError`]: the transport could not complete a unary call or
//!   accept a write.
//! - [`StreamError`]: a live subscription failed; delivered through the
//!   subscriber's callback.
//! - [`ClientError`]: what a facade future fails with.
//!
//! Errors always surface to the immediate caller. Nothing here retries or
//! suppresses; retry policy belongs to the layer above.

use std::fmt;

use crate::transport::Status;

/// Transport-level failure of a unary call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The remote completed the call with a non-OK status.
    Status(Status),
    /// The connection to the controller is gone.
    ConnectionClosed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Status(status) => write!(f, "call failed: {status}"),
            TransportError::ConnectionClosed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Failure of a live subscription stream, delivered through the
/// subscriber's callback. `Clone` because one failure fans out to every
/// subscriber of a shared stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The stream terminated with a non-OK status.
    Status(Status),
    /// This subscriber fell behind the fan-out buffer and missed items.
    Lagged(u64),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Status(status) => write!(f, "stream failed: {status}"),
            StreamError::Lagged(missed) => write!(f, "subscriber lagged, missed {missed} items"),
        }
    }
}

impl std::error::Error for StreamError {}

/// Error from a facade call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The transport failed the call.
    Transport(TransportError),
    /// The remote reported success but produced no response payload.
    EmptyResponse,
    /// The event stream reported a non-OK terminal status.
    Status(Status),
    /// The event stream completed cleanly but never produced the awaited
    /// value.
    NoResult,
    /// The event stream ended without reporting a terminal status.
    MissingStatus,
}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        ClientError::Transport(e)
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Transport(e) => write!(f, "{e}"),
            ClientError::EmptyResponse => write!(f, "call completed without a response"),
            ClientError::Status(status) => write!(f, "{status}"),
            ClientError::NoResult => write!(f, "stream completed without producing a result"),
            ClientError::MissingStatus => write!(f, "stream ended without a terminal status"),
        }
    }
}

impl std::error::Error for ClientError {}
