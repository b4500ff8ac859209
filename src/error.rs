//! Error types shared across the crate.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for audit-viewer operations
pub type Result<T> = std::result::Result<T, ViewerError>;

/// Errors surfaced by the protocol, event and filter layers
#[derive(Error, Debug)]
pub enum ViewerError {
    /// The privileged server could not be started or closed the channel
    /// during the handshake. Recoverable: callers fall back to unprivileged
    /// file access.
    #[error("privileged server is not available")]
    ServerUnavailable,

    /// I/O operation failed (filesystem, transport, or a remote errno reply)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Persisted filter or statistic configuration is invalid
    #[error("invalid configuration: {0}")]
    Format(String),

    /// A search expression failed to parse
    #[error("invalid search expression: {0}")]
    Expression(String),
}

impl ViewerError {
    /// Create a format error
    pub fn format<M: fmt::Display>(msg: M) -> Self {
        Self::Format(msg.to_string())
    }

    /// Create an expression syntax error
    pub fn expression<M: fmt::Display>(msg: M) -> Self {
        Self::Expression(msg.to_string())
    }

    /// Create an I/O error from a raw OS error code
    pub fn from_errno(code: i32) -> Self {
        Self::Io(io::Error::from_raw_os_error(code))
    }

    /// The OS error code carried by this error, if any
    pub fn os_error(&self) -> Option<i32> {
        match self {
            Self::Io(err) => err.raw_os_error(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_round_trip() {
        let err = ViewerError::from_errno(nix::libc::ENOENT);
        assert_eq!(err.os_error(), Some(nix::libc::ENOENT));
    }

    #[test]
    fn unavailable_carries_no_code() {
        assert_eq!(ViewerError::ServerUnavailable.os_error(), None);
    }
}
