/*!
 * Copyright (c) 2026 Ming Lyu, aka mingcheng
 *
 * This source code is licensed under the MIT License,
 * which is located in the LICENSE file in the source tree's root directory.
 *
 * File: error.rs
 * Author: mingcheng <mingcheng@apache.org>
 * File Created: 2026-03-02 10:12:41
 *
 * Modified By: mingcheng <mingcheng@apache.org>
 * Last Modified: 2026-03-02 11:03:17
 */

use std::fmt;
use thiserror::Error;

/// Errors produced by the fetch and send operations.
#[derive(Debug, Error)]
pub enum MailError {
    /// TCP connect, TLS handshake or timeout failure.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The server rejected the account credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The server answered, but not with what we asked for.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Outbound message rejected locally, before any session was opened.
    #[error("Invalid message: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of a [`MailError`], for callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Authentication,
    Protocol,
    Validation,
    Unknown,
}

impl MailError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MailError::Connection(_) => ErrorKind::Connection,
            MailError::Authentication(_) => ErrorKind::Authentication,
            MailError::Protocol(_) => ErrorKind::Protocol,
            MailError::Validation(_) => ErrorKind::Validation,
            MailError::Other(_) => ErrorKind::Unknown,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Validation => "validation",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(
            MailError::Connection("refused".into()).kind(),
            ErrorKind::Connection
        );
        assert_eq!(
            MailError::Authentication("bad password".into()).kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            MailError::Protocol("NO".into()).kind(),
            ErrorKind::Protocol
        );
        assert_eq!(
            MailError::Validation("empty subject".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            MailError::from(anyhow::anyhow!("boom")).kind(),
            ErrorKind::Unknown
        );
    }

    #[test]
    fn test_display() {
        let err = MailError::Authentication("LOGIN rejected".into());
        assert_eq!(err.to_string(), "Authentication failed: LOGIN rejected");
        assert_eq!(ErrorKind::Protocol.to_string(), "protocol");

        // transparent keeps the inner message
        let err = MailError::from(anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "boom");
    }
}
