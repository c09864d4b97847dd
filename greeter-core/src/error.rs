// ABOUTME: Typed errors for authentication, transport, and session lifecycle failures
// ABOUTME: Session operations return SessionError; plumbing code uses anyhow on top

use thiserror::Error;

/// Token missing, rejected by the identity service, or lacking chat scopes
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthenticationError {
    #[error("no access token available")]
    MissingToken,

    #[error("access token is invalid or expired")]
    InvalidToken,

    #[error("access token lacks required scopes: {}", missing.join(", "))]
    MissingScopes { missing: Vec<String> },

    #[error("token introspection failed: {0}")]
    Introspection(String),
}

/// Connection, join, or send failure reported by a chat transport
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("transport is not connected")]
    NotConnected,

    #[error("failed to send: {0}")]
    Send(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Error returned by session lifecycle operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
