// ABOUTME: Seams between the session controller and the outside world
// ABOUTME: Chat transport adapter, transport connector, and credential provider traits

use crate::error::{AuthenticationError, TransportError};
use async_trait::async_trait;
use std::fmt::Debug;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;

/// Scopes a token must carry to read and post chat messages
pub const REQUIRED_CHAT_SCOPES: &[&str] = &["chat:read", "chat:edit"];

// =============================================================================
// Incoming Chat Message
// =============================================================================

/// A chat message delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Channel the message was posted in
    pub channel: String,
    /// Display name of the sender
    pub sender: String,
    /// Message text
    pub text: String,
    /// Set by the transport when this is the sender's first message ever in the channel
    pub is_first_message: bool,
}

impl ChatMessage {
    pub fn new(channel: impl Into<String>, sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            sender: sender.into(),
            text: text.into(),
            is_first_message: false,
        }
    }

    /// Mark this message as the sender's first-ever message in the channel
    pub fn first_time(mut self) -> Self {
        self.is_first_message = true;
        self
    }
}

// =============================================================================
// Transport Events
// =============================================================================

/// Inbound event vocabulary of a chat transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Transport-level connection established and authenticated
    Connected,
    /// Transport-level connection lost or closed
    Disconnected,
    /// The bot joined the channel
    Joined { channel: String },
    /// The bot left the channel
    Parted { channel: String },
    /// The server refused or never acknowledged a join
    JoinFailed { channel: String, reason: String },
    /// A chat message arrived
    MessageReceived(ChatMessage),
}

/// Boxed stream of transport events, consumed by exactly one reader
pub type EventStream = Pin<Box<dyn Stream<Item = TransportEvent> + Send>>;

// =============================================================================
// Chat Transport Adapter
// =============================================================================

/// Credentials handed to a transport once the token has been introspected
#[derive(Clone)]
pub struct TransportCredentials {
    pub client_id: String,
    pub access_token: String,
    pub scopes: Vec<String>,
    /// Login name of the authenticated account
    pub login: String,
}

// Custom Debug impl to redact the access token
impl Debug for TransportCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportCredentials")
            .field("client_id", &self.client_id)
            .field("access_token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("login", &self.login)
            .finish()
    }
}

/// One live connection to a chat service.
///
/// `join`, `part` and `send_message` resolve once the request has been handed to
/// the connection; acknowledgments arrive later as [`TransportEvent`]s.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Request to join a channel
    async fn join(&self, channel: &str) -> Result<(), TransportError>;

    /// Request to leave a channel
    async fn part(&self, channel: &str) -> Result<(), TransportError>;

    /// Post a message to a channel
    async fn send_message(&self, channel: &str, text: &str) -> Result<(), TransportError>;

    /// Channels the transport currently sits in
    fn joined_channels(&self) -> Vec<String>;

    /// Close the connection. Events stop flowing afterwards.
    async fn shutdown(&self) {}
}

/// Factory for transport connections. Each call opens a fresh connection.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Start connecting and return the handle plus its event stream.
    ///
    /// Returns as soon as the connection attempt is underway; `Connected` and
    /// `Joined` are reported through the stream. `channel` is joined
    /// automatically once the connection is up.
    async fn connect(
        &self,
        credentials: TransportCredentials,
        channel: &str,
    ) -> Result<(Arc<dyn ChatTransport>, EventStream), TransportError>;
}

// =============================================================================
// Credential Provider
// =============================================================================

/// Result of token introspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub client_id: String,
    pub scopes: Vec<String>,
    /// Login name of the account the token belongs to
    pub user_name: String,
}

impl TokenInfo {
    /// Scopes from `required` that this token does not carry
    pub fn missing_scopes(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|scope| !self.scopes.iter().any(|s| s == *scope))
            .map(|scope| scope.to_string())
            .collect()
    }

    /// Fail with `MissingScopes` unless every scope in `required` is present
    pub fn require_scopes(&self, required: &[&str]) -> Result<(), AuthenticationError> {
        let missing = self.missing_scopes(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthenticationError::MissingScopes { missing })
        }
    }
}

/// Supplies and introspects access tokens
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// The currently stored token, if any
    fn get_token(&self) -> Option<String>;

    /// Ask the identity service who the token belongs to and what it may do
    async fn introspect(&self, token: &str) -> Result<TokenInfo, AuthenticationError>;

    /// True when a token is stored and carries the chat scopes
    async fn validate_token(&self) -> bool {
        let Some(token) = self.get_token() else {
            return false;
        };
        match self.introspect(&token).await {
            Ok(info) => info.require_scopes(REQUIRED_CHAT_SCOPES).is_ok(),
            Err(e) => {
                tracing::debug!(error = %e, "Token validation failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(scopes: &[&str]) -> TokenInfo {
        TokenInfo {
            client_id: "cid".to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            user_name: "streamer".to_string(),
        }
    }

    #[test]
    fn test_require_scopes_passes_with_both_chat_scopes() {
        let info = info(&["chat:read", "chat:edit", "bits:read"]);
        assert!(info.require_scopes(REQUIRED_CHAT_SCOPES).is_ok());
    }

    #[test]
    fn test_require_scopes_reports_missing() {
        let info = info(&["chat:read"]);
        assert_eq!(
            info.require_scopes(REQUIRED_CHAT_SCOPES),
            Err(AuthenticationError::MissingScopes {
                missing: vec!["chat:edit".to_string()]
            })
        );
    }

    #[test]
    fn test_transport_credentials_debug_redacts_token() {
        let creds = TransportCredentials {
            client_id: "cid".to_string(),
            access_token: "super-secret".to_string(),
            scopes: vec![],
            login: "bot".to_string(),
        };
        let debug_str = format!("{:?}", creds);
        assert!(!debug_str.contains("super-secret"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_first_time_builder() {
        let msg = ChatMessage::new("chan", "Alice", "hi").first_time();
        assert!(msg.is_first_message);
    }
}
