// ABOUTME: Twitch chat transport built on the twitch-irc client
// ABOUTME: The client owns the socket; a relay task turns its feed into session events

pub mod auth;
pub mod events;
pub mod relay;

pub use auth::TwitchCredentials;

use async_trait::async_trait;
use greeter_core::config::TwitchConfig;
use greeter_core::{
    ChatTransport, EventStream, TransportConnector, TransportCredentials, TransportError,
};
use relay::{RelayHandle, RelayOptions};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use twitch_irc::login::StaticLoginCredentials;
use twitch_irc::{ClientConfig, SecureTCPTransport, TwitchIRCClient};

type Client = TwitchIRCClient<SecureTCPTransport, StaticLoginCredentials>;

// =============================================================================
// TwitchConnector - Implements TransportConnector
// =============================================================================

/// Opens Twitch chat connections
#[derive(Debug, Clone)]
pub struct TwitchConnector {
    login_timeout: Duration,
    join_timeout: Duration,
}

impl TwitchConnector {
    pub fn new(login_timeout: Duration, join_timeout: Duration) -> Self {
        Self {
            login_timeout,
            join_timeout,
        }
    }

    pub fn from_config(config: &TwitchConfig) -> Self {
        Self::new(config.login_timeout(), config.join_timeout())
    }
}

#[async_trait]
impl TransportConnector for TwitchConnector {
    async fn connect(
        &self,
        credentials: TransportCredentials,
        channel: &str,
    ) -> Result<(Arc<dyn ChatTransport>, EventStream), TransportError> {
        let login = credentials.login.to_ascii_lowercase();
        let channel = events::channel_name(channel);
        let token = credentials
            .access_token
            .trim_start_matches("oauth:")
            .to_string();

        tracing::info!(%login, %channel, "Connecting to Twitch chat");
        let config = ClientConfig::new_simple(StaticLoginCredentials::new(login.clone(), Some(token)));
        let (incoming, client) = Client::new(config);

        let (relay, events) = relay::spawn(
            incoming,
            RelayOptions {
                login,
                channel: channel.clone(),
                login_timeout: self.login_timeout,
                join_timeout: self.join_timeout,
            },
        );
        let transport = TwitchTransport {
            client: Mutex::new(Some(client)),
            relay,
        };
        if let Err(e) = transport.client()?.join(channel) {
            transport.shutdown().await;
            return Err(TransportError::Connect(e.to_string()));
        }

        let transport: Arc<dyn ChatTransport> = Arc::new(transport);
        Ok((transport, events))
    }
}

// =============================================================================
// TwitchTransport - Implements ChatTransport
// =============================================================================

/// Handle to one live Twitch connection
pub struct TwitchTransport {
    /// Dropped on shutdown, which closes the connection and ends the relay feed
    client: Mutex<Option<Client>>,
    relay: RelayHandle,
}

impl TwitchTransport {
    fn client(&self) -> Result<Client, TransportError> {
        self.client
            .lock()
            .ok()
            .and_then(|client| client.clone())
            .ok_or(TransportError::NotConnected)
    }
}

#[async_trait]
impl ChatTransport for TwitchTransport {
    async fn join(&self, channel: &str) -> Result<(), TransportError> {
        let channel = events::channel_name(channel);
        self.client()?
            .join(channel.clone())
            .map_err(|e| TransportError::Send(e.to_string()))?;
        self.relay.expect_join(&channel);
        Ok(())
    }

    async fn part(&self, channel: &str) -> Result<(), TransportError> {
        self.client()?.part(events::channel_name(channel));
        Ok(())
    }

    async fn send_message(&self, channel: &str, text: &str) -> Result<(), TransportError> {
        // One call is one chat message
        let text: String = text
            .chars()
            .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
            .collect();
        self.client()?
            .say(events::channel_name(channel), text)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    fn joined_channels(&self) -> Vec<String> {
        self.relay.joined_channels()
    }

    async fn shutdown(&self) {
        let client = self.client.lock().ok().and_then(|mut client| client.take());
        drop(client);
        self.relay.stop().await;
    }
}
