// ABOUTME: Scriptable in-memory transport and credential provider for tests
// ABOUTME: Records every join/part/send and lets tests inject transport events
//!
//! # Example
//!
//! ```no_run
//! use greeter_core::mock::{MockConnector, MockCredentials};
//! use greeter_core::{MessagingPolicy, SessionController, TransportEvent};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let credentials = Arc::new(MockCredentials::new().with_chat_token("tok", "streamer"));
//! let connector = Arc::new(MockConnector::new());
//! let session = SessionController::new(credentials, connector.clone());
//!
//! session.connect("tok", "streamer", MessagingPolicy::default()).await.unwrap();
//! let transport = connector.last_transport().unwrap();
//! transport.emit(TransportEvent::Connected);
//! # }
//! ```

use crate::error::{AuthenticationError, TransportError};
use crate::traits::{
    ChatTransport, CredentialProvider, EventStream, TokenInfo, TransportConnector,
    TransportCredentials, TransportEvent, REQUIRED_CHAT_SCOPES,
};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::UnboundedReceiverStream;

// =============================================================================
// MockCredentials
// =============================================================================

/// Credential provider backed by a fixed token table
#[derive(Default)]
pub struct MockCredentials {
    stored_token: Mutex<Option<String>>,
    tokens: HashMap<String, TokenInfo>,
}

impl MockCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as belonging to `user` with the given scopes
    pub fn with_token(mut self, token: &str, user: &str, scopes: &[&str]) -> Self {
        self.tokens.insert(
            token.to_string(),
            TokenInfo {
                client_id: "mock-client".to_string(),
                scopes: scopes.iter().map(|s| s.to_string()).collect(),
                user_name: user.to_string(),
            },
        );
        self
    }

    /// Accept `token` with both chat scopes and make it the stored token
    pub fn with_chat_token(self, token: &str, user: &str) -> Self {
        let creds = self.with_token(token, user, REQUIRED_CHAT_SCOPES);
        creds.set_stored_token(Some(token));
        creds
    }

    pub fn set_stored_token(&self, token: Option<&str>) {
        if let Ok(mut stored) = self.stored_token.lock() {
            *stored = token.map(str::to_string);
        }
    }
}

#[async_trait]
impl CredentialProvider for MockCredentials {
    fn get_token(&self) -> Option<String> {
        self.stored_token.lock().ok().and_then(|t| t.clone())
    }

    async fn introspect(&self, token: &str) -> Result<TokenInfo, AuthenticationError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or(AuthenticationError::InvalidToken)
    }
}

// =============================================================================
// MockTransport
// =============================================================================

/// In-memory transport; every outbound request is recorded
pub struct MockTransport {
    credentials: TransportCredentials,
    events: mpsc::UnboundedSender<TransportEvent>,
    sent: Mutex<Vec<(String, String)>>,
    join_requests: Mutex<Vec<String>>,
    part_requests: Mutex<Vec<String>>,
    joined: Mutex<BTreeSet<String>>,
    fail_sends: Mutex<Option<TransportError>>,
    shut_down: Mutex<bool>,
    activity: Notify,
    hold: Mutex<bool>,
    released: Notify,
}

impl MockTransport {
    fn new(credentials: TransportCredentials) -> (Arc<Self>, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            credentials,
            events: tx,
            sent: Mutex::new(Vec::new()),
            join_requests: Mutex::new(Vec::new()),
            part_requests: Mutex::new(Vec::new()),
            joined: Mutex::new(BTreeSet::new()),
            fail_sends: Mutex::new(None),
            shut_down: Mutex::new(false),
            activity: Notify::new(),
            hold: Mutex::new(false),
            released: Notify::new(),
        });
        (transport, Box::pin(UnboundedReceiverStream::new(rx)))
    }

    /// Deliver an event to the session as if the server had sent it.
    ///
    /// `Joined` and `Parted` also update the transport's joined-channel set.
    pub fn emit(&self, event: TransportEvent) {
        if let Ok(mut joined) = self.joined.lock() {
            match &event {
                TransportEvent::Joined { channel } => {
                    joined.insert(channel.clone());
                }
                TransportEvent::Parted { channel } => {
                    joined.remove(channel);
                }
                _ => {}
            }
        }
        let _ = self.events.send(event);
    }

    pub fn credentials(&self) -> &TransportCredentials {
        &self.credentials
    }

    /// Every message sent so far as (channel, text)
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Texts of every message sent so far
    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }

    pub fn join_requests(&self) -> Vec<String> {
        self.join_requests.lock().map(|j| j.clone()).unwrap_or_default()
    }

    pub fn part_requests(&self) -> Vec<String> {
        self.part_requests.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.lock().map(|s| *s).unwrap_or(false)
    }

    /// Make every later send fail with `error`
    pub fn fail_sends(&self, error: TransportError) {
        if let Ok(mut fail) = self.fail_sends.lock() {
            *fail = Some(error);
        }
    }

    /// Park every later send after it is recorded, until [`release_sends`](Self::release_sends)
    pub fn hold_sends(&self) {
        if let Ok(mut hold) = self.hold.lock() {
            *hold = true;
        }
    }

    /// Let parked and later sends complete
    pub fn release_sends(&self) {
        if let Ok(mut hold) = self.hold.lock() {
            *hold = false;
        }
        self.released.notify_waiters();
    }

    fn is_held(&self) -> bool {
        self.hold.lock().map(|h| *h).unwrap_or(false)
    }

    /// Wait until at least `count` send attempts have been made
    pub async fn wait_for_sends(&self, count: usize) {
        loop {
            let notified = self.activity.notified();
            if self.attempts() >= count {
                return;
            }
            notified.await;
        }
    }

    fn attempts(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn join(&self, channel: &str) -> Result<(), TransportError> {
        if let Ok(mut joins) = self.join_requests.lock() {
            joins.push(channel.to_string());
        }
        Ok(())
    }

    async fn part(&self, channel: &str) -> Result<(), TransportError> {
        if let Ok(mut parts) = self.part_requests.lock() {
            parts.push(channel.to_string());
        }
        Ok(())
    }

    async fn send_message(&self, channel: &str, text: &str) -> Result<(), TransportError> {
        let failure = self.fail_sends.lock().ok().and_then(|f| f.clone());
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((channel.to_string(), text.to_string()));
        }
        self.activity.notify_waiters();
        loop {
            let released = self.released.notified();
            if !self.is_held() {
                break;
            }
            released.await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn joined_channels(&self) -> Vec<String> {
        self.joined
            .lock()
            .map(|j| j.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn shutdown(&self) {
        if let Ok(mut shut_down) = self.shut_down.lock() {
            *shut_down = true;
        }
    }
}

// =============================================================================
// MockConnector
// =============================================================================

/// Connector handing out a fresh [`MockTransport`] per connection
#[derive(Default)]
pub struct MockConnector {
    transports: Mutex<Vec<Arc<MockTransport>>>,
    fail_with: Mutex<Option<TransportError>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next connection attempts fail with `error`
    pub fn fail_with(&self, error: TransportError) {
        if let Ok(mut fail) = self.fail_with.lock() {
            *fail = Some(error);
        }
    }

    pub fn connect_count(&self) -> usize {
        self.transports.lock().map(|t| t.len()).unwrap_or(0)
    }

    /// The transport created by the most recent connection attempt
    pub fn last_transport(&self) -> Option<Arc<MockTransport>> {
        self.transports.lock().ok().and_then(|t| t.last().cloned())
    }
}

#[async_trait]
impl TransportConnector for MockConnector {
    async fn connect(
        &self,
        credentials: TransportCredentials,
        _channel: &str,
    ) -> Result<(Arc<dyn ChatTransport>, EventStream), TransportError> {
        if let Some(error) = self.fail_with.lock().ok().and_then(|f| f.clone()) {
            return Err(error);
        }
        let (transport, events) = MockTransport::new(credentials);
        if let Ok(mut transports) = self.transports.lock() {
            transports.push(Arc::clone(&transport));
        }
        let handle: Arc<dyn ChatTransport> = transport;
        Ok((handle, events))
    }
}
