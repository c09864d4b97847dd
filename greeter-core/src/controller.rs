// ABOUTME: Session controller owning one chat connection's lifecycle and messaging policy
// ABOUTME: Drives the transport, tracks connect/join phases, and posts startup/welcome messages

use crate::error::{SessionError, TransportError};
use crate::notify::{Signal, Subscription};
use crate::policy::MessagingPolicy;
use crate::state::{ConnectionPhase, JoinPhase, SessionSnapshot};
use crate::timers::Debouncer;
use crate::traits::{
    ChatMessage, ChatTransport, CredentialProvider, EventStream, TransportConnector,
    TransportCredentials, TransportEvent, REQUIRED_CHAT_SCOPES,
};
use crate::welcome::{WelcomeDecision, WelcomeGate};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_stream::StreamExt;

/// Default quiet period before a join-state notification is delivered
pub const DEFAULT_JOIN_DEBOUNCE: Duration = Duration::from_millis(15);

/// Default time to wait for the transport to accept a part request on disconnect
pub const DEFAULT_PART_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables for [`SessionController`]
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub join_debounce: Duration,
    pub part_timeout: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            join_debounce: DEFAULT_JOIN_DEBOUNCE,
            part_timeout: DEFAULT_PART_TIMEOUT,
        }
    }
}

struct SessionState {
    connection: ConnectionPhase,
    join: JoinPhase,
    channel: Option<String>,
    authenticated_identity: Option<String>,
    policy: MessagingPolicy,
    transport: Option<Arc<dyn ChatTransport>>,
    welcome: WelcomeGate,
    /// Bumped whenever a connection attempt starts or the session resets.
    /// Events and attempts tagged with an older value are ignored.
    epoch: u64,
}

impl SessionState {
    fn new() -> Self {
        Self {
            connection: ConnectionPhase::Disconnected,
            join: JoinPhase::NotJoined,
            channel: None,
            authenticated_identity: None,
            policy: MessagingPolicy::default(),
            transport: None,
            welcome: WelcomeGate::new(),
            epoch: 0,
        }
    }
}

struct Shared {
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn TransportConnector>,
    state: Mutex<SessionState>,
    on_connect_state_changed: Signal,
    on_join_state_changed: Signal,
    join_debounce: Debouncer,
    part_timeout: Duration,
}

/// Handle to the single chat session of the process.
///
/// Create one at startup and hand clones to every consumer; all clones share
/// the same state. Callers must not call [`connect`](Self::connect) while the
/// session is already connected or connecting.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn TransportConnector>,
    ) -> Self {
        Self::with_options(credentials, connector, ControllerOptions::default())
    }

    pub fn with_options(
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn TransportConnector>,
        options: ControllerOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                credentials,
                connector,
                state: Mutex::new(SessionState::new()),
                on_connect_state_changed: Signal::new(),
                on_join_state_changed: Signal::new(),
                join_debounce: Debouncer::new(options.join_debounce),
                part_timeout: options.part_timeout,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Called whenever the connection phase may have changed
    pub fn on_connect_state_changed(
        &self,
        listener: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        self.shared.on_connect_state_changed.subscribe(listener)
    }

    /// Called whenever the join phase may have changed
    pub fn on_join_state_changed(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.shared.on_join_state_changed.subscribe(listener)
    }

    fn emit_join_state_debounced(&self) {
        let signal = self.shared.on_join_state_changed.clone();
        self.shared.join_debounce.schedule(move || signal.emit());
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn connection_phase(&self) -> ConnectionPhase {
        self.lock().connection
    }

    pub fn join_phase(&self) -> JoinPhase {
        self.lock().join
    }

    pub fn connected(&self) -> bool {
        self.connection_phase() == ConnectionPhase::Connected
    }

    pub fn connecting(&self) -> bool {
        self.connection_phase() == ConnectionPhase::Connecting
    }

    pub fn joined(&self) -> bool {
        self.join_phase() == JoinPhase::Joined
    }

    pub fn joining(&self) -> bool {
        self.join_phase() == JoinPhase::Joining
    }

    pub fn channel(&self) -> Option<String> {
        self.lock().channel.clone()
    }

    pub fn authenticated_identity(&self) -> Option<String> {
        self.lock().authenticated_identity.clone()
    }

    pub fn joined_channels(&self) -> Vec<String> {
        self.lock()
            .transport
            .as_ref()
            .map(|t| t.joined_channels())
            .unwrap_or_default()
    }

    pub fn active_policy(&self) -> MessagingPolicy {
        self.lock().policy.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            connection: state.connection,
            join: state.join,
            channel: state.channel.clone(),
            authenticated_identity: state.authenticated_identity.clone(),
            joined_channels: state
                .transport
                .as_ref()
                .map(|t| t.joined_channels())
                .unwrap_or_default(),
            active_policy: state.policy.clone(),
            seen_first_time_chatters: state.welcome.seen_chatters(),
            welcome_cooldown_active: state.welcome.cooldown_active(),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Authenticate `token` and start connecting to `channel`.
    ///
    /// Returns once the transport connection attempt is underway; connect and
    /// join acknowledgments arrive later as transport events. Any failure
    /// resets the session before the error is returned. There is no retry.
    pub async fn connect(
        &self,
        token: &str,
        channel: &str,
        policy: MessagingPolicy,
    ) -> Result<(), SessionError> {
        let epoch = {
            let mut state = self.lock();
            state.epoch += 1;
            state.policy = policy;
            state.channel = Some(channel.to_string());
            state.connection = ConnectionPhase::Connecting;
            state.epoch
        };
        tracing::info!(channel = %channel, "Connecting to chat");
        self.shared.on_connect_state_changed.emit();

        match self.establish(epoch, token, channel).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, channel = %channel, "Failed to connect to chat");
                if self.is_current(epoch) {
                    self.reset();
                }
                Err(e)
            }
        }
    }

    async fn establish(&self, epoch: u64, token: &str, channel: &str) -> Result<(), SessionError> {
        let info = self.shared.credentials.introspect(token).await?;
        info.require_scopes(REQUIRED_CHAT_SCOPES)?;

        {
            let mut state = self.lock();
            if state.epoch != epoch {
                tracing::warn!(channel = %channel, "Connection attempt superseded during authentication");
                return Ok(());
            }
            state.authenticated_identity = Some(info.user_name.clone());
        }
        tracing::info!(user = %info.user_name, "Token authenticated");

        let credentials = TransportCredentials {
            client_id: info.client_id,
            access_token: token.to_string(),
            scopes: info.scopes,
            login: info.user_name,
        };
        let (transport, events) = self.shared.connector.connect(credentials, channel).await?;

        let superseded = {
            let mut state = self.lock();
            if state.epoch == epoch {
                state.transport = Some(Arc::clone(&transport));
                false
            } else {
                true
            }
        };
        if superseded {
            tracing::warn!(channel = %channel, "Connection attempt superseded, closing transport");
            transport.shutdown().await;
            return Ok(());
        }

        self.spawn_event_pump(epoch, events);
        Ok(())
    }

    /// Leave the channel if possible, then reset the session.
    ///
    /// The reset happens whether or not the transport accepts the part request.
    /// Sends already in progress are not aborted.
    pub async fn disconnect(&self) {
        let (transport, channel) = {
            let state = self.lock();
            (state.transport.clone(), state.channel.clone())
        };

        if let (Some(transport), Some(channel)) = (&transport, &channel) {
            match tokio::time::timeout(self.shared.part_timeout, transport.part(channel)).await {
                Ok(Ok(())) => tracing::debug!(channel = %channel, "Part requested"),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, channel = %channel, "Failed to part channel")
                }
                Err(_) => tracing::warn!(channel = %channel, "Timed out requesting part"),
            }
        }

        self.reset();
        tracing::info!("Disconnected from chat");

        if let Some(transport) = transport {
            transport.shutdown().await;
        }
    }

    /// Ask the transport to (re)join the session channel.
    ///
    /// The join phase flips to `Joining` and listeners are told before the
    /// request goes out. Without a channel this does nothing.
    pub async fn join(&self) -> Result<(), SessionError> {
        let (channel, transport) = {
            let mut state = self.lock();
            let Some(channel) = state.channel.clone() else {
                return Ok(());
            };
            state.join = JoinPhase::Joining;
            (channel, state.transport.clone())
        };
        self.shared.on_join_state_changed.emit();

        let result = match transport {
            Some(transport) => transport.join(&channel).await,
            None => Err(TransportError::NotConnected),
        };

        if let Err(e) = result {
            tracing::error!(error = %e, channel = %channel, "Failed to request join");
            {
                let mut state = self.lock();
                if state.join == JoinPhase::Joining {
                    state.join = JoinPhase::NotJoined;
                }
            }
            self.shared.on_join_state_changed.emit();
            return Err(e.into());
        }

        tracing::debug!(channel = %channel, "Join requested");
        Ok(())
    }

    /// Replace the policy used for future decisions. Bursts already being
    /// sent keep the policy they started with.
    pub fn set_policy(&self, policy: MessagingPolicy) {
        self.lock().policy = policy;
        tracing::debug!("Messaging policy updated");
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock().epoch == epoch
    }

    /// Return to the initial state and notify both listener kinds
    fn reset(&self) {
        {
            let mut state = self.lock();
            let epoch = state.epoch + 1;
            state.welcome.reset();
            *state = SessionState {
                epoch,
                ..SessionState::new()
            };
        }
        self.shared.join_debounce.cancel();
        self.shared.on_connect_state_changed.emit();
        self.shared.on_join_state_changed.emit();
    }

    // =========================================================================
    // Transport events
    // =========================================================================

    fn spawn_event_pump(&self, epoch: u64, mut events: EventStream) {
        let controller = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if !controller.is_current(epoch) {
                    break;
                }
                controller.process_event(epoch, event).await;
            }
            tracing::debug!(epoch, "Transport event stream ended");
        });
    }

    /// Process one transport event against the current connection.
    ///
    /// Events are normally delivered by the connection's own event stream;
    /// this entry point exists for transports that push events directly.
    pub async fn handle_event(&self, event: TransportEvent) {
        let epoch = self.lock().epoch;
        self.process_event(epoch, event).await;
    }

    async fn process_event(&self, epoch: u64, event: TransportEvent) {
        tracing::debug!(?event, "Transport event");
        match event {
            TransportEvent::Connected => {
                let applied = self.update_if_current(epoch, |state| {
                    state.connection = ConnectionPhase::Connected;
                    state.join = JoinPhase::Joining;
                });
                if applied {
                    tracing::info!("Chat connection established");
                    self.shared.on_connect_state_changed.emit();
                    self.shared.on_join_state_changed.emit();
                }
            }
            TransportEvent::Disconnected => {
                let applied = self.update_if_current(epoch, |state| {
                    state.connection = ConnectionPhase::Disconnected;
                });
                if applied {
                    tracing::warn!("Chat connection lost");
                    self.shared.on_connect_state_changed.emit();
                }
            }
            TransportEvent::Parted { channel } => {
                let applied = self.update_if_current(epoch, |state| {
                    state.join = JoinPhase::NotJoined;
                });
                if applied {
                    tracing::info!(channel = %channel, "Left channel");
                    self.emit_join_state_debounced();
                }
            }
            TransportEvent::Joined { channel } => {
                let applied = self.update_if_current(epoch, |state| {
                    state.join = JoinPhase::Joined;
                });
                if applied {
                    tracing::info!(channel = %channel, "Joined channel");
                    self.emit_join_state_debounced();
                    self.send_startup_messages().await;
                }
            }
            TransportEvent::JoinFailed { channel, reason } => {
                let applied = self.update_if_current(epoch, |state| {
                    state.join = JoinPhase::NotJoined;
                });
                if applied {
                    tracing::warn!(channel = %channel, reason = %reason, "Failed to join channel");
                    self.emit_join_state_debounced();
                }
            }
            TransportEvent::MessageReceived(message) => {
                if self.is_current(epoch) {
                    self.evaluate_welcome_message(&message).await;
                }
            }
        }
    }

    fn update_if_current(&self, epoch: u64, apply: impl FnOnce(&mut SessionState)) -> bool {
        let mut state = self.lock();
        if state.epoch != epoch {
            tracing::debug!(epoch, current = state.epoch, "Ignoring event from a stale connection");
            return false;
        }
        apply(&mut state);
        true
    }

    // =========================================================================
    // Messaging policy
    // =========================================================================

    fn send_target(state: &SessionState) -> Option<(String, Arc<dyn ChatTransport>)> {
        Some((state.channel.clone()?, state.transport.clone()?))
    }

    async fn send_startup_messages(&self) {
        let (messages, target) = {
            let state = self.lock();
            if !state.policy.post_startup_message {
                return;
            }
            (state.policy.startup_messages.clone(), Self::send_target(&state))
        };
        let Some((channel, transport)) = target else {
            tracing::warn!("No active transport for startup messages");
            return;
        };

        tracing::info!(channel = %channel, count = messages.len(), "Posting startup messages");
        send_burst(transport.as_ref(), &channel, &messages, "startup").await;
    }

    async fn evaluate_welcome_message(&self, message: &ChatMessage) {
        tracing::debug!(
            channel = %message.channel,
            user = %message.sender,
            first = message.is_first_message,
            "Received chat message"
        );

        let (decision, target) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let decision = state.welcome.evaluate(&state.policy, message);
            (decision, Self::send_target(state))
        };

        let messages = match decision {
            WelcomeDecision::Skip(reason) => {
                tracing::debug!(user = %message.sender, ?reason, "No welcome sent");
                return;
            }
            WelcomeDecision::Send(messages) => messages,
        };
        let Some((channel, transport)) = target else {
            tracing::warn!(user = %message.sender, "No active transport for welcome messages");
            return;
        };

        tracing::info!(channel = %channel, user = %message.sender, "Welcoming chatter");
        send_burst(transport.as_ref(), &channel, &messages, "welcome").await;
    }
}

/// Send `messages` one after another; a failed send is logged and the rest still go out
async fn send_burst(transport: &dyn ChatTransport, channel: &str, messages: &[String], kind: &str) {
    for text in messages {
        if let Err(e) = transport.send_message(channel, text).await {
            tracing::error!(error = %e, channel = %channel, kind, "Failed to send message");
        }
    }
}
