// ABOUTME: Background task turning the chat client's message feed into session events
// ABOUTME: Tracks login and join deadlines; event delivery never waits on the reader

use super::events::{self, Inbound};
use greeter_core::{EventStream, TransportEvent};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;
use twitch_irc::message::ServerMessage;

/// How long `stop` waits for the relay task before aborting it
const STOP_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Login name of the connected account
    pub login: String,
    /// Joined automatically after every login
    pub channel: String,
    pub login_timeout: Duration,
    pub join_timeout: Duration,
}

enum RelayCommand {
    ExpectJoin(String),
    Stop,
}

/// Control side of a running relay
pub struct RelayHandle {
    commands: mpsc::UnboundedSender<RelayCommand>,
    joined: Arc<Mutex<BTreeSet<String>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RelayHandle {
    /// Start the join deadline for `channel`; a JoinFailed follows if no ack arrives
    pub fn expect_join(&self, channel: &str) {
        let _ = self
            .commands
            .send(RelayCommand::ExpectJoin(events::channel_name(channel)));
    }

    pub fn joined_channels(&self) -> Vec<String> {
        self.joined
            .lock()
            .map(|joined| joined.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Stop relaying; the event stream yields a final Disconnected and ends
    pub async fn stop(&self) {
        let _ = self.commands.send(RelayCommand::Stop);
        let task = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some(mut task) = task {
            if tokio::time::timeout(STOP_GRACE, &mut task).await.is_err() {
                tracing::warn!("Twitch relay did not stop in time, aborting");
                task.abort();
            }
        }
    }
}

/// Spawn a relay over `incoming`
pub fn spawn(
    incoming: mpsc::UnboundedReceiver<ServerMessage>,
    options: RelayOptions,
) -> (RelayHandle, EventStream) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let joined = Arc::new(Mutex::new(BTreeSet::new()));

    let relay = Relay {
        login_deadline: Some(Instant::now() + options.login_timeout),
        options,
        connected: false,
        pending_join: None,
        events: events_tx,
        joined: Arc::clone(&joined),
    };
    let task = tokio::spawn(relay.run(incoming, commands_rx));

    let handle = RelayHandle {
        commands: commands_tx,
        joined,
        task: Mutex::new(Some(task)),
    };
    (handle, Box::pin(UnboundedReceiverStream::new(events_rx)))
}

// =============================================================================
// Relay task
// =============================================================================

struct PendingJoin {
    channel: String,
    deadline: Instant,
}

struct Relay {
    options: RelayOptions,
    connected: bool,
    /// Armed until the server accepts the login
    login_deadline: Option<Instant>,
    pending_join: Option<PendingJoin>,
    events: mpsc::UnboundedSender<TransportEvent>,
    joined: Arc<Mutex<BTreeSet<String>>>,
}

impl Relay {
    async fn run(
        mut self,
        mut incoming: mpsc::UnboundedReceiver<ServerMessage>,
        mut commands: mpsc::UnboundedReceiver<RelayCommand>,
    ) {
        let reason = self.pump(&mut incoming, &mut commands).await;
        tracing::info!(%reason, "Twitch connection closed");

        self.forget_joins();
        self.emit(TransportEvent::Disconnected);
    }

    /// Runs until the feed ends, login fails, or a stop is requested; returns why
    async fn pump(
        &mut self,
        incoming: &mut mpsc::UnboundedReceiver<ServerMessage>,
        commands: &mut mpsc::UnboundedReceiver<RelayCommand>,
    ) -> String {
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                message = incoming.recv() => match message {
                    Some(message) => {
                        if let Some(reason) = self.handle(&message) {
                            return reason;
                        }
                    }
                    None => return "chat client closed".to_string(),
                },
                command = commands.recv() => match command {
                    Some(RelayCommand::ExpectJoin(channel)) => self.arm_join(channel),
                    Some(RelayCommand::Stop) | None => return "shutdown requested".to_string(),
                },
                _ = wait_until(deadline) => {
                    if let Some(reason) = self.expire() {
                        return reason;
                    }
                }
            }
        }
    }

    fn handle(&mut self, message: &ServerMessage) -> Option<String> {
        match events::translate(message, &self.options.login)? {
            Inbound::LoggedIn => {
                self.login_deadline = None;
                if !self.connected {
                    self.connected = true;
                    tracing::info!(login = %self.options.login, "Logged in to Twitch chat");
                    self.emit(TransportEvent::Connected);
                    let channel = self.options.channel.clone();
                    self.arm_join(channel);
                }
            }
            Inbound::ServerReconnect => {
                tracing::warn!("Twitch requested a reconnect");
                self.connected = false;
                self.pending_join = None;
                self.login_deadline = Some(Instant::now() + self.options.login_timeout);
                self.forget_joins();
                self.emit(TransportEvent::Disconnected);
            }
            Inbound::LoginRejected(reason) => return Some(reason),
            Inbound::Joined(channel) => {
                if self.pending_join.as_ref().is_some_and(|p| p.channel == channel) {
                    self.pending_join = None;
                }
                if let Ok(mut joined) = self.joined.lock() {
                    joined.insert(channel.clone());
                }
                tracing::info!(%channel, "Joined channel");
                self.emit(TransportEvent::Joined { channel });
            }
            Inbound::Parted(channel) => {
                if let Ok(mut joined) = self.joined.lock() {
                    joined.remove(&channel);
                }
                tracing::info!(%channel, "Left channel");
                self.emit(TransportEvent::Parted { channel });
            }
            Inbound::JoinRefused { channel, reason } => {
                if self.pending_join.as_ref().is_some_and(|p| p.channel == channel) {
                    self.pending_join = None;
                }
                tracing::warn!(%channel, %reason, "Join refused");
                self.emit(TransportEvent::JoinFailed { channel, reason });
            }
            Inbound::Chat(message) => {
                tracing::trace!(channel = %message.channel, sender = %message.sender, "Chat message");
                self.emit(TransportEvent::MessageReceived(message));
            }
        }
        None
    }

    fn arm_join(&mut self, channel: String) {
        self.pending_join = Some(PendingJoin {
            channel,
            deadline: Instant::now() + self.options.join_timeout,
        });
    }

    fn next_deadline(&self) -> Option<Instant> {
        let join = self.pending_join.as_ref().map(|p| p.deadline);
        match (self.login_deadline, join) {
            (Some(login), Some(join)) => Some(login.min(join)),
            (login, join) => login.or(join),
        }
    }

    /// Fire whichever deadline has passed; Some ends the relay
    fn expire(&mut self) -> Option<String> {
        let now = Instant::now();
        if self.login_deadline.is_some_and(|deadline| deadline <= now) {
            return Some("login timed out".to_string());
        }
        if self.pending_join.as_ref().is_some_and(|p| p.deadline <= now) {
            if let Some(pending) = self.pending_join.take() {
                tracing::warn!(channel = %pending.channel, "Join was not acknowledged in time");
                self.emit(TransportEvent::JoinFailed {
                    channel: pending.channel,
                    reason: "join timed out".to_string(),
                });
            }
        }
        None
    }

    fn forget_joins(&self) {
        if let Ok(mut joined) = self.joined.lock() {
            joined.clear();
        }
    }

    fn emit(&self, event: TransportEvent) {
        // Receiver gone means the session stopped listening
        let _ = self.events.send(event);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
