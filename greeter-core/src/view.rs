// ABOUTME: View binding layer projecting session state for a user interface
// ABOUTME: Mirrors connect/join flags into a watch channel and guards connect calls

use crate::controller::SessionController;
use crate::error::SessionError;
use crate::notify::Subscription;
use crate::settings::{SettingsStore, UsernameStore};
use crate::traits::CredentialProvider;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The four flags a UI renders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewState {
    pub connected: bool,
    pub connecting: bool,
    pub joined: bool,
    pub joining: bool,
}

impl ViewState {
    pub fn read(controller: &SessionController) -> Self {
        let snapshot = controller.snapshot();
        Self {
            connected: snapshot.is_connected(),
            connecting: snapshot.is_connecting(),
            joined: snapshot.has_joined(),
            joining: snapshot.is_joining(),
        }
    }
}

/// One UI consumer of the shared session.
///
/// Listeners are registered on creation and released by [`unmount`](Self::unmount)
/// or drop. Several views may share one controller.
pub struct SessionView {
    controller: SessionController,
    credentials: Arc<dyn CredentialProvider>,
    settings: SettingsStore,
    usernames: UsernameStore,
    channel_override: Option<String>,
    state: Arc<watch::Sender<ViewState>>,
    subscriptions: Vec<Subscription>,
    settings_push: Option<JoinHandle<()>>,
}

impl SessionView {
    pub fn new(
        controller: SessionController,
        credentials: Arc<dyn CredentialProvider>,
        settings: SettingsStore,
        usernames: UsernameStore,
    ) -> Self {
        let (tx, _rx) = watch::channel(ViewState::read(&controller));
        let state = Arc::new(tx);

        let subscriptions = vec![
            controller.on_join_state_changed(sync_listener(&controller, &state)),
            controller.on_connect_state_changed(sync_listener(&controller, &state)),
        ];

        Self {
            controller,
            credentials,
            settings,
            usernames,
            channel_override: None,
            state,
            subscriptions,
            settings_push: None,
        }
    }

    /// Join `channel` instead of the stored username's channel
    pub fn with_channel(mut self, channel: Option<String>) -> Self {
        self.channel_override = channel.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Channel a connect would target
    pub fn channel(&self) -> Option<String> {
        self.channel_override
            .clone()
            .or_else(|| self.usernames.get())
    }

    /// Receiver that sees every change of the projected flags
    pub fn state(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> ViewState {
        *self.state.borrow()
    }

    /// Re-read the controller and publish the result
    pub fn sync_state(&self) {
        self.state.send_replace(ViewState::read(&self.controller));
    }

    /// Sync, start forwarding settings changes, and connect if possible.
    ///
    /// Returns whether a connection attempt was made.
    pub async fn mount(&mut self) -> Result<bool, SessionError> {
        self.sync_state();
        self.start_settings_push();
        self.connect().await
    }

    /// Release listeners and stop forwarding settings. The session stays up.
    pub fn unmount(&mut self) {
        self.subscriptions.clear();
        if let Some(task) = self.settings_push.take() {
            task.abort();
        }
    }

    fn start_settings_push(&mut self) {
        if self.settings_push.is_some() {
            return;
        }
        let mut rx = self.settings.subscribe();
        let controller = self.controller.clone();
        self.settings_push = Some(tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let policy = rx.borrow_and_update().clone();
                controller.set_policy(policy);
            }
        }));
    }

    /// Connect unless already connected or connecting, or token or channel is missing.
    ///
    /// Returns whether a connection attempt was made.
    pub async fn connect(&self) -> Result<bool, SessionError> {
        if self.controller.connected() || self.controller.connecting() {
            tracing::debug!("Session already connected or connecting");
            return Ok(false);
        }
        let Some(token) = self.credentials.get_token() else {
            tracing::info!("No access token stored, not connecting");
            return Ok(false);
        };
        let Some(channel) = self.channel() else {
            tracing::info!("No channel or username configured, not connecting");
            return Ok(false);
        };

        self.controller
            .connect(&token, &channel, self.settings.get())
            .await?;
        Ok(true)
    }

    pub async fn disconnect(&self) {
        self.controller.disconnect().await;
    }

    pub async fn join(&self) -> Result<(), SessionError> {
        self.controller.join().await
    }
}

impl Drop for SessionView {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn sync_listener(
    controller: &SessionController,
    state: &Arc<watch::Sender<ViewState>>,
) -> impl Fn() + Send + Sync + 'static {
    let controller = controller.clone();
    let state = Arc::clone(state);
    move || {
        let next = ViewState::read(&controller);
        state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
