// ABOUTME: Wires config, persisted stores, Twitch credentials, and the session controller
// ABOUTME: Also hosts the login/logout flows shared by the CLI subcommands

use crate::platform::twitch::auth::normalize_token;
use crate::platform::{TwitchConnector, TwitchCredentials};
use anyhow::{Context, Result};
use greeter_core::config::Config;
use greeter_core::settings::{SettingsStore, TokenStore, UsernameStore};
use greeter_core::storage::LocalStore;
use greeter_core::{CredentialProvider, SessionController, SessionView, REQUIRED_CHAT_SCOPES};
use std::sync::Arc;

/// Everything a running greeter needs, built once from config
pub struct App {
    pub config: Config,
    pub store: LocalStore,
    pub settings: SettingsStore,
    pub tokens: TokenStore,
    pub usernames: UsernameStore,
    pub credentials: Arc<TwitchCredentials>,
    pub controller: SessionController,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let store = LocalStore::open(config.store_path()).with_context(|| {
            format!("Failed to open store at {}", config.store_path().display())
        })?;
        let settings = SettingsStore::new(store.clone());
        let tokens = TokenStore::new(store.clone());
        let usernames = UsernameStore::new(store.clone());

        let credentials = Arc::new(
            TwitchCredentials::new(config.twitch.validate_url.clone(), tokens.clone())
                .with_token_override(config.twitch.access_token.clone()),
        );
        let connector = Arc::new(TwitchConnector::from_config(&config.twitch));
        let controller = SessionController::with_options(
            credentials.clone(),
            connector,
            config.controller_options(),
        );

        tracing::debug!(store = %config.store_path().display(), "Application wired");

        Ok(Self {
            config,
            store,
            settings,
            tokens,
            usernames,
            credentials,
            controller,
        })
    }

    /// A view over the shared session; `channel` overrides config and stored username
    pub fn view(&self, channel: Option<String>) -> SessionView {
        SessionView::new(
            self.controller.clone(),
            self.credentials.clone(),
            self.settings.clone(),
            self.usernames.clone(),
        )
        .with_channel(channel.or_else(|| self.config.twitch.channel.clone()))
    }

    /// Validate `token` and store it with the username.
    ///
    /// Without `username` the token's own login is stored. Returns the stored username.
    pub async fn login(&self, token: &str, username: Option<&str>) -> Result<String> {
        let token = normalize_token(token).context("Token must not be empty")?;
        let info = self
            .credentials
            .introspect(&token)
            .await
            .context("Token validation failed")?;
        info.require_scopes(REQUIRED_CHAT_SCOPES)?;

        let username = username
            .map(|u| u.trim().trim_start_matches('#').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or(info.user_name);

        self.tokens.set(&token)?;
        self.usernames.set(&username)?;
        tracing::info!(%username, "Stored Twitch credentials");
        Ok(username)
    }

    pub fn logout(&self) -> Result<()> {
        self.tokens.clear()?;
        self.usernames.clear()?;
        tracing::info!("Removed stored Twitch credentials");
        Ok(())
    }
}
