// ABOUTME: Persisted messaging settings, access token, and username on top of LocalStore
// ABOUTME: Settings changes are broadcast on a watch channel for the session to pick up

use crate::policy::MessagingPolicy;
use crate::storage::LocalStore;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;

pub const SETTINGS_KEY: &str = "settings";
pub const TOKEN_KEY: &str = "twitch-token";
pub const USERNAME_KEY: &str = "twitch-username";

/// Messaging policy with defaults merged in for any field the store lacks
#[derive(Clone)]
pub struct SettingsStore {
    store: LocalStore,
    current: Arc<watch::Sender<MessagingPolicy>>,
}

impl SettingsStore {
    pub fn new(store: LocalStore) -> Self {
        let policy = match store.get::<MessagingPolicy>(SETTINGS_KEY) {
            Ok(Some(policy)) => policy,
            Ok(None) => MessagingPolicy::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Stored settings unreadable, using defaults");
                MessagingPolicy::default()
            }
        };
        let (tx, _rx) = watch::channel(policy);
        Self {
            store,
            current: Arc::new(tx),
        }
    }

    pub fn get(&self) -> MessagingPolicy {
        self.current.borrow().clone()
    }

    /// Receiver that observes every later settings change
    pub fn subscribe(&self) -> watch::Receiver<MessagingPolicy> {
        self.current.subscribe()
    }

    /// Persist `policy` and notify subscribers
    pub fn replace(&self, policy: MessagingPolicy) -> Result<()> {
        self.store.set(SETTINGS_KEY, &policy)?;
        self.current.send_replace(policy);
        tracing::info!("Settings updated");
        Ok(())
    }

    /// Apply `edit` to the current settings, persist, and notify
    pub fn update(&self, edit: impl FnOnce(&mut MessagingPolicy)) -> Result<MessagingPolicy> {
        let mut policy = self.get();
        edit(&mut policy);
        self.replace(policy.clone())?;
        Ok(policy)
    }

    /// Restore the built-in defaults
    pub fn reset(&self) -> Result<()> {
        self.replace(MessagingPolicy::default())
    }
}

/// Stored access token
#[derive(Clone)]
pub struct TokenStore {
    store: LocalStore,
}

impl TokenStore {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn get(&self) -> Option<String> {
        read_string(&self.store, TOKEN_KEY)
    }

    pub fn set(&self, token: &str) -> Result<()> {
        self.store.set(TOKEN_KEY, &token)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(TOKEN_KEY)
    }
}

/// Stored username; also the channel joined when none is configured
#[derive(Clone)]
pub struct UsernameStore {
    store: LocalStore,
}

impl UsernameStore {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn get(&self) -> Option<String> {
        read_string(&self.store, USERNAME_KEY)
    }

    pub fn set(&self, username: &str) -> Result<()> {
        self.store.set(USERNAME_KEY, &username)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(USERNAME_KEY)
    }
}

fn read_string(store: &LocalStore, key: &str) -> Option<String> {
    match store.get::<String>(key) {
        Ok(value) => value.filter(|v| !v.trim().is_empty()),
        Err(e) => {
            tracing::warn!(key, error = %e, "Ignoring unreadable stored value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::WelcomeSendWhen;

    #[test]
    fn test_settings_default_when_missing() {
        let settings = SettingsStore::new(LocalStore::in_memory());
        assert_eq!(settings.get(), MessagingPolicy::default());
    }

    #[test]
    fn test_settings_merge_defaults_for_partial_record() {
        let store = LocalStore::in_memory();
        store
            .set(
                SETTINGS_KEY,
                &serde_json::json!({ "welcome_message_send_when": "firstTimeStream" }),
            )
            .unwrap();

        let policy = SettingsStore::new(store).get();
        assert_eq!(policy.welcome_message_send_when, WelcomeSendWhen::FirstTimeThisStream);
        assert_eq!(policy.welcome_messages, MessagingPolicy::default().welcome_messages);
    }

    #[test]
    fn test_settings_update_persists_and_notifies() {
        let store = LocalStore::in_memory();
        let settings = SettingsStore::new(store.clone());
        let mut rx = settings.subscribe();

        settings
            .update(|p| p.interval_between_welcome_messages = 0)
            .unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().interval_between_welcome_messages, 0);
        assert_eq!(
            SettingsStore::new(store).get().interval_between_welcome_messages,
            0
        );
    }

    #[test]
    fn test_settings_reset() {
        let settings = SettingsStore::new(LocalStore::in_memory());
        settings.update(|p| p.post_startup_message = false).unwrap();
        settings.reset().unwrap();
        assert_eq!(settings.get(), MessagingPolicy::default());
    }

    #[test]
    fn test_unreadable_settings_fall_back_to_defaults() {
        let store = LocalStore::in_memory();
        store.set(SETTINGS_KEY, &"garbage").unwrap();
        assert_eq!(SettingsStore::new(store).get(), MessagingPolicy::default());
    }

    #[test]
    fn test_token_and_username_stores() {
        let store = LocalStore::in_memory();
        let tokens = TokenStore::new(store.clone());
        let usernames = UsernameStore::new(store);

        assert!(tokens.get().is_none());
        tokens.set("abc").unwrap();
        usernames.set("streamer").unwrap();
        assert_eq!(tokens.get().as_deref(), Some("abc"));
        assert_eq!(usernames.get().as_deref(), Some("streamer"));

        tokens.clear().unwrap();
        assert!(tokens.get().is_none());
    }

    #[test]
    fn test_blank_username_reads_as_none() {
        let usernames = UsernameStore::new(LocalStore::in_memory());
        usernames.set("  ").unwrap();
        assert!(usernames.get().is_none());
    }
}
