// ABOUTME: Messaging policy that decides which startup and welcome messages get posted
// ABOUTME: Missing fields fall back to the built-in defaults when deserialized

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder replaced with the chatter's display name in welcome messages
pub const USER_PLACEHOLDER: &str = "%user";

/// When a chatter qualifies for a welcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WelcomeSendWhen {
    /// Only when the transport flags the message as the sender's first ever in the channel
    #[default]
    #[serde(alias = "firstTime")]
    FirstTimeEver,
    /// The first message a chatter sends during this session
    #[serde(alias = "firstTimeStream")]
    FirstTimeThisStream,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingPolicy {
    #[serde(alias = "postStartupMessage")]
    pub post_startup_message: bool,
    /// Sent in order once per successful join
    #[serde(alias = "startupMessages")]
    pub startup_messages: Vec<String>,
    #[serde(alias = "postWelcomeMessage")]
    pub post_welcome_message: bool,
    /// Sent in order to each qualifying chatter; `%user` is replaced with their name
    #[serde(alias = "welcomeMessages")]
    pub welcome_messages: Vec<String>,
    #[serde(alias = "welcomeMessageSendWhen")]
    pub welcome_message_send_when: WelcomeSendWhen,
    /// Seconds between welcome bursts; 0 disables the cooldown
    #[serde(alias = "intervalBetweenWelcomeMessages")]
    pub interval_between_welcome_messages: u64,
}

impl Default for MessagingPolicy {
    fn default() -> Self {
        Self {
            post_startup_message: true,
            startup_messages: vec!["Twitch Chat Translator Bot connected.".to_string()],
            post_welcome_message: true,
            welcome_messages: vec![
                "Welcome %user, This channel uses a translator. Feel free to speak your native language and the bot will translate it!".to_string(),
            ],
            welcome_message_send_when: WelcomeSendWhen::FirstTimeEver,
            interval_between_welcome_messages: 30,
        }
    }
}

impl MessagingPolicy {
    /// Cooldown window after a welcome burst, or None when disabled
    pub fn welcome_cooldown(&self) -> Option<Duration> {
        (self.interval_between_welcome_messages > 0)
            .then(|| Duration::from_secs(self.interval_between_welcome_messages))
    }

    /// Welcome messages with every `%user` replaced by `user`
    pub fn render_welcome(&self, user: &str) -> Vec<String> {
        self.welcome_messages
            .iter()
            .map(|template| template.replace(USER_PLACEHOLDER, user))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = MessagingPolicy::default();
        assert!(policy.post_startup_message);
        assert!(policy.post_welcome_message);
        assert_eq!(policy.startup_messages.len(), 1);
        assert_eq!(policy.welcome_message_send_when, WelcomeSendWhen::FirstTimeEver);
        assert_eq!(policy.interval_between_welcome_messages, 30);
    }

    #[test]
    fn test_render_welcome_replaces_every_placeholder() {
        let policy = MessagingPolicy {
            welcome_messages: vec!["hi %user".to_string(), "%user, %user!".to_string()],
            ..MessagingPolicy::default()
        };
        assert_eq!(
            policy.render_welcome("Alice"),
            vec!["hi Alice".to_string(), "Alice, Alice!".to_string()]
        );
    }

    #[test]
    fn test_welcome_cooldown_zero_disables() {
        let policy = MessagingPolicy {
            interval_between_welcome_messages: 0,
            ..MessagingPolicy::default()
        };
        assert!(policy.welcome_cooldown().is_none());
        assert_eq!(
            MessagingPolicy::default().welcome_cooldown(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_partial_json_merges_defaults() {
        let policy: MessagingPolicy =
            serde_json::from_str(r#"{"post_welcome_message": false}"#).unwrap();
        assert!(!policy.post_welcome_message);
        assert_eq!(policy.startup_messages, MessagingPolicy::default().startup_messages);
        assert_eq!(policy.interval_between_welcome_messages, 30);
    }

    #[test]
    fn test_send_when_accepts_legacy_names() {
        let when: WelcomeSendWhen = serde_json::from_str(r#""firstTimeStream""#).unwrap();
        assert_eq!(when, WelcomeSendWhen::FirstTimeThisStream);
        let when: WelcomeSendWhen = serde_json::from_str(r#""first_time_ever""#).unwrap();
        assert_eq!(when, WelcomeSendWhen::FirstTimeEver);
    }

    #[test]
    fn test_policy_accepts_legacy_camel_case_fields() {
        let policy: MessagingPolicy = serde_json::from_str(
            r#"{
                "postStartupMessage": false,
                "startupMessages": ["hello"],
                "postWelcomeMessage": true,
                "welcomeMessages": ["hi %user"],
                "welcomeMessageSendWhen": "firstTimeStream",
                "intervalBetweenWelcomeMessages": 5
            }"#,
        )
        .unwrap();
        assert_eq!(
            policy,
            MessagingPolicy {
                post_startup_message: false,
                startup_messages: vec!["hello".to_string()],
                post_welcome_message: true,
                welcome_messages: vec!["hi %user".to_string()],
                welcome_message_send_when: WelcomeSendWhen::FirstTimeThisStream,
                interval_between_welcome_messages: 5,
            }
        );
    }
}
