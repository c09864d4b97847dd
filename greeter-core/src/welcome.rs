// ABOUTME: Welcome message decisions: first-time checks, chatter dedup, and cooldown
// ABOUTME: Decides what to send; the session controller performs the actual sends

use crate::policy::{MessagingPolicy, WelcomeSendWhen};
use crate::timers::Cooldown;
use crate::traits::ChatMessage;
use std::collections::{BTreeSet, HashSet};

/// Why a message did not produce a welcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    Disabled,
    NotFirstMessage,
    AlreadyWelcomed,
    CoolingDown,
}

/// Outcome of evaluating one chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WelcomeDecision {
    Skip(Skip),
    /// Rendered messages to send, in order
    Send(Vec<String>),
}

/// Per-session welcome bookkeeping
#[derive(Default)]
pub struct WelcomeGate {
    seen_first_time_chatters: HashSet<String>,
    cooldown: Cooldown,
}

impl WelcomeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `message` earns a welcome under `policy`.
    ///
    /// The sender is recorded as seen before the cooldown check, so a chatter
    /// whose first message lands inside a cooldown window is not welcomed later.
    pub fn evaluate(&mut self, policy: &MessagingPolicy, message: &ChatMessage) -> WelcomeDecision {
        if !policy.post_welcome_message {
            return WelcomeDecision::Skip(Skip::Disabled);
        }

        match policy.welcome_message_send_when {
            WelcomeSendWhen::FirstTimeEver if !message.is_first_message => {
                return WelcomeDecision::Skip(Skip::NotFirstMessage);
            }
            WelcomeSendWhen::FirstTimeThisStream
                if self.seen_first_time_chatters.contains(&message.sender) =>
            {
                return WelcomeDecision::Skip(Skip::AlreadyWelcomed);
            }
            _ => {}
        }

        self.seen_first_time_chatters.insert(message.sender.clone());

        if self.cooldown.is_active() {
            return WelcomeDecision::Skip(Skip::CoolingDown);
        }

        if let Some(window) = policy.welcome_cooldown() {
            self.cooldown.arm(window);
        }

        WelcomeDecision::Send(policy.render_welcome(&message.sender))
    }

    pub fn cooldown_active(&self) -> bool {
        self.cooldown.is_active()
    }

    pub fn seen_chatters(&self) -> BTreeSet<String> {
        self.seen_first_time_chatters.iter().cloned().collect()
    }

    /// Forget every seen chatter and end any cooldown
    pub fn reset(&mut self) {
        self.seen_first_time_chatters.clear();
        self.cooldown.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy(when: WelcomeSendWhen, interval: u64) -> MessagingPolicy {
        MessagingPolicy {
            post_welcome_message: true,
            welcome_messages: vec!["Welcome %user!".to_string()],
            welcome_message_send_when: when,
            interval_between_welcome_messages: interval,
            ..MessagingPolicy::default()
        }
    }

    fn first(sender: &str) -> ChatMessage {
        ChatMessage::new("chan", sender, "hello").first_time()
    }

    #[tokio::test]
    async fn test_disabled_short_circuits_before_tracking() {
        let mut gate = WelcomeGate::new();
        let mut p = policy(WelcomeSendWhen::FirstTimeThisStream, 0);
        p.post_welcome_message = false;

        assert_eq!(gate.evaluate(&p, &first("Alice")), WelcomeDecision::Skip(Skip::Disabled));
        assert!(gate.seen_chatters().is_empty());
    }

    #[tokio::test]
    async fn test_first_time_ever_requires_flag() {
        let mut gate = WelcomeGate::new();
        let p = policy(WelcomeSendWhen::FirstTimeEver, 0);

        assert_eq!(
            gate.evaluate(&p, &first("Alice")),
            WelcomeDecision::Send(vec!["Welcome Alice!".to_string()])
        );
        assert_eq!(
            gate.evaluate(&p, &ChatMessage::new("chan", "Alice", "again")),
            WelcomeDecision::Skip(Skip::NotFirstMessage)
        );
    }

    #[tokio::test]
    async fn test_first_time_this_stream_dedups_by_name() {
        let mut gate = WelcomeGate::new();
        let p = policy(WelcomeSendWhen::FirstTimeThisStream, 0);

        assert!(matches!(gate.evaluate(&p, &first("Alice")), WelcomeDecision::Send(_)));
        assert!(matches!(gate.evaluate(&p, &first("Bob")), WelcomeDecision::Send(_)));
        assert_eq!(
            gate.evaluate(&p, &first("Alice")),
            WelcomeDecision::Skip(Skip::AlreadyWelcomed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_suppresses_but_still_records() {
        let mut gate = WelcomeGate::new();
        let p = policy(WelcomeSendWhen::FirstTimeThisStream, 30);

        assert!(matches!(gate.evaluate(&p, &first("Alice")), WelcomeDecision::Send(_)));
        assert!(gate.cooldown_active());
        assert_eq!(
            gate.evaluate(&p, &first("Bob")),
            WelcomeDecision::Skip(Skip::CoolingDown)
        );
        assert!(gate.seen_chatters().contains("Bob"));

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(!gate.cooldown_active());

        // Bob's first message was consumed during the cooldown
        assert_eq!(
            gate.evaluate(&p, &first("Bob")),
            WelcomeDecision::Skip(Skip::AlreadyWelcomed)
        );
        assert!(matches!(gate.evaluate(&p, &first("Carol")), WelcomeDecision::Send(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_seen_and_cooldown() {
        let mut gate = WelcomeGate::new();
        let p = policy(WelcomeSendWhen::FirstTimeThisStream, 30);
        gate.evaluate(&p, &first("Alice"));

        gate.reset();

        assert!(gate.seen_chatters().is_empty());
        assert!(!gate.cooldown_active());
        assert!(matches!(gate.evaluate(&p, &first("Alice")), WelcomeDecision::Send(_)));
    }
}
