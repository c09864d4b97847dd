// ABOUTME: Connection and join phases plus the read-only session snapshot
// ABOUTME: Phases are enums so mutually exclusive flags can never both be set

use crate::policy::MessagingPolicy;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPhase {
    #[default]
    NotJoined,
    Joining,
    Joined,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionPhase::Disconnected => write!(f, "disconnected"),
            ConnectionPhase::Connecting => write!(f, "connecting"),
            ConnectionPhase::Connected => write!(f, "connected"),
        }
    }
}

impl std::fmt::Display for JoinPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinPhase::NotJoined => write!(f, "not joined"),
            JoinPhase::Joining => write!(f, "joining"),
            JoinPhase::Joined => write!(f, "joined"),
        }
    }
}

/// Point-in-time copy of everything the session controller tracks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub connection: ConnectionPhase,
    pub join: JoinPhase,
    pub channel: Option<String>,
    pub authenticated_identity: Option<String>,
    pub joined_channels: Vec<String>,
    pub active_policy: MessagingPolicy,
    pub seen_first_time_chatters: BTreeSet<String>,
    pub welcome_cooldown_active: bool,
}

impl SessionSnapshot {
    /// The state of a freshly created or fully reset session
    pub fn initial() -> Self {
        Self {
            connection: ConnectionPhase::Disconnected,
            join: JoinPhase::NotJoined,
            channel: None,
            authenticated_identity: None,
            joined_channels: Vec::new(),
            active_policy: MessagingPolicy::default(),
            seen_first_time_chatters: BTreeSet::new(),
            welcome_cooldown_active: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionPhase::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.connection == ConnectionPhase::Connecting
    }

    pub fn has_joined(&self) -> bool {
        self.join == JoinPhase::Joined
    }

    pub fn is_joining(&self) -> bool {
        self.join == JoinPhase::Joining
    }
}
