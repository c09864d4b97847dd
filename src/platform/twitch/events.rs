// ABOUTME: Translates twitch-irc server messages into what the session cares about
// ABOUTME: Own joins and parts, join refusals, login outcome, and chat lines

use greeter_core::ChatMessage;
use twitch_irc::message::ServerMessage;

/// NOTICE msg-ids Twitch sends when it refuses a join
pub const JOIN_REFUSAL_IDS: &[&str] = &[
    "msg_channel_suspended",
    "msg_banned",
    "tos_ban",
    "msg_room_not_found",
    "invalid_user",
];

/// Twitch channel name without `#`, lowercased
pub fn channel_name(raw: &str) -> String {
    raw.trim().trim_start_matches('#').to_ascii_lowercase()
}

/// A server message reduced to what the relay acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    LoggedIn,
    /// Twitch is about to drop the connection; the client reconnects on its own
    ServerReconnect,
    LoginRejected(String),
    Joined(String),
    Parted(String),
    JoinRefused { channel: String, reason: String },
    Chat(ChatMessage),
}

/// Reduce `message` for the account logged in as `login`; None means ignore it
pub fn translate(message: &ServerMessage, login: &str) -> Option<Inbound> {
    match message {
        ServerMessage::GlobalUserState(_) => Some(Inbound::LoggedIn),
        ServerMessage::Join(join) if join.user_login.eq_ignore_ascii_case(login) => {
            Some(Inbound::Joined(channel_name(&join.channel_login)))
        }
        ServerMessage::Part(part) if part.user_login.eq_ignore_ascii_case(login) => {
            Some(Inbound::Parted(channel_name(&part.channel_login)))
        }
        ServerMessage::Notice(notice) => match (&notice.channel_login, &notice.message_id) {
            (Some(channel), Some(id)) if JOIN_REFUSAL_IDS.contains(&id.as_str()) => {
                Some(Inbound::JoinRefused {
                    channel: channel_name(channel),
                    reason: id.clone(),
                })
            }
            (None, _)
                if notice.message_text.contains("Login authentication failed")
                    || notice.message_text.contains("Improperly formatted auth") =>
            {
                Some(Inbound::LoginRejected(notice.message_text.clone()))
            }
            _ => None,
        },
        ServerMessage::Privmsg(privmsg) => {
            let sender = if privmsg.sender.name.is_empty() {
                &privmsg.sender.login
            } else {
                &privmsg.sender.name
            };
            if sender.is_empty() {
                return None;
            }
            let mut chat = ChatMessage::new(
                channel_name(&privmsg.channel_login),
                sender.as_str(),
                privmsg.message_text.as_str(),
            );
            chat.is_first_message = privmsg
                .source
                .tags
                .0
                .get("first-msg")
                .and_then(Option::as_deref)
                == Some("1");
            Some(Inbound::Chat(chat))
        }
        ServerMessage::Reconnect(_) => Some(Inbound::ServerReconnect),
        _ => None,
    }
}
