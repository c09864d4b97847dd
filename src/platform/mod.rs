// ABOUTME: Chat platform implementations of the transport and credential seams
// ABOUTME: Twitch is the only platform; others plug in behind the same traits

pub mod twitch;

pub use twitch::{TwitchConnector, TwitchCredentials, TwitchTransport};
