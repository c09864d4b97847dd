// ABOUTME: Platform-agnostic chat session control for welcome and startup messaging
// ABOUTME: Provides the session controller, policy evaluation, stores, and transport traits

pub mod config;
pub mod controller;
pub mod error;
pub mod mock;
pub mod notify;
pub mod paths;
pub mod policy;
pub mod settings;
pub mod state;
pub mod storage;
pub mod timers;
pub mod traits;
pub mod view;
pub mod welcome;

pub use controller::SessionController;
pub use error::{AuthenticationError, SessionError, TransportError};
pub use notify::{Signal, Subscription};
pub use policy::{MessagingPolicy, WelcomeSendWhen};
pub use state::{ConnectionPhase, JoinPhase, SessionSnapshot};
pub use traits::{
    // Transport adapter
    ChatMessage, ChatTransport, EventStream, TransportConnector, TransportCredentials,
    TransportEvent,
    // Credentials
    CredentialProvider, TokenInfo, REQUIRED_CHAT_SCOPES,
};
pub use view::{SessionView, ViewState};
