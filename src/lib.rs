// ABOUTME: Root library module exposing the Twitch platform and application wiring
// ABOUTME: Re-exports the platform-agnostic session modules from greeter-core

pub mod app;
pub mod platform;

// Re-export platform-agnostic modules from greeter-core
pub use greeter_core::config;
pub use greeter_core::paths;
pub use greeter_core::policy;
pub use greeter_core::settings;
pub use greeter_core::storage;

// Re-export greeter-core traits and types
pub use greeter_core::controller;
pub use greeter_core::traits;
pub use greeter_core::view;

pub use app::App;
pub use greeter_core::{SessionController, SessionView, ViewState};
