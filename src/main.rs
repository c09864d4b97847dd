// ABOUTME: Main entry point for the Twitch greeter CLI
// ABOUTME: Initializes logging and config, then runs the session or manages stored credentials

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use greeter_core::paths;
use greeter_core::policy::MessagingPolicy;
use greeter_core::CredentialProvider;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use twitch_greeter::{config::Config, App};

#[derive(Parser)]
#[command(name = "twitch-greeter")]
#[command(about = "Posts startup and welcome messages in a Twitch chat")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and stay in chat until Ctrl-C
    Run {
        /// Channel to join instead of the stored username
        #[arg(short, long)]
        channel: Option<String>,
    },

    /// Validate and store an access token
    Login {
        /// OAuth access token (with or without the `oauth:` prefix)
        #[arg(short, long)]
        token: String,

        /// Username to store; defaults to the token's login
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Remove the stored token and username
    Logout,

    /// Check that the stored token carries the chat scopes
    ValidateToken,

    /// Inspect or change the messaging settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings as TOML
    Show,
    /// Restore the built-in defaults
    Reset,
    /// Replace the settings with the contents of a TOML file
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file before the filter reads RUST_LOG
    dotenvy::dotenv().ok();

    let _log_guard = init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;
    tracing::debug!(?config, "Configuration loaded");
    let app = App::new(config)?;

    match cli.command {
        Commands::Run { channel } => run(app, channel).await,
        Commands::Login { token, username } => {
            let username = app.login(&token, username.as_deref()).await?;
            println!("Logged in; will join #{}", username);
            Ok(())
        }
        Commands::Logout => {
            app.logout()?;
            println!("Logged out");
            Ok(())
        }
        Commands::ValidateToken => {
            if app.credentials.validate_token().await {
                println!("Token is valid and has chat:read and chat:edit");
                Ok(())
            } else {
                anyhow::bail!("No valid token with chat:read and chat:edit is stored")
            }
        }
        Commands::Settings { action } => settings(&app, action),
    }
}

/// Stderr logging plus a daily-rolling file in the log directory.
///
/// The returned guard flushes the file writer on drop.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = paths::log_dir();
    let (file_layer, guard) = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&log_dir, "twitch-greeter.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("Failed to create log directory {}: {}", log_dir.display(), e);
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,twitch_greeter=debug,greeter_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

async fn run(app: App, channel: Option<String>) -> Result<()> {
    let mut view = app.view(channel);

    let mut state = view.state();
    let watcher = tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            tracing::info!(
                connected = current.connected,
                connecting = current.connecting,
                joined = current.joined,
                joining = current.joining,
                "Session state changed"
            );
        }
    });

    let started = view
        .mount()
        .await
        .context("Failed to start chat session")?;
    if !started {
        watcher.abort();
        anyhow::bail!("Nothing to connect: store a token with `twitch-greeter login` first");
    }

    tracing::info!(channel = ?view.channel(), "Session running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    tracing::info!("Shutting down");
    view.disconnect().await;
    view.unmount();
    watcher.abort();
    Ok(())
}

fn settings(app: &App, action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Show => {
            let rendered = toml::to_string_pretty(&app.settings.get())
                .context("Failed to render settings")?;
            print!("{}", rendered);
        }
        SettingsAction::Reset => {
            app.settings.reset()?;
            println!("Settings restored to defaults");
        }
        SettingsAction::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let policy: MessagingPolicy = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            app.settings.replace(policy)?;
            println!("Settings imported from {}", file.display());
        }
    }
    Ok(())
}
