// ABOUTME: Tests for configuration loading and validation
// ABOUTME: Verifies TOML parsing, env var overrides, and rejection of bad values

use serial_test::serial;
use std::io::Write;
use std::time::Duration;
use twitch_greeter::config::Config;

/// Helper to clear all config-related env vars
fn clear_config_env_vars() {
    std::env::remove_var("GREETER_CONFIG_PATH");
    std::env::remove_var("TWITCH_CHANNEL");
    std::env::remove_var("TWITCH_TOKEN");
    std::env::remove_var("TWITCH_VALIDATE_URL");
    std::env::remove_var("GREETER_STORE_PATH");
    std::env::remove_var("GREETER_JOIN_DEBOUNCE_MS");
}

fn write_config(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
    let config_path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    std::env::set_var("GREETER_CONFIG_PATH", config_path.to_str().unwrap());
    config_path
}

#[test]
#[serial]
fn test_config_loads_from_toml_file() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");
    write_config(
        &dir,
        &format!(
            r##"
[twitch]
channel = "#Streamer"
join_timeout_secs = 3
login_timeout_secs = 7

[session]
join_debounce_ms = 25
part_timeout_secs = 2

[storage]
path = "{}"
"##,
            store.display()
        ),
    );

    let config = Config::load().unwrap();

    assert_eq!(config.twitch.channel.as_deref(), Some("Streamer"));
    assert_eq!(config.twitch.login_timeout(), Duration::from_secs(7));
    assert_eq!(config.twitch.join_timeout(), Duration::from_secs(3));
    assert_eq!(config.store_path(), store);

    let options = config.controller_options();
    assert_eq!(options.join_debounce, Duration::from_millis(25));
    assert_eq!(options.part_timeout, Duration::from_secs(2));

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_env_vars_override_file() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    write_config(
        &dir,
        r#"
[twitch]
channel = "fromfile"
"#,
    );
    std::env::set_var("TWITCH_CHANNEL", "fromenv");
    std::env::set_var("TWITCH_VALIDATE_URL", "http://127.0.0.1:1/validate");
    std::env::set_var("GREETER_JOIN_DEBOUNCE_MS", "40");
    std::env::set_var("GREETER_STORE_PATH", dir.path().join("s.json").to_str().unwrap());

    let config = Config::load().unwrap();

    assert_eq!(config.twitch.channel.as_deref(), Some("fromenv"));
    assert_eq!(config.twitch.validate_url, "http://127.0.0.1:1/validate");
    assert_eq!(config.session.join_debounce_ms, 40);
    assert_eq!(config.store_path(), dir.path().join("s.json"));

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_token_env_var_is_consumed() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    write_config(&dir, "");
    std::env::set_var("TWITCH_TOKEN", "oauth:secret");

    let config = Config::load().unwrap();

    assert_eq!(config.twitch.access_token.as_deref(), Some("oauth:secret"));
    assert!(std::env::var("TWITCH_TOKEN").is_err());

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_invalid_debounce_env_var_fails() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    write_config(&dir, "");
    std::env::set_var("GREETER_JOIN_DEBOUNCE_MS", "soon");

    let err = Config::load().unwrap_err();
    assert!(err.to_string().contains("GREETER_JOIN_DEBOUNCE_MS"));

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_invalid_toml_fails() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    write_config(&dir, "[twitch\nchannel = ");

    assert!(Config::load().is_err());

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_zero_join_timeout_rejected() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    write_config(
        &dir,
        r#"
[twitch]
join_timeout_secs = 0
"#,
    );

    assert!(Config::load().is_err());

    clear_config_env_vars();
}
