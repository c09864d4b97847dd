// ABOUTME: Integration tests for token introspection and the login/logout flows
// ABOUTME: Serves canned validate responses from a one-shot local HTTP listener

use greeter_core::settings::TokenStore;
use greeter_core::storage::LocalStore;
use greeter_core::{AuthenticationError, CredentialProvider, TokenInfo};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use twitch_greeter::config::Config;
use twitch_greeter::platform::TwitchCredentials;
use twitch_greeter::App;

/// Answer one HTTP request with `status` and `body`; the handle yields the raw request
async fn validate_endpoint(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/oauth2/validate", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !String::from_utf8_lossy(&request).contains("\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&request).to_string()
    });
    (url, handle)
}

const VALID_BODY: &str = r#"{"client_id":"cid","login":"streamer","scopes":["chat:read","chat:edit"],"user_id":"42","expires_in":5000}"#;

fn credentials(url: &str) -> TwitchCredentials {
    TwitchCredentials::new(url, TokenStore::new(LocalStore::in_memory()))
}

#[tokio::test]
async fn test_introspect_valid_token() {
    let (url, request) = validate_endpoint("200 OK", VALID_BODY).await;

    let info = credentials(&url).introspect("oauth:abc123").await.unwrap();

    assert_eq!(
        info,
        TokenInfo {
            client_id: "cid".to_string(),
            scopes: vec!["chat:read".to_string(), "chat:edit".to_string()],
            user_name: "streamer".to_string(),
        }
    );
    let request = request.await.unwrap().to_lowercase();
    assert!(request.starts_with("get /oauth2/validate"));
    assert!(request.contains("authorization: oauth abc123"));
}

#[tokio::test]
async fn test_unauthorized_is_invalid_token() {
    let (url, _request) = validate_endpoint(
        "401 Unauthorized",
        r#"{"status":401,"message":"invalid access token"}"#,
    )
    .await;

    let result = credentials(&url).introspect("expired").await;

    assert_eq!(result, Err(AuthenticationError::InvalidToken));
}

#[tokio::test]
async fn test_server_error_is_introspection_failure() {
    let (url, _request) = validate_endpoint("503 Service Unavailable", "{}").await;

    let result = credentials(&url).introspect("abc").await;

    assert!(matches!(result, Err(AuthenticationError::Introspection(_))));
}

#[tokio::test]
async fn test_app_token_without_login_is_rejected() {
    let (url, _request) =
        validate_endpoint("200 OK", r#"{"client_id":"cid","scopes":[],"expires_in":100}"#).await;

    let result = credentials(&url).introspect("apptoken").await;

    assert!(matches!(result, Err(AuthenticationError::Introspection(_))));
}

#[tokio::test]
async fn test_validate_token_requires_both_chat_scopes() {
    let (url, _request) = validate_endpoint(
        "200 OK",
        r#"{"client_id":"cid","login":"streamer","scopes":["chat:read"]}"#,
    )
    .await;
    let tokens = TokenStore::new(LocalStore::in_memory());
    tokens.set("abc").unwrap();

    let creds = TwitchCredentials::new(url, tokens);

    assert!(!creds.validate_token().await);
}

#[tokio::test]
async fn test_validate_token_without_stored_token() {
    let creds = credentials("http://127.0.0.1:1/oauth2/validate");
    assert!(!creds.validate_token().await);
}

fn app_with(url: &str, dir: &tempfile::TempDir) -> App {
    let mut config = Config::default();
    config.twitch.validate_url = url.to_string();
    config.storage.path = dir.path().join("store.json").to_string_lossy().to_string();
    App::new(config).unwrap()
}

#[tokio::test]
async fn test_login_stores_token_and_login_name() {
    let dir = tempfile::tempdir().unwrap();
    let (url, _request) = validate_endpoint("200 OK", VALID_BODY).await;
    let app = app_with(&url, &dir);

    let username = app.login("oauth:abc123", None).await.unwrap();

    assert_eq!(username, "streamer");
    assert_eq!(app.tokens.get().as_deref(), Some("abc123"));
    assert_eq!(app.usernames.get().as_deref(), Some("streamer"));

    // Persisted across reopen
    let reopened = app_with(&url, &dir);
    assert_eq!(reopened.credentials.get_token().as_deref(), Some("abc123"));
}

#[tokio::test]
async fn test_login_with_explicit_username() {
    let dir = tempfile::tempdir().unwrap();
    let (url, _request) = validate_endpoint("200 OK", VALID_BODY).await;
    let app = app_with(&url, &dir);

    let username = app.login("abc123", Some("#OtherChannel")).await.unwrap();

    assert_eq!(username, "OtherChannel");
    assert_eq!(app.view(None).channel().as_deref(), Some("OtherChannel"));
}

#[tokio::test]
async fn test_login_rejects_token_without_scopes() {
    let dir = tempfile::tempdir().unwrap();
    let (url, _request) = validate_endpoint(
        "200 OK",
        r#"{"client_id":"cid","login":"streamer","scopes":[]}"#,
    )
    .await;
    let app = app_with(&url, &dir);

    assert!(app.login("abc123", None).await.is_err());
    assert!(app.tokens.get().is_none());
    assert!(app.usernames.get().is_none());
}

#[tokio::test]
async fn test_logout_clears_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let (url, _request) = validate_endpoint("200 OK", VALID_BODY).await;
    let app = app_with(&url, &dir);
    app.login("abc123", None).await.unwrap();

    app.logout().unwrap();

    assert!(app.tokens.get().is_none());
    assert!(app.usernames.get().is_none());
    assert!(!app.credentials.validate_token().await);
}
