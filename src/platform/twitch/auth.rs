// ABOUTME: Twitch token storage access and introspection via the OAuth validate endpoint
// ABOUTME: Maps validate responses onto TokenInfo and HTTP failures onto AuthenticationError

use async_trait::async_trait;
use greeter_core::settings::TokenStore;
use greeter_core::{AuthenticationError, CredentialProvider, TokenInfo};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of a successful `GET /oauth2/validate`
#[derive(Debug, Deserialize)]
struct ValidateResponse {
    client_id: String,
    /// Absent for app access tokens
    #[serde(default)]
    login: Option<String>,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Credential provider backed by the local token store and Twitch's identity service
pub struct TwitchCredentials {
    http: reqwest::Client,
    validate_url: String,
    tokens: TokenStore,
    /// Token from config or environment, preferred over the stored one
    token_override: Option<String>,
}

impl TwitchCredentials {
    pub fn new(validate_url: impl Into<String>, tokens: TokenStore) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            validate_url: validate_url.into(),
            tokens,
            token_override: None,
        }
    }

    pub fn with_token_override(mut self, token: Option<String>) -> Self {
        self.token_override = token.as_deref().and_then(normalize_token);
        self
    }
}

/// Strip an `oauth:` prefix and surrounding whitespace; blank tokens become None
pub fn normalize_token(raw: &str) -> Option<String> {
    let token = raw.trim();
    let token = token.strip_prefix("oauth:").unwrap_or(token).trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[async_trait]
impl CredentialProvider for TwitchCredentials {
    fn get_token(&self) -> Option<String> {
        self.token_override
            .clone()
            .or_else(|| self.tokens.get().as_deref().and_then(normalize_token))
    }

    async fn introspect(&self, token: &str) -> Result<TokenInfo, AuthenticationError> {
        let token = normalize_token(token).ok_or(AuthenticationError::MissingToken)?;

        let response = self
            .http
            .get(&self.validate_url)
            .header(AUTHORIZATION, format!("OAuth {}", token))
            .send()
            .await
            .map_err(|e| AuthenticationError::Introspection(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AuthenticationError::InvalidToken);
        }
        if !status.is_success() {
            return Err(AuthenticationError::Introspection(format!(
                "validate endpoint returned {}",
                status
            )));
        }

        let body: ValidateResponse = response
            .json()
            .await
            .map_err(|e| AuthenticationError::Introspection(e.to_string()))?;
        let login = body
            .login
            .filter(|login| !login.is_empty())
            .ok_or_else(|| {
                AuthenticationError::Introspection("token is not bound to a user".to_string())
            })?;

        tracing::debug!(
            %login,
            scopes = ?body.scopes,
            expires_in = ?body.expires_in,
            "Token validated"
        );

        Ok(TokenInfo {
            client_id: body.client_id,
            scopes: body.scopes,
            user_name: login,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greeter_core::storage::LocalStore;

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("oauth:abc"), Some("abc".to_string()));
        assert_eq!(normalize_token("  abc \n"), Some("abc".to_string()));
        assert_eq!(normalize_token("oauth:"), None);
        assert_eq!(normalize_token("   "), None);
    }

    #[test]
    fn test_override_wins_over_stored_token() {
        let tokens = TokenStore::new(LocalStore::in_memory());
        tokens.set("stored").unwrap();
        let creds = TwitchCredentials::new("http://localhost/validate", tokens.clone());
        assert_eq!(creds.get_token().as_deref(), Some("stored"));

        let creds = creds.with_token_override(Some("oauth:override".to_string()));
        assert_eq!(creds.get_token().as_deref(), Some("override"));
    }

    #[test]
    fn test_no_token_anywhere() {
        let tokens = TokenStore::new(LocalStore::in_memory());
        let creds = TwitchCredentials::new("http://localhost/validate", tokens)
            .with_token_override(Some(" ".to_string()));
        assert!(creds.get_token().is_none());
    }

    #[tokio::test]
    async fn test_introspect_blank_token_is_missing() {
        let tokens = TokenStore::new(LocalStore::in_memory());
        let creds = TwitchCredentials::new("http://localhost/validate", tokens);
        assert_eq!(
            creds.introspect("oauth:").await,
            Err(AuthenticationError::MissingToken)
        );
    }
}
