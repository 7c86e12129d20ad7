//! Auth module — Keystone token acquisition.
//!
//! Two flows, picked by [`AuthMode`]:
//!
//!   password                → user/password scoped to the project
//!   application credential  → credential ID + secret (already project-scoped)
//!
//! Either way Keystone answers `201 Created` with the token in the
//! `X-Subject-Token` header. Tokens are requested fresh every poll cycle
//! and never cached.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::{AuthMode, Credentials};
use crate::error::{truncate_body, AuthError};

const SUBJECT_TOKEN_HEADER: &str = "x-subject-token";

/// An issued API token. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

/// Anything that can hand the poll driver a fresh token.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn acquire_token(&self) -> Result<Token, AuthError>;
}

// ── Keystone ────────────────────────────────────────────────────────

pub struct KeystoneAuth {
    client: reqwest::Client,
    auth_url: String,
    project_id: String,
    credentials: Credentials,
    mode: AuthMode,
}

impl KeystoneAuth {
    pub fn new(
        client: reqwest::Client,
        auth_url: String,
        project_id: String,
        credentials: Credentials,
        mode: AuthMode,
    ) -> Self {
        Self {
            client,
            auth_url,
            project_id,
            credentials,
            mode,
        }
    }

    fn tokens_url(&self) -> String {
        format!("{}/auth/tokens", self.auth_url)
    }

    /// Build the identity request for the configured flow.
    ///
    /// Password auth assumes the user lives in the `Default` domain.
    fn request_body(&self) -> Value {
        match self.mode {
            AuthMode::Password => json!({
                "auth": {
                    "identity": {
                        "methods": ["password"],
                        "password": {
                            "user": {
                                "name": &self.credentials.username,
                                "domain": { "name": "Default" },
                                "password": &self.credentials.password,
                            }
                        }
                    },
                    "scope": {
                        "project": { "id": &self.project_id }
                    }
                }
            }),
            AuthMode::ApplicationCredential => json!({
                "auth": {
                    "identity": {
                        "methods": ["application_credential"],
                        "application_credential": {
                            "id": &self.credentials.username,
                            "secret": &self.credentials.password,
                        }
                    }
                }
            }),
        }
    }
}

#[async_trait]
impl TokenProvider for KeystoneAuth {
    async fn acquire_token(&self) -> Result<Token, AuthError> {
        debug!(mode = ?self.mode, url = %self.tokens_url(), "Requesting Keystone token");

        let resp = self
            .client
            .post(self.tokens_url())
            .json(&self.request_body())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        resp.headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(Token::new)
            .ok_or(AuthError::MissingToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use tokio::net::TcpListener;

    fn keystone(auth_url: &str, mode: AuthMode) -> KeystoneAuth {
        KeystoneAuth::new(
            reqwest::Client::new(),
            auth_url.to_string(),
            "proj-1".into(),
            Credentials {
                username: "exporter".into(),
                password: "s3cret".into(),
            },
            mode,
        )
    }

    async fn spawn_keystone(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/v3", addr)
    }

    #[test]
    fn test_password_body_is_project_scoped() {
        let body = keystone("http://unused", AuthMode::Password).request_body();
        assert_eq!(body["auth"]["identity"]["methods"][0], "password");
        assert_eq!(body["auth"]["identity"]["password"]["user"]["name"], "exporter");
        assert_eq!(body["auth"]["identity"]["password"]["user"]["password"], "s3cret");
        assert_eq!(body["auth"]["scope"]["project"]["id"], "proj-1");
    }

    #[test]
    fn test_app_credential_body_has_no_scope() {
        let body = keystone("http://unused", AuthMode::ApplicationCredential).request_body();
        assert_eq!(body["auth"]["identity"]["methods"][0], "application_credential");
        assert_eq!(body["auth"]["identity"]["application_credential"]["id"], "exporter");
        assert_eq!(body["auth"]["identity"]["application_credential"]["secret"], "s3cret");
        assert!(body["auth"].get("scope").is_none());
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = Token::new("gAAAAAB-secret");
        assert_eq!(format!("{:?}", token), "Token(<redacted>)");
        assert_eq!(token.as_str(), "gAAAAAB-secret");
    }

    #[tokio::test]
    async fn test_acquire_token_reads_subject_header() {
        let app = Router::new().route(
            "/v3/auth/tokens",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["auth"]["scope"]["project"]["id"], "proj-1");
                (
                    StatusCode::CREATED,
                    [("x-subject-token", "tok-123")],
                    "{}",
                )
            }),
        );
        let url = spawn_keystone(app).await;

        let token = keystone(&url, AuthMode::Password)
            .acquire_token()
            .await
            .unwrap();
        assert_eq!(token.as_str(), "tok-123");
    }

    #[tokio::test]
    async fn test_acquire_token_with_app_credential() {
        let app = Router::new().route(
            "/v3/auth/tokens",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["auth"]["identity"]["methods"][0], "application_credential");
                assert_eq!(body["auth"]["identity"]["application_credential"]["id"], "exporter");
                assert!(body["auth"].get("scope").is_none());
                (
                    StatusCode::CREATED,
                    [("x-subject-token", "tok-app")],
                    "{}",
                )
            }),
        );
        let url = spawn_keystone(app).await;

        let token = keystone(&url, AuthMode::ApplicationCredential)
            .acquire_token()
            .await
            .unwrap();
        assert_eq!(token.as_str(), "tok-app");
    }

    #[tokio::test]
    async fn test_acquire_token_rejected() {
        let app = Router::new().route(
            "/v3/auth/tokens",
            post(|| async { (StatusCode::UNAUTHORIZED, "The request you have made requires authentication.") }),
        );
        let url = spawn_keystone(app).await;

        let err = keystone(&url, AuthMode::ApplicationCredential)
            .acquire_token()
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Rejected { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_acquire_token_missing_header() {
        let app = Router::new().route(
            "/v3/auth/tokens",
            post(|| async { (StatusCode::CREATED, "{}") }),
        );
        let url = spawn_keystone(app).await;

        let err = keystone(&url, AuthMode::Password)
            .acquire_token()
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingToken));
    }
}
