//! HTTP implementation of [`QuotaApi`].
//!
//! `GET {api_url}/{version}/projects/{project}/{quota|current_usage}`
//! with the Keystone token in `X-Auth-Token`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{ByRegion, CurrentUsageV1, CurrentUsageV3, QuotaApi, QuotaV1, QuotaV3};
use crate::auth::Token;
use crate::error::{truncate_body, FetchError};

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

pub struct ApiClient {
    client: reqwest::Client,
    api_url: String,
}

impl ApiClient {
    pub fn new(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    fn url(&self, version: &str, project_id: &str, resource: &str) -> String {
        format!(
            "{}/{}/projects/{}/{}",
            self.api_url, version, project_id, resource
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String, token: &Token) -> Result<T, FetchError> {
        debug!(url = %url, "Fetching");

        let resp = match self
            .client
            .get(&url)
            .header(AUTH_TOKEN_HEADER, token.as_str())
            .send()
            .await
        {
            Ok(r) => r,
            Err(source) => return Err(FetchError::Transport { url, source }),
        };

        let status = resp.status();
        let body = match resp.text().await {
            Ok(b) => b,
            Err(source) => return Err(FetchError::Transport { url, source }),
        };

        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        serde_json::from_str(&body).map_err(|source| FetchError::Decode { url, source })
    }
}

#[async_trait]
impl QuotaApi for ApiClient {
    async fn quota_v1(&self, project_id: &str, token: &Token) -> Result<ByRegion<QuotaV1>, FetchError> {
        self.get_json(self.url("v1", project_id, "quota"), token).await
    }

    async fn current_usage_v1(
        &self,
        project_id: &str,
        token: &Token,
    ) -> Result<ByRegion<CurrentUsageV1>, FetchError> {
        self.get_json(self.url("v1", project_id, "current_usage"), token).await
    }

    async fn quota_v3(&self, project_id: &str, token: &Token) -> Result<ByRegion<QuotaV3>, FetchError> {
        self.get_json(self.url("v3", project_id, "quota"), token).await
    }

    async fn current_usage_v3(
        &self,
        project_id: &str,
        token: &Token,
    ) -> Result<ByRegion<CurrentUsageV3>, FetchError> {
        self.get_json(self.url("v3", project_id, "current_usage"), token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tokio::net::TcpListener;

    async fn spawn_api(app: Router) -> ApiClient {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        ApiClient::new(reqwest::Client::new(), format!("http://{}", addr))
    }

    #[test]
    fn test_url_layout() {
        let client = ApiClient::new(reqwest::Client::new(), "https://api.example:5001".into());
        assert_eq!(
            client.url("v3", "proj-1", "current_usage"),
            "https://api.example:5001/v3/projects/proj-1/current_usage"
        );
    }

    #[tokio::test]
    async fn test_fetch_quota_sends_token() {
        let app = Router::new().route(
            "/v1/projects/:project/quota",
            get(|Path(project): Path<String>, headers: HeaderMap| async move {
                assert_eq!(project, "proj-1");
                if headers.get("x-auth-token").map(|v| v.as_bytes()) != Some(b"tok-1".as_slice()) {
                    return (StatusCode::UNAUTHORIZED, String::new());
                }
                (
                    StatusCode::OK,
                    r#"{"dbl": {"compute.cores": 10, "s3.space_bytes": 512}}"#.to_string(),
                )
            }),
        );
        let client = spawn_api(app).await;

        let quota = client.quota_v1("proj-1", &Token::new("tok-1")).await.unwrap();
        assert_eq!(quota["dbl"].compute_cores, 10.0);
        assert_eq!(quota["dbl"].s3_space_bytes, 512.0);
    }

    #[tokio::test]
    async fn test_fetch_status_error() {
        let app = Router::new().route(
            "/v3/projects/:project/current_usage",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        );
        let client = spawn_api(app).await;

        let err = client
            .current_usage_v3("proj-1", &Token::new("tok-1"))
            .await
            .unwrap_err();
        match err {
            FetchError::Status { status, body, url } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
                assert!(url.ends_with("/v3/projects/proj-1/current_usage"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_decode_error() {
        let app = Router::new().route(
            "/v3/projects/:project/quota",
            get(|| async { "not json" }),
        );
        let client = spawn_api(app).await;

        let err = client.quota_v3("proj-1", &Token::new("tok-1")).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }
}
