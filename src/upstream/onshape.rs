//! Direct client for the Onshape REST API.
//!
//! Attaches credentials to every call and proxies the raw reply back. The
//! only built-in retry is the authentication recovery path: a 401 under
//! OAuth triggers a refresh-token grant and a single repeat of the request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::gateway::{ApiGateway, ProxiedResponse};
use crate::config::{AuthScheme, RelayConfig};
use crate::errors::UpstreamError;

pub struct OnshapeClient {
    http: Client,
    api_url: String,
    oauth_url: String,
    credentials: Credentials,
}

enum Credentials {
    ApiKeys {
        access_key: String,
        secret_key: String,
    },
    OAuth {
        client_id: String,
        client_secret: String,
        tokens: RwLock<TokenPair>,
    },
}

struct TokenPair {
    access_token: String,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl OnshapeClient {
    pub fn new(config: &RelayConfig) -> Self {
        Self::with_urls(
            config.api_url.clone(),
            config.oauth_url.clone(),
            config.auth.clone(),
        )
    }

    /// Build a client against explicit base URLs (useful for testing).
    pub fn with_urls(api_url: String, oauth_url: String, auth: AuthScheme) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        let credentials = match auth {
            AuthScheme::ApiKeys {
                access_key,
                secret_key,
            } => Credentials::ApiKeys {
                access_key,
                secret_key,
            },
            AuthScheme::OAuth {
                client_id,
                client_secret,
                access_token,
                refresh_token,
            } => Credentials::OAuth {
                client_id,
                client_secret,
                tokens: RwLock::new(TokenPair {
                    access_token,
                    refresh_token,
                }),
            },
        };
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            oauth_url: oauth_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn normalize(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}/{}", self.api_url, path.trim_start_matches('/'))
        }
    }

    async fn can_refresh(&self) -> bool {
        match &self.credentials {
            Credentials::OAuth { tokens, .. } => tokens.read().await.refresh_token.is_some(),
            Credentials::ApiKeys { .. } => false,
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, UpstreamError> {
        let url = self.normalize(path);
        let mut req = self.http.request(method, &url);
        req = match &self.credentials {
            Credentials::ApiKeys {
                access_key,
                secret_key,
            } => req.basic_auth(access_key, Some(secret_key)),
            Credentials::OAuth { tokens, .. } => {
                let access_token = tokens.read().await.access_token.clone();
                req.bearer_auth(access_token)
            }
        };
        if let Some(body) = body {
            req = req.json(body);
        }
        req.send().await.map_err(UpstreamError::RequestFailed)
    }

    async fn refresh_access_token(&self) -> Result<(), UpstreamError> {
        let Credentials::OAuth {
            client_id,
            client_secret,
            tokens,
        } = &self.credentials
        else {
            return Err(UpstreamError::MissingRefreshToken);
        };
        let refresh_token = tokens
            .read()
            .await
            .refresh_token
            .clone()
            .ok_or(UpstreamError::MissingRefreshToken)?;

        let resp = self
            .http
            .post(format!("{}/oauth/token", self.oauth_url))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(UpstreamError::RequestFailed)?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::RefreshFailed(format!("{status}: {body}")));
        }

        let token: TokenResponse = resp.json().await.map_err(UpstreamError::RequestFailed)?;
        let mut guard = tokens.write().await;
        guard.access_token = token.access_token;
        if token.refresh_token.is_some() {
            guard.refresh_token = token.refresh_token;
        }
        info!("OAuth access token refreshed");
        Ok(())
    }

    async fn proxied(resp: reqwest::Response) -> Result<ProxiedResponse, UpstreamError> {
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp
            .bytes()
            .await
            .map_err(UpstreamError::RequestFailed)?
            .to_vec();
        Ok(ProxiedResponse {
            status,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl ApiGateway for OnshapeClient {
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ProxiedResponse, UpstreamError> {
        let resp = self.send(method.clone(), path, body.as_ref()).await?;
        if resp.status() == StatusCode::UNAUTHORIZED && self.can_refresh().await {
            debug!(%path, "Upstream returned 401, refreshing token and retrying once");
            self.refresh_access_token().await?;
            let retried = self.send(method, path, body.as_ref()).await?;
            return Self::proxied(retried).await;
        }
        Self::proxied(resp).await
    }
}
