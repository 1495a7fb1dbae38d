//! Gateway variant that routes upstream calls through a Flow automation
//! proxy instead of hitting the platform directly.
//!
//! Every call is wrapped in the envelope the Flow expects:
//! `{httpVerb, requestUrlParameters, onshapeRequestBody, basicAuthString}`,
//! POSTed to the configured proxy URL. The Flow performs the real Onshape
//! request and relays the reply, which we proxy back verbatim.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{Client, Method};
use serde_json::{Value, json};

use super::gateway::{ApiGateway, ProxiedResponse};
use crate::config::{AuthScheme, FlowConfig};
use crate::errors::UpstreamError;

pub struct FlowClient {
    http: Client,
    proxy_url: String,
    basic_auth_signature: Option<String>,
}

impl FlowClient {
    pub fn new(flow: &FlowConfig, auth: &AuthScheme) -> Self {
        Self {
            http: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(120))
                .build()
                .expect("failed to build HTTP client"),
            proxy_url: flow.proxy_url.clone(),
            basic_auth_signature: basic_auth_signature(auth),
        }
    }
}

/// The `accessKey:secretKey` pair, base64-encoded for the Flow to replay as
/// an Authorization header. Only API-key auth can be forwarded this way.
pub fn basic_auth_signature(auth: &AuthScheme) -> Option<String> {
    match auth {
        AuthScheme::ApiKeys {
            access_key,
            secret_key,
        } => Some(STANDARD.encode(format!("{access_key}:{secret_key}"))),
        AuthScheme::OAuth { .. } => None,
    }
}

#[async_trait]
impl ApiGateway for FlowClient {
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ProxiedResponse, UpstreamError> {
        let envelope = json!({
            "httpVerb": method.as_str(),
            "requestUrlParameters": path.trim_start_matches('/'),
            "onshapeRequestBody": body.unwrap_or_else(|| json!({})),
            "basicAuthString": self.basic_auth_signature,
        });

        let resp = self
            .http
            .post(&self.proxy_url)
            .json(&envelope)
            .send()
            .await
            .map_err(UpstreamError::RequestFailed)?;

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

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method as http_method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn flow_config(server: &MockServer) -> FlowConfig {
        FlowConfig {
            proxy_url: format!("{}/proxy", server.uri()),
            register_webhook_url: format!("{}/register", server.uri()),
        }
    }

    fn api_keys() -> AuthScheme {
        AuthScheme::ApiKeys {
            access_key: "ak".to_string(),
            secret_key: "sk".to_string(),
        }
    }

    #[tokio::test]
    async fn wraps_calls_in_the_flow_envelope() {
        let server = MockServer::start().await;
        Mock::given(http_method("POST"))
            .and(path("/proxy"))
            .and(body_partial_json(serde_json::json!({
                "httpVerb": "DELETE",
                "requestUrlParameters": "webhooks/wh-1",
                "basicAuthString": "YWs6c2s=",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let client = FlowClient::new(&flow_config(&server), &api_keys());
        let resp = client.delete("/webhooks/wh-1").await.unwrap();
        assert_eq!(resp.status, 200);
    }

    #[tokio::test]
    async fn forwards_request_bodies_inside_the_envelope() {
        let server = MockServer::start().await;
        Mock::given(http_method("POST"))
            .and(path("/proxy"))
            .and(body_partial_json(serde_json::json!({
                "httpVerb": "POST",
                "onshapeRequestBody": {"formatName": "GLTF"},
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_string(r#"{"id":"T1"}"#),
            )
            .mount(&server)
            .await;

        let client = FlowClient::new(&flow_config(&server), &api_keys());
        let resp = client
            .post("translations", serde_json::json!({"formatName": "GLTF"}))
            .await
            .unwrap();
        assert_eq!(resp.json().unwrap()["id"], "T1");
    }

    #[test]
    fn oauth_credentials_produce_no_signature() {
        let auth = AuthScheme::OAuth {
            client_id: "cid".to_string(),
            client_secret: "csec".to_string(),
            access_token: "tok".to_string(),
            refresh_token: None,
        };
        assert!(basic_auth_signature(&auth).is_none());
    }
}
