use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::errors::UpstreamError;

/// Raw upstream reply, carried back verbatim so route handlers can proxy
/// status, content type, and body without reshaping them.
#[derive(Debug, Clone)]
pub struct ProxiedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ProxiedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("json"))
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> Result<Value, UpstreamError> {
        serde_json::from_slice(&self.body).map_err(|e| UpstreamError::UnexpectedPayload {
            message: e.to_string(),
        })
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A client for the upstream platform's REST API.
///
/// `path` is relative to the API base URL (absolute URLs pass through
/// unchanged). Non-2xx replies are returned as `ProxiedResponse`, not errors:
/// upstream 4xx bodies flow back to the caller unmodified. Only transport
/// failures and broken auth recovery surface as `UpstreamError`.
#[async_trait]
pub trait ApiGateway: Send + Sync {
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ProxiedResponse, UpstreamError>;

    async fn get(&self, path: &str) -> Result<ProxiedResponse, UpstreamError> {
        self.call(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<ProxiedResponse, UpstreamError> {
        self.call(Method::POST, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<ProxiedResponse, UpstreamError> {
        self.call(Method::DELETE, path, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range_is_2xx() {
        let ok = ProxiedResponse {
            status: 204,
            content_type: None,
            body: Vec::new(),
        };
        assert!(ok.is_success());
        let not_found = ProxiedResponse {
            status: 404,
            content_type: None,
            body: Vec::new(),
        };
        assert!(!not_found.is_success());
    }

    #[test]
    fn json_detection_matches_content_type() {
        let resp = ProxiedResponse {
            status: 200,
            content_type: Some("application/json;charset=UTF-8".to_string()),
            body: br#"{"id":"T1"}"#.to_vec(),
        };
        assert!(resp.is_json());
        assert_eq!(resp.json().unwrap()["id"], "T1");
    }

    #[test]
    fn json_parse_failure_is_reported() {
        let resp = ProxiedResponse {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: b"not json".to_vec(),
        };
        assert!(matches!(
            resp.json(),
            Err(UpstreamError::UnexpectedPayload { .. })
        ));
    }
}
