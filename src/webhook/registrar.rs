//! Registers and unregisters webhook subscriptions with the platform.
//!
//! Direct mode POSTs the standard `api/webhooks` registration body; Flow
//! mode hands the parameters to a dedicated registration Flow instead.
//! Unregistration is idempotent from the caller's perspective: an id the
//! platform no longer knows is logged and treated as already gone.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::notification::{TRANSLATION_COMPLETE_EVENT, WORKFLOW_TRANSITION_EVENT};
use crate::config::{AuthScheme, RelayConfig};
use crate::errors::{UpstreamError, WebhookError};
use crate::upstream::{ApiGateway, basic_auth_signature};

/// Event class a subscription listens for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventClass {
    TranslationComplete,
    WorkflowTransition,
}

impl EventClass {
    pub fn event_name(self) -> &'static str {
        match self {
            Self::TranslationComplete => TRANSLATION_COMPLETE_EVENT,
            Self::WorkflowTransition => WORKFLOW_TRANSITION_EVENT,
        }
    }
}

/// Resource scope a subscription is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookScope {
    Element {
        document_id: String,
        workspace_id: String,
        element_id: String,
    },
    Company {
        company_id: String,
    },
}

impl WebhookScope {
    /// Notification filter expression in the platform's template syntax.
    fn filter(&self) -> String {
        match self {
            Self::Element {
                document_id,
                workspace_id,
                element_id,
            } => format!(
                "{{$DocumentId}} = '{document_id}' && {{$WorkspaceId}} = '{workspace_id}' && {{$ElementId}} = '{element_id}'"
            ),
            Self::Company { company_id } => format!("{{$CompanyId}} = '{company_id}'"),
        }
    }
}

pub struct WebhookRegistrar {
    gateway: Arc<dyn ApiGateway>,
    /// Public root URL of this app; the platform POSTs notifications to
    /// `{root}/api/webhookEvents`.
    callback_root_url: String,
    flow: Option<FlowRegistration>,
}

struct FlowRegistration {
    http: Client,
    url: String,
    basic_auth_signature: Option<String>,
}

impl WebhookRegistrar {
    pub fn new(gateway: Arc<dyn ApiGateway>, config: &RelayConfig) -> Self {
        let flow = config.flow.as_ref().map(|flow| FlowRegistration {
            http: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(120))
                .build()
                .expect("failed to build HTTP client"),
            url: flow.register_webhook_url.clone(),
            basic_auth_signature: basic_auth_signature(&config.auth),
        });
        Self {
            gateway,
            callback_root_url: config.callback_root_url.clone(),
            flow,
        }
    }

    fn callback_url(&self) -> String {
        format!("{}/api/webhookEvents", self.callback_root_url)
    }

    /// Register a webhook for the given scope and event class.
    ///
    /// Returns the platform-assigned webhook id.
    pub async fn register(
        &self,
        scope: &WebhookScope,
        event: EventClass,
    ) -> Result<String, WebhookError> {
        match &self.flow {
            Some(flow) => self.register_via_flow(flow, scope).await,
            None => self.register_direct(scope, event).await,
        }
    }

    async fn register_direct(
        &self,
        scope: &WebhookScope,
        event: EventClass,
    ) -> Result<String, WebhookError> {
        let body = json!({
            "events": [event.event_name()],
            "filter": scope.filter(),
            "options": {"collapseEvents": false},
            "url": self.callback_url(),
        });
        let resp = self.gateway.post("webhooks", body).await?;
        if !resp.is_success() {
            return Err(WebhookError::RegistrationRejected {
                status: resp.status,
                body: resp.body_string(),
            });
        }
        Self::extract_id(&resp.json()?, &resp.body_string())
    }

    async fn register_via_flow(
        &self,
        flow: &FlowRegistration,
        scope: &WebhookScope,
    ) -> Result<String, WebhookError> {
        let mut body = match scope {
            WebhookScope::Element {
                document_id,
                workspace_id,
                element_id,
            } => json!({
                "documentId": document_id,
                "workspaceId": workspace_id,
                "elementId": element_id,
                "webhookCallbackRootUrl": self.callback_root_url,
            }),
            WebhookScope::Company { company_id } => json!({
                "companyId": company_id,
                "webhookCallbackRootUrl": self.callback_root_url,
            }),
        };
        if let Some(signature) = &flow.basic_auth_signature {
            body["basicAuthSignature"] = json!(signature);
        }

        let resp = flow
            .http
            .post(&flow.url)
            .json(&body)
            .send()
            .await
            .map_err(UpstreamError::RequestFailed)?;
        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(UpstreamError::RequestFailed)?;
        if !(200..300).contains(&status) {
            return Err(WebhookError::RegistrationRejected { status, body: text });
        }
        let parsed: Value =
            serde_json::from_str(&text).map_err(|e| UpstreamError::UnexpectedPayload {
                message: e.to_string(),
            })?;
        Self::extract_id(&parsed, &text)
    }

    fn extract_id(parsed: &Value, raw: &str) -> Result<String, WebhookError> {
        parsed["id"]
            .as_str()
            .map(str::to_string)
            .inspect(|id| info!(webhook_id = %id, "Webhook registered"))
            .ok_or_else(|| WebhookError::MissingId {
                body: raw.to_string(),
            })
    }

    /// Tear down a subscription. An id the platform already forgot is fine.
    pub async fn unregister(&self, webhook_id: &str) -> Result<(), WebhookError> {
        let resp = self
            .gateway
            .delete(&format!("webhooks/{webhook_id}"))
            .await
            .map_err(|source| WebhookError::UnregisterFailed {
                webhook_id: webhook_id.to_string(),
                source,
            })?;
        if resp.is_success() {
            info!(%webhook_id, "Webhook unregistered");
            Ok(())
        } else if resp.status == 404 {
            debug!(%webhook_id, "Webhook already unregistered");
            Ok(())
        } else {
            Err(WebhookError::UnregisterFailed {
                webhook_id: webhook_id.to_string(),
                source: UpstreamError::ErrorStatus {
                    status: resp.status,
                    body: resp.body_string(),
                },
            })
        }
    }
}
