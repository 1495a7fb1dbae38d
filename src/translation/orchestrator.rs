//! The core lifecycle: start a translation upstream, track it as a job, and
//! serve its result once the completion webhook has fired.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::errors::UpstreamError;
use crate::jobs::{JobState, JobStore};
use crate::upstream::{ApiGateway, ProxiedResponse};
use crate::webhook::{EventClass, WebhookRegistrar, WebhookScope};

/// Identifies the element (or single part) to translate.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRef {
    pub document_id: String,
    pub workspace_id: String,
    pub element_id: String,
    pub part_id: Option<String>,
}

/// Export quality knobs, passed through to the upstream translator.
#[derive(Debug, Clone)]
pub struct FormatParams {
    pub resolution: String,
    pub distance_tolerance: f64,
    pub angular_tolerance: f64,
    pub maximum_chord_length: f64,
}

impl Default for FormatParams {
    fn default() -> Self {
        Self {
            resolution: "medium".to_string(),
            distance_tolerance: 0.00012,
            angular_tolerance: 0.1090830782496456,
            maximum_chord_length: 10.0,
        }
    }
}

/// Outcome of a start request: the raw upstream reply, plus the job id
/// extracted from it when the request was accepted.
#[derive(Debug)]
pub struct StartedTranslation {
    pub job_id: Option<String>,
    pub response: ProxiedResponse,
}

/// Result of polling a tracked job.
#[derive(Debug)]
pub enum JobOutcome {
    /// No such job: never started, already consumed, or evicted.
    NotFound,
    /// Still waiting on the completion notification.
    InProgress,
    /// Terminal success: the translated asset, fetched and ready to proxy.
    Ready(ProxiedResponse),
    /// Terminal failure reported by the platform.
    Failed { reason: String },
}

#[derive(Clone)]
pub struct TranslationOrchestrator {
    gateway: Arc<dyn ApiGateway>,
    registrar: Arc<WebhookRegistrar>,
    jobs: Arc<JobStore>,
}

impl TranslationOrchestrator {
    pub fn new(
        gateway: Arc<dyn ApiGateway>,
        registrar: Arc<WebhookRegistrar>,
        jobs: Arc<JobStore>,
    ) -> Self {
        Self {
            gateway,
            registrar,
            jobs,
        }
    }

    /// Kick off a glTF translation for the given element.
    ///
    /// The webhook registration runs as a background task; its failure is
    /// logged but does not fail the translation request. The upstream reply
    /// is returned raw so the route can proxy it, including 4xx validation
    /// errors, unmodified.
    pub async fn start_translation(
        &self,
        resource: &ResourceRef,
        params: &FormatParams,
    ) -> Result<StartedTranslation, UpstreamError> {
        self.spawn_webhook_registration(resource);

        let path = format!(
            "partstudios/d/{}/w/{}/e/{}/translations",
            resource.document_id, resource.workspace_id, resource.element_id
        );
        let mut body = json!({
            "formatName": "GLTF",
            "resolution": params.resolution,
            "distanceTolerance": params.distance_tolerance,
            "angularTolerance": params.angular_tolerance,
            "maximumChordLength": params.maximum_chord_length,
        });
        if let Some(part_id) = &resource.part_id {
            body["partIds"] = json!([part_id]);
        }

        let response = self.gateway.post(&path, body).await?;

        let mut job_id = None;
        if response.is_success() && response.is_json() {
            if let Ok(parsed) = response.json() {
                if let Some(id) = parsed["id"].as_str() {
                    // The record must exist before the completion notification
                    // can match it; the store buffers any that outrun us.
                    self.jobs.insert_pending(id).await;
                    info!(job_id = %id, "Translation started");
                    job_id = Some(id.to_string());
                }
            }
        }
        Ok(StartedTranslation { job_id, response })
    }

    fn spawn_webhook_registration(&self, resource: &ResourceRef) {
        let registrar = self.registrar.clone();
        let scope = WebhookScope::Element {
            document_id: resource.document_id.clone(),
            workspace_id: resource.workspace_id.clone(),
            element_id: resource.element_id.clone(),
        };
        tokio::spawn(async move {
            if let Err(err) = registrar
                .register(&scope, EventClass::TranslationComplete)
                .await
            {
                warn!(error = %err, "Failed to register translation webhook");
            }
        });
    }

    /// Poll a job. A `Ready` outcome consumes the record: the asset is
    /// fetched, the webhook torn down, and the id forgotten, so the result
    /// can be retrieved at most once.
    pub async fn job_result(&self, job_id: &str) -> Result<JobOutcome, UpstreamError> {
        let Some(record) = self.jobs.get(job_id).await else {
            return Ok(JobOutcome::NotFound);
        };
        match record.state {
            JobState::Pending => Ok(JobOutcome::InProgress),
            JobState::Failed { reason } => Ok(JobOutcome::Failed { reason }),
            JobState::Succeeded { asset_path } => {
                let response = self.gateway.get(&asset_path).await?;
                // Only the caller that wins the removal tears the webhook
                // down; unregistration is best-effort and off the hot path.
                if let Some(consumed) = self.jobs.remove(job_id).await {
                    if let Some(webhook_id) = consumed.webhook_id {
                        let registrar = self.registrar.clone();
                        tokio::spawn(async move {
                            if let Err(err) = registrar.unregister(&webhook_id).await {
                                warn!(error = %err, "Failed to unregister webhook after consumption");
                            }
                        });
                    }
                }
                Ok(JobOutcome::Ready(response))
            }
        }
    }
}
