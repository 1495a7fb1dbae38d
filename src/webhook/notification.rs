use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Fired when a model translation finishes (successfully or not).
pub const TRANSLATION_COMPLETE_EVENT: &str = "onshape.model.translation.complete";
/// Trial ping the platform sends immediately after a webhook is registered.
pub const WEBHOOK_REGISTER_EVENT: &str = "webhook.register";
/// Fired when a workflowable object (e.g. a release package) changes state.
pub const WORKFLOW_TRANSITION_EVENT: &str = "onshape.workflow.transition";

/// `requestState` value marking a failed translation.
pub const FAILED_REQUEST_STATE: &str = "FAILED";

/// Inbound notification POSTed by the platform when a subscribed event fires.
///
/// The field set varies by event class, so everything beyond `event` is
/// optional and unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookNotification {
    pub event: String,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// The webhook that fired; echoed back so the subscriber can tear it down.
    #[serde(default)]
    pub webhook_id: Option<String>,
    #[serde(default)]
    pub translation_id: Option<String>,
    #[serde(default)]
    pub request_state: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub result_external_data_ids: Vec<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// Event classes the receiver distinguishes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    RegistrationPing,
    TranslationComplete,
    Other,
}

impl WebhookNotification {
    pub fn kind(&self) -> EventKind {
        match self.event.as_str() {
            WEBHOOK_REGISTER_EVENT => EventKind::RegistrationPing,
            TRANSLATION_COMPLETE_EVENT => EventKind::TranslationComplete,
            _ => EventKind::Other,
        }
    }

    pub fn failed(&self) -> bool {
        self.request_state.as_deref() == Some(FAILED_REQUEST_STATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_a_completion_payload() {
        let notification: WebhookNotification = serde_json::from_str(
            r#"{
                "event": "onshape.model.translation.complete",
                "messageId": "m-1",
                "timestamp": "2023-04-01T12:00:00Z",
                "translationId": "T1",
                "webhookId": "wh-1",
                "requestState": "DONE",
                "documentId": "A",
                "resultExternalDataIds": ["X"]
            }"#,
        )
        .unwrap();
        assert_eq!(notification.kind(), EventKind::TranslationComplete);
        assert!(!notification.failed());
        assert_eq!(notification.translation_id.as_deref(), Some("T1"));
        assert_eq!(notification.result_external_data_ids, vec!["X"]);
    }

    #[test]
    fn sparse_payloads_still_parse() {
        let notification: WebhookNotification =
            serde_json::from_str(r#"{"event": "webhook.register"}"#).unwrap();
        assert_eq!(notification.kind(), EventKind::RegistrationPing);
        assert!(notification.translation_id.is_none());
        assert!(notification.result_external_data_ids.is_empty());
    }

    #[test]
    fn unknown_events_map_to_other() {
        let notification: WebhookNotification =
            serde_json::from_str(r#"{"event": "onshape.document.lifecycle.created"}"#).unwrap();
        assert_eq!(notification.kind(), EventKind::Other);
    }

    #[test]
    fn failed_request_state_is_detected() {
        let notification: WebhookNotification = serde_json::from_str(
            r#"{"event": "onshape.model.translation.complete", "requestState": "FAILED"}"#,
        )
        .unwrap();
        assert!(notification.failed());
    }
}
