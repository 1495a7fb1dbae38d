//! Applies inbound webhook notifications to the job store.
//!
//! Completion handling is idempotent: a duplicate notification for a job
//! that already resolved (or was consumed and deleted) is acknowledged as a
//! no-op so the platform never retry-storms us over bookkeeping races.

use tracing::{debug, info, warn};

use super::notification::{EventKind, WebhookNotification};
use crate::jobs::{JobStore, Outcome, ResolveStatus};

/// How an inbound notification was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Trial ping received after registration; we confirm readiness.
    RegistrationPing,
    /// Completion notification applied against the store.
    Resolved(ResolveStatus),
    /// Payload was missing fields its event class requires.
    Malformed(String),
    /// Event class we don't track; acknowledged without state change.
    Ignored,
}

/// Path of the translated asset relative to the API base.
pub fn asset_path(document_id: &str, external_data_id: &str) -> String {
    format!("documents/d/{document_id}/externaldata/{external_data_id}")
}

pub async fn apply_notification(
    store: &JobStore,
    notification: &WebhookNotification,
) -> Disposition {
    match notification.kind() {
        EventKind::RegistrationPing => {
            debug!(webhook_id = ?notification.webhook_id, "Webhook registration ping");
            Disposition::RegistrationPing
        }
        EventKind::TranslationComplete => {
            let Some(translation_id) = notification.translation_id.as_deref() else {
                return Disposition::Malformed("completion event without translationId".to_string());
            };

            let outcome = if notification.failed() {
                Outcome::Failed {
                    reason: notification
                        .failure_reason
                        .clone()
                        .unwrap_or_else(|| "translation failed".to_string()),
                }
            } else {
                match (
                    notification.document_id.as_deref(),
                    notification.result_external_data_ids.first(),
                ) {
                    (Some(document_id), Some(external_data_id)) => Outcome::Succeeded {
                        asset_path: asset_path(document_id, external_data_id),
                    },
                    _ => {
                        return Disposition::Malformed(
                            "completion event without result identifiers".to_string(),
                        );
                    }
                }
            };

            let status = store
                .resolve(translation_id, outcome, notification.webhook_id.clone())
                .await;
            match &status {
                ResolveStatus::Applied => {
                    info!(%translation_id, "Translation resolved");
                }
                ResolveStatus::AlreadyResolved => {
                    debug!(%translation_id, "Duplicate completion notification ignored");
                }
                ResolveStatus::Buffered => {
                    warn!(%translation_id, "Completion arrived before job record, buffered");
                }
            }
            Disposition::Resolved(status)
        }
        EventKind::Other => {
            debug!(event = %notification.event, "Unhandled webhook event acknowledged");
            Disposition::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobState;
    use std::time::Duration;

    fn store() -> JobStore {
        JobStore::new(500, Duration::from_secs(300))
    }

    fn completion(translation_id: &str) -> WebhookNotification {
        serde_json::from_value(serde_json::json!({
            "event": "onshape.model.translation.complete",
            "translationId": translation_id,
            "webhookId": "wh-1",
            "requestState": "DONE",
            "documentId": "A",
            "resultExternalDataIds": ["X"]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn registration_ping_changes_nothing() {
        let store = store();
        let ping: WebhookNotification =
            serde_json::from_value(serde_json::json!({"event": "webhook.register"})).unwrap();
        assert_eq!(
            apply_notification(&store, &ping).await,
            Disposition::RegistrationPing
        );
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn completion_resolves_pending_job_with_asset_path() {
        let store = store();
        store.insert_pending("T1").await;

        let disposition = apply_notification(&store, &completion("T1")).await;
        assert_eq!(disposition, Disposition::Resolved(ResolveStatus::Applied));

        let record = store.get("T1").await.unwrap();
        assert_eq!(
            record.state,
            JobState::Succeeded {
                asset_path: "documents/d/A/externaldata/X".to_string()
            }
        );
        assert_eq!(record.webhook_id.as_deref(), Some("wh-1"));
    }

    #[tokio::test]
    async fn failed_completion_carries_the_reason() {
        let store = store();
        store.insert_pending("T1").await;

        let failed: WebhookNotification = serde_json::from_value(serde_json::json!({
            "event": "onshape.model.translation.complete",
            "translationId": "T1",
            "requestState": "FAILED",
            "failureReason": "bad geometry"
        }))
        .unwrap();
        apply_notification(&store, &failed).await;

        assert_eq!(
            store.get("T1").await.unwrap().state,
            JobState::Failed {
                reason: "bad geometry".to_string()
            }
        );
    }

    #[tokio::test]
    async fn duplicate_completion_is_a_no_op() {
        let store = store();
        store.insert_pending("T1").await;
        apply_notification(&store, &completion("T1")).await;

        let mut duplicate = completion("T1");
        duplicate.failure_reason = Some("should not apply".to_string());
        duplicate.request_state = Some("FAILED".to_string());
        let disposition = apply_notification(&store, &duplicate).await;
        assert_eq!(
            disposition,
            Disposition::Resolved(ResolveStatus::AlreadyResolved)
        );
        assert_eq!(store.get("T1").await.unwrap().state.as_str(), "succeeded");
    }

    #[tokio::test]
    async fn late_notification_for_deleted_job_stays_invisible() {
        let store = store();
        store.insert_pending("T1").await;
        apply_notification(&store, &completion("T1")).await;
        store.remove("T1").await;

        let disposition = apply_notification(&store, &completion("T1")).await;
        assert_eq!(disposition, Disposition::Resolved(ResolveStatus::Buffered));
        assert!(store.get("T1").await.is_none());
    }

    #[tokio::test]
    async fn completion_without_translation_id_is_malformed() {
        let store = store();
        let bad: WebhookNotification = serde_json::from_value(serde_json::json!({
            "event": "onshape.model.translation.complete",
            "requestState": "DONE"
        }))
        .unwrap();
        assert!(matches!(
            apply_notification(&store, &bad).await,
            Disposition::Malformed(_)
        ));
    }

    #[tokio::test]
    async fn successful_completion_without_result_ids_is_malformed() {
        let store = store();
        store.insert_pending("T1").await;
        let bad: WebhookNotification = serde_json::from_value(serde_json::json!({
            "event": "onshape.model.translation.complete",
            "translationId": "T1",
            "requestState": "DONE"
        }))
        .unwrap();
        assert!(matches!(
            apply_notification(&store, &bad).await,
            Disposition::Malformed(_)
        ));
        // Store untouched.
        assert_eq!(store.get("T1").await.unwrap().state, JobState::Pending);
    }

    #[tokio::test]
    async fn unknown_event_is_acknowledged_without_state_change() {
        let store = store();
        store.insert_pending("T1").await;
        let other: WebhookNotification = serde_json::from_value(
            serde_json::json!({"event": "onshape.workflow.transition", "translationId": "T1"}),
        )
        .unwrap();
        assert_eq!(apply_notification(&store, &other).await, Disposition::Ignored);
        assert_eq!(store.get("T1").await.unwrap().state, JobState::Pending);
    }
}
