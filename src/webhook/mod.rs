//! Webhook lifecycle: registration with the upstream platform, inbound
//! notification payloads, and the receiver that drives job-store transitions.

mod notification;
mod receiver;
mod registrar;

pub use notification::{
    EventKind, TRANSLATION_COMPLETE_EVENT, WEBHOOK_REGISTER_EVENT, WORKFLOW_TRANSITION_EVENT,
    WebhookNotification,
};
pub use receiver::{Disposition, apply_notification, asset_path};
pub use registrar::{EventClass, WebhookRegistrar, WebhookScope};
