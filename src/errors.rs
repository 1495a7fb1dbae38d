//! Typed error hierarchy for the relay.
//!
//! Two top-level enums cover the two subsystems that can fail:
//! - `UpstreamError` — outbound calls to the Onshape API (or the Flow proxy)
//! - `WebhookError` — webhook registration and teardown

use thiserror::Error;

/// Errors from outbound calls to the upstream platform.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Request to upstream failed: {0}")]
    RequestFailed(#[source] reqwest::Error),

    #[error("Upstream returned {status}: {body}")]
    ErrorStatus { status: u16, body: String },

    #[error("Upstream response was not the expected JSON: {message}")]
    UnexpectedPayload { message: String },

    #[error("No refresh token available to recover from 401")]
    MissingRefreshToken,

    #[error("OAuth token refresh failed: {0}")]
    RefreshFailed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the webhook registrar.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Failed to create webhook: {body}")]
    RegistrationRejected { status: u16, body: String },

    #[error("Failed to unregister webhook {webhook_id}: {source}")]
    UnregisterFailed {
        webhook_id: String,
        #[source]
        source: UpstreamError,
    },

    #[error("Webhook response did not contain an id: {body}")]
    MissingId { body: String },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}
